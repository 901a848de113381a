use crate::api::v1::handler::ApiResponse;
use crate::application_port::*;
use crate::validation::FieldErrors;
use serde::Serialize;
use std::convert::Infallible;
use thiserror::Error;
use tracing::{error, warn};
use warp::body::BodyDeserializeError;
use warp::http::StatusCode;
use warp::{Rejection, reject};

pub async fn recover_error(err: Rejection) -> Result<impl warp::Reply, Infallible> {
    let (code, details) = if let Some(code) = err.find::<ApiErrorCode>() {
        (*code, None)
    } else if let Some(ValidationRejection(fields)) = err.find::<ValidationRejection>() {
        (ApiErrorCode::ValidationFailed, Some(fields.clone()))
    } else if err.is_not_found() {
        (ApiErrorCode::NotFound, None)
    } else if let Some(e) = err.find::<BodyDeserializeError>() {
        warn!(error = %e, "unreadable request body");
        (ApiErrorCode::BadRequest, None)
    } else if err.find::<warp::cors::CorsForbidden>().is_some() {
        (ApiErrorCode::Forbidden, None)
    } else if err.find::<reject::MissingHeader>().is_some() {
        (ApiErrorCode::InvalidToken, None)
    } else if err.find::<reject::MethodNotAllowed>().is_some() {
        (ApiErrorCode::NotFound, None)
    } else if err.find::<reject::PayloadTooLarge>().is_some()
        || err.find::<reject::LengthRequired>().is_some()
        || err.find::<reject::UnsupportedMediaType>().is_some()
    {
        (ApiErrorCode::BadRequest, None)
    } else {
        error!("unhandled rejection: {:?}", err);
        (ApiErrorCode::InternalError, None)
    };

    let status = code.status();
    let body = ApiResponse::<()>::failure(ApiError {
        message: code.to_string(),
        code,
        details,
    });
    Ok(warp::reply::with_status(warp::reply::json(&body), status))
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<FieldErrors>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
pub enum ApiErrorCode {
    #[error("Malformed request")]
    BadRequest,
    #[error("Validation failed")]
    ValidationFailed,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Token is not valid")]
    InvalidToken,
    #[error("Insufficient permissions")]
    Forbidden,
    #[error("Email already registered")]
    EmailTaken,
    #[error("Service temporarily unavailable")]
    ServiceUnavailable,
    #[error("Internal error")]
    InternalError,
    #[error("Not found")]
    NotFound,
}

impl ApiErrorCode {
    pub fn internal<E: std::fmt::Display>(error: E) -> ApiErrorCode {
        warn!("Internal error: {}", error);
        ApiErrorCode::InternalError
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiErrorCode::BadRequest | ApiErrorCode::ValidationFailed => StatusCode::BAD_REQUEST,
            ApiErrorCode::InvalidCredentials | ApiErrorCode::InvalidToken => {
                StatusCode::UNAUTHORIZED
            }
            ApiErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ApiErrorCode::EmailTaken => StatusCode::CONFLICT,
            ApiErrorCode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            ApiErrorCode::NotFound => StatusCode::NOT_FOUND,
        }
    }
}

impl reject::Reject for ApiErrorCode {}

impl From<AuthError> for ApiErrorCode {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::InvalidCredentials => ApiErrorCode::InvalidCredentials,
            // a pinned-algorithm violation looks like any other bad token
            AuthError::InvalidOrExpiredToken | AuthError::AlgorithmRejected => {
                ApiErrorCode::InvalidToken
            }
            AuthError::EmailTaken => ApiErrorCode::EmailTaken,
            AuthError::StoreUnavailable(_) => ApiErrorCode::ServiceUnavailable,
            AuthError::InternalError(e) => ApiErrorCode::internal(e),
        }
    }
}

/// Field-level validation failures, reported back with their messages.
#[derive(Debug)]
pub struct ValidationRejection(pub FieldErrors);

impl reject::Reject for ValidationRejection {}
