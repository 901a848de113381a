use super::error::*;
use crate::application_port::*;
use crate::domain_model::UserId;
use crate::logger::*;
use crate::validation::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use warp::http::StatusCode;
use warp::{self, Rejection, reject};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(error: ApiError) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(error),
        }
    }
}

fn validated<T: Validate>(body: T) -> Result<T, Rejection> {
    body.validate()
        .map_err(|fields| reject::custom(ValidationRejection(fields)))?;
    Ok(body)
}

fn rejected(error: AuthError) -> Rejection {
    reject::custom(ApiErrorCode::from(error))
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl Validate for RegisterRequest {
    const RULES: &'static [FieldRule] = REGISTER_RULES;

    fn field(&self, name: &str) -> &str {
        match name {
            "name" => &self.name,
            "email" => &self.email,
            "password" => &self.password,
            _ => "",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: UserId,
}

pub async fn register(
    body: RegisterRequest,
    user_service: Arc<dyn UserService>,
) -> Result<impl warp::Reply, Rejection> {
    let body = validated(body)?;
    let user_id = user_service
        .register(RegisterInput {
            name: body.name,
            email: body.email,
            password: body.password,
        })
        .await
        .map_err(rejected)?;

    Ok(warp::reply::with_status(
        warp::reply::json(&ApiResponse::ok(RegisterResponse { user_id })),
        StatusCode::CREATED,
    ))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl Validate for LoginRequest {
    const RULES: &'static [FieldRule] = LOGIN_RULES;

    fn field(&self, name: &str) -> &str {
        match name {
            "email" => &self.email,
            "password" => &self.password,
            _ => "",
        }
    }
}

pub async fn login(
    body: LoginRequest,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, Rejection> {
    let body = validated(body)?;
    let tokens = auth_service
        .login(LoginInput {
            email: body.email,
            password: body.password,
        })
        .await
        .map_err(rejected)?;

    Ok(warp::reply::json(&ApiResponse::ok(tokens)))
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh_token: String,
}

impl Validate for RefreshRequest {
    const RULES: &'static [FieldRule] = REFRESH_RULES;

    fn field(&self, name: &str) -> &str {
        match name {
            "refresh_token" => &self.refresh_token,
            _ => "",
        }
    }
}

pub async fn refresh(
    body: RefreshRequest,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, Rejection> {
    let body = validated(body)?;
    let tokens = auth_service
        .refresh(&body.refresh_token)
        .await
        .map_err(rejected)?;

    Ok(warp::reply::json(&ApiResponse::ok(tokens)))
}

#[derive(Debug, Serialize)]
pub struct RevokedResponse {
    pub revoked: u64,
}

pub async fn logout(
    claims: AccessTokenClaims,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, Rejection> {
    auth_service.logout(&claims).await.map_err(rejected)?;
    Ok(warp::reply::json(&ApiResponse::ok(())))
}

pub async fn logout_all(
    claims: AccessTokenClaims,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, Rejection> {
    let revoked = auth_service
        .logout_all(claims.subject)
        .await
        .map_err(rejected)?;
    Ok(warp::reply::json(&ApiResponse::ok(RevokedResponse { revoked })))
}

#[derive(Deserialize)]
pub struct RevokeSessionsRequest {
    #[serde(default)]
    pub user_id: String,
}

impl Validate for RevokeSessionsRequest {
    const RULES: &'static [FieldRule] = REVOKE_SESSIONS_RULES;

    fn field(&self, name: &str) -> &str {
        match name {
            "user_id" => &self.user_id,
            _ => "",
        }
    }
}

pub async fn revoke_sessions(
    claims: AccessTokenClaims,
    body: RevokeSessionsRequest,
    auth_service: Arc<dyn AuthService>,
) -> Result<impl warp::Reply, Rejection> {
    let body = validated(body)?;
    let target: UserId = body.user_id.trim().parse().map_err(|_| {
        reject::custom(ValidationRejection(FieldErrors::from([(
            "user_id",
            "user_id must be a UUID",
        )])))
    })?;

    let revoked = auth_service.logout_all(target).await.map_err(rejected)?;
    info!(admin = %claims.subject, user = %target, revoked, "sessions revoked by admin");

    Ok(warp::reply::json(&ApiResponse::ok(RevokedResponse { revoked })))
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

pub async fn health() -> Result<impl warp::Reply, Rejection> {
    Ok(warp::reply::json(&ApiResponse::ok(HealthResponse {
        status: "ok",
    })))
}
