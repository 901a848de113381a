use super::error::*;
use super::handler;
use crate::application_port::*;
use crate::domain_model::Role;
use crate::server::*;
use serde::de::DeserializeOwned;
use std::convert::Infallible;
use std::sync::Arc;
use warp::{Filter, Rejection, http, reject};

const MAX_BODY_BYTES: u64 = 16 * 1024;

pub fn routes(
    server: Arc<Server>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = Rejection> + Clone {
    let register = warp::post()
        .and(warp::path!("auth" / "register"))
        .and(json_body())
        .and(with(server.user_service.clone()))
        .and_then(handler::register);

    let login = warp::post()
        .and(warp::path!("auth" / "login"))
        .and(json_body())
        .and(with(server.auth_service.clone()))
        .and_then(handler::login);

    let refresh = warp::post()
        .and(warp::path!("auth" / "refresh"))
        .and(json_body())
        .and(with(server.auth_service.clone()))
        .and_then(handler::refresh);

    let logout = warp::post()
        .and(warp::path!("auth" / "logout"))
        .and(with_verification(server.auth_service.clone()))
        .and(with(server.auth_service.clone()))
        .and_then(handler::logout);

    let logout_all = warp::post()
        .and(warp::path!("auth" / "logout_all"))
        .and(with_verification(server.auth_service.clone()))
        .and(with(server.auth_service.clone()))
        .and_then(handler::logout_all);

    let revoke_sessions = warp::post()
        .and(warp::path!("admin" / "revoke_sessions"))
        .and(with_role(
            Role::Admin,
            server.auth_service.clone(),
            server.user_service.clone(),
        ))
        .and(json_body())
        .and(with(server.auth_service.clone()))
        .and_then(handler::revoke_sessions);

    let health = warp::get()
        .and(warp::path!("health"))
        .and_then(handler::health);

    register
        .or(login)
        .or(refresh)
        .or(logout)
        .or(logout_all)
        .or(revoke_sessions)
        .or(health)
}

fn with<ServiceType>(
    service: Arc<ServiceType>,
) -> impl Filter<Extract = (Arc<ServiceType>,), Error = Infallible> + Clone
where
    ServiceType: Send + Sync + ?Sized,
{
    warp::any().map(move || service.clone())
}

fn json_body<T>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone
where
    T: DeserializeOwned + Send,
{
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}

fn bearer(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

fn with_verification(
    auth_service: Arc<dyn AuthService>,
) -> impl Filter<Extract = (AccessTokenClaims,), Error = Rejection> + Clone {
    warp::header::<String>(http::header::AUTHORIZATION.as_ref()).and_then(move |header: String| {
        let auth_service = auth_service.clone();
        async move {
            let Some(token) = bearer(&header) else {
                return Err(reject::custom(ApiErrorCode::InvalidToken));
            };
            auth_service
                .authenticate(token)
                .await
                .map_err(ApiErrorCode::from)
                .map_err(reject::custom)
        }
    })
}

/// Verified caller whose current role permits `required`. The role is read
/// from the identity store, not from the token.
fn with_role(
    required: Role,
    auth_service: Arc<dyn AuthService>,
    user_service: Arc<dyn UserService>,
) -> impl Filter<Extract = (AccessTokenClaims,), Error = Rejection> + Clone {
    with_verification(auth_service).and_then(move |claims: AccessTokenClaims| {
        let user_service = user_service.clone();
        async move {
            let role = user_service
                .role_of(claims.subject)
                .await
                .map_err(ApiErrorCode::from)
                .map_err(reject::custom)?;
            match role {
                Some(role) if role.permits(required) => Ok(claims),
                Some(_) => Err(reject::custom(ApiErrorCode::Forbidden)),
                None => Err(reject::custom(ApiErrorCode::InvalidToken)),
            }
        }
    })
}
