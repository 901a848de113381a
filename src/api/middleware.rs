use super::v1;
use crate::server::Server;
use std::convert::Infallible;
use std::sync::Arc;
use warp::http::HeaderMap;
use warp::Filter;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

const MAX_REQUEST_ID_LEN: usize = 128;

/// The whole HTTP surface: `/api/v1` routes with CORS, error recovery,
/// request ids and a per-request trace span.
pub fn app(
    server: Arc<Server>,
    cors_allowed_origins: &[String],
) -> impl Filter<Extract = (impl warp::Reply + use<>,), Error = Infallible> + Clone + use<> {
    let api_v1 = warp::path("api")
        .and(warp::path("v1"))
        .and(v1::routes(server))
        .with(cors(cors_allowed_origins))
        .recover(v1::recover_error);

    request_id()
        .and(api_v1)
        .map(|id: String, reply| warp::reply::with_header(reply, REQUEST_ID_HEADER, id))
        .with(warp::trace(|info| {
            tracing::info_span!(
                "request",
                method = %info.method(),
                path = info.path(),
                request_id = tracing::field::Empty,
            )
        }))
}

pub fn cors(allowed_origins: &[String]) -> warp::cors::Builder {
    let builder = warp::cors()
        .allow_methods(["GET", "POST", "OPTIONS"])
        .allow_headers(["origin", "content-type", "authorization", REQUEST_ID_HEADER])
        .expose_headers([REQUEST_ID_HEADER]);

    if allowed_origins.iter().any(|o| o == "*") {
        builder.allow_any_origin()
    } else {
        builder
            .allow_origins(allowed_origins.iter().map(String::as_str))
            .allow_credentials(true)
    }
}

/// The caller's `X-Request-ID` when it is usable, otherwise a fresh one.
/// Recorded on the current request span.
pub fn request_id() -> impl Filter<Extract = (String,), Error = Infallible> + Clone {
    warp::header::headers_cloned().map(|headers: HeaderMap| {
        let id = headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|id| usable_request_id(id))
            .map(str::to_owned)
            .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());
        tracing::Span::current().record("request_id", id.as_str());
        id
    })
}

fn usable_request_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_REQUEST_ID_LEN
        && id.bytes().all(|b| b.is_ascii_graphic())
}
