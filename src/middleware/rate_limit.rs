//! Per-client request quota.
//!
//! Clients are keyed by the SHA-256 of their bearer token so raw keys never
//! reach the counter store. Only tokens that match an active API key get a
//! bucket of their own; missing or unknown tokens share the `anonymous` one. Every response carries `X-RateLimit-Limit` and
//! `X-RateLimit-Remaining`; rejected requests get 429 with `Retry-After`.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::app::AppState;
use crate::error::AppError;
use crate::middleware::auth::bearer_token;
use crate::services::Context;
use crate::services::auth_service::hash_key;
use crate::services::rate_limit_service::Decision;

pub const LIMIT_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const REMAINING_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

const ANONYMOUS: &str = "anonymous";

/// Bucket key for the request.
///
/// The token is read before the returned future is built so the future does
/// not borrow the (non-`Sync`) request and stays `Send`.
pub fn client_key<'a>(
    ctx: &'a Context,
    request: &Request,
) -> impl Future<Output = String> + Send + use<'a> {
    let key_hash = bearer_token(request).map(hash_key);
    async move {
        let Some(key_hash) = key_hash else {
            return ANONYMOUS.to_string();
        };
        match ctx.repos.auth.find_api_key_by_hash(&key_hash).await {
            Ok(Some(_)) => key_hash,
            Ok(None) => ANONYMOUS.to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "API key lookup failed, using anonymous bucket");
                ANONYMOUS.to_string()
            }
        }
    }
}

fn set_headers(headers: &mut HeaderMap, limit: u64, remaining: u64) {
    headers.insert(LIMIT_HEADER, HeaderValue::from(limit));
    headers.insert(REMAINING_HEADER, HeaderValue::from(remaining));
}

pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let key = client_key(&state.ctx, &request).await;
    match state.rate_limiter.check(&key).await {
        Decision::Allowed { limit, remaining } => {
            let mut response = next.run(request).await;
            set_headers(response.headers_mut(), limit, remaining);
            response
        }
        Decision::Limited { limit, retry_after } => {
            tracing::warn!(path = %request.uri().path(), retry_after, "Rate limit exceeded");
            let mut response = AppError::RateLimited(retry_after).into_response();
            set_headers(response.headers_mut(), limit, 0);
            response
        }
    }
}
