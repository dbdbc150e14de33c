use std::net::SocketAddr;

use crate::error::{AppError, Result};
use crate::state::AppState;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{Extensions, HeaderMap, HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use linkhop_ratelimit::Decision;

pub const UNKNOWN_CLIENT: &str = "unknown";

static RATE_LIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
static RATE_LIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

/// Address of the calling client.
///
/// With `trust_forwarded` the first `X-Forwarded-For` hop wins; otherwise
/// the peer address of the connection is used.
pub fn client_address(headers: &HeaderMap, extensions: &Extensions, trust_forwarded: bool) -> String {
    if trust_forwarded {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(addr) = forwarded {
            return addr.to_string();
        }
    }

    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

/// Admits the request through the rate limiter, keyed by client address.
///
/// Throttled requests are answered with `429 Too Many Requests` and a
/// `Retry-After` header; admitted ones carry the remaining budget.
pub async fn rate_limit(State(state): State<AppState>, req: Request, next: Next) -> Result<Response> {
    let identity = client_address(req.headers(), req.extensions(), state.trust_forwarded);

    match state.limiter.check(&identity).await? {
        Decision::Admitted { limit, remaining } => {
            let mut response = next.run(req).await;
            let headers = response.headers_mut();
            headers.insert(RATE_LIMIT_LIMIT.clone(), HeaderValue::from(limit));
            headers.insert(RATE_LIMIT_REMAINING.clone(), HeaderValue::from(remaining));
            Ok(response)
        }
        Decision::Throttled { retry_after, .. } => Err(AppError::Throttled { retry_after }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forwarded_header_only_when_trusted() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        let mut extensions = Extensions::new();
        extensions.insert(ConnectInfo("192.0.2.1:5555".parse::<SocketAddr>().unwrap()));

        assert_eq!(client_address(&headers, &extensions, true), "203.0.113.7");
        assert_eq!(client_address(&headers, &extensions, false), "192.0.2.1");
        assert_eq!(
            client_address(&HeaderMap::new(), &Extensions::new(), true),
            UNKNOWN_CLIENT
        );
    }
}
