use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use findshop_core::{AppConfig, Environment};

/// Newtype wrapping a request ID string, stored as a request extension.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Shared-secret auth for the ingestion endpoint.
#[derive(Debug, Clone)]
pub struct IngestAuthState {
    token: Option<Arc<String>>,
}

impl IngestAuthState {
    /// Builds ingest auth from the configured shared secret.
    ///
    /// In development, a missing token disables auth for local
    /// iteration. In non-development envs, a missing token fails
    /// startup.
    ///
    /// # Errors
    ///
    /// Returns an error outside development when no token is set.
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        match &config.ingest_token {
            Some(token) => Ok(Self {
                token: Some(Arc::new(token.clone())),
            }),
            None if config.env == Environment::Development => {
                tracing::warn!(
                    "FINDSHOP_INGEST_TOKEN not set; ingest auth disabled in development environment"
                );
                Ok(Self { token: None })
            }
            None => anyhow::bail!(
                "FINDSHOP_INGEST_TOKEN is required outside development; provide the shared ingest secret"
            ),
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.token.is_some()
    }

    fn allows(&self, candidate: &str) -> bool {
        self.token.as_deref().is_some_and(|t| t == candidate)
    }
}

#[derive(Debug, Clone)]
struct RateLimitWindow {
    started_at: Instant,
    count: usize,
}

/// Fixed-window limiter for simple API protection.
#[derive(Debug, Clone)]
pub struct RateLimitState {
    max_requests: usize,
    window: Duration,
    state: Arc<Mutex<RateLimitWindow>>,
}

impl RateLimitState {
    #[must_use]
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            state: Arc::new(Mutex::new(RateLimitWindow {
                started_at: Instant::now(),
                count: 0,
            })),
        }
    }
}

#[derive(Debug, Serialize)]
struct MiddlewareErrorBody {
    error: MiddlewareError,
}

#[derive(Debug, Serialize)]
struct MiddlewareError {
    code: &'static str,
    message: &'static str,
}

/// Axum middleware that extracts or generates a request ID.
///
/// If the incoming request has an `x-request-id` header, that value is used.
/// Otherwise a new `UUIDv4` is generated. The ID is:
/// - Inserted into request extensions as [`RequestId`]
/// - Set on the response as the `x-request-id` header
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    req.extensions_mut().insert(RequestId(id.clone()));

    let mut res = next.run(req).await;

    if let Ok(val) = HeaderValue::from_str(&id) {
        res.headers_mut().insert("x-request-id", val);
    }

    res
}

/// Middleware enforcing the ingest shared secret when one is configured.
pub async fn require_ingest_token(
    State(auth): State<IngestAuthState>,
    req: Request,
    next: Next,
) -> Response {
    if !auth.enabled() {
        return next.run(req).await;
    }

    let token = extract_bearer_token(req.headers().get(AUTHORIZATION));

    match token {
        Some(token) if auth.allows(token) => next.run(req).await,
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(MiddlewareErrorBody {
                error: MiddlewareError {
                    code: "unauthorized",
                    message: "missing or invalid ingest token",
                },
            }),
        )
            .into_response(),
    }
}

/// Middleware enforcing a fixed request-per-window limit.
pub async fn enforce_rate_limit(
    State(rate_limit): State<RateLimitState>,
    req: Request,
    next: Next,
) -> Response {
    let mut window = rate_limit.state.lock().await;
    let elapsed = window.started_at.elapsed();

    if elapsed >= rate_limit.window {
        window.started_at = Instant::now();
        window.count = 0;
    }

    if window.count >= rate_limit.max_requests {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(MiddlewareErrorBody {
                error: MiddlewareError {
                    code: "rate_limited",
                    message: "rate limit exceeded",
                },
            }),
        )
            .into_response();
    }

    window.count += 1;
    drop(window);

    next.run(req).await
}

fn extract_bearer_token(value: Option<&HeaderValue>) -> Option<&str> {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};

    fn config(env: Environment, token: Option<&str>) -> AppConfig {
        AppConfig {
            database_url: "postgres://example".to_string(),
            env,
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8080),
            log_level: "info".to_string(),
            ingest_token: token.map(str::to_owned),
            db_max_connections: 10,
            db_min_connections: 1,
            db_acquire_timeout_secs: 10,
            results_per_page: 7,
            list_page_size: 10,
            chat_width: 49,
            retention_days: 14,
            max_broadcast_bytes: 1_048_576,
        }
    }

    #[test]
    fn extract_bearer_token_accepts_valid_header() {
        let header = HeaderValue::from_static("Bearer test-token");
        assert_eq!(extract_bearer_token(Some(&header)), Some("test-token"));
    }

    #[test]
    fn extract_bearer_token_rejects_non_bearer_header() {
        let header = HeaderValue::from_static("Basic abc123");
        assert_eq!(extract_bearer_token(Some(&header)), None);
    }

    #[test]
    fn auth_disabled_without_token_in_development() {
        let state = IngestAuthState::from_config(&config(Environment::Development, None))
            .expect("dev should allow missing token");
        assert!(!state.enabled());
    }

    #[test]
    fn auth_required_outside_development() {
        assert!(IngestAuthState::from_config(&config(Environment::Production, None)).is_err());
    }

    #[test]
    fn auth_allows_only_the_configured_token() {
        let state = IngestAuthState::from_config(&config(Environment::Production, Some("secret")))
            .expect("configured token");
        assert!(state.enabled());
        assert!(state.allows("secret"));
        assert!(!state.allows("other"));
    }
}
