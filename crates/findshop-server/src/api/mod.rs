mod ingest;
mod search;
mod shops;
mod statistics;

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use findshop_core::{AppConfig, QueryError};

use crate::middleware::{
    enforce_rate_limit, request_id, require_ingest_token, IngestAuthState, RateLimitState,
    RequestId,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

/// Maps query-engine errors onto the API error envelope. "No results"
/// never reaches this; handlers turn it into a defined 200 response.
pub(super) fn map_query_error(request_id: String, error: &QueryError) -> ApiError {
    match error {
        QueryError::PageOutOfRange { .. } | QueryError::MissingQuery => {
            ApiError::new(request_id, "bad_request", error.to_string())
        }
        QueryError::InvalidIdentity { .. } => {
            ApiError::new(request_id, "bad_request", error.to_string())
        }
        QueryError::ShopNotFound { .. } => ApiError::new(request_id, "not_found", error.to_string()),
        QueryError::NoResults { .. } | QueryError::EmptyCatalog => {
            ApiError::new(request_id, "not_found", error.to_string())
        }
        QueryError::Catalog(e) => {
            tracing::error!(error = %e, "catalog query failed");
            ApiError::new(request_id, "internal_error", "catalog query failed")
        }
    }
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
}

fn query_router(rate_limit: RateLimitState) -> Router<AppState> {
    Router::new()
        .route("/api/v1/shops", get(shops::list_shops))
        .route("/api/v1/shops/{identity}", get(shops::get_shop))
        .route("/api/v1/search", get(search::search_items))
        .route("/api/v1/statistics", get(statistics::get_statistics))
        .layer(axum::middleware::from_fn_with_state(
            rate_limit,
            enforce_rate_limit,
        ))
}

fn ingest_router(auth: IngestAuthState, max_body_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/api/v1/ingest", post(ingest::ingest_broadcast))
        .layer(
            ServiceBuilder::new()
                .layer(DefaultBodyLimit::max(max_body_bytes))
                .layer(axum::middleware::from_fn_with_state(
                    auth,
                    require_ingest_token,
                )),
        )
}

pub fn build_app(state: AppState, auth: IngestAuthState, rate_limit: RateLimitState) -> Router {
    let public_routes = Router::new().route("/api/v1/health", get(health));
    let max_body_bytes = state.config.max_broadcast_bytes;

    Router::new()
        .merge(public_routes)
        .merge(query_router(rate_limit))
        .merge(ingest_router(auth, max_body_bytes))
        .layer(
            ServiceBuilder::new()
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);

    match findshop_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "ok",
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                    meta,
                }),
            )
        }
    }
}

pub fn default_rate_limit_state() -> RateLimitState {
    RateLimitState::new(120, Duration::from_secs(60))
}
