use axum::{body::Bytes, extract::State, http::StatusCode, Extension, Json};
use serde::Serialize;

use findshop_core::{validate_broadcast, Catalog};
use findshop_db::PgCatalog;

use crate::middleware::RequestId;

use super::{ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Serialize)]
pub(super) struct IngestData {
    pub shop_id: i64,
    pub created: bool,
    pub identity: String,
}

/// Accepts one raw broadcast, validates it, and replaces the shop's
/// snapshot. Rejections are logged and dropped; the producer resends
/// on its own schedule, so there is no retry here.
pub(super) async fn ingest_broadcast(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    body: Bytes,
) -> Result<(StatusCode, Json<ApiResponse<IngestData>>), ApiError> {
    let raw: serde_json::Value = serde_json::from_slice(&body).map_err(|e| {
        ApiError::new(
            req_id.0.clone(),
            "bad_request",
            format!("invalid JSON payload: {e}"),
        )
    })?;

    let shop = match validate_broadcast(&raw) {
        Ok(shop) => shop,
        Err(reason) => {
            tracing::warn!(reason = %reason, "rejected broadcast");
            return Err(ApiError::new(
                req_id.0,
                "validation_error",
                reason.to_string(),
            ));
        }
    };

    let catalog = PgCatalog::new(state.pool.clone());
    let outcome = catalog.upsert(&shop).await.map_err(|e| {
        tracing::error!(
            error = %e,
            identity = %shop.identity,
            "broadcast upsert failed"
        );
        ApiError::new(
            req_id.0.clone(),
            "internal_error",
            "failed to store broadcast",
        )
    })?;

    tracing::info!(
        identity = %shop.identity,
        created = outcome.created,
        items = shop.items.len(),
        "broadcast ingested"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse {
            data: IngestData {
                shop_id: outcome.shop_id,
                created: outcome.created,
                identity: shop.identity.to_string(),
            },
            meta: ResponseMeta::new(req_id.0),
        }),
    ))
}
