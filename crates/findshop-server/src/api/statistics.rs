use axum::{extract::State, Extension, Json};
use serde::Serialize;

use findshop_core::{format, CatalogStatistics, QueryEngine};
use findshop_db::PgCatalog;

use crate::middleware::RequestId;

use super::{map_query_error, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Serialize)]
pub(super) struct StatisticsData {
    pub statistics: CatalogStatistics,
    pub rendered: String,
}

pub(super) async fn get_statistics(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<StatisticsData>>, ApiError> {
    let catalog = PgCatalog::new(state.pool.clone());
    let engine = QueryEngine::new(&catalog);

    let statistics = engine
        .statistics()
        .await
        .map_err(|e| map_query_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: StatisticsData {
            rendered: format::render_statistics(&statistics),
            statistics,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}
