use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use findshop_core::{format, ItemHit, QueryEngine, QueryError, SearchDirection};
use findshop_db::PgCatalog;

use crate::middleware::RequestId;

use super::{map_query_error, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct SearchParams {
    q: Option<String>,
    direction: Option<String>,
    page: Option<u32>,
}

#[derive(Debug, Serialize)]
pub(super) struct SearchData {
    pub query: String,
    pub direction: SearchDirection,
    pub page: u32,
    pub pages: u32,
    pub total: usize,
    pub results: Vec<ItemHit>,
    pub rendered: String,
}

pub(super) async fn search_items(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(params): Query<SearchParams>,
) -> Result<Json<ApiResponse<SearchData>>, ApiError> {
    let direction = match params.direction.as_deref() {
        None => SearchDirection::Buy,
        Some(raw) => SearchDirection::from_param(raw).ok_or_else(|| {
            ApiError::new(
                req_id.0.clone(),
                "bad_request",
                format!("unknown search direction {raw:?}; expected \"buy\" or \"sell\""),
            )
        })?,
    };

    let catalog = PgCatalog::new(state.pool.clone());
    let engine = QueryEngine::new(&catalog)
        .with_page_sizes(state.config.results_per_page, state.config.list_page_size);

    let text = params.q.unwrap_or_default();
    let data = match engine.search(&text, params.page.unwrap_or(1), direction).await {
        Ok(results) => SearchData {
            query: results.query.clone(),
            direction,
            page: results.page,
            pages: results.pages,
            total: results.total,
            rendered: format::render_search_page(&results, state.config.chat_width, Utc::now()),
            results: results.hits,
        },
        // A miss is a defined answer, not a failure.
        Err(QueryError::NoResults { query }) => SearchData {
            rendered: format::render_no_results(&query, direction),
            query,
            direction,
            page: 1,
            pages: 0,
            total: 0,
            results: Vec::new(),
        },
        Err(e) => return Err(map_query_error(req_id.0, &e)),
    };

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}
