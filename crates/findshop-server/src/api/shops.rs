use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use findshop_core::{format, QueryEngine, QueryError, ShopRecord, ShopSummary};
use findshop_db::PgCatalog;

use crate::middleware::RequestId;

use super::{map_query_error, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct PageParams {
    page: Option<u32>,
}

#[derive(Debug, Serialize)]
pub(super) struct ShopListData {
    pub page: u32,
    pub pages: u32,
    pub total: usize,
    pub shops: Vec<ShopSummary>,
    pub rendered: String,
}

pub(super) async fn list_shops(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(params): Query<PageParams>,
) -> Result<Json<ApiResponse<ShopListData>>, ApiError> {
    let catalog = PgCatalog::new(state.pool.clone());
    let engine = QueryEngine::new(&catalog)
        .with_page_sizes(state.config.results_per_page, state.config.list_page_size);

    let page = params.page.unwrap_or(1);
    let data = match engine.list_shops(page).await {
        Ok(results) => ShopListData {
            page: results.page,
            pages: results.pages,
            total: results.total,
            rendered: format::render_shop_list(&results, state.config.chat_width, Utc::now()),
            shops: results.shops,
        },
        Err(QueryError::EmptyCatalog) => ShopListData {
            page: 1,
            pages: 0,
            total: 0,
            shops: Vec::new(),
            rendered: format::render_empty_catalog(),
        },
        Err(e) => return Err(map_query_error(req_id.0, &e)),
    };

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[derive(Debug, Serialize)]
pub(super) struct ShopDetailData {
    pub shop: ShopRecord,
    pub rendered: String,
}

pub(super) async fn get_shop(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(identity): Path<String>,
) -> Result<Json<ApiResponse<ShopDetailData>>, ApiError> {
    let catalog = PgCatalog::new(state.pool.clone());
    let engine = QueryEngine::new(&catalog);

    let shop = engine
        .shop_detail(&identity)
        .await
        .map_err(|e| map_query_error(req_id.0.clone(), &e))?;

    let rendered = format::render_shop_detail(&shop, Utc::now());
    Ok(Json(ApiResponse {
        data: ShopDetailData { shop, rendered },
        meta: ResponseMeta::new(req_id.0),
    }))
}
