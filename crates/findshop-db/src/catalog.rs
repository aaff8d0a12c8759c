//! Postgres implementation of the [`Catalog`] storage port.

use async_trait::async_trait;
use chrono::Duration;
use sqlx::PgPool;

use findshop_core::{
    Catalog, CatalogError, CatalogStatistics, ItemHit, NormalizedShop, SearchFilter, ShopIdentity,
    ShopRecord, UpsertOutcome,
};

use crate::DbError;

/// [`Catalog`] over a shared Postgres pool. Cloning shares the pool.
#[derive(Debug, Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn storage(error: DbError) -> CatalogError {
    CatalogError::Storage(Box::new(error))
}

#[async_trait]
impl Catalog for PgCatalog {
    async fn upsert(&self, shop: &NormalizedShop) -> Result<UpsertOutcome, CatalogError> {
        crate::shops::upsert_shop(&self.pool, shop)
            .await
            .map_err(storage)
    }

    async fn get_by_identity(
        &self,
        identity: ShopIdentity,
    ) -> Result<Option<ShopRecord>, CatalogError> {
        crate::shops::get_shop_by_identity(&self.pool, identity)
            .await
            .map_err(storage)
    }

    async fn list_all(&self) -> Result<Vec<ShopRecord>, CatalogError> {
        crate::shops::list_all_shops(&self.pool).await.map_err(storage)
    }

    async fn search_items(&self, filter: &SearchFilter) -> Result<Vec<ItemHit>, CatalogError> {
        crate::search::search_shop_items(&self.pool, filter)
            .await
            .map_err(storage)
    }

    async fn sweep_expired(&self, window: Duration) -> Result<u64, CatalogError> {
        crate::shops::sweep_expired_shops(&self.pool, window)
            .await
            .map_err(storage)
    }

    async fn statistics(&self) -> Result<CatalogStatistics, CatalogError> {
        crate::shops::catalog_statistics(&self.pool)
            .await
            .map_err(storage)
    }
}
