//! Storage port for the shop catalog.
//!
//! The store is a plain trait so the query engine runs against any
//! relational backend (and against an in-memory double in tests).

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::types::{ItemHit, NormalizedShop, ShopIdentity, ShopRecord};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("storage failure: {0}")]
    Storage(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Result of an upsert: the store-internal id and whether the identity
/// was seen for the first time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UpsertOutcome {
    pub shop_id: i64,
    pub created: bool,
}

/// Item search parameters as the store understands them. `query` is
/// matched case-insensitively against item name or display name;
/// `in_stock` keeps rows with non-zero stock or `made_on_demand`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilter {
    pub query: String,
    pub exact: bool,
    pub in_stock: bool,
    pub shop_buys_item: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CatalogStatistics {
    pub shop_count: i64,
    pub item_count: i64,
    pub location_count: i64,
    pub latest_seen: Option<DateTime<Utc>>,
}

/// Durable keyed storage of canonical shop records.
///
/// `upsert` is the sole mutation point: per identity it atomically
/// replaces the previous snapshot wholesale, so readers never observe a
/// mix of old and new items or locations. All other operations are
/// read-only except [`Catalog::sweep_expired`].
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Insert or wholesale-replace the snapshot for `shop`'s identity,
    /// bumping `last_seen`.
    async fn upsert(&self, shop: &NormalizedShop) -> Result<UpsertOutcome, CatalogError>;

    /// Exact identity lookup: an absent `multi_shop` matches only shops
    /// without one.
    async fn get_by_identity(
        &self,
        identity: ShopIdentity,
    ) -> Result<Option<ShopRecord>, CatalogError>;

    /// Every shop, ordered case-insensitively by name with insertion
    /// order breaking ties.
    async fn list_all(&self) -> Result<Vec<ShopRecord>, CatalogError>;

    /// Matching items with their parent shops, in stable
    /// (shop, item) insertion order.
    async fn search_items(&self, filter: &SearchFilter) -> Result<Vec<ItemHit>, CatalogError>;

    /// Delete shops not seen within `window`, cascading to their
    /// locations, items, and prices. Returns the number deleted.
    async fn sweep_expired(&self, window: Duration) -> Result<u64, CatalogError>;

    async fn statistics(&self) -> Result<CatalogStatistics, CatalogError>;
}
