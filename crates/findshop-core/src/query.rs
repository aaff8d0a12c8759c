//! Query engine: turns a user's raw search/list request into a
//! deterministic, paginated result against the catalog store.
//!
//! Each query is stateless and reproducible from the current store
//! snapshot; ranking and pagination are fully defined so two identical
//! requests against the same snapshot always render the same page.

use std::cmp::Ordering;

use serde::Serialize;
use thiserror::Error;

use crate::catalog::{Catalog, CatalogError, CatalogStatistics, SearchFilter};
use crate::types::{IdentityParseError, ItemHit, ShopIdentity, ShopRecord, ShopSummary};

/// Fixed page size for item search results.
pub const SEARCH_PAGE_SIZE: usize = 7;
/// Fixed page size for the shop list.
pub const LIST_PAGE_SIZE: usize = 10;

/// What the searcher wants to do: `Buy` finds shops selling the item,
/// `Sell` finds shops buying it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchDirection {
    Buy,
    Sell,
}

impl SearchDirection {
    /// Parses a request parameter; `None` for anything unrecognized.
    #[must_use]
    pub fn from_param(raw: &str) -> Option<Self> {
        match raw.to_lowercase().as_str() {
            "buy" | "b" => Some(Self::Buy),
            "sell" | "sl" => Some(Self::Sell),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("no results for {query:?}")]
    NoResults { query: String },
    #[error("no shops in the catalog yet")]
    EmptyCatalog,
    #[error("page {page} is out of bounds (1..={pages})")]
    PageOutOfRange { page: u32, pages: u32 },
    #[error("missing search text")]
    MissingQuery,
    #[error("invalid shop identity {input:?}: {source}")]
    InvalidIdentity {
        input: String,
        source: IdentityParseError,
    },
    #[error("no shop with identity {identity}")]
    ShopNotFound { identity: ShopIdentity },
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// One page of the alphabetical shop list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PagedShops {
    pub page: u32,
    pub pages: u32,
    pub total: usize,
    pub shops: Vec<ShopSummary>,
}

/// One page of ranked search results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PagedHits {
    pub direction: SearchDirection,
    pub query: String,
    pub page: u32,
    pub pages: u32,
    pub total: usize,
    pub hits: Vec<ItemHit>,
}

pub struct QueryEngine<'a> {
    catalog: &'a dyn Catalog,
    search_page_size: usize,
    list_page_size: usize,
}

impl<'a> QueryEngine<'a> {
    #[must_use]
    pub fn new(catalog: &'a dyn Catalog) -> Self {
        Self {
            catalog,
            search_page_size: SEARCH_PAGE_SIZE,
            list_page_size: LIST_PAGE_SIZE,
        }
    }

    #[must_use]
    pub fn with_page_sizes(mut self, search: usize, list: usize) -> Self {
        self.search_page_size = search.max(1);
        self.list_page_size = list.max(1);
        self
    }

    /// All shops, alphabetical, paged.
    ///
    /// # Errors
    ///
    /// [`QueryError::EmptyCatalog`] when no shops exist,
    /// [`QueryError::PageOutOfRange`] for pages outside `1..=pages`.
    pub async fn list_shops(&self, page: u32) -> Result<PagedShops, QueryError> {
        let shops = self.catalog.list_all().await?;
        if shops.is_empty() {
            return Err(QueryError::EmptyCatalog);
        }

        let total = shops.len();
        let summaries: Vec<ShopSummary> = shops.iter().map(ShopRecord::summary).collect();
        let (shops, pages) = paginate(summaries, page, self.list_page_size)?;

        Ok(PagedShops {
            page,
            pages,
            total,
            shops,
        })
    }

    /// Ranked item search. A leading `=` switches the match from
    /// substring to equality on name/display name.
    ///
    /// Items without a KST price never appear; for `Buy`, items with
    /// zero stock that are not made on demand never appear.
    ///
    /// # Errors
    ///
    /// [`QueryError::MissingQuery`] for blank queries,
    /// [`QueryError::NoResults`] when nothing matches,
    /// [`QueryError::PageOutOfRange`] for pages outside `1..=pages`.
    pub async fn search(
        &self,
        text: &str,
        page: u32,
        direction: SearchDirection,
    ) -> Result<PagedHits, QueryError> {
        let trimmed = text.trim();
        let (query, exact) = match trimmed.strip_prefix('=') {
            Some(rest) if !rest.trim().is_empty() => (rest.trim(), true),
            Some(_) => return Err(QueryError::MissingQuery),
            None if trimmed.is_empty() => return Err(QueryError::MissingQuery),
            None => (trimmed, false),
        };

        let filter = SearchFilter {
            query: query.to_owned(),
            exact,
            in_stock: direction == SearchDirection::Buy,
            shop_buys_item: direction == SearchDirection::Sell,
        };

        let mut hits = self.catalog.search_items(&filter).await?;
        hits.retain(|hit| hit.item.kst_price().is_some());

        if hits.is_empty() {
            return Err(QueryError::NoResults {
                query: query.to_owned(),
            });
        }

        rank_hits(&mut hits, direction);

        let total = hits.len();
        let (hits, pages) = paginate(hits, page, self.search_page_size)?;

        Ok(PagedHits {
            direction,
            query: query.to_owned(),
            page,
            pages,
            total,
            hits,
        })
    }

    /// Looks up one shop by its `computerID[:multiShop]` identity string.
    ///
    /// # Errors
    ///
    /// [`QueryError::InvalidIdentity`] for malformed identity strings,
    /// distinct from [`QueryError::ShopNotFound`] for unknown shops.
    pub async fn shop_detail(&self, identity_str: &str) -> Result<ShopRecord, QueryError> {
        let identity: ShopIdentity =
            identity_str
                .parse()
                .map_err(|source| QueryError::InvalidIdentity {
                    input: identity_str.to_owned(),
                    source,
                })?;

        self.catalog
            .get_by_identity(identity)
            .await?
            .ok_or(QueryError::ShopNotFound { identity })
    }

    /// # Errors
    ///
    /// Propagates storage failures.
    pub async fn statistics(&self) -> Result<CatalogStatistics, QueryError> {
        Ok(self.catalog.statistics().await?)
    }
}

/// Binary in-stock split first, then KST price: ascending when the
/// searcher buys (cheapest seller first), descending when the searcher
/// sells (highest offer first). `sort_by` is stable, so ties keep the
/// store's natural order.
fn rank_hits(hits: &mut [ItemHit], direction: SearchDirection) {
    hits.sort_by(|a, b| {
        let group_a = u8::from(!a.item.in_stock());
        let group_b = u8::from(!b.item.in_stock());
        group_a.cmp(&group_b).then_with(|| {
            let price_a = a.item.kst_price().map_or(f64::MAX, |p| p.value);
            let price_b = b.item.kst_price().map_or(f64::MAX, |p| p.value);
            let ordering = price_a.partial_cmp(&price_b).unwrap_or(Ordering::Equal);
            match direction {
                SearchDirection::Buy => ordering,
                SearchDirection::Sell => ordering.reverse(),
            }
        })
    });
}

/// Out-of-range pages are a reported error, never clamped. Callers
/// short-circuit empty result sets before page math, so `pages >= 1`
/// whenever this runs.
fn paginate<T>(rows: Vec<T>, page: u32, page_size: usize) -> Result<(Vec<T>, u32), QueryError> {
    let pages = u32::try_from(rows.len().div_ceil(page_size)).unwrap_or(u32::MAX);
    if page < 1 || page > pages {
        return Err(QueryError::PageOutOfRange { page, pages });
    }

    let start = (page as usize - 1) * page_size;
    let rows = rows.into_iter().skip(start).take(page_size).collect();
    Ok((rows, pages))
}
