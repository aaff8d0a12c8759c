//! Item search against the catalog.
//!
//! Matching happens in SQL (case-insensitive, on item name or display
//! name); ranking and pagination belong to the query engine, so results
//! come back in stable `(shop, item)` insertion order.

use sqlx::PgPool;
use std::collections::HashMap;

use findshop_core::{ItemHit, Location, SearchFilter, ShopIdentity, ShopSummary};

use crate::shops::{LocationRow, PriceRow};
use crate::DbError;

#[derive(Debug, Clone, sqlx::FromRow)]
struct SearchHitRow {
    item_id: i64,
    shop_id: i64,
    name: String,
    display_name: String,
    nbt_hash: Option<String>,
    description: Option<String>,
    dynamic_price: bool,
    stock: Option<i64>,
    made_on_demand: bool,
    requires_interaction: bool,
    shop_buys_item: bool,
    no_limit: bool,
    computer_id: i32,
    multi_shop: Option<i32>,
    shop_name: String,
    last_seen: chrono::DateTime<chrono::Utc>,
}

const HIT_COLUMNS: &str = "i.id AS item_id, i.shop_id, i.name, i.display_name, i.nbt_hash, \
     i.description, i.dynamic_price, i.stock, i.made_on_demand, i.requires_interaction, \
     i.shop_buys_item, i.no_limit, \
     s.computer_id, s.multi_shop, s.name AS shop_name, s.last_seen";

/// The `in_stock` filter keeps rows whose stock is anything but a
/// literal zero, plus made-on-demand listings; the direction filter
/// selects buy or sell listings exactly.
const HIT_FILTERS: &str = "i.shop_buys_item = $2 \
     AND (NOT $3::bool OR i.stock IS DISTINCT FROM 0 OR i.made_on_demand)";

/// Matching items joined with their parent shops, hydrated with prices
/// and the shop's main location.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if a query fails.
pub async fn search_shop_items(
    pool: &PgPool,
    filter: &SearchFilter,
) -> Result<Vec<ItemHit>, DbError> {
    let needle = filter.query.to_lowercase();

    let rows: Vec<SearchHitRow> = if filter.exact {
        sqlx::query_as(&format!(
            "SELECT {HIT_COLUMNS} \
             FROM items i JOIN shops s ON s.id = i.shop_id \
             WHERE (LOWER(i.name) = $1 OR LOWER(i.display_name) = $1) \
               AND {HIT_FILTERS} \
             ORDER BY s.id, i.id"
        ))
        .bind(&needle)
        .bind(filter.shop_buys_item)
        .bind(filter.in_stock)
        .fetch_all(pool)
        .await?
    } else {
        let pattern = format!("%{}%", escape_like(&needle));
        sqlx::query_as(&format!(
            "SELECT {HIT_COLUMNS} \
             FROM items i JOIN shops s ON s.id = i.shop_id \
             WHERE (LOWER(i.name) LIKE $1 ESCAPE '\\' OR LOWER(i.display_name) LIKE $1 ESCAPE '\\') \
               AND {HIT_FILTERS} \
             ORDER BY s.id, i.id"
        ))
        .bind(&pattern)
        .bind(filter.shop_buys_item)
        .bind(filter.in_stock)
        .fetch_all(pool)
        .await?
    };

    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let item_ids: Vec<i64> = rows.iter().map(|r| r.item_id).collect();
    let price_rows: Vec<PriceRow> = sqlx::query_as(
        "SELECT id, item_id, value, currency, address, required_meta \
         FROM prices WHERE item_id = ANY($1) ORDER BY item_id, id",
    )
    .bind(&item_ids)
    .fetch_all(pool)
    .await?;

    let mut prices_by_item: HashMap<i64, Vec<PriceRow>> = HashMap::new();
    for price in price_rows {
        prices_by_item.entry(price.item_id).or_default().push(price);
    }

    let shop_ids: Vec<i64> = rows.iter().map(|r| r.shop_id).collect();
    let location_rows: Vec<LocationRow> = sqlx::query_as(
        "SELECT id, shop_id, is_main, x, y, z, description, dimension \
         FROM locations WHERE shop_id = ANY($1) AND is_main ORDER BY shop_id, id",
    )
    .bind(&shop_ids)
    .fetch_all(pool)
    .await?;

    let mut main_location_by_shop: HashMap<i64, Location> = HashMap::new();
    for row in location_rows {
        let coordinates = match (row.x, row.y, row.z) {
            (Some(x), Some(y), Some(z)) => Some((x, y, z)),
            _ => None,
        };
        main_location_by_shop.insert(
            row.shop_id,
            Location {
                coordinates,
                description: row.description,
                dimension: row.dimension.map(|d| findshop_core::Dimension::from_raw(&d)),
            },
        );
    }

    Ok(rows
        .into_iter()
        .map(|row| {
            let prices = prices_by_item
                .remove(&row.item_id)
                .unwrap_or_default()
                .into_iter()
                .map(|p| findshop_core::Price {
                    value: p.value,
                    currency: p.currency,
                    address: p.address,
                    required_meta: p.required_meta,
                })
                .collect();

            ItemHit {
                shop: ShopSummary {
                    identity: ShopIdentity::new(row.computer_id, row.multi_shop),
                    name: row.shop_name,
                    main_location: main_location_by_shop
                        .get(&row.shop_id)
                        .cloned()
                        .unwrap_or_default(),
                    last_seen: row.last_seen,
                },
                item: findshop_core::ShopItem {
                    name: row.name,
                    display_name: row.display_name,
                    nbt_hash: row.nbt_hash,
                    description: row.description,
                    prices,
                    dynamic_price: row.dynamic_price,
                    stock: row.stock,
                    made_on_demand: row.made_on_demand,
                    requires_interaction: row.requires_interaction,
                    shop_buys_item: row.shop_buys_item,
                    no_limit: row.no_limit,
                },
            }
        })
        .collect())
}

/// Escape LIKE metacharacters so user queries match literally.
fn escape_like(raw: &str) -> String {
    raw.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_like_quotes_metacharacters() {
        assert_eq!(escape_like("100%_done"), "100\\%\\_done");
        assert_eq!(escape_like("back\\slash"), "back\\\\slash");
        assert_eq!(escape_like("dirt"), "dirt");
    }
}
