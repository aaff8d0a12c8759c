//! Database operations for `shops` and their child rows.
//!
//! A broadcast is a full snapshot, so [`upsert_shop`] replaces a shop's
//! locations and items wholesale inside one transaction: readers keep
//! seeing the previous snapshot until the new one commits, and nothing
//! from the previous snapshot survives it.

use chrono::{DateTime, Duration, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::HashMap;

use findshop_core::{
    CatalogStatistics, Dimension, Location, NormalizedShop, Price, ShopIdentity, ShopItem,
    ShopRecord, UpsertOutcome,
};

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `shops` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ShopRow {
    pub id: i64,
    pub computer_id: i32,
    pub multi_shop: Option<i32>,
    pub name: String,
    pub description: Option<String>,
    pub owner: Option<String>,
    pub software_name: Option<String>,
    pub software_version: Option<String>,
    pub last_seen: DateTime<Utc>,
}

/// A row from the `locations` table. Coordinates are written all-or-none,
/// so partially-null triples never occur through the write path.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LocationRow {
    pub id: i64,
    pub shop_id: i64,
    pub is_main: bool,
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub z: Option<i32>,
    pub description: Option<String>,
    pub dimension: Option<String>,
}

/// A row from the `items` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ItemRow {
    pub id: i64,
    pub shop_id: i64,
    pub name: String,
    pub display_name: String,
    pub nbt_hash: Option<String>,
    pub description: Option<String>,
    pub dynamic_price: bool,
    pub stock: Option<i64>,
    pub made_on_demand: bool,
    pub requires_interaction: bool,
    pub shop_buys_item: bool,
    pub no_limit: bool,
}

/// A row from the `prices` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PriceRow {
    pub id: i64,
    pub item_id: i64,
    pub value: f64,
    pub currency: String,
    pub address: Option<String>,
    pub required_meta: Option<String>,
}

const SHOP_COLUMNS: &str = "id, computer_id, multi_shop, name, description, owner, \
                            software_name, software_version, last_seen";

// ---------------------------------------------------------------------------
// Row -> domain conversion
// ---------------------------------------------------------------------------

fn location_from_row(row: LocationRow) -> Location {
    let coordinates = match (row.x, row.y, row.z) {
        (Some(x), Some(y), Some(z)) => Some((x, y, z)),
        _ => None,
    };
    Location {
        coordinates,
        description: row.description,
        dimension: row.dimension.map(|d| Dimension::from_raw(&d)),
    }
}

fn item_from_rows(row: ItemRow, prices: Vec<PriceRow>) -> ShopItem {
    ShopItem {
        name: row.name,
        display_name: row.display_name,
        nbt_hash: row.nbt_hash,
        description: row.description,
        prices: prices
            .into_iter()
            .map(|p| Price {
                value: p.value,
                currency: p.currency,
                address: p.address,
                required_meta: p.required_meta,
            })
            .collect(),
        dynamic_price: row.dynamic_price,
        stock: row.stock,
        made_on_demand: row.made_on_demand,
        requires_interaction: row.requires_interaction,
        shop_buys_item: row.shop_buys_item,
        no_limit: row.no_limit,
    }
}

// ---------------------------------------------------------------------------
// shops operations
// ---------------------------------------------------------------------------

/// Insert or wholesale-replace the snapshot for `shop`'s identity.
///
/// Conflicts on `(computer_id, multi_shop)` (NULLS NOT DISTINCT) update
/// the shop row and bump `last_seen`; the previous locations and items
/// are deleted (prices cascade) and the new snapshot inserted, all in
/// one transaction.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement fails; the transaction
/// rolls back and the previous snapshot stays intact.
pub async fn upsert_shop(pool: &PgPool, shop: &NormalizedShop) -> Result<UpsertOutcome, DbError> {
    let mut tx = pool.begin().await?;

    let (shop_id, created): (i64, bool) = sqlx::query_as(
        "INSERT INTO shops \
             (computer_id, multi_shop, name, description, owner, software_name, software_version) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         ON CONFLICT (computer_id, multi_shop) DO UPDATE SET \
             name             = EXCLUDED.name, \
             description      = EXCLUDED.description, \
             owner            = EXCLUDED.owner, \
             software_name    = EXCLUDED.software_name, \
             software_version = EXCLUDED.software_version, \
             last_seen        = NOW() \
         RETURNING id, (xmax = 0) AS is_new",
    )
    .bind(shop.identity.computer_id)
    .bind(shop.identity.multi_shop)
    .bind(&shop.name)
    .bind(&shop.description)
    .bind(&shop.owner)
    .bind(&shop.software_name)
    .bind(&shop.software_version)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM locations WHERE shop_id = $1")
        .bind(shop_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM items WHERE shop_id = $1")
        .bind(shop_id)
        .execute(&mut *tx)
        .await?;

    insert_locations(&mut tx, shop_id, shop).await?;
    insert_items(&mut tx, shop_id, &shop.items).await?;

    tx.commit().await?;

    Ok(UpsertOutcome { shop_id, created })
}

/// Batch-insert the main and secondary locations. Empty locations (no
/// coordinates, description, or dimension) are not stored; reads treat
/// a missing main row as an unknown location.
async fn insert_locations(
    tx: &mut Transaction<'_, Postgres>,
    shop_id: i64,
    shop: &NormalizedShop,
) -> Result<(), DbError> {
    let mut rows: Vec<(bool, &Location)> = Vec::with_capacity(1 + shop.other_locations.len());
    if !shop.main_location.is_empty() {
        rows.push((true, &shop.main_location));
    }
    rows.extend(shop.other_locations.iter().map(|loc| (false, loc)));

    if rows.is_empty() {
        return Ok(());
    }

    let mut is_mains: Vec<bool> = Vec::with_capacity(rows.len());
    let mut xs: Vec<Option<i32>> = Vec::with_capacity(rows.len());
    let mut ys: Vec<Option<i32>> = Vec::with_capacity(rows.len());
    let mut zs: Vec<Option<i32>> = Vec::with_capacity(rows.len());
    let mut descriptions: Vec<Option<String>> = Vec::with_capacity(rows.len());
    let mut dimensions: Vec<Option<String>> = Vec::with_capacity(rows.len());

    for (is_main, loc) in rows {
        is_mains.push(is_main);
        xs.push(loc.coordinates.map(|(x, _, _)| x));
        ys.push(loc.coordinates.map(|(_, y, _)| y));
        zs.push(loc.coordinates.map(|(_, _, z)| z));
        descriptions.push(loc.description.clone());
        dimensions.push(loc.dimension.as_ref().map(|d| d.as_str().to_owned()));
    }

    sqlx::query(
        "INSERT INTO locations (shop_id, is_main, x, y, z, description, dimension) \
         SELECT $1, * FROM UNNEST(\
             $2::bool[], $3::int4[], $4::int4[], $5::int4[], $6::text[], $7::text[])",
    )
    .bind(shop_id)
    .bind(&is_mains)
    .bind(&xs)
    .bind(&ys)
    .bind(&zs)
    .bind(&descriptions)
    .bind(&dimensions)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Insert the item rows in broadcast order, with each item's prices
/// batch-inserted in quote order.
async fn insert_items(
    tx: &mut Transaction<'_, Postgres>,
    shop_id: i64,
    items: &[ShopItem],
) -> Result<(), DbError> {
    for item in items {
        let item_id: i64 = sqlx::query_scalar::<_, i64>(
            "INSERT INTO items \
                 (shop_id, name, display_name, nbt_hash, description, dynamic_price, stock, \
                  made_on_demand, requires_interaction, shop_buys_item, no_limit) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING id",
        )
        .bind(shop_id)
        .bind(&item.name)
        .bind(&item.display_name)
        .bind(&item.nbt_hash)
        .bind(&item.description)
        .bind(item.dynamic_price)
        .bind(item.stock)
        .bind(item.made_on_demand)
        .bind(item.requires_interaction)
        .bind(item.shop_buys_item)
        .bind(item.no_limit)
        .fetch_one(&mut **tx)
        .await?;

        if item.prices.is_empty() {
            continue;
        }

        let mut values: Vec<f64> = Vec::with_capacity(item.prices.len());
        let mut currencies: Vec<String> = Vec::with_capacity(item.prices.len());
        let mut addresses: Vec<Option<String>> = Vec::with_capacity(item.prices.len());
        let mut required_metas: Vec<Option<String>> = Vec::with_capacity(item.prices.len());
        for price in &item.prices {
            values.push(price.value);
            currencies.push(price.currency.clone());
            addresses.push(price.address.clone());
            required_metas.push(price.required_meta.clone());
        }

        sqlx::query(
            "INSERT INTO prices (item_id, value, currency, address, required_meta) \
             SELECT $1, * FROM UNNEST($2::float8[], $3::text[], $4::text[], $5::text[])",
        )
        .bind(item_id)
        .bind(&values)
        .bind(&currencies)
        .bind(&addresses)
        .bind(&required_metas)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

/// Exact identity lookup. `IS NOT DISTINCT FROM` makes an absent
/// `multi_shop` match only shops without one, never every slot sharing
/// the computer.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_shop_by_identity(
    pool: &PgPool,
    identity: ShopIdentity,
) -> Result<Option<ShopRecord>, DbError> {
    let row = sqlx::query_as::<_, ShopRow>(&format!(
        "SELECT {SHOP_COLUMNS} FROM shops \
         WHERE computer_id = $1 AND multi_shop IS NOT DISTINCT FROM $2"
    ))
    .bind(identity.computer_id)
    .bind(identity.multi_shop)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => Ok(load_records(pool, vec![row]).await?.into_iter().next()),
        None => Ok(None),
    }
}

/// Every shop with its full snapshot, ordered case-insensitively by
/// name with insertion id breaking ties.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if a query fails.
pub async fn list_all_shops(pool: &PgPool) -> Result<Vec<ShopRecord>, DbError> {
    let rows = sqlx::query_as::<_, ShopRow>(&format!(
        "SELECT {SHOP_COLUMNS} FROM shops ORDER BY LOWER(name), id"
    ))
    .fetch_all(pool)
    .await?;

    load_records(pool, rows).await
}

/// Hydrate shop rows into full records, batching the child queries.
async fn load_records(pool: &PgPool, rows: Vec<ShopRow>) -> Result<Vec<ShopRecord>, DbError> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let shop_ids: Vec<i64> = rows.iter().map(|r| r.id).collect();

    let location_rows = sqlx::query_as::<_, LocationRow>(
        "SELECT id, shop_id, is_main, x, y, z, description, dimension \
         FROM locations WHERE shop_id = ANY($1) ORDER BY shop_id, id",
    )
    .bind(&shop_ids)
    .fetch_all(pool)
    .await?;

    let item_rows = sqlx::query_as::<_, ItemRow>(
        "SELECT id, shop_id, name, display_name, nbt_hash, description, dynamic_price, stock, \
                made_on_demand, requires_interaction, shop_buys_item, no_limit \
         FROM items WHERE shop_id = ANY($1) ORDER BY shop_id, id",
    )
    .bind(&shop_ids)
    .fetch_all(pool)
    .await?;

    let item_ids: Vec<i64> = item_rows.iter().map(|r| r.id).collect();
    let price_rows = sqlx::query_as::<_, PriceRow>(
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

    let mut locations_by_shop: HashMap<i64, Vec<LocationRow>> = HashMap::new();
    for location in location_rows {
        locations_by_shop
            .entry(location.shop_id)
            .or_default()
            .push(location);
    }

    let mut items_by_shop: HashMap<i64, Vec<ShopItem>> = HashMap::new();
    for item in item_rows {
        let prices = prices_by_item.remove(&item.id).unwrap_or_default();
        items_by_shop
            .entry(item.shop_id)
            .or_default()
            .push(item_from_rows(item, prices));
    }

    Ok(rows
        .into_iter()
        .map(|row| {
            let mut main_location = Location::default();
            let mut other_locations = Vec::new();
            for location in locations_by_shop.remove(&row.id).unwrap_or_default() {
                if location.is_main {
                    main_location = location_from_row(location);
                } else {
                    other_locations.push(location_from_row(location));
                }
            }

            ShopRecord {
                identity: ShopIdentity::new(row.computer_id, row.multi_shop),
                name: row.name,
                description: row.description,
                owner: row.owner,
                software_name: row.software_name,
                software_version: row.software_version,
                main_location,
                other_locations,
                items: items_by_shop.remove(&row.id).unwrap_or_default(),
                last_seen: row.last_seen,
            }
        })
        .collect())
}

/// Delete shops whose `last_seen` is older than `now - window`,
/// cascading to locations, items, and prices.
///
/// Returns the number of shops deleted.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn sweep_expired_shops(pool: &PgPool, window: Duration) -> Result<u64, DbError> {
    let cutoff = Utc::now() - window;
    let deleted = sqlx::query("DELETE FROM shops WHERE last_seen < $1")
        .bind(cutoff)
        .execute(pool)
        .await?
        .rows_affected();
    Ok(deleted)
}

#[derive(Debug, sqlx::FromRow)]
struct StatisticsRow {
    shop_count: i64,
    item_count: i64,
    location_count: i64,
    latest_seen: Option<DateTime<Utc>>,
}

/// Catalog-wide counts plus the most recent broadcast timestamp.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn catalog_statistics(pool: &PgPool) -> Result<CatalogStatistics, DbError> {
    let row = sqlx::query_as::<_, StatisticsRow>(
        "SELECT (SELECT COUNT(*) FROM shops)     AS shop_count, \
                (SELECT COUNT(*) FROM items)     AS item_count, \
                (SELECT COUNT(*) FROM locations) AS location_count, \
                (SELECT MAX(last_seen) FROM shops) AS latest_seen",
    )
    .fetch_one(pool)
    .await?;

    Ok(CatalogStatistics {
        shop_count: row.shop_count,
        item_count: row.item_count,
        location_count: row.location_count,
        latest_seen: row.latest_seen,
    })
}
