//! Tests for the findshop-db catalog store.
//!
//! The offline tests at the top need no database. The `#[sqlx::test]`
//! tests run against a live Postgres (DATABASE_URL) with the workspace
//! migrations applied per-test.

use chrono::Duration;
use findshop_core::{
    Dimension, Location, NormalizedShop, Price, SearchFilter, ShopIdentity, ShopItem,
};
use findshop_db::{ItemRow, PoolConfig};

// ---------------------------------------------------------------------------
// Offline tests
// ---------------------------------------------------------------------------

#[test]
fn pool_config_from_app_config_uses_core_values() {
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};

    let app_config = findshop_core::AppConfig {
        database_url: "postgres://example".to_string(),
        env: findshop_core::Environment::Test,
        bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8080),
        log_level: "info".to_string(),
        ingest_token: None,
        db_max_connections: 42,
        db_min_connections: 7,
        db_acquire_timeout_secs: 9,
        results_per_page: 7,
        list_page_size: 10,
        chat_width: 49,
        retention_days: 14,
        max_broadcast_bytes: 1_048_576,
    };

    let pool_config = PoolConfig::from_app_config(&app_config);
    assert_eq!(pool_config.max_connections, 42);
    assert_eq!(pool_config.min_connections, 7);
    assert_eq!(pool_config.acquire_timeout_secs, 9);
}

/// Compile-time smoke test: confirm that [`ItemRow`] has all expected
/// fields with the correct types. No database required.
#[test]
fn item_row_has_expected_fields() {
    let row = ItemRow {
        id: 1_i64,
        shop_id: 2_i64,
        name: "minecraft:dirt".to_string(),
        display_name: "Dirt".to_string(),
        nbt_hash: None,
        description: None,
        dynamic_price: false,
        stock: Some(64),
        made_on_demand: false,
        requires_interaction: false,
        shop_buys_item: false,
        no_limit: false,
    };

    assert_eq!(row.id, 1);
    assert_eq!(row.shop_id, 2);
    assert_eq!(row.name, "minecraft:dirt");
    assert_eq!(row.stock, Some(64));
    assert!(!row.shop_buys_item);
}

// ---------------------------------------------------------------------------
// Database tests
// ---------------------------------------------------------------------------

fn kst_price(value: f64) -> Price {
    Price {
        value,
        currency: "KST".to_owned(),
        address: Some("pay@shop.kst".to_owned()),
        required_meta: None,
    }
}

fn sell_item(name: &str, stock: i64, price: f64) -> ShopItem {
    ShopItem {
        name: format!("minecraft:{name}"),
        display_name: name.to_owned(),
        nbt_hash: None,
        description: None,
        prices: vec![kst_price(price)],
        dynamic_price: false,
        stock: Some(stock),
        made_on_demand: false,
        requires_interaction: false,
        shop_buys_item: false,
        no_limit: false,
    }
}

fn make_shop(computer_id: i32, name: &str, items: Vec<ShopItem>) -> NormalizedShop {
    NormalizedShop {
        identity: ShopIdentity::new(computer_id, None),
        name: name.to_owned(),
        description: None,
        owner: Some("joe".to_owned()),
        software_name: Some("shopd".to_owned()),
        software_version: None,
        main_location: Location {
            coordinates: Some((10, 64, -21)),
            description: Some("spawn mall".to_owned()),
            dimension: Some(Dimension::Overworld),
        },
        other_locations: Vec::new(),
        items,
    }
}

#[sqlx::test(migrations = "../../migrations")]
async fn upsert_then_get_returns_exact_snapshot(pool: sqlx::PgPool) {
    let shop = make_shop(42, "Joe's", vec![sell_item("dirt", 64, 1.0)]);
    let outcome = findshop_db::upsert_shop(&pool, &shop).await.expect("upsert");
    assert!(outcome.created);

    let record = findshop_db::get_shop_by_identity(&pool, shop.identity)
        .await
        .expect("get")
        .expect("shop exists");
    assert_eq!(record.name, "Joe's");
    assert_eq!(record.items.len(), 1);
    assert_eq!(record.items[0].name, "minecraft:dirt");
    assert_eq!(record.items[0].prices[0].currency, "KST");
    assert_eq!(record.main_location.coordinates, Some((10, 64, -21)));
    assert_eq!(record.main_location.dimension, Some(Dimension::Overworld));
}

#[sqlx::test(migrations = "../../migrations")]
async fn reingest_replaces_snapshot_without_residue(pool: sqlx::PgPool) {
    let first = make_shop(
        42,
        "Joe's",
        vec![sell_item("dirt", 64, 1.0), sell_item("cobblestone", 32, 0.5)],
    );
    findshop_db::upsert_shop(&pool, &first).await.expect("first upsert");

    let mut second = make_shop(42, "Joe's Remodeled", vec![sell_item("oak_log", 16, 4.0)]);
    second.main_location.coordinates = Some((100, 70, 100));
    let outcome = findshop_db::upsert_shop(&pool, &second)
        .await
        .expect("second upsert");
    assert!(!outcome.created);

    let record = findshop_db::get_shop_by_identity(&pool, second.identity)
        .await
        .expect("get")
        .expect("shop exists");
    assert_eq!(record.name, "Joe's Remodeled");
    assert_eq!(record.items.len(), 1, "old items must not survive");
    assert_eq!(record.items[0].name, "minecraft:oak_log");
    assert_eq!(record.main_location.coordinates, Some((100, 70, 100)));

    // The removed item must disappear from search immediately.
    let hits = findshop_db::search_shop_items(
        &pool,
        &SearchFilter {
            query: "dirt".to_owned(),
            exact: false,
            in_stock: false,
            shop_buys_item: false,
        },
    )
    .await
    .expect("search");
    assert!(hits.is_empty());
}

#[sqlx::test(migrations = "../../migrations")]
async fn reingest_with_empty_items_clears_listings(pool: sqlx::PgPool) {
    let stocked = make_shop(42, "Joe's", vec![sell_item("dirt", 64, 1.0)]);
    findshop_db::upsert_shop(&pool, &stocked).await.expect("upsert");

    let emptied = make_shop(42, "Joe's", Vec::new());
    findshop_db::upsert_shop(&pool, &emptied).await.expect("upsert");

    let record = findshop_db::get_shop_by_identity(&pool, emptied.identity)
        .await
        .expect("get")
        .expect("shop exists");
    assert!(record.items.is_empty());
}

#[sqlx::test(migrations = "../../migrations")]
async fn multi_shop_identity_is_exact(pool: sqlx::PgPool) {
    let bare = make_shop(42, "Bare", Vec::new());
    let mut slotted = make_shop(42, "Slot 3", Vec::new());
    slotted.identity = ShopIdentity::new(42, Some(3));

    findshop_db::upsert_shop(&pool, &bare).await.expect("bare");
    findshop_db::upsert_shop(&pool, &slotted).await.expect("slotted");

    let found = findshop_db::get_shop_by_identity(&pool, ShopIdentity::new(42, None))
        .await
        .expect("get")
        .expect("bare shop");
    assert_eq!(found.name, "Bare");

    let found = findshop_db::get_shop_by_identity(&pool, ShopIdentity::new(42, Some(3)))
        .await
        .expect("get")
        .expect("slotted shop");
    assert_eq!(found.name, "Slot 3");

    assert!(findshop_db::get_shop_by_identity(&pool, ShopIdentity::new(42, Some(9)))
        .await
        .expect("get")
        .is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn reingest_without_slot_replaces_slotless_snapshot(pool: sqlx::PgPool) {
    let first = make_shop(7, "First", Vec::new());
    let second = make_shop(7, "Second", Vec::new());

    findshop_db::upsert_shop(&pool, &first).await.expect("first");
    let outcome = findshop_db::upsert_shop(&pool, &second).await.expect("second");
    assert!(!outcome.created, "same slotless identity must conflict");

    let shops = findshop_db::list_all_shops(&pool).await.expect("list");
    assert_eq!(shops.len(), 1);
    assert_eq!(shops[0].name, "Second");
}

#[sqlx::test(migrations = "../../migrations")]
async fn sweep_deletes_only_expired_shops(pool: sqlx::PgPool) {
    let fresh = make_shop(1, "Fresh", vec![sell_item("dirt", 1, 1.0)]);
    let stale = make_shop(2, "Stale", vec![sell_item("dirt", 1, 1.0)]);
    findshop_db::upsert_shop(&pool, &fresh).await.expect("fresh");
    findshop_db::upsert_shop(&pool, &stale).await.expect("stale");

    sqlx::query("UPDATE shops SET last_seen = NOW() - INTERVAL '15 days' WHERE computer_id = 2")
        .execute(&pool)
        .await
        .expect("backdate");

    let deleted = findshop_db::sweep_expired_shops(&pool, Duration::days(14))
        .await
        .expect("sweep");
    assert_eq!(deleted, 1);

    let shops = findshop_db::list_all_shops(&pool).await.expect("list");
    assert_eq!(shops.len(), 1);
    assert_eq!(shops[0].name, "Fresh");

    // Cascade: the stale shop's items and prices are gone too.
    let orphaned_items: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items")
        .fetch_one(&pool)
        .await
        .expect("count");
    assert_eq!(orphaned_items, 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn search_applies_direction_and_stock_filters(pool: sqlx::PgPool) {
    let mut out_of_stock = sell_item("dirt", 0, 1.0);
    out_of_stock.made_on_demand = false;

    let mut on_demand = sell_item("dirt", 0, 2.0);
    on_demand.made_on_demand = true;

    let mut buying = sell_item("dirt", 100, 3.0);
    buying.shop_buys_item = true;

    findshop_db::upsert_shop(&pool, &make_shop(1, "Empty", vec![out_of_stock]))
        .await
        .expect("upsert");
    findshop_db::upsert_shop(&pool, &make_shop(2, "OnDemand", vec![on_demand]))
        .await
        .expect("upsert");
    findshop_db::upsert_shop(&pool, &make_shop(3, "Buyer", vec![buying]))
        .await
        .expect("upsert");

    let selling_in_stock = findshop_db::search_shop_items(
        &pool,
        &SearchFilter {
            query: "dirt".to_owned(),
            exact: false,
            in_stock: true,
            shop_buys_item: false,
        },
    )
    .await
    .expect("search");
    assert_eq!(selling_in_stock.len(), 1);
    assert_eq!(selling_in_stock[0].shop.name, "OnDemand");

    let buyers = findshop_db::search_shop_items(
        &pool,
        &SearchFilter {
            query: "dirt".to_owned(),
            exact: false,
            in_stock: false,
            shop_buys_item: true,
        },
    )
    .await
    .expect("search");
    assert_eq!(buyers.len(), 1);
    assert_eq!(buyers[0].shop.name, "Buyer");
}

#[sqlx::test(migrations = "../../migrations")]
async fn search_exact_match_requires_equality(pool: sqlx::PgPool) {
    findshop_db::upsert_shop(
        &pool,
        &make_shop(1, "Joe's", vec![sell_item("dirt", 5, 1.0)]),
    )
    .await
    .expect("upsert");
    findshop_db::upsert_shop(
        &pool,
        &make_shop(2, "Coarse", vec![sell_item("coarse_dirt", 5, 1.0)]),
    )
    .await
    .expect("upsert");

    let substring = findshop_db::search_shop_items(
        &pool,
        &SearchFilter {
            query: "DIRT".to_owned(),
            exact: false,
            in_stock: false,
            shop_buys_item: false,
        },
    )
    .await
    .expect("search");
    assert_eq!(substring.len(), 2);

    let exact = findshop_db::search_shop_items(
        &pool,
        &SearchFilter {
            query: "Dirt".to_owned(),
            exact: true,
            in_stock: false,
            shop_buys_item: false,
        },
    )
    .await
    .expect("search");
    assert_eq!(exact.len(), 1);
    assert_eq!(exact[0].item.display_name, "dirt");
}

#[sqlx::test(migrations = "../../migrations")]
async fn list_orders_case_insensitively(pool: sqlx::PgPool) {
    for (id, name) in [(1, "cherry"), (2, "Apple"), (3, "banana")] {
        findshop_db::upsert_shop(&pool, &make_shop(id, name, Vec::new()))
            .await
            .expect("upsert");
    }

    let shops = findshop_db::list_all_shops(&pool).await.expect("list");
    let names: Vec<&str> = shops.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["Apple", "banana", "cherry"]);
}

#[sqlx::test(migrations = "../../migrations")]
async fn statistics_count_rows_and_latest_broadcast(pool: sqlx::PgPool) {
    let stats = findshop_db::catalog_statistics(&pool).await.expect("stats");
    assert_eq!(stats.shop_count, 0);
    assert!(stats.latest_seen.is_none());

    findshop_db::upsert_shop(
        &pool,
        &make_shop(1, "Joe's", vec![sell_item("dirt", 1, 1.0)]),
    )
    .await
    .expect("upsert");

    let stats = findshop_db::catalog_statistics(&pool).await.expect("stats");
    assert_eq!(stats.shop_count, 1);
    assert_eq!(stats.item_count, 1);
    assert_eq!(stats.location_count, 1);
    assert!(stats.latest_seen.is_some());
}
