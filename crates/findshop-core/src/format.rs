//! Chat-text presentation of query results.
//!
//! The chat transport renders markdown in a fixed-width in-game overlay,
//! so these helpers speak its dialect: back-ticked monospace spans, bold
//! shop names, `=` header bars padded to the configured chat width, and
//! a private-use glyph for the primary currency.

use chrono::{DateTime, Duration, Utc};

use crate::catalog::CatalogStatistics;
use crate::query::{PagedHits, PagedShops, SearchDirection};
use crate::types::{Location, ShopItem, ShopRecord, PRIMARY_CURRENCY};

/// Default chat overlay width in columns.
pub const DEFAULT_CHAT_WIDTH: usize = 49;

/// Shops not re-broadcast within this window get a clock marker.
const STALE_AFTER_DAYS: i64 = 7;

/// In-game glyph for the primary currency symbol.
const CURRENCY_GLYPH: char = '\u{e000}';

/// Characters the chat font renders at roughly 0.4 columns.
const NARROW_CHARS: [char; 6] = ['l', 'i', 't', '[', ']', ' '];

/// Human-readable location: back-ticked coordinates with optional
/// description and dimension suffixes; bare URLs so they stay clickable;
/// `Unknown` when the producer sent nothing.
#[must_use]
pub fn format_location(location: &Location) -> String {
    if let Some((x, y, z)) = location.coordinates {
        let mut out = format!("`{x} {y} {z}`");
        if let Some(description) = &location.description {
            out.push_str(&format!(" ({description})"));
        }
        if let Some(dimension) = &location.dimension {
            out.push_str(&format!(" in the {dimension}"));
        }
        return out;
    }

    if let Some(description) = &location.description {
        return if description.starts_with("http") {
            description.clone()
        } else {
            format!("`{description}`")
        };
    }

    match &location.dimension {
        Some(dimension) => format!("the {dimension}"),
        None => "Unknown".to_owned(),
    }
}

/// Price as shown in result lines: the first KST quote when one exists
/// (with the currency glyph), otherwise the first quote with its
/// currency code. Dynamic prices get a `*` marker.
#[must_use]
pub fn format_price(item: &ShopItem) -> String {
    let Some(price) = item.kst_price().or_else(|| item.prices.first()) else {
        return "`?`".to_owned();
    };

    let marker = if item.dynamic_price { "*" } else { "" };
    if price.currency == PRIMARY_CURRENCY {
        format!("{CURRENCY_GLYPH}`{}{marker}`", price.value)
    } else {
        format!("`{}{marker}` {}", price.value, price.currency)
    }
}

/// Bold shop name, with a trailing clock for shops that have gone quiet.
#[must_use]
pub fn format_shop_name(name: &str, seen: DateTime<Utc>, now: DateTime<Utc>) -> String {
    if now - seen >= Duration::days(STALE_AFTER_DAYS) {
        format!("**{name}\u{1f550}**")
    } else {
        format!("**{name}**")
    }
}

/// Item names drop the `minecraft:` namespace for display.
#[must_use]
pub fn display_item_name(name: &str) -> &str {
    name.strip_prefix("minecraft:").unwrap_or(name)
}

/// A `=== text ===` bar padded toward `width` columns, counting narrow
/// characters as 0.4 columns the way the chat font does.
#[must_use]
pub fn header_line(text: &str, width: usize) -> String {
    #[allow(clippy::cast_precision_loss)]
    let mut remaining = width as f64 - 5.0;
    for ch in text.replace('`', "").chars() {
        if NARROW_CHARS.contains(&ch) {
            remaining -= 0.4;
        } else {
            remaining -= 1.0;
        }
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let reps = (remaining / 2.0).round().max(0.0) as usize;
    let bar = "=".repeat(reps);
    format!("{bar} {text} {bar}")
}

/// One page of the shop list, chat-ready.
#[must_use]
pub fn render_shop_list(results: &PagedShops, width: usize, now: DateTime<Utc>) -> String {
    let mut lines = vec![
        "Results:".to_owned(),
        header_line(&format!("Page {} of {}", results.page, results.pages), width),
    ];
    for shop in &results.shops {
        lines.push(format!(
            "{} at {}",
            format_shop_name(&shop.name, shop.last_seen, now),
            format_location(&shop.main_location),
        ));
    }
    lines.push(header_line("`\\fs list [page]` for more", width));
    lines.join("\n")
}

/// One page of search results, chat-ready. Buy results carry the stock
/// count; sell results omit it (the searcher supplies the items).
#[must_use]
pub fn render_search_page(results: &PagedHits, width: usize, now: DateTime<Utc>) -> String {
    let mut lines = vec![
        "Results:".to_owned(),
        header_line(&format!("Page {} of {}", results.page, results.pages), width),
    ];
    for hit in &results.hits {
        let mut line = format!(
            "`{}` at {} ({}) for {}",
            display_item_name(&hit.item.name),
            format_shop_name(&hit.shop.name, hit.shop.last_seen, now),
            format_location(&hit.shop.main_location),
            format_price(&hit.item),
        );
        if results.direction == SearchDirection::Buy {
            match hit.item.stock {
                Some(stock) => line.push_str(&format!(" (`{stock}` in stock)")),
                None => line.push_str(" (made on demand)"),
            }
        }
        lines.push(line);
    }
    let command = match results.direction {
        SearchDirection::Buy => "buy",
        SearchDirection::Sell => "sell",
    };
    lines.push(header_line(
        &format!("`\\fs {command} [item] [page]` for more"),
        width,
    ));
    lines.join("\n")
}

/// Full shop card: name, owner, locations, last seen, software, item
/// count.
#[must_use]
pub fn render_shop_detail(shop: &ShopRecord, now: DateTime<Utc>) -> String {
    let mut out = format_shop_name(&shop.name, shop.last_seen, now);
    if let Some(owner) = &shop.owner {
        out.push_str(&format!(" *by {owner}*"));
    }
    out.push('\n');

    if !shop.main_location.is_empty() {
        out.push_str(&format!(
            "Located at {}",
            format_location(&shop.main_location)
        ));
        if !shop.other_locations.is_empty() {
            out.push_str(&format!(
                " +`{}` other locations",
                shop.other_locations.len()
            ));
        }
        out.push('\n');
    }

    out.push_str(&format!(
        "Last seen `{}`\n",
        shop.last_seen.format("%a, %d %b %Y %H:%M:%S GMT")
    ));

    if let Some(software) = &shop.software_name {
        out.push_str(&format!("Running `{software}`"));
        if let Some(version) = &shop.software_version {
            out.push_str(&format!(" `{version}`"));
        }
        out.push('\n');
    }

    out.push_str(&format!("Selling `{}` items", shop.items.len()));
    out
}

/// Catalog statistics, chat-ready.
#[must_use]
pub fn render_statistics(stats: &CatalogStatistics) -> String {
    let mut out = format!(
        "Tracking `{}` shops with `{}` listed items across `{}` locations.",
        stats.shop_count, stats.item_count, stats.location_count
    );
    if let Some(latest) = stats.latest_seen {
        out.push_str(&format!(
            "\nLast broadcast seen `{}`",
            latest.format("%a, %d %b %Y %H:%M:%S GMT")
        ));
    }
    out
}

/// The defined "no results" response for a search: an answer, not a
/// failure.
#[must_use]
pub fn render_no_results(query: &str, direction: SearchDirection) -> String {
    match direction {
        SearchDirection::Buy => format!(
            "**Error!** FindShop was unable to find any shops with `{query}` in stock."
        ),
        SearchDirection::Sell => {
            format!("**Error!** FindShop was unable to find any shops buying `{query}`.")
        }
    }
}

/// The defined response for listing an empty catalog.
#[must_use]
pub fn render_empty_catalog() -> String {
    "**Error!** FindShop hasn't seen any shops yet.".to_owned()
}

/// Help text listing the chat commands.
#[must_use]
pub fn render_help() -> String {
    [
        "FindShop helps locate ShopSync-compatible shops buying or selling an item.",
        "`\\fs list` - List detected shops",
        "`\\fs stats` - Catalog statistics",
        "`\\fs buy [item]` - Finds shops selling *[item]*",
        "`\\fs sell [item]` - Finds shops buying *[item]*",
        "`\\fs shop [id]` - Shows a shop's info by its computer ID",
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Dimension, Price, ShopIdentity, ShopSummary};

    fn loc(
        coordinates: Option<(i32, i32, i32)>,
        description: Option<&str>,
        dimension: Option<Dimension>,
    ) -> Location {
        Location {
            coordinates,
            description: description.map(str::to_owned),
            dimension,
        }
    }

    #[test]
    fn location_unknown_when_empty() {
        assert_eq!(format_location(&Location::default()), "Unknown");
    }

    #[test]
    fn location_coordinates_are_backticked() {
        assert_eq!(
            format_location(&loc(Some((1, 2, 3)), None, None)),
            "`1 2 3`"
        );
        assert_eq!(
            format_location(&loc(Some((2, -612, 7)), None, None)),
            "`2 -612 7`"
        );
    }

    #[test]
    fn location_coordinates_with_description_and_dimension() {
        assert_eq!(
            format_location(&loc(Some((1, 2, 3)), Some("joe mama"), Some(Dimension::End))),
            "`1 2 3` (joe mama) in the end"
        );
    }

    #[test]
    fn location_plain_description_is_backticked() {
        assert_eq!(
            format_location(&loc(None, Some("the back of CatMall"), None)),
            "`the back of CatMall`"
        );
    }

    #[test]
    fn location_url_description_stays_clickable() {
        assert_eq!(
            format_location(&loc(None, Some("https://example.com"), None)),
            "https://example.com"
        );
    }

    #[test]
    fn location_dimension_only() {
        assert_eq!(
            format_location(&loc(None, None, Some(Dimension::Nether))),
            "the nether"
        );
    }

    fn dirt_item() -> ShopItem {
        ShopItem {
            name: "minecraft:dirt".to_owned(),
            display_name: "Dirt".to_owned(),
            nbt_hash: None,
            description: None,
            prices: vec![Price {
                value: 1.0,
                currency: "KST".to_owned(),
                address: Some("dirt@joe.kst".to_owned()),
                required_meta: None,
            }],
            dynamic_price: false,
            stock: Some(64),
            made_on_demand: false,
            requires_interaction: false,
            shop_buys_item: false,
            no_limit: false,
        }
    }

    #[test]
    fn kst_price_uses_currency_glyph() {
        assert_eq!(format_price(&dirt_item()), "\u{e000}`1`");
    }

    #[test]
    fn dynamic_price_gets_a_marker() {
        let mut item = dirt_item();
        item.dynamic_price = true;
        assert_eq!(format_price(&item), "\u{e000}`1*`");
    }

    #[test]
    fn foreign_currency_renders_as_suffix() {
        let mut item = dirt_item();
        item.prices[0].currency = "TST".to_owned();
        assert_eq!(format_price(&item), "`1` TST");
    }

    #[test]
    fn priceless_item_renders_placeholder() {
        let mut item = dirt_item();
        item.prices.clear();
        assert_eq!(format_price(&item), "`?`");
    }

    #[test]
    fn stale_shop_gets_clock_marker() {
        let now = Utc::now();
        assert_eq!(
            format_shop_name("Joe's", now - Duration::days(8), now),
            "**Joe's\u{1f550}**"
        );
        assert_eq!(
            format_shop_name("Joe's", now - Duration::hours(1), now),
            "**Joe's**"
        );
    }

    #[test]
    fn item_names_drop_minecraft_namespace() {
        assert_eq!(display_item_name("minecraft:dirt"), "dirt");
        assert_eq!(display_item_name("techreborn:rubber"), "techreborn:rubber");
    }

    #[test]
    fn header_line_wraps_text_in_bars() {
        let line = header_line("Page 1 of 2", DEFAULT_CHAT_WIDTH);
        assert!(line.starts_with('='));
        assert!(line.ends_with('='));
        assert!(line.contains(" Page 1 of 2 "));
        // Both bars have the same length.
        let bar_len = line.chars().take_while(|&c| c == '=').count();
        assert!(line.ends_with(&"=".repeat(bar_len)));
    }

    #[test]
    fn header_line_counts_narrow_characters_as_fractional() {
        let wide = header_line("mmmm", DEFAULT_CHAT_WIDTH);
        let narrow = header_line("llll", DEFAULT_CHAT_WIDTH);
        let bar = |s: &str| s.chars().take_while(|&c| c == '=').count();
        assert!(bar(&narrow) > bar(&wide));
    }

    #[test]
    fn search_page_line_contains_price_and_shop() {
        let now = Utc::now();
        let results = PagedHits {
            direction: SearchDirection::Buy,
            query: "dirt".to_owned(),
            page: 1,
            pages: 1,
            total: 1,
            hits: vec![crate::types::ItemHit {
                shop: ShopSummary {
                    identity: ShopIdentity::new(42, None),
                    name: "Joe's".to_owned(),
                    main_location: Location::default(),
                    last_seen: now,
                },
                item: dirt_item(),
            }],
        };

        let rendered = render_search_page(&results, DEFAULT_CHAT_WIDTH, now);
        assert!(rendered.contains("Page 1 of 1"));
        assert!(rendered.contains("`dirt` at **Joe's**"));
        assert!(rendered.contains("\u{e000}`1`"));
        assert!(rendered.contains("(`64` in stock)"));
    }

    #[test]
    fn shop_detail_renders_owner_and_software() {
        let now = Utc::now();
        let shop = ShopRecord {
            identity: ShopIdentity::new(42, None),
            name: "Joe's".to_owned(),
            description: None,
            owner: Some("joe".to_owned()),
            software_name: Some("shopd".to_owned()),
            software_version: Some("2.1".to_owned()),
            main_location: loc(Some((10, 64, -21)), None, Some(Dimension::Overworld)),
            other_locations: vec![Location::default()],
            items: vec![dirt_item()],
            last_seen: now,
        };

        let rendered = render_shop_detail(&shop, now);
        assert!(rendered.starts_with("**Joe's** *by joe*"));
        assert!(rendered.contains("Located at `10 64 -21` in the overworld"));
        assert!(rendered.contains("+`1` other locations"));
        assert!(rendered.contains("Running `shopd` `2.1`"));
        assert!(rendered.ends_with("Selling `1` items"));
    }

    #[test]
    fn help_lists_every_command() {
        let help = render_help();
        for command in ["list", "stats", "buy", "sell", "shop"] {
            assert!(help.contains(&format!("\\fs {command}")), "missing {command}");
        }
    }

    #[test]
    fn no_results_message_names_the_query() {
        assert!(render_no_results("dirt", SearchDirection::Buy).contains("`dirt` in stock"));
        assert!(render_no_results("dirt", SearchDirection::Sell).contains("buying `dirt`"));
    }

    #[test]
    fn statistics_render_counts() {
        let stats = CatalogStatistics {
            shop_count: 3,
            item_count: 12,
            location_count: 4,
            latest_seen: None,
        };
        assert_eq!(
            render_statistics(&stats),
            "Tracking `3` shops with `12` listed items across `4` locations."
        );
    }
}
