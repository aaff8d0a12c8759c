//! Canonical catalog data model.
//!
//! Broadcasts are validated into [`NormalizedShop`] payloads by
//! [`crate::validate`]; the store assigns `last_seen` and reads back
//! [`ShopRecord`]s.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Currency that participates in search ranking. Prices in other
/// currencies are stored verbatim but invisible to ranking.
pub const PRIMARY_CURRENCY: &str = "KST";

/// Deferred secondary currency. Counts as "usable" for the
/// whole-broadcast price rule, but never ranks.
pub const SECONDARY_CURRENCY: &str = "TST";

/// Identifies one producer: the broadcasting computer plus an optional
/// slot for co-located shops sharing a single computer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShopIdentity {
    pub computer_id: i32,
    pub multi_shop: Option<i32>,
}

impl ShopIdentity {
    #[must_use]
    pub fn new(computer_id: i32, multi_shop: Option<i32>) -> Self {
        Self {
            computer_id,
            multi_shop,
        }
    }
}

impl fmt::Display for ShopIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.multi_shop {
            Some(slot) => write!(f, "{}:{slot}", self.computer_id),
            None => write!(f, "{}", self.computer_id),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityParseError {
    #[error("expected computerID[:multiShop]")]
    Empty,
    #[error("segment {0:?} is not an integer")]
    NotAnInteger(String),
    #[error("too many segments; expected computerID[:multiShop]")]
    TooManySegments,
}

impl FromStr for ShopIdentity {
    type Err = IdentityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(IdentityParseError::Empty);
        }

        let mut segments = s.split(':');
        let computer = segments.next().unwrap_or_default();
        let computer_id = computer
            .parse::<i32>()
            .map_err(|_| IdentityParseError::NotAnInteger(computer.to_owned()))?;

        let multi_shop = match segments.next() {
            None => None,
            Some(slot) => Some(
                slot.parse::<i32>()
                    .map_err(|_| IdentityParseError::NotAnInteger(slot.to_owned()))?,
            ),
        };

        if segments.next().is_some() {
            return Err(IdentityParseError::TooManySegments);
        }

        Ok(Self::new(computer_id, multi_shop))
    }
}

/// World a location sits in. Unrecognized raw values are carried through
/// as [`Dimension::Other`] rather than rejected, so new dimensions on the
/// producer side survive ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Dimension {
    Overworld,
    Nether,
    End,
    Other(String),
}

impl Dimension {
    /// Maps a raw dimension string, lower-casing before lookup.
    #[must_use]
    pub fn from_raw(raw: &str) -> Self {
        let lowered = raw.to_lowercase();
        match lowered.as_str() {
            "overworld" => Self::Overworld,
            "nether" => Self::Nether,
            "end" => Self::End,
            _ => Self::Other(lowered),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Overworld => "overworld",
            Self::Nether => "nether",
            Self::End => "end",
            Self::Other(raw) => raw,
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Dimension {
    fn from(raw: String) -> Self {
        Self::from_raw(&raw)
    }
}

impl From<Dimension> for String {
    fn from(dimension: Dimension) -> Self {
        dimension.as_str().to_owned()
    }
}

/// Where a shop can be found. Every field is optional: producers send
/// coordinates, a free-text description (possibly a URL), both, or
/// nothing at all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub coordinates: Option<(i32, i32, i32)>,
    pub description: Option<String>,
    pub dimension: Option<Dimension>,
}

impl Location {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.coordinates.is_none() && self.description.is_none() && self.dimension.is_none()
    }
}

/// One quoted price for an item. `address` is where buyers pay; it is
/// required on sell listings and meaningless on buy listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    pub value: f64,
    pub currency: String,
    pub address: Option<String>,
    pub required_meta: Option<String>,
}

/// One listing in a shop's broadcast snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShopItem {
    pub name: String,
    pub display_name: String,
    pub nbt_hash: Option<String>,
    pub description: Option<String>,
    pub prices: Vec<Price>,
    pub dynamic_price: bool,
    pub stock: Option<i64>,
    pub made_on_demand: bool,
    pub requires_interaction: bool,
    pub shop_buys_item: bool,
    pub no_limit: bool,
}

impl ShopItem {
    /// First KST-denominated price in broadcast order. Items without one
    /// are invisible to search ranking.
    #[must_use]
    pub fn kst_price(&self) -> Option<&Price> {
        self.prices.iter().find(|p| p.currency == PRIMARY_CURRENCY)
    }

    /// Whether any price is in a currency the system understands.
    #[must_use]
    pub fn has_usable_price(&self) -> bool {
        self.prices
            .iter()
            .any(|p| p.currency == PRIMARY_CURRENCY || p.currency == SECONDARY_CURRENCY)
    }

    /// Strictly-positive stock. `made_on_demand` and `no_limit` listings
    /// without stock are available but not "in stock" for ranking.
    #[must_use]
    pub fn in_stock(&self) -> bool {
        self.stock.is_some_and(|s| s > 0)
    }
}

/// Validator output: a canonical shop snapshot without `last_seen`,
/// which the store assigns at upsert time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedShop {
    pub identity: ShopIdentity,
    pub name: String,
    pub description: Option<String>,
    pub owner: Option<String>,
    pub software_name: Option<String>,
    pub software_version: Option<String>,
    pub main_location: Location,
    pub other_locations: Vec<Location>,
    pub items: Vec<ShopItem>,
}

/// A shop as read back from the catalog store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShopRecord {
    pub identity: ShopIdentity,
    pub name: String,
    pub description: Option<String>,
    pub owner: Option<String>,
    pub software_name: Option<String>,
    pub software_version: Option<String>,
    pub main_location: Location,
    pub other_locations: Vec<Location>,
    pub items: Vec<ShopItem>,
    pub last_seen: DateTime<Utc>,
}

impl ShopRecord {
    #[must_use]
    pub fn summary(&self) -> ShopSummary {
        ShopSummary {
            identity: self.identity,
            name: self.name.clone(),
            main_location: self.main_location.clone(),
            last_seen: self.last_seen,
        }
    }
}

/// The slice of a shop that search results carry alongside each item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShopSummary {
    pub identity: ShopIdentity,
    pub name: String,
    pub main_location: Location,
    pub last_seen: DateTime<Utc>,
}

/// One search result: a matching item plus its parent shop.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemHit {
    pub shop: ShopSummary,
    pub item: ShopItem,
}
