//! Broadcast validation and normalization.
//!
//! Turns one raw, untrusted JSON value into a canonical
//! [`NormalizedShop`] or a [`ValidationError`] naming the first rule it
//! breaks. Pure: no I/O, no partial application. A rejected broadcast
//! leaves nothing behind.
//!
//! Producers are sloppy in known ways: some send `{}` where a list
//! belongs, coordinates of the wrong arity, lower-case currency codes,
//! or dimension names in arbitrary case. Those are coerced, not
//! rejected. Structural violations and broken listing invariants reject
//! the whole broadcast.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::types::{Dimension, Location, NormalizedShop, Price, ShopIdentity, ShopItem};

/// Broadcast `type` tag accepted by the validator.
pub const BROADCAST_TYPE: &str = "ShopSync";

/// Only protocol version understood, when the producer sends one at all.
const SUPPORTED_VERSION: i64 = 1;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("broadcast is not a JSON object")]
    NotAnObject,
    #[error("broadcast has no type tag")]
    MissingType,
    #[error("unsupported broadcast type {found:?}")]
    UnsupportedType { found: String },
    #[error("unsupported broadcast version {found}")]
    UnsupportedVersion { found: String },
    #[error("broadcast has no info object")]
    MissingInfo,
    #[error("info.computerID must be an integer")]
    InvalidComputerId,
    #[error("info.multiShop must be an integer")]
    InvalidMultiShop,
    #[error("info.name must be a non-empty string")]
    MissingShopName,
    #[error("malformed broadcast: {0}")]
    Schema(String),
    #[error("item {item:?}: {currency} price must be non-negative")]
    NegativePrice { item: String, currency: String },
    #[error("item {item:?}: sell listing has no stock and is not made on demand")]
    SellListingWithoutStock { item: String },
    #[error("item {item:?}: buy listing has no stock and no limit flag")]
    BuyListingWithoutStock { item: String },
    #[error("item {item:?}: sell price in {currency} is missing a payment address")]
    SellPriceWithoutAddress { item: String, currency: String },
    #[error("no item in the broadcast carries a usable price")]
    NoUsablePrices,
}

// ---------------------------------------------------------------------------
// Raw (wire) shapes
// ---------------------------------------------------------------------------

/// `{}` sent where a list belongs. Some producers emit an empty object
/// for "no data"; both shapes normalize to an empty list.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EmptyPlaceholder {}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListOrPlaceholder<T> {
    List(Vec<T>),
    Placeholder(EmptyPlaceholder),
}

impl<T> ListOrPlaceholder<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Self::List(items) => items,
            Self::Placeholder(EmptyPlaceholder {}) => Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawBroadcast {
    info: RawInfo,
    items: Option<ListOrPlaceholder<RawItem>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawInfo {
    name: Option<String>,
    description: Option<String>,
    owner: Option<String>,
    software: Option<RawSoftware>,
    location: Option<RawLocation>,
    other_locations: Option<ListOrPlaceholder<RawLocation>>,
}

#[derive(Debug, Deserialize)]
struct RawSoftware {
    name: Option<String>,
    version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawLocation {
    coordinates: Option<ListOrPlaceholder<f64>>,
    description: Option<String>,
    dimension: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawItem {
    item: RawItemInfo,
    prices: ListOrPlaceholder<RawPrice>,
    #[serde(default)]
    dynamic_price: bool,
    stock: Option<i64>,
    #[serde(default)]
    made_on_demand: bool,
    #[serde(default)]
    requires_interaction: bool,
    #[serde(default)]
    shop_buys_item: bool,
    #[serde(default)]
    no_limit: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawItemInfo {
    name: String,
    display_name: String,
    nbt: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPrice {
    value: f64,
    currency: String,
    address: Option<String>,
    required_meta: Option<String>,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validates and normalizes one raw broadcast.
///
/// Rules run in order: type tag and version, producer identity, shop
/// name, structural shape, per-item invariants, then the whole-broadcast
/// usable-price rule.
///
/// # Errors
///
/// Returns the [`ValidationError`] for the first rule the broadcast
/// breaks.
pub fn validate_broadcast(raw: &Value) -> Result<NormalizedShop, ValidationError> {
    let obj = raw.as_object().ok_or(ValidationError::NotAnObject)?;

    match obj.get("type").and_then(Value::as_str) {
        Some(BROADCAST_TYPE) => {}
        Some(other) => {
            return Err(ValidationError::UnsupportedType {
                found: other.to_owned(),
            })
        }
        None => return Err(ValidationError::MissingType),
    }

    match obj.get("version") {
        None | Some(Value::Null) => {}
        Some(v) if v.as_i64() == Some(SUPPORTED_VERSION) => {}
        Some(v) => {
            return Err(ValidationError::UnsupportedVersion {
                found: v.to_string(),
            })
        }
    }

    // Identity is checked before the serde pass so the rejection reason
    // names the field instead of a deserializer path.
    let info = obj
        .get("info")
        .and_then(Value::as_object)
        .ok_or(ValidationError::MissingInfo)?;

    let computer_id = info
        .get("computerID")
        .and_then(Value::as_i64)
        .and_then(|n| i32::try_from(n).ok())
        .ok_or(ValidationError::InvalidComputerId)?;

    let multi_shop = match info.get("multiShop") {
        None | Some(Value::Null) => None,
        Some(v) => Some(
            v.as_i64()
                .and_then(|n| i32::try_from(n).ok())
                .ok_or(ValidationError::InvalidMultiShop)?,
        ),
    };

    let broadcast =
        RawBroadcast::deserialize(raw).map_err(|e| ValidationError::Schema(e.to_string()))?;

    let name = broadcast
        .info
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or(ValidationError::MissingShopName)?
        .to_owned();

    let main_location = broadcast
        .info
        .location
        .map_or_else(Location::default, normalize_location);

    let other_locations: Vec<Location> = broadcast
        .info
        .other_locations
        .map(ListOrPlaceholder::into_vec)
        .unwrap_or_default()
        .into_iter()
        .map(normalize_location)
        .filter(|loc| !loc.is_empty())
        .collect();

    let (software_name, software_version) = match broadcast.info.software {
        Some(software) => (
            software.name.filter(|s| !s.is_empty()),
            software.version.filter(|s| !s.is_empty()),
        ),
        None => (None, None),
    };

    let items = broadcast
        .items
        .map(ListOrPlaceholder::into_vec)
        .unwrap_or_default()
        .into_iter()
        .map(normalize_item)
        .collect::<Result<Vec<_>, _>>()?;

    if !items.is_empty() && !items.iter().any(ShopItem::has_usable_price) {
        return Err(ValidationError::NoUsablePrices);
    }

    Ok(NormalizedShop {
        identity: ShopIdentity::new(computer_id, multi_shop),
        name,
        description: broadcast.info.description.filter(|s| !s.is_empty()),
        owner: broadcast.info.owner.filter(|s| !s.is_empty()),
        software_name,
        software_version,
        main_location,
        other_locations,
        items,
    })
}

/// Coordinates must be exactly three numbers; anything else is dropped,
/// not rejected. Dimension strings map through [`Dimension::from_raw`].
fn normalize_location(raw: RawLocation) -> Location {
    let coordinates = raw
        .coordinates
        .map(ListOrPlaceholder::into_vec)
        .and_then(|coords| match coords[..] {
            [x, y, z] => Some((round_coord(x), round_coord(y), round_coord(z))),
            _ => None,
        });

    Location {
        coordinates,
        description: raw
            .description
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty()),
        dimension: raw.dimension.map(|s| Dimension::from_raw(&s)),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn round_coord(v: f64) -> i32 {
    v.round() as i32
}

fn normalize_item(raw: RawItem) -> Result<ShopItem, ValidationError> {
    let name = raw.item.name;

    let prices: Vec<Price> = raw
        .prices
        .into_vec()
        .into_iter()
        .map(|p| Price {
            value: p.value,
            currency: p.currency.to_uppercase(),
            address: p.address.filter(|a| !a.is_empty()),
            required_meta: p.required_meta,
        })
        .collect();

    if let Some(bad) = prices.iter().find(|p| p.value < 0.0) {
        return Err(ValidationError::NegativePrice {
            item: name,
            currency: bad.currency.clone(),
        });
    }

    if raw.shop_buys_item {
        if !raw.no_limit && raw.stock.is_none() {
            return Err(ValidationError::BuyListingWithoutStock { item: name });
        }
    } else {
        if !raw.made_on_demand && raw.stock.is_none() {
            return Err(ValidationError::SellListingWithoutStock { item: name });
        }
        if let Some(bad) = prices.iter().find(|p| p.address.is_none()) {
            return Err(ValidationError::SellPriceWithoutAddress {
                item: name,
                currency: bad.currency.clone(),
            });
        }
    }

    Ok(ShopItem {
        name,
        display_name: raw.item.display_name,
        nbt_hash: raw.item.nbt,
        description: raw.item.description,
        prices,
        dynamic_price: raw.dynamic_price,
        stock: raw.stock,
        made_on_demand: raw.made_on_demand,
        requires_interaction: raw.requires_interaction,
        shop_buys_item: raw.shop_buys_item,
        no_limit: raw.no_limit,
    })
}
