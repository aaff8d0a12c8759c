pub mod app_config;
pub mod catalog;
pub mod config;
pub mod format;
pub mod query;
pub mod types;
pub mod validate;

pub use app_config::{AppConfig, Environment};
pub use catalog::{Catalog, CatalogError, CatalogStatistics, SearchFilter, UpsertOutcome};
pub use config::{load_app_config, load_app_config_from_env, ConfigError};
pub use query::{PagedHits, PagedShops, QueryEngine, QueryError, SearchDirection};
pub use types::{
    Dimension, IdentityParseError, ItemHit, Location, NormalizedShop, Price, ShopIdentity,
    ShopItem, ShopRecord, ShopSummary, PRIMARY_CURRENCY, SECONDARY_CURRENCY,
};
pub use validate::{validate_broadcast, ValidationError, BROADCAST_TYPE};
