use std::path::PathBuf;

use chrono::{Duration, Utc};
use clap::{Parser, Subcommand, ValueEnum};

use findshop_core::{format, validate_broadcast, Catalog, QueryEngine, SearchDirection};
use findshop_db::PgCatalog;

#[derive(Debug, Parser)]
#[command(name = "findshop-cli")]
#[command(about = "FindShop catalog operations")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List detected shops, one page at a time.
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Search the catalog for an item. Prefix the query with `=` for an
    /// exact match.
    Search {
        query: String,
        #[arg(long, value_enum, default_value_t = Direction::Buy)]
        direction: Direction,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Show one shop by its computerID[:multiShop] identity.
    Shop { identity: String },
    /// Print catalog statistics.
    Stats,
    /// Delete shops not seen within the retention window.
    Sweep {
        /// Retention window in days.
        #[arg(long, default_value_t = 14)]
        days: i64,
    },
    /// Validate and ingest a broadcast from a JSON file.
    Ingest { file: PathBuf },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Direction {
    /// Find shops selling the item.
    Buy,
    /// Find shops buying the item.
    Sell,
}

impl From<Direction> for SearchDirection {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Buy => SearchDirection::Buy,
            Direction::Sell => SearchDirection::Sell,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let pool = findshop_db::connect_pool_from_env().await?;
    let catalog = PgCatalog::new(pool);
    let engine = QueryEngine::new(&catalog);
    let width = format::DEFAULT_CHAT_WIDTH;

    match cli.command {
        Commands::List { page } => {
            let results = engine.list_shops(page).await?;
            println!("{}", format::render_shop_list(&results, width, Utc::now()));
        }
        Commands::Search {
            query,
            direction,
            page,
        } => {
            let results = engine.search(&query, page, direction.into()).await?;
            println!("{}", format::render_search_page(&results, width, Utc::now()));
        }
        Commands::Shop { identity } => {
            let shop = engine.shop_detail(&identity).await?;
            println!("{}", format::render_shop_detail(&shop, Utc::now()));
        }
        Commands::Stats => {
            let statistics = engine.statistics().await?;
            println!("{}", format::render_statistics(&statistics));
        }
        Commands::Sweep { days } => {
            let deleted = catalog.sweep_expired(Duration::days(days)).await?;
            println!("deleted {deleted} expired shops");
        }
        Commands::Ingest { file } => {
            let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&file)?)?;
            let shop = validate_broadcast(&raw)
                .map_err(|reason| anyhow::anyhow!("broadcast rejected: {reason}"))?;
            let outcome = catalog.upsert(&shop).await?;
            let verb = if outcome.created { "created" } else { "updated" };
            println!("{verb} shop {} ({} items)", shop.identity, shop.items.len());
        }
    }

    Ok(())
}
