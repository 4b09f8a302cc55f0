//! `catalog-linker` command line
//!
//! ```text
//! catalog-linker [--config FILE] collect [--all | ID...]
//! catalog-linker [--config FILE] links [--a ID,ID] [--b ID,ID] [--vendor CODE,CODE] [--internal ID,ID]
//! catalog-linker [--config FILE] a-to-b ID...
//! catalog-linker [--config FILE] b-to-a ID...
//! ```
//!
//! Results are printed to stdout as JSON; logs go to stderr.

#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use catalog_linker_lib::application::{CatalogScope, LinkEngine, ResultCache};
use catalog_linker_lib::domain::BFilter;
use catalog_linker_lib::infrastructure::config::AppConfig;
use catalog_linker_lib::infrastructure::logging::{init_logging_with_config, log_system_info};
use catalog_linker_lib::infrastructure::{DatabaseConnection, SqliteBarcodeRepository};

#[derive(Parser, Debug)]
#[command(name = "catalog-linker", version, about = "Cross-marketplace barcode linking", long_about = None)]
struct Cli {
    /// Configuration file layered over the built-in defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Reconcile the whole A catalog or the listed A items
    Collect {
        #[arg(long, conflicts_with = "ids", help = "Collect every A item with barcodes (default)")]
        all: bool,

        #[arg(help = "A item IDs to collect")]
        ids: Vec<String>,
    },

    /// Print the link table, optionally filtered on either side
    Links {
        #[arg(long, value_delimiter = ',', help = "Comma-separated A item IDs")]
        a: Option<Vec<String>>,

        #[arg(long, value_delimiter = ',', help = "Comma-separated B item IDs")]
        b: Option<Vec<String>>,

        #[arg(long, value_delimiter = ',', help = "Comma-separated B vendor codes")]
        vendor: Option<Vec<String>>,

        #[arg(long, value_delimiter = ',', help = "Comma-separated B internal product IDs")]
        internal: Option<Vec<String>>,
    },

    /// Primary B links of the given A items
    AToB {
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Primary A links of the given B items
    BToA {
        #[arg(required = true)]
        ids: Vec<String>,
    },
}

impl Command {
    fn scope(all: bool, ids: Vec<String>) -> CatalogScope {
        if all || ids.is_empty() {
            CatalogScope::All
        } else {
            CatalogScope::Explicit(ids)
        }
    }
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::from_file(path),
        None => AppConfig::load(),
    }
    .context("Failed to load configuration")?;

    init_logging_with_config(config.logging.clone())?;
    log_system_info();

    let db = DatabaseConnection::from_config(&config.database)
        .await
        .with_context(|| format!("Failed to open catalog database {}", config.database.url))?;
    db.migrate().await.context("Failed to prepare catalog schema")?;
    let source = Arc::new(SqliteBarcodeRepository::new(db.pool().clone()));

    let mut engine = LinkEngine::new(source, config.engine.clone())?;
    if config.engine.cache.enabled {
        engine = engine.with_cache(Arc::new(ResultCache::from_config(&config.engine.cache)));
    }

    match cli.command {
        Command::Collect { all, ids } => {
            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("🛑 Interrupt received, finishing current batch");
                    on_signal.cancel();
                }
            });

            let result = engine
                .collect_for_catalog_with_cancel(Command::scope(all, ids), &config.engine.batch, &cancel)
                .await?;
            print_json(result.as_ref())?;
        }
        Command::Links { a, b, vendor, internal } => {
            let filter = BFilter { b_ids: b, vendor_codes: vendor, internal_ids: internal };
            let rows = engine.get_all_links_by(a.as_deref(), filter).await?;
            print_json(&rows)?;
        }
        Command::AToB { ids } => print_json(&engine.link_a_to_b(&ids).await?)?,
        Command::BToA { ids } => print_json(&engine.link_b_to_a(&ids).await?)?,
    }

    db.close().await;
    info!("Done");
    Ok(())
}
