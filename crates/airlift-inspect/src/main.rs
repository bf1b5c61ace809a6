//! Airlift Inspect - read-only view of a persisted definitions cache.
//!
//! Loads the envelope from a cache file or SQLite store and prints either a
//! summary, one dag, or the tasks bound to one asset key.

mod report;

use airlift_core::{AssetKey, EnvelopeStore, FileEnvelopeStore, SqliteEnvelopeStore};
use anyhow::{anyhow, bail, Context, Result};
use clap::{ArgGroup, Parser};
use std::path::PathBuf;
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "airlift-inspect")]
#[command(about = "Inspect a persisted airlift definitions cache")]
#[command(group(ArgGroup::new("source").required(true).args(["cache_file", "sqlite"])))]
struct Args {
    /// Envelope file written by the file store
    #[arg(long)]
    cache_file: Option<PathBuf>,

    /// SQLite database written by the SQLite store
    #[arg(long)]
    sqlite: Option<PathBuf>,

    /// Show a single dag
    #[arg(long, conflicts_with = "asset")]
    dag: Option<String>,

    /// Show the tasks bound to an asset key (`a/b/c`)
    #[arg(long)]
    asset: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let store: Box<dyn EnvelopeStore> = match (&args.cache_file, &args.sqlite) {
        (Some(path), _) => Box::new(FileEnvelopeStore::new(path)),
        (None, Some(path)) => Box::new(
            SqliteEnvelopeStore::new(path)
                .with_context(|| format!("Failed to open {}", path.display()))?,
        ),
        (None, None) => bail!("Either --cache-file or --sqlite is required"),
    };

    let envelope = store
        .load()
        .context("Failed to load envelope")?
        .ok_or_else(|| anyhow!("No envelope has been stored yet"))?;
    debug!("Loaded envelope v{}", envelope.schema_version());

    let output = if let Some(dag_id) = &args.dag {
        report::dag(&envelope, dag_id)?
    } else if let Some(asset) = &args.asset {
        report::asset(&envelope, &AssetKey::parse_user_string(asset)?)?
    } else {
        report::summary(&envelope)?
    };

    print!("{}", output);
    Ok(())
}
