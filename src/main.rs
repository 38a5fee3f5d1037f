use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sspc_import::config::Config;
use sspc_import::feeds::{FeedParams, FeedSource, SspcFeed, SspcFile};
use sspc_import::hooks::ChangeLogHook;
use sspc_import::import::{self, mapping_values, Importer};
use sspc_import::media::HttpFetcher;
use sspc_import::store::LocalStore;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sspc-import", version, about = "Import SSPC property listings")]
struct Cli {
    /// Configuration file
    #[arg(long, env = "SSPC_IMPORT_CONFIG", default_value = "sspc-import.toml")]
    config: PathBuf,

    /// Store directory, overriding the configuration
    #[arg(long)]
    store: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Import the feed and retire listings that left it
    Import {
        #[arg(long, conflicts_with = "feed_file")]
        feed_url: Option<String>,
        #[arg(long)]
        feed_file: Option<PathBuf>,
    },
    /// Show the feed values that need a term mapping
    Mappings {
        #[arg(long, conflicts_with = "feed_file")]
        feed_url: Option<String>,
        #[arg(long)]
        feed_file: Option<PathBuf>,
    },
}

fn feed_source(
    config: &Config,
    feed_url: Option<String>,
    feed_file: Option<PathBuf>,
) -> Result<Box<dyn FeedSource>> {
    if let Some(path) = feed_file {
        return Ok(Box::new(SspcFile::new(path)));
    }
    let url = feed_url
        .or_else(|| config.feed.url.clone())
        .context("No feed URL given on the command line or in the configuration")?;
    let feed = SspcFeed::with_params(FeedParams::from_config(url, &config.feed))?;
    Ok(Box::new(feed))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let mut config = Config::load(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    if let Some(store) = cli.store {
        config.store.path = store;
    }

    match cli.command {
        Command::Import { feed_url, feed_file } => {
            let source = feed_source(&config, feed_url, feed_file)?;
            info!("Importing {} feed", source.source_name());

            let mut store = LocalStore::open(&config.store.path)
                .await
                .context("Failed to open store")?;
            info!("Using store at {}", store.root().display());
            let fetcher = HttpFetcher::new().context("Failed to create HTTP client")?;

            let mut importer = Importer::new(&config, &mut store, &fetcher)?;
            importer.add_hook(Box::new(ChangeLogHook));

            let result = import::run(&mut importer, source.as_ref()).await;
            let log = importer.into_log();

            if let Some(path) = &config.log_file {
                log.save(path)
                    .await
                    .with_context(|| format!("Failed to write import log to {}", path.display()))?;
            }

            let summary = result.context("Import failed")?;
            store.save().await.context("Failed to save store")?;

            info!(
                "Imported {} properties ({} inserted, {} updated, {} failed), {} removed",
                summary.processed, summary.inserted, summary.updated, summary.failed, summary.removed
            );
            info!(
                "Media: {} new, {} existing, {} deleted; {} errors",
                summary.media.new, summary.media.existing, summary.media.deleted, summary.errors
            );
        }
        Command::Mappings { feed_url, feed_file } => {
            let source = feed_source(&config, feed_url, feed_file)?;
            let document = source.fetch().await?;
            let result = import::pre_test(&document.property);

            println!("{} passed, {} failed", result.passed, result.failed);
            for (field, values) in &result.mappings {
                println!();
                println!("{}:", field);
                let options = mapping_values(field);
                for value in values {
                    let known = options.as_ref().map_or(false, |o| o.contains_key(value.as_str()));
                    println!("   {}{}", value, if known { "" } else { " (no default option)" });
                }
            }
        }
    }

    Ok(())
}
