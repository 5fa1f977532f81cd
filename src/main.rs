use anyhow::Context;
use clap::{Parser, Subcommand};
use std::env;
use storyfeed::{
    projector, ranking, Error, Fetcher, FetchConfig, RankingConfig, SourceRegistry, Store,
    SyncOptions, Synchronizer,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "storyfeed", about = "Publication feed aggregator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sync stories with the published feeds.
    Sync {
        /// Force updates even if the feed is not new.
        #[arg(long)]
        force: bool,
        /// Which page of the feed should be parsed. Default is 1-3.
        #[arg(long)]
        page: Option<u32>,
        /// Which publication should be synced. Default is all.
        #[arg(long = "pub")]
        publication: Option<String>,
    },
    /// Recompute the weight of all feed entries from likes, comments and age.
    Rank,
    /// Refresh the per-category story counts.
    Recount,
    /// Print the unified feed (weight ascending) as JSON.
    Feed,
    /// Register a publication.
    AddPub {
        #[arg(long)]
        name: String,
        #[arg(long)]
        url: String,
        #[arg(long)]
        feed_url: String,
        #[arg(long)]
        logo_url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let database_url =
        env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:storyfeed.db".to_string());
    let store = Store::connect(&database_url)
        .await
        .with_context(|| format!("opening {database_url}"))?;

    match cli.command {
        Command::Sync {
            force,
            page,
            publication,
        } => {
            let fetcher = Fetcher::new(FetchConfig::default())?;
            let registry = SourceRegistry::new(Fetcher::new(FetchConfig::default())?);
            let synchronizer =
                Synchronizer::new(&store, &registry, &fetcher, RankingConfig::from_env());
            let options = SyncOptions {
                force,
                page,
                publication,
            };
            // Per-entry failures are logged inside the run; a partial sync
            // still exits 0.
            synchronizer.run(&options).await?;
        }
        Command::Rank => {
            let total = ranking::recompute_all(&store, &RankingConfig::from_env()).await?;
            info!("updated {} feed entries", total);
        }
        Command::Recount => {
            let total = store.recount_categories().await?;
            info!("recounted {} categories", total);
        }
        Command::Feed => {
            let items = projector::list(&store).await?;
            println!("{}", serde_json::to_string_pretty(&items)?);
        }
        Command::AddPub {
            name,
            url,
            feed_url,
            logo_url,
        } => {
            url::Url::parse(&url)
                .map_err(Error::from)
                .with_context(|| format!("invalid site URL {url}"))?;
            url::Url::parse(&feed_url)
                .map_err(Error::from)
                .with_context(|| format!("invalid feed URL {feed_url}"))?;
            let id = store
                .insert_publication(&name, &url, &feed_url, logo_url.as_deref())
                .await?;
            info!("publication {} registered with id {}", name, id);
        }
    }

    Ok(())
}
