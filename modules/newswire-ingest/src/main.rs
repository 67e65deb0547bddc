use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use intel_client::IntelClient;
use newswire_common::{Category, Config};
use newswire_ingest::classify::RuleChainClassifier;
use newswire_ingest::embedder::IntelEmbedder;
use newswire_ingest::feed::fetch_candidates;
use newswire_ingest::IngestPipeline;
use newswire_store::{migrate, ArticleStore, PgStore};

#[derive(Parser)]
#[command(name = "newswire", about = "Feed ingestion and story clustering")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch all configured feeds and run one ingestion batch.
    Run,
    /// Apply the database schema and exit.
    Migrate,
    /// Print the latest tracked stories as JSON.
    Feed {
        /// Restrict to one category (domestic, world, business, ...).
        #[arg(long)]
        category: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    config.log_redacted();

    let store = PgStore::connect(&config.database_url).await?;

    match cli.command {
        Command::Migrate => {
            migrate(store.pool()).await?;
            info!("schema up to date");
        }
        Command::Run => {
            migrate(store.pool()).await?;

            let intel = Arc::new(IntelClient::new(&config.openai_api_key));
            let embedder = Arc::new(IntelEmbedder::new(intel.clone()));
            let classifier = Arc::new(RuleChainClassifier::new(intel));

            let store: Arc<dyn ArticleStore> = Arc::new(store);
            let http = reqwest::Client::new();
            let candidates = fetch_candidates(&http, store.as_ref(), &config.feed_urls).await?;

            let pipeline = IngestPipeline::new(store, embedder, classifier, config.cluster.clone())
                .with_deadline(Duration::from_secs(config.run_deadline_secs));
            let stats = pipeline.run(candidates).await?;
            info!(%stats, "done");
        }
        Command::Feed { category, limit } => {
            let category = category.map(|c| c.parse().unwrap_or(Category::Other));
            let feed = store.story_feed(category, limit).await?;
            println!("{}", serde_json::to_string_pretty(&feed)?);
        }
    }

    Ok(())
}
