use anyhow::Context;
use clap::{Parser, Subcommand};
use policy_monitor::server::{serve, AppState};
use policy_monitor::{
    AppConfig, OpenAiModel, PgPolicyStore, PolicyExtractor, PolicyProcessor, SourceAggregator,
    DEFAULT_DAYS_BACK,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(name = "policy-monitor", about = "AI policy ingestion and monitoring service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP trigger/status server (default)
    Serve,
    /// Run one collection pass and exit
    Collect {
        #[arg(long, default_value_t = DEFAULT_DAYS_BACK)]
        days_back: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = AppConfig::from_env().context("failed to load configuration")?;

    info!("Starting policy monitor");
    info!("Connecting to database: {}", config.safe_database_url());

    let store = Arc::new(
        PgPolicyStore::connect(&config.database_url)
            .await
            .context("failed to connect to database")?,
    );
    store.migrate().await.context("failed to run migrations")?;

    let client = reqwest::Client::builder()
        .user_agent("policy-monitor/0.1")
        .timeout(Duration::from_secs(30))
        .gzip(true)
        .build()
        .context("failed to build HTTP client")?;

    let aggregator = SourceAggregator::with_default_sources(client.clone());
    let model = Arc::new(OpenAiModel::new(
        client,
        config.openai_api_key.clone(),
        config.openai_model.clone(),
    ));
    let extractor = PolicyExtractor::new(model);
    let processor = Arc::new(PolicyProcessor::new(aggregator, extractor, store.clone()));

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let state = AppState {
                processor,
                store,
                cron_secret: config.cron_secret.clone(),
                admin_key: config.admin_key.clone(),
            };
            serve(state, &config.bind_addr).await?;
        }
        Command::Collect { days_back } => {
            let result = processor.process_latest(days_back).await?;
            processor.update_existing().await;
            let stats = processor.stats().await?;

            println!("{}", serde_json::to_string_pretty(&result)?);
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }

    Ok(())
}
