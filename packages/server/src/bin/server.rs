// Main entry point for the LeadHunter API server

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use countries_client::CountriesClient;
use leadhunter_core::kernel::admission::PlanQuota;
use leadhunter_core::kernel::engines::{
    ChromeMapEngine, DuckDuckGoEngine, EngineSet, SearchCliEngine,
};
use leadhunter_core::kernel::history::HistoryStore;
use leadhunter_core::kernel::scheduler::{JobScheduler, SchedulerConfig};
use leadhunter_core::kernel::stream_hub::StreamHub;
use leadhunter_core::server::{build_app, AppState};
use leadhunter_core::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,leadhunter_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting LeadHunter API");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!("Configuration loaded");

    let unit_timeout = Duration::from_secs(config.unit_timeout_secs);

    // Build the stage engines
    let engines = EngineSet {
        map: Arc::new(ChromeMapEngine::new(&config.chrome_binary, unit_timeout)),
        search_primary: Arc::new(SearchCliEngine::new(
            &config.search_cli_command,
            &config.data_dir,
        )),
        search_fallback: Arc::new(
            DuckDuckGoEngine::new().context("Failed to build fallback search engine")?,
        ),
    };

    // Scheduler with persisted history
    let history = HistoryStore::new(&config.data_dir);
    let scheduler = JobScheduler::start(
        SchedulerConfig {
            max_concurrent: config.max_concurrent_jobs,
            output_dir: config.output_dir.clone(),
            unit_timeout,
        },
        engines,
        history,
        StreamHub::new(),
    )
    .await
    .context("Failed to start job scheduler")?;

    let countries = config
        .countries_api_url
        .as_deref()
        .map(|url| Arc::new(CountriesClient::new(url)));
    if countries.is_none() {
        tracing::warn!("COUNTRIES_API_URL not set, skipping location validation");
    }

    let app = build_app(AppState {
        scheduler,
        quota: Arc::new(PlanQuota),
        countries,
    });

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);
    tracing::info!("Health check: http://localhost:{}/health", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
