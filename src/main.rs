use momoscan::config::Config;
use momoscan::error::ScanError;
use momoscan::services::{BroadcastNotifier, ResultSink, ScanObserver, Scanner, SqliteResultStore};
use momoscan::sources::{FinnhubClient, MarketDataProvider, StaticUniverse, UniverseSource};
use momoscan::AppState;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Build the scanner from configuration. Missing credentials are fatal to scanning.
fn build_scanner(
    config: &Config,
    sink: Arc<dyn ResultSink>,
    notifier: BroadcastNotifier,
) -> Result<Scanner, ScanError> {
    let api_key = config
        .finnhub_api_key
        .clone()
        .ok_or_else(|| ScanError::Configuration("FINNHUB_API_KEY not set".into()))?;

    let finnhub = Arc::new(FinnhubClient::new(
        config.finnhub_base_url.clone(),
        api_key,
        config.universe_limit,
    )?);

    let universe: Arc<dyn UniverseSource> = if config.universe_symbols.is_empty() {
        info!(limit = config.universe_limit, "Using Finnhub US listing as universe");
        finnhub.clone()
    } else {
        info!(symbols = config.universe_symbols.len(), "Using configured universe");
        Arc::new(StaticUniverse::new(&config.universe_symbols))
    };
    let provider: Arc<dyn MarketDataProvider> = finnhub;

    let scanner = Scanner::new(config.scan.clone(), provider, universe, sink)?
        .with_observer(Arc::new(notifier) as Arc<dyn ScanObserver>);
    Ok(scanner)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "momoscan=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Arc::new(Config::from_env());
    info!("Starting momoscan on {}:{}", config.host, config.port);

    let sink: Arc<dyn ResultSink> = Arc::new(SqliteResultStore::new(&config.database_path)?);

    let notifier = BroadcastNotifier::default();
    let (scanner, startup_error) = match build_scanner(&config, sink.clone(), notifier.clone()) {
        Ok(scanner) => (Some(Arc::new(scanner)), None),
        Err(e) => {
            error!("Scanner disabled: {}", e);
            (None, Some(e.to_string()))
        }
    };

    // Log committed scans
    {
        let mut reports = notifier.subscribe();
        tokio::spawn(async move {
            while let Ok(report) = reports.recv().await {
                debug!(
                    scan_id = %report.scan_id,
                    top = ?report.result.symbols(),
                    "Scan committed"
                );
            }
        });
    }

    if let Some(scanner) = scanner.clone() {
        // Scheduled scans
        if config.scan_interval_secs > 0 {
            let scanner = scanner.clone();
            let interval_secs = config.scan_interval_secs;
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
                loop {
                    interval.tick().await;
                    if let Err(e) = scanner.run().await {
                        warn!("Scheduled scan failed: {}", e);
                    }
                }
            });
        }

        // Retention pruning
        let prune_secs = config.prune_interval_secs.max(60);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(prune_secs));
            loop {
                interval.tick().await;
                match scanner.prune().await {
                    Ok(removed) => debug!(removed, "Retention prune complete"),
                    Err(e) => warn!("Retention prune failed: {}", e),
                }
            }
        });
    }

    let state = AppState {
        config: config.clone(),
        scanner,
        sink,
        startup_error,
    };
    let app = momoscan::app(state);

    // Start the server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("momoscan listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
