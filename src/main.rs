use anyhow::Result;
use marketplace_deal_monitor::core::{
    logging, AppConfig, EventBus, HealthChecker, MonitorEvent, MonitorMetrics, MonitoringMode,
};
use marketplace_deal_monitor::monitoring::SqliteStateStore;
use marketplace_deal_monitor::scanner::{MarketplaceMonitor, SnapshotDirSource};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = AppConfig::load()?;

    // Initialize logging
    logging::init_logging(&config.service.log_level);

    tracing::info!("🚀 Marketplace deal monitor starting...");
    tracing::info!("Version: {}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Location: {} | keywords: {:?} | products: {} | mode: {:?}",
        config.settings.location,
        config.settings.keywords,
        config.settings.products.len(),
        config.settings.monitoring_mode
    );

    let health_checker = HealthChecker::new();
    let metrics = MonitorMetrics::new()?;
    let events = Arc::new(EventBus::new(1024));

    let store = Arc::new(SqliteStateStore::new(&config.service.database_path).await?);
    let source = Arc::new(SnapshotDirSource::new(&config.service.snapshot_dir));

    let monitor = Arc::new(
        MarketplaceMonitor::new(
            source,
            store,
            events.clone(),
            metrics.clone(),
            health_checker.clone(),
        )
        .await?,
    );

    // Alerts are handed to the notifier through the event bus; log them here.
    let mut alerts = events.subscribe();
    tokio::spawn(async move {
        loop {
            match alerts.recv().await {
                Ok(MonitorEvent::AlertRaised(decision)) => {
                    tracing::info!(
                        "🔔 {}{} for {} ({})",
                        decision
                            .deal_label()
                            .map(|label| format!("{} @ ", label))
                            .unwrap_or_default(),
                        decision.result.product_name.as_deref().unwrap_or("unmatched"),
                        decision.listing.price,
                        decision.listing.link
                    );
                }
                Ok(other) => tracing::debug!("Event: {:?}", other),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("Alert listener lagged, {} events dropped", n);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    // Start health, status and metrics endpoint
    let port = config.service.health_port;
    tokio::spawn(start_http_server(
        health_checker.clone(),
        monitor.clone(),
        metrics.clone(),
        port,
    ));
    tracing::info!("✅ Health endpoint running on port {}", port);

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown requested");
            shutdown.cancel();
        }
    });

    if config.settings.auto_start() {
        monitor.start().await;
    } else {
        tracing::info!("Manual mode: waiting for POST /start on port {}", port);
    }
    if config.settings.monitoring_mode == MonitoringMode::Auto {
        tracing::info!(
            "Auto mode window {}-{} is applied through set_active by the scheduler",
            config.settings.start_time,
            config.settings.end_time
        );
    }

    monitor
        .run(&config.service, &config.settings, cancel)
        .await;

    let status = monitor.status().await;
    tracing::info!(
        "Monitor stopped with {} seen listings, {} keyword(s) pending baseline",
        status.seen_listings,
        status.pending_keywords.len()
    );

    Ok(())
}

async fn start_http_server(
    health_checker: HealthChecker,
    monitor: Arc<MarketplaceMonitor>,
    metrics: MonitorMetrics,
    port: u16,
) {
    use warp::Filter;

    let health = warp::path("health")
        .and(warp::any().map(move || health_checker.clone()))
        .and_then(|checker: HealthChecker| async move {
            let status = checker.get_status().await;
            Ok::<_, warp::Rejection>(warp::reply::json(&status))
        });

    let status_monitor = monitor.clone();
    let status = warp::path("status")
        .and(warp::any().map(move || status_monitor.clone()))
        .and_then(|monitor: Arc<MarketplaceMonitor>| async move {
            let status = monitor.status().await;
            Ok::<_, warp::Rejection>(warp::reply::json(&status))
        });

    let metrics = warp::path("metrics")
        .and(warp::any().map(move || metrics.clone()))
        .map(|metrics: MonitorMetrics| metrics.render());

    let start_monitor = monitor.clone();
    let start = warp::path("start")
        .and(warp::any().map(move || start_monitor.clone()))
        .and_then(|monitor: Arc<MarketplaceMonitor>| async move {
            monitor.start().await;
            Ok::<_, warp::Rejection>(warp::reply::json(&monitor.status().await))
        });

    let stop_monitor = monitor.clone();
    let stop = warp::path("stop")
        .and(warp::any().map(move || stop_monitor.clone()))
        .and_then(|monitor: Arc<MarketplaceMonitor>| async move {
            monitor.stop().await;
            Ok::<_, warp::Rejection>(warp::reply::json(&monitor.status().await))
        });

    let routes = warp::get()
        .and(health.or(status).or(metrics))
        .or(warp::post().and(start.or(stop)));

    warp::serve(routes).run(([0, 0, 0, 0], port)).await;
}
