use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

/// Prometheus counters for listing processing.
#[derive(Clone)]
pub struct MonitorMetrics {
    registry: Registry,
    pub listings_observed: IntCounter,
    pub duplicates_skipped: IntCounter,
    pub new_listings: IntCounter,
    pub excluded_skipped: IntCounter,
    pub filtered_skipped: IntCounter,
    pub alerts_emitted: IntCounter,
    pub baseline_listings: IntCounter,
    pub flush_failures: IntCounter,
    pub source_failures: IntCounter,
    pub seen_listings: IntGauge,
}

impl MonitorMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new_custom(Some("marketplace_monitor".to_string()), None)?;

        let counter = |name: &str, help: &str| -> prometheus::Result<IntCounter> {
            let c = IntCounter::new(name, help)?;
            registry.register(Box::new(c.clone()))?;
            Ok(c)
        };

        let listings_observed = counter("listings_observed_total", "Listings returned by the source")?;
        let duplicates_skipped = counter("duplicates_skipped_total", "Listings already seen")?;
        let new_listings = counter("new_listings_total", "Listings seen for the first time")?;
        let excluded_skipped = counter("excluded_skipped_total", "New listings dropped by excluded words")?;
        let filtered_skipped = counter("filtered_skipped_total", "New listings dropped by alert filters")?;
        let alerts_emitted = counter("alerts_emitted_total", "Alert decisions emitted")?;
        let baseline_listings = counter("baseline_listings_total", "Listings recorded during baselines")?;
        let flush_failures = counter("flush_failures_total", "Failed state flushes")?;
        let source_failures = counter("source_failures_total", "Failed listing fetches")?;

        let seen_listings = IntGauge::new("seen_listings", "Listing ids currently remembered")?;
        registry.register(Box::new(seen_listings.clone()))?;

        Ok(Self {
            registry,
            listings_observed,
            duplicates_skipped,
            new_listings,
            excluded_skipped,
            filtered_skipped,
            alerts_emitted,
            baseline_listings,
            flush_failures,
            source_failures,
            seen_listings,
        })
    }

    /// Prometheus text exposition of every registered metric.
    pub fn render(&self) -> String {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            tracing::warn!("Failed to encode metrics: {}", e);
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}
