use anyhow::Result;
use chrono::{DateTime, Utc};
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use super::pipeline::{AlertDecision, BatchContext, ListingPipeline};
use super::source::ListingSource;
use crate::core::{EventBus, HealthChecker, MonitorEvent, MonitorMetrics, ServiceConfig, Settings};
use crate::monitoring::reporter::{BatchSummary, MonitorStatus};
use crate::monitoring::state::MonitorState;
use crate::monitoring::state_store::StateStore;

/// Result of one pass over every configured keyword.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub batches: Vec<BatchSummary>,
    pub alerts: Vec<AlertDecision>,
    pub failed_keywords: Vec<String>,
    pub skipped: bool,
    pub cancelled: bool,
}

/// Drives the pipeline across keywords and owns the persisted monitor state.
///
/// State lives behind a single async mutex, held for a whole cycle, so runs
/// never interleave. Activation transitions and explicit resets go through
/// the same lock. Each cycle runs under a child of the caller's token, which
/// `stop` and deactivation cancel to halt the batch in progress.
pub struct MarketplaceMonitor {
    source: Arc<dyn ListingSource>,
    store: Arc<dyn StateStore>,
    pipeline: ListingPipeline,
    state: Mutex<MonitorState>,
    events: Arc<EventBus>,
    metrics: MonitorMetrics,
    health: HealthChecker,
    active: AtomicBool,
    cycle_cancel: Mutex<Option<CancellationToken>>,
    tracked_keywords: RwLock<Vec<String>>,
    last_cycle_at: RwLock<Option<DateTime<Utc>>>,
}

impl MarketplaceMonitor {
    /// Loads persisted state from `store`. The monitor starts inactive.
    pub async fn new(
        source: Arc<dyn ListingSource>,
        store: Arc<dyn StateStore>,
        events: Arc<EventBus>,
        metrics: MonitorMetrics,
        health: HealthChecker,
    ) -> Result<Self> {
        let state = match MonitorState::load(store.as_ref()).await {
            Ok(state) => {
                health.update_component("state_store", true).await;
                state
            }
            Err(e) => {
                health.update_component("state_store", false).await;
                return Err(e.into());
            }
        };
        metrics.seen_listings.set(state.seen.size() as i64);

        Ok(Self {
            pipeline: ListingPipeline::new(store.clone()).with_metrics(metrics.clone()),
            source,
            store,
            state: Mutex::new(state),
            events,
            metrics,
            health,
            active: AtomicBool::new(false),
            cycle_cancel: Mutex::new(None),
            tracked_keywords: RwLock::new(Vec::new()),
            last_cycle_at: RwLock::new(None),
        })
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// User-initiated start. Always requires fresh baselines.
    pub async fn start(&self) {
        tracing::info!("Starting monitoring");
        self.active.store(true, Ordering::SeqCst);
        self.reset_first_run(None).await;
    }

    pub async fn stop(&self) {
        tracing::info!("Stopping monitoring");
        self.active.store(false, Ordering::SeqCst);
        self.halt_running_cycle().await;
    }

    /// Apply an externally computed activity state (e.g. the daily
    /// monitoring window). Becoming active after a pause resets every
    /// keyword's baseline, since listings may have changed meanwhile.
    pub async fn set_active(&self, active: bool) {
        let was_active = self.active.swap(active, Ordering::SeqCst);
        if active && !was_active {
            tracing::info!("Transition from inactive to active, treating as first run");
            self.reset_first_run(None).await;
        } else if !active && was_active {
            tracing::info!("Monitoring paused");
            self.halt_running_cycle().await;
        }
    }

    async fn halt_running_cycle(&self) {
        if let Some(cycle) = self.cycle_cancel.lock().await.as_ref() {
            cycle.cancel();
        }
    }

    /// Send one keyword (or all with `None`) back to baseline mode.
    pub async fn reset_first_run(&self, keyword: Option<&str>) {
        let mut state = self.state.lock().await;
        match keyword {
            Some(keyword) => {
                state.first_run.reset(keyword);
            }
            None => state.first_run.reset_all(),
        }

        if let Err(e) = state.flush_first_run(self.store.as_ref()).await {
            tracing::warn!("Failed to persist first-run reset: {}", e);
            self.metrics.flush_failures.inc();
        }

        self.events.publish(MonitorEvent::FirstRunReset {
            keyword: keyword.map(str::to_string),
            timestamp: Utc::now(),
        });
    }

    /// Process every configured keyword once, in order.
    pub async fn run_cycle(&self, settings: &Settings, cancel: &CancellationToken) -> CycleReport {
        let mut report = CycleReport::default();
        *self.tracked_keywords.write().await = settings.keywords.clone();

        if !self.is_active() {
            tracing::debug!("Monitoring inactive, skipping cycle");
            report.skipped = true;
            return report;
        }
        if settings.keywords.is_empty() {
            tracing::warn!("No keywords configured, skipping cycle");
            report.skipped = true;
            return report;
        }

        let mut state = self.state.lock().await;
        let filters = settings.alert_filters();

        // Installed before the first activity check, so a concurrent stop
        // either cancels this token or is seen by that check.
        let cycle = cancel.child_token();
        *self.cycle_cancel.lock().await = Some(cycle.clone());

        tracing::info!(
            "Beginning marketplace check for {} keywords in {}",
            settings.keywords.len(),
            settings.location
        );

        for keyword in &settings.keywords {
            if cycle.is_cancelled() || !self.is_active() {
                tracing::info!("Monitoring stopped during keyword checks, ending cycle");
                report.cancelled = true;
                break;
            }

            let listings = match self.source.fetch(keyword).await {
                Ok(listings) => {
                    self.health.update_component("listing_source", true).await;
                    listings
                }
                Err(e) => {
                    tracing::error!("Error checking keyword '{}': {}", keyword, e);
                    self.metrics.source_failures.inc();
                    self.health.update_component("listing_source", false).await;
                    report.failed_keywords.push(keyword.clone());
                    continue;
                }
            };
            tracing::info!("Found {} listings for '{}'", listings.len(), keyword);

            let ctx = BatchContext {
                keyword,
                products: &settings.products,
                excluded_words: &settings.excluded_words,
                filters,
            };
            let outcome = self.pipeline.process(&mut state, &listings, ctx, &cycle).await;
            tracing::debug!("\n{}", outcome.summary.render());
            self.health
                .record_flush_failures(outcome.summary.flush_failures)
                .await;

            if outcome.summary.baseline && !outcome.summary.cancelled {
                self.events.publish(MonitorEvent::BaselineRecorded {
                    keyword: keyword.clone(),
                    listings: outcome.summary.evaluated,
                    timestamp: Utc::now(),
                });
            }
            for decision in &outcome.decisions {
                self.events.publish(MonitorEvent::AlertRaised(decision.clone()));
            }

            report.cancelled |= outcome.summary.cancelled;
            report.alerts.extend(outcome.decisions);
            report.batches.push(outcome.summary);

            if report.cancelled {
                break;
            }
        }

        let was_complete = state.first_run.all_complete();
        if state.first_run.refresh_all_complete(&settings.keywords) {
            tracing::info!(
                "All keywords have completed first run - future checks will alert on new listings"
            );
            self.events.publish(MonitorEvent::AllKeywordsBaselined {
                timestamp: Utc::now(),
            });
        }
        if was_complete != state.first_run.all_complete() {
            if let Err(e) = state.flush_first_run(self.store.as_ref()).await {
                tracing::warn!("Failed to persist first-run flag: {}", e);
                self.metrics.flush_failures.inc();
            }
        }

        *self.cycle_cancel.lock().await = None;
        *self.last_cycle_at.write().await = Some(Utc::now());
        report
    }

    /// Run cycles until cancelled, sleeping a random delay within the
    /// configured poll window between them.
    pub async fn run(&self, service: &ServiceConfig, settings: &Settings, cancel: CancellationToken) {
        loop {
            let report = self.run_cycle(settings, &cancel).await;
            if !report.failed_keywords.is_empty() {
                tracing::warn!(
                    "{} keyword(s) failed this cycle and will be retried: {:?}",
                    report.failed_keywords.len(),
                    report.failed_keywords
                );
            }

            let delay_secs = next_delay_secs(service.poll_min_secs, service.poll_max_secs);
            tracing::debug!("Scheduling next check in {} seconds", delay_secs);

            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Monitor loop cancelled");
                    break;
                }
                _ = tokio::time::sleep(std::time::Duration::from_secs(delay_secs)) => {}
            }
        }
    }

    pub async fn status(&self) -> MonitorStatus {
        let state = self.state.lock().await;
        let tracked = self.tracked_keywords.read().await;
        MonitorStatus::from_state(
            &state,
            &tracked,
            self.is_active(),
            *self.last_cycle_at.read().await,
        )
    }

    /// Copy of the current state, for callers that persist or inspect it.
    pub async fn state_snapshot(&self) -> MonitorState {
        self.state.lock().await.clone()
    }
}

fn next_delay_secs(min_secs: u64, max_secs: u64) -> u64 {
    if max_secs <= min_secs {
        return min_secs;
    }
    rand::rng().random_range(min_secs..=max_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::Product;
    use crate::monitoring::state_store::{MemoryStateStore, StateStoreError};
    use crate::scanner::listing::Listing;
    use crate::scanner::source::{MockListingSource, SourceError};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    /// Memory store whose writes take `delay`.
    struct SlowStateStore {
        inner: MemoryStateStore,
        delay: Duration,
    }

    #[async_trait]
    impl StateStore for SlowStateStore {
        async fn get(&self, key: &str) -> Result<Option<Value>, StateStoreError> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: Value) -> Result<(), StateStoreError> {
            tokio::time::sleep(self.delay).await;
            self.inner.set(key, value).await
        }
    }

    fn settings() -> Settings {
        Settings {
            keywords: vec!["iphone".to_string(), "ipad".to_string()],
            products: vec![Product::new("iPhone 12", 100.0, 300.0, true)],
            ..Settings::default()
        }
    }

    async fn monitor_with(source: MockListingSource) -> (MarketplaceMonitor, Arc<MemoryStateStore>) {
        let store = Arc::new(MemoryStateStore::new());
        let monitor = MarketplaceMonitor::new(
            Arc::new(source),
            store.clone(),
            Arc::new(EventBus::new(64)),
            MonitorMetrics::new().unwrap(),
            HealthChecker::new(),
        )
        .await
        .unwrap();
        (monitor, store)
    }

    #[tokio::test]
    async fn test_inactive_monitor_skips_cycle() {
        let mut source = MockListingSource::new();
        source.expect_fetch().never();
        let (monitor, _) = monitor_with(source).await;

        let report = monitor.run_cycle(&settings(), &CancellationToken::new()).await;
        assert!(report.skipped);
    }

    #[tokio::test]
    async fn test_source_failure_abandons_only_that_keyword() {
        let mut source = MockListingSource::new();
        source
            .expect_fetch()
            .withf(|k| k == "iphone")
            .returning(|_| Err(SourceError::Unavailable("tab crashed".into())));
        source
            .expect_fetch()
            .withf(|k| k == "ipad")
            .returning(|_| Ok(vec![Listing::new("/marketplace/item/5/", "$100", "iPad Air")]));
        let (monitor, _) = monitor_with(source).await;
        monitor.set_active(true).await;

        let report = monitor.run_cycle(&settings(), &CancellationToken::new()).await;

        assert_eq!(report.failed_keywords, vec!["iphone"]);
        assert_eq!(report.batches.len(), 1);
        assert!(report.batches[0].baseline);

        let status = monitor.status().await;
        assert_eq!(status.pending_keywords, vec!["iphone"]);
        assert!(!status.all_complete);
        assert_eq!(monitor.metrics.source_failures.get(), 1);
    }

    #[tokio::test]
    async fn test_reactivation_resets_baselines() {
        let mut source = MockListingSource::new();
        source
            .expect_fetch()
            .returning(|_| Ok(vec![Listing::new("/marketplace/item/1/", "$100", "iPhone 12")]));
        let (monitor, store) = monitor_with(source).await;
        monitor.set_active(true).await;

        monitor.run_cycle(&settings(), &CancellationToken::new()).await;
        assert!(monitor.status().await.all_complete);
        assert_eq!(
            store.get("firstRun").await.unwrap(),
            Some(serde_json::json!(false))
        );

        monitor.set_active(false).await;
        monitor.set_active(true).await;

        let status = monitor.status().await;
        assert_eq!(status.pending_keywords, vec!["iphone", "ipad"]);
        assert_eq!(status.seen_listings, 1);
        assert_eq!(
            store.get("firstRunKeywords").await.unwrap(),
            Some(serde_json::json!([]))
        );
    }

    #[tokio::test]
    async fn test_stop_halts_batch_in_progress() {
        let listings: Vec<Listing> = (1..=10)
            .map(|i| Listing::new(format!("/marketplace/item/{}/", i), "$100", "iPhone 12"))
            .collect();
        let calls = AtomicUsize::new(0);
        let mut source = MockListingSource::new();
        source.expect_fetch().returning(move |_| {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(Vec::new())
            } else {
                Ok(listings.clone())
            }
        });
        let store = Arc::new(SlowStateStore {
            inner: MemoryStateStore::new(),
            delay: Duration::from_millis(50),
        });
        let monitor = Arc::new(
            MarketplaceMonitor::new(
                Arc::new(source),
                store,
                Arc::new(EventBus::new(64)),
                MonitorMetrics::new().unwrap(),
                HealthChecker::new(),
            )
            .await
            .unwrap(),
        );
        let settings = Settings {
            keywords: vec!["iphone".to_string()],
            ..settings()
        };

        monitor.set_active(true).await;
        let baseline = monitor.run_cycle(&settings, &CancellationToken::new()).await;
        assert!(baseline.batches[0].baseline);

        let running = {
            let monitor = monitor.clone();
            let settings = settings.clone();
            tokio::spawn(async move { monitor.run_cycle(&settings, &CancellationToken::new()).await })
        };
        tokio::time::sleep(Duration::from_millis(120)).await;
        monitor.stop().await;
        let report = running.await.unwrap();

        assert!(report.cancelled);
        assert!(report.batches[0].cancelled);
        assert!(report.alerts.len() < 10);
        assert_eq!(report.alerts.len(), report.batches[0].evaluated);

        let state = monitor.state_snapshot().await;
        assert_eq!(state.seen.size(), report.batches[0].new_listings);
        assert!(!state.seen.contains("10"));
    }

    #[tokio::test]
    async fn test_flush_failures_degrade_health() {
        let mut source = MockListingSource::new();
        source
            .expect_fetch()
            .returning(|_| Ok(vec![Listing::new("/marketplace/item/1/", "$100", "iPhone 12")]));
        let (monitor, store) = monitor_with(source).await;
        let settings = Settings {
            keywords: vec!["iphone".to_string()],
            ..settings()
        };
        monitor.set_active(true).await;
        monitor.run_cycle(&settings, &CancellationToken::new()).await;
        assert_eq!(monitor.health.get_status().await.status, "healthy");

        store.set_fail_writes(true);
        monitor.reset_first_run(None).await;
        monitor.run_cycle(&settings, &CancellationToken::new()).await;

        let status = monitor.health.get_status().await;
        assert_eq!(status.status, "degraded");
        assert!(status.components.recent_flush_failures > 0);
    }

    #[tokio::test]
    async fn test_pause_after_cycle_leaves_caller_token_untouched() {
        let mut source = MockListingSource::new();
        source.expect_fetch().returning(|_| Ok(Vec::new()));
        let (monitor, _) = monitor_with(source).await;
        let outer = CancellationToken::new();

        monitor.set_active(true).await;
        monitor.run_cycle(&settings(), &outer).await;
        monitor.set_active(false).await;

        assert!(!outer.is_cancelled());
        assert!(monitor.cycle_cancel.lock().await.is_none());
    }

    #[test]
    fn test_next_delay_within_window() {
        for _ in 0..100 {
            let delay = next_delay_secs(15, 25);
            assert!((15..=25).contains(&delay));
        }
        assert_eq!(next_delay_secs(10, 10), 10);
        assert_eq!(next_delay_secs(30, 10), 30);
    }
}
