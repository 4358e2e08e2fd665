use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::listing::Listing;
use crate::core::MonitorMetrics;
use crate::matching::deal_classifier::check_with_matcher;
use crate::matching::{MatchResult, Product, ProductMatcher};
use crate::monitoring::reporter::BatchSummary;
use crate::monitoring::seen_listings::MAX_SEEN_LISTINGS;
use crate::monitoring::state::MonitorState;
use crate::monitoring::state_store::StateStore;

/// Single-filter presets. Settings can enable several filters at once; see
/// [`AlertFilters`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterMode {
    None,
    OnlyPreferred,
    NearOrGood,
    GoodOnly,
}

/// Independent alert filters. A listing alerts only if it passes every
/// enabled filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AlertFilters {
    pub only_preferred: bool,
    pub near_or_good: bool,
    pub good_only: bool,
}

impl From<FilterMode> for AlertFilters {
    fn from(mode: FilterMode) -> Self {
        let mut filters = AlertFilters::default();
        match mode {
            FilterMode::None => {}
            FilterMode::OnlyPreferred => filters.only_preferred = true,
            FilterMode::NearOrGood => filters.near_or_good = true,
            FilterMode::GoodOnly => filters.good_only = true,
        }
        filters
    }
}

impl AlertFilters {
    /// Name of the first filter the result fails, if any.
    pub fn rejection(&self, result: &MatchResult) -> Option<&'static str> {
        if self.only_preferred && !result.preferred {
            return Some("not a preferred product");
        }
        if self.near_or_good && !(result.is_good_deal || result.near_good_deal) {
            return Some("not a good or near-good deal");
        }
        if self.good_only && !result.is_good_deal {
            return Some("not a good deal");
        }
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DealLabel {
    GoodDeal,
    NearGoodDeal,
}

impl DealLabel {
    pub fn for_result(result: &MatchResult) -> Option<Self> {
        if result.is_good_deal {
            Some(Self::GoodDeal)
        } else if result.near_good_deal {
            Some(Self::NearGoodDeal)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GoodDeal => "Good Deal",
            Self::NearGoodDeal => "Near Good Deal",
        }
    }
}

/// A listing that should be delivered to the notifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertDecision {
    pub alert_id: Uuid,
    pub keyword: String,
    pub listing_id: String,
    pub listing: Listing,
    pub result: MatchResult,
    pub deal_label: Option<DealLabel>,
    pub decided_at: DateTime<Utc>,
}

impl AlertDecision {
    pub fn new(keyword: &str, listing_id: String, listing: Listing, result: MatchResult) -> Self {
        Self {
            alert_id: Uuid::new_v4(),
            keyword: keyword.to_string(),
            listing_id,
            deal_label: DealLabel::for_result(&result),
            listing,
            result,
            decided_at: Utc::now(),
        }
    }

    pub fn deal_label(&self) -> Option<&'static str> {
        self.deal_label.as_ref().map(DealLabel::as_str)
    }
}

/// Per-batch inputs taken from the current settings.
#[derive(Debug, Clone, Copy)]
pub struct BatchContext<'a> {
    pub keyword: &'a str,
    pub products: &'a [Product],
    pub excluded_words: &'a [String],
    pub filters: AlertFilters,
}

#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub decisions: Vec<AlertDecision>,
    pub summary: BatchSummary,
}

/// Dedup, baseline, match and filter one keyword's batch of listings.
///
/// Every listing that is new outside a baseline is flushed to the state store
/// before classification, so a crash mid-batch cannot re-alert it on restart.
/// Flush failures are logged and counted; the in-memory state stays
/// authoritative for the rest of the run.
pub struct ListingPipeline {
    store: Arc<dyn StateStore>,
    metrics: Option<MonitorMetrics>,
}

impl ListingPipeline {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self {
            store,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: MonitorMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub async fn process(
        &self,
        state: &mut MonitorState,
        listings: &[Listing],
        ctx: BatchContext<'_>,
        cancel: &CancellationToken,
    ) -> BatchOutcome {
        let mut summary = BatchSummary::new(ctx.keyword, listings.len());

        if state.first_run.is_pending(ctx.keyword) {
            self.record_baseline(state, listings, ctx.keyword, cancel, &mut summary)
                .await;
            return BatchOutcome {
                decisions: Vec::new(),
                summary,
            };
        }

        let matcher = ProductMatcher::new(ctx.products);
        let mut decisions = Vec::new();

        for listing in listings {
            if cancel.is_cancelled() {
                tracing::warn!(
                    "Monitoring stopped during '{}' batch, {} listings left unevaluated",
                    ctx.keyword,
                    listings.len() - summary.evaluated
                );
                summary.cancelled = true;
                break;
            }
            summary.evaluated += 1;
            self.with_metric(|m| m.listings_observed.inc());

            let listing_id = listing.listing_id();
            if state.seen.contains(&listing_id) {
                summary.duplicates += 1;
                self.with_metric(|m| m.duplicates_skipped.inc());
                tracing::debug!("Skipping already seen listing: {}", listing_id);
                continue;
            }

            tracing::info!("NEW LISTING FOUND: {} ({})", listing_id, short_title(&listing.title));
            state.seen.add(listing_id.clone());
            summary.new_listings += 1;
            self.with_metric(|m| m.new_listings.inc());
            self.flush_seen(state, &mut summary).await;

            if listing.contains_excluded_word(ctx.excluded_words) {
                summary.excluded += 1;
                self.with_metric(|m| m.excluded_skipped.inc());
                tracing::debug!("Skipping listing with excluded words: {}", listing.title);
                continue;
            }

            let result = check_with_matcher(&listing.title, &listing.price, &matcher);
            tracing::debug!(
                "Product check for '{}' ({}): {:?}",
                listing.title,
                listing.price,
                result
            );

            if let Some(reason) = ctx.filters.rejection(&result) {
                summary.filtered += 1;
                self.with_metric(|m| m.filtered_skipped.inc());
                tracing::debug!(
                    "Skipping {}: {}",
                    result.product_name.as_deref().unwrap_or("unmatched listing"),
                    reason
                );
                continue;
            }

            decisions.push(AlertDecision::new(
                ctx.keyword,
                listing_id,
                listing.clone(),
                result,
            ));
        }

        let trimmed = state.seen.trim(MAX_SEEN_LISTINGS);
        if trimmed > 0 {
            tracing::info!("Trimmed {} oldest seen listings", trimmed);
        }
        self.flush_seen(state, &mut summary).await;

        summary.alerts = decisions.len();
        summary.seen_total = state.seen.size();
        self.with_metric(|m| {
            m.alerts_emitted.inc_by(decisions.len() as u64);
            m.seen_listings.set(state.seen.size() as i64);
        });
        summary.log();

        BatchOutcome { decisions, summary }
    }

    async fn record_baseline(
        &self,
        state: &mut MonitorState,
        listings: &[Listing],
        keyword: &str,
        cancel: &CancellationToken,
        summary: &mut BatchSummary,
    ) {
        summary.baseline = true;
        tracing::info!(
            "FIRST RUN for '{}': storing {} listings without alerts",
            keyword,
            listings.len()
        );

        let mut ids = Vec::with_capacity(listings.len());
        for listing in listings {
            if cancel.is_cancelled() {
                tracing::warn!("Monitoring stopped during baseline for '{}', nothing recorded", keyword);
                summary.cancelled = true;
                return;
            }
            ids.push(listing.listing_id());
        }
        summary.evaluated = ids.len();

        state
            .first_run
            .record_baseline(keyword, ids, &mut state.seen);
        state.seen.trim(MAX_SEEN_LISTINGS);

        // Keyword completion is persisted only after its baseline ids are durable.
        if self.flush_seen(state, summary).await {
            if let Err(e) = state.flush_first_run(self.store.as_ref()).await {
                tracing::warn!("Failed to flush first-run state for '{}': {}", keyword, e);
                summary.flush_failures += 1;
                self.with_metric(|m| m.flush_failures.inc());
            }
        } else {
            tracing::warn!(
                "Baseline ids for '{}' not persisted, keyword stays pending in storage",
                keyword
            );
        }

        summary.seen_total = state.seen.size();
        self.with_metric(|m| {
            m.baseline_listings.inc_by(listings.len() as u64);
            m.seen_listings.set(state.seen.size() as i64);
        });
        tracing::info!(
            "First run complete for '{}'. Total seen listings: {}",
            keyword,
            state.seen.size()
        );
    }

    async fn flush_seen(&self, state: &MonitorState, summary: &mut BatchSummary) -> bool {
        match state.flush_seen(self.store.as_ref()).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Failed to flush seen listings: {}", e);
                summary.flush_failures += 1;
                self.with_metric(|m| m.flush_failures.inc());
                false
            }
        }
    }

    fn with_metric<F: FnOnce(&MonitorMetrics)>(&self, f: F) {
        if let Some(metrics) = &self.metrics {
            f(metrics);
        }
    }
}

fn short_title(title: &str) -> String {
    let mut short: String = title.chars().take(30).collect();
    if title.chars().count() > 30 {
        short.push_str("...");
    }
    short
}
