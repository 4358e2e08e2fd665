use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::MonitorState;

/// Counters for one processed batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub keyword: String,
    pub total: usize,
    pub evaluated: usize,
    pub new_listings: usize,
    pub duplicates: usize,
    pub excluded: usize,
    pub filtered: usize,
    pub alerts: usize,
    pub seen_total: usize,
    pub flush_failures: usize,
    pub baseline: bool,
    pub cancelled: bool,
}

impl BatchSummary {
    pub fn new(keyword: &str, total: usize) -> Self {
        Self {
            keyword: keyword.to_string(),
            total,
            ..Self::default()
        }
    }

    pub fn log(&self) {
        tracing::info!(
            keyword = %self.keyword,
            total = self.total,
            new = self.new_listings,
            duplicates = self.duplicates,
            excluded = self.excluded,
            filtered = self.filtered,
            alerts = self.alerts,
            seen = self.seen_total,
            "Listing check summary"
        );
    }

    pub fn render(&self) -> String {
        let mut report = String::new();
        report.push_str("========== LISTING CHECK SUMMARY ==========\n");
        report.push_str(&format!("Keyword: \"{}\"\n", self.keyword));
        if self.baseline {
            report.push_str("Mode: baseline (no alerts)\n");
        }
        report.push_str(&format!("Total listings found: {}\n", self.total));
        report.push_str(&format!("New listings found: {}\n", self.new_listings));
        report.push_str(&format!("Duplicates skipped: {}\n", self.duplicates));
        report.push_str(&format!("Excluded by words: {}\n", self.excluded));
        report.push_str(&format!("Filtered out: {}\n", self.filtered));
        report.push_str(&format!("Alerts: {}\n", self.alerts));
        report.push_str(&format!("Current seen listings count: {}\n", self.seen_total));
        if self.flush_failures > 0 {
            report.push_str(&format!("Flush failures: {}\n", self.flush_failures));
        }
        if self.cancelled {
            report.push_str(&format!(
                "Cancelled after {} of {} listings\n",
                self.evaluated, self.total
            ));
        }
        report.push_str("===========================================\n");
        report
    }
}

/// Read-only view of the monitor for status endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorStatus {
    pub active: bool,
    pub all_complete: bool,
    pub pending_keywords: Vec<String>,
    pub completed_keywords: Vec<String>,
    pub seen_listings: usize,
    pub last_cycle_at: Option<DateTime<Utc>>,
}

impl MonitorStatus {
    pub fn from_state(
        state: &MonitorState,
        tracked_keywords: &[String],
        active: bool,
        last_cycle_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            active,
            all_complete: state.first_run.all_complete(),
            pending_keywords: state.first_run.pending_keywords(tracked_keywords),
            completed_keywords: state.first_run.completed_keywords(),
            seen_listings: state.seen.size(),
            last_cycle_at,
        }
    }
}
