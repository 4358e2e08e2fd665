use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use super::seen_listings::SeenListingStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeywordPhase {
    /// No baseline captured yet; listings are recorded but never alerted.
    Pending,
    Complete,
}

/// Per-keyword baseline state.
///
/// A keyword is pending until its first batch has been recorded as seen.
/// Keywords never observed before are pending by absence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FirstRunTracker {
    completed: IndexSet<String>,
    all_complete: bool,
}

impl FirstRunTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_persisted<I, S>(completed: I, global_first_run: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            completed: completed.into_iter().map(Into::into).collect(),
            all_complete: !global_first_run,
        }
    }

    pub fn phase(&self, keyword: &str) -> KeywordPhase {
        if self.completed.contains(keyword) {
            KeywordPhase::Complete
        } else {
            KeywordPhase::Pending
        }
    }

    pub fn is_pending(&self, keyword: &str) -> bool {
        self.phase(keyword) == KeywordPhase::Pending
    }

    /// Mark every id as seen without alerting, then complete the keyword.
    pub fn record_baseline<I, S>(&mut self, keyword: &str, ids: I, seen: &mut SeenListingStore)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for id in ids {
            seen.add(id);
        }
        self.completed.insert(keyword.to_string());
    }

    /// Returns `true` if the keyword had completed its baseline.
    pub fn reset(&mut self, keyword: &str) -> bool {
        let was_complete = self.completed.shift_remove(keyword);
        if was_complete {
            self.all_complete = false;
        }
        was_complete
    }

    pub fn reset_all(&mut self) {
        self.completed.clear();
        self.all_complete = false;
    }

    /// Recompute the global flag against the currently tracked keywords.
    /// Returns `true` on the transition into "all complete".
    pub fn refresh_all_complete(&mut self, tracked: &[String]) -> bool {
        let now_complete = tracked.iter().all(|k| self.completed.contains(k.as_str()));
        let transitioned = now_complete && !self.all_complete;
        self.all_complete = now_complete;
        transitioned
    }

    pub fn all_complete(&self) -> bool {
        self.all_complete
    }

    pub fn completed_keywords(&self) -> Vec<String> {
        self.completed.iter().cloned().collect()
    }

    pub fn pending_keywords(&self, tracked: &[String]) -> Vec<String> {
        tracked
            .iter()
            .filter(|k| self.is_pending(k))
            .cloned()
            .collect()
    }
}
