use indexmap::IndexSet;

/// Upper bound on remembered listing ids.
pub const MAX_SEEN_LISTINGS: usize = 5000;

/// Insertion-ordered set of listing ids already evaluated.
///
/// Re-adding an id keeps its original position, so trimming always drops the
/// ids that were first seen longest ago.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeenListingStore {
    ids: IndexSet<String>,
}

impl SeenListingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Returns `true` when the id was not present before.
    pub fn add(&mut self, id: impl Into<String>) -> bool {
        self.ids.insert(id.into())
    }

    pub fn size(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.ids.iter().cloned().collect()
    }

    /// Keep only the `max_size` most recently inserted ids. Returns how many
    /// were dropped.
    pub fn trim(&mut self, max_size: usize) -> usize {
        if self.ids.len() <= max_size {
            return 0;
        }
        let excess = self.ids.len() - max_size;
        self.ids.drain(..excess);
        excess
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }
}
