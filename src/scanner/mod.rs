pub mod listing;
pub mod monitor;
pub mod pipeline;
pub mod source;

pub use listing::{extract_listing_id, Listing};
pub use monitor::{CycleReport, MarketplaceMonitor};
pub use pipeline::{
    AlertDecision, AlertFilters, BatchContext, BatchOutcome, DealLabel, FilterMode, ListingPipeline,
};
pub use source::{keyword_slug, ListingSource, SnapshotDirSource, SourceError};
