pub mod database;
pub mod first_run;
pub mod reporter;
pub mod seen_listings;
pub mod state;
pub mod state_store;

pub use database::SqliteStateStore;
pub use first_run::{FirstRunTracker, KeywordPhase};
pub use reporter::{BatchSummary, MonitorStatus};
pub use seen_listings::{SeenListingStore, MAX_SEEN_LISTINGS};
pub use state::MonitorState;
pub use state_store::{MemoryStateStore, StateStore, StateStoreError};
