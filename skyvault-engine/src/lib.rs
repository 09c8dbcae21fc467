pub mod engine;
pub mod shares;
pub mod snapshot;
pub mod summary;

pub use engine::{BulkBooking, LifecycleEngine};
pub use snapshot::SnapshotCache;
pub use summary::{summarize, PortfolioSummary, StateCounts};
