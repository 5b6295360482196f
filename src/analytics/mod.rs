pub mod aggregator;
pub mod classifier;
pub mod sentiment;
pub mod snapshot;
pub mod summary;

pub use aggregator::*;
pub use classifier::*;
pub use sentiment::*;
pub use snapshot::{Completion, SessionId, Snapshot};
pub use summary::*;
