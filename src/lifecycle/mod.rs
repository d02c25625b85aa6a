mod manager;
mod state;

pub use manager::{CommitOutcome, LifecycleManager, RunRecord, StagedCursors};
pub use state::{JobState, Operation};
