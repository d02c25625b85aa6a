use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::JobError;

/// The four states of a job run.
///
/// Each run flows through: UNINITIALIZED → INITIALIZED → COMMITTED, and may
/// drop to FAILED from either non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Uninitialized,
    Initialized,
    Committed,
    Failed,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Uninitialized => write!(f, "UNINITIALIZED"),
            JobState::Initialized => write!(f, "INITIALIZED"),
            JobState::Committed => write!(f, "COMMITTED"),
            JobState::Failed => write!(f, "FAILED"),
        }
    }
}

/// Things a caller can ask of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    Initialize,
    /// Record a source cursor for the pending commit. Does not change state.
    Stage,
    Commit,
    Fail,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Initialize => write!(f, "initialize"),
            Operation::Stage => write!(f, "stage"),
            Operation::Commit => write!(f, "commit"),
            Operation::Fail => write!(f, "fail"),
        }
    }
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Committed | JobState::Failed)
    }

    /// Computes the state `operation` leads to without applying it.
    ///
    /// - `Initialize`: UNINITIALIZED → INITIALIZED.
    /// - `Stage`: INITIALIZED → INITIALIZED.
    /// - `Commit`: INITIALIZED → COMMITTED.
    /// - `Fail`: UNINITIALIZED or INITIALIZED → FAILED.
    ///
    /// Everything else, including any operation on a terminal state, is an
    /// `InvalidStateTransition`.
    pub fn apply(self, operation: Operation) -> Result<JobState, JobError> {
        match (self, operation) {
            (JobState::Uninitialized, Operation::Initialize) => Ok(JobState::Initialized),
            (JobState::Initialized, Operation::Stage) => Ok(JobState::Initialized),
            (JobState::Initialized, Operation::Commit) => Ok(JobState::Committed),
            (JobState::Uninitialized | JobState::Initialized, Operation::Fail) => {
                Ok(JobState::Failed)
            }
            (from, operation) => Err(JobError::InvalidStateTransition { from, operation }),
        }
    }
}
