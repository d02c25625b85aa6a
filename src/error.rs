use thiserror::Error;

use crate::bookmark::StoreError;
use crate::lifecycle::{JobState, Operation};

#[derive(Debug, Error)]
pub enum JobError {
    #[error("required argument --{0} is missing")]
    MissingArgument(String),

    #[error("argument --{0} has no value")]
    MalformedArgument(String),

    /// The key has a value, but not one it accepts. Reported under the
    /// `MalformedArgument` kind.
    #[error("argument --{key} has invalid value {value:?}")]
    InvalidArgument { key: String, value: String },

    #[error("initialization failed: {0}")]
    InitializationError(String),

    #[error("cannot {operation} a job in state {from}")]
    InvalidStateTransition { from: JobState, operation: Operation },

    #[error("bookmark could not be persisted: {0}")]
    CommitPersistenceError(#[source] StoreError),

    #[error("processing failed: {0}")]
    ProcessingFailed(String),
}

impl JobError {
    /// Stable name of the error kind, reported at the process boundary.
    pub fn kind(&self) -> &'static str {
        match self {
            JobError::MissingArgument(_) => "MissingArgument",
            JobError::MalformedArgument(_) | JobError::InvalidArgument { .. } => {
                "MalformedArgument"
            }
            JobError::InitializationError(_) => "InitializationError",
            JobError::InvalidStateTransition { .. } => "InvalidStateTransition",
            JobError::CommitPersistenceError(_) => "CommitPersistenceError",
            JobError::ProcessingFailed(_) => "ProcessingFailed",
        }
    }
}
