use tracing::{error, info};

use crate::args::{ArgumentResolver, BOOKMARK_OPTION, JOB_RUN_ID, JobIdentity, detect_mode};
use crate::bookmark::BookmarkStore;
use crate::config::EtlConfig;
use crate::context::ContextFactory;
use crate::error::JobError;
use crate::lifecycle::{CommitOutcome, JobState, LifecycleManager, RunRecord, StagedCursors};

/// Result of driving one job run from raw arguments to a terminal outcome.
#[derive(Debug)]
pub struct JobRun {
    /// `None` when the run aborted before a lifecycle existed (bad arguments).
    pub record: Option<RunRecord>,
    pub outcome: Result<CommitOutcome, JobError>,
}

impl JobRun {
    fn aborted(err: JobError) -> Self {
        error!(kind = err.kind(), error = %err, "job aborted before initialization");
        Self {
            record: None,
            outcome: Err(err),
        }
    }

    pub fn final_state(&self) -> Option<JobState> {
        self.record.as_ref().map(|r| r.state)
    }

    /// 0 only when the run reached COMMITTED.
    pub fn exit_code(&self) -> u8 {
        match (&self.outcome, self.final_state()) {
            (Ok(_), Some(JobState::Committed)) => 0,
            _ => 1,
        }
    }
}

/// Resolves `raw_args`, then initializes, runs `work` and commits.
///
/// Argument errors abort before any lifecycle exists. Commit is only reached
/// when `work` returns `Ok`.
pub fn run_job<S, F, W>(
    raw_args: &[String],
    config: &EtlConfig,
    store: S,
    factory: &F,
    work: W,
) -> JobRun
where
    S: BookmarkStore,
    F: ContextFactory,
    W: FnOnce(&mut F::Context, &mut StagedCursors) -> anyhow::Result<()>,
{
    let resolver = ArgumentResolver::new(config.required_keys.as_slice())
        .with_optional(&[JOB_RUN_ID, BOOKMARK_OPTION]);
    let arguments = match resolver.resolve(raw_args) {
        Ok(arguments) => arguments,
        Err(e) => return JobRun::aborted(e),
    };

    let mode = detect_mode(raw_args, &config.local_flag);
    info!(is_local = mode.is_local(), "isLocal: {}", mode.is_local());

    let identity = match JobIdentity::new(&arguments, mode) {
        Ok(identity) => identity,
        Err(e) => return JobRun::aborted(e),
    };
    let mut manager = match LifecycleManager::new(identity, arguments, store) {
        Ok(manager) => manager,
        Err(e) => return JobRun::aborted(e),
    };

    let outcome = manager.run(factory, work);
    if let Err(e) = &outcome {
        error!(
            job = manager.identity().name(),
            state = %manager.state(),
            kind = e.kind(),
            error = %e,
            "job run did not commit"
        );
    }

    JobRun {
        record: Some(manager.record()),
        outcome,
    }
}
