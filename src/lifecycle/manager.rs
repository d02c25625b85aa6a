use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::state::{JobState, Operation};
use crate::args::{JobArguments, JobIdentity, JobMode};
use crate::bookmark::{Bookmark, BookmarkOption, BookmarkStore};
use crate::context::{ContextFactory, InitRequest};
use crate::error::JobError;

/// Source cursors a run has reached but not yet committed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagedCursors(BTreeMap<String, String>);

impl StagedCursors {
    /// Records how far `source` has been consumed. A later call for the
    /// same source replaces the earlier cursor.
    pub fn stage(&mut self, source: impl Into<String>, cursor: impl Into<String>) {
        self.0.insert(source.into(), cursor.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// What a successful commit did with the bookmark.
#[derive(Debug, Clone, PartialEq)]
pub enum CommitOutcome {
    /// The advanced bookmark is now the stored one.
    Persisted(Bookmark),
    /// The bookmark option asked for the stored bookmark to stay put.
    Skipped(BookmarkOption),
}

/// Owns one job run: its identity, its arguments and its state.
///
/// The bookmark is read once, during `initialize`, and written at most once,
/// during `commit`. Nothing the run stages reaches the store before that.
pub struct LifecycleManager<S> {
    identity: JobIdentity,
    arguments: JobArguments,
    option: BookmarkOption,
    run_id: String,
    store: S,
    state: JobState,
    state_history: Vec<JobState>,
    baseline: Option<Bookmark>,
    staged: StagedCursors,
    committed: Option<Bookmark>,
    failure: Option<String>,
    started_at: DateTime<Utc>,
}

impl<S: BookmarkStore> LifecycleManager<S> {
    /// Fails with `InvalidArgument` when `--job-bookmark-option` carries an
    /// unknown value.
    pub fn new(identity: JobIdentity, arguments: JobArguments, store: S) -> Result<Self, JobError> {
        let option = arguments.bookmark_option()?;
        let run_id = arguments
            .run_id()
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        Ok(Self {
            identity,
            arguments,
            option,
            run_id,
            store,
            state: JobState::Uninitialized,
            state_history: Vec::new(),
            baseline: None,
            staged: StagedCursors::default(),
            committed: None,
            failure: None,
            started_at: Utc::now(),
        })
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn identity(&self) -> &JobIdentity {
        &self.identity
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Bookmark read at initialization.
    pub fn baseline(&self) -> Option<&Bookmark> {
        self.baseline.as_ref()
    }

    pub fn staged(&self) -> &StagedCursors {
        &self.staged
    }

    fn transition(&mut self, operation: Operation) -> Result<(), JobError> {
        let next = self.state.apply(operation)?;
        debug!(from = %self.state, to = %next, %operation, "state transition");
        self.state_history.push(self.state);
        self.state = next;
        Ok(())
    }

    /// UNINITIALIZED → INITIALIZED.
    ///
    /// Reads the stored bookmark (unless bookmarks are disabled) and asks
    /// `factory` for a context. If either step fails the run stays
    /// UNINITIALIZED with no baseline recorded.
    pub fn initialize<F: ContextFactory>(&mut self, factory: &F) -> Result<F::Context, JobError> {
        self.state.apply(Operation::Initialize)?;
        let job_name = self.identity.name();

        let baseline = if self.option.reads() {
            self.store
                .load(job_name)
                .map_err(|e| {
                    warn!(job = job_name, error = %e, "could not read bookmark");
                    JobError::InitializationError(format!("reading bookmark: {e}"))
                })?
                .unwrap_or_else(|| Bookmark::empty(job_name))
        } else {
            Bookmark::empty(job_name)
        };

        let request = InitRequest {
            identity: &self.identity,
            arguments: &self.arguments,
            run_id: &self.run_id,
            bookmark: &baseline,
        };
        let context = factory.create(&request).map_err(|e| {
            warn!(job = job_name, error = %e, "execution context factory failed");
            JobError::InitializationError(format!("{e:#}"))
        })?;

        info!(
            job = job_name,
            run_id = %self.run_id,
            mode = %self.identity.mode(),
            bookmark_run = baseline.run,
            option = %self.option,
            "job initialized"
        );
        self.baseline = Some(baseline);
        self.transition(Operation::Initialize)?;
        Ok(context)
    }

    /// Stages a cursor for the pending commit. Only valid while INITIALIZED.
    pub fn stage(&mut self, source: &str, cursor: &str) -> Result<(), JobError> {
        self.state.apply(Operation::Stage)?;
        self.staged.stage(source, cursor);
        Ok(())
    }

    /// INITIALIZED → COMMITTED.
    ///
    /// Must be the last action of a run whose work fully succeeded. When the
    /// bookmark option persists, the advanced bookmark is handed to the store
    /// exactly once; if the store fails the run becomes FAILED and the stored
    /// bookmark keeps its pre-run value. Any call outside INITIALIZED,
    /// including a second commit, is rejected without touching the store.
    pub fn commit(&mut self) -> Result<CommitOutcome, JobError> {
        self.state.apply(Operation::Commit)?;

        if !self.option.persists() {
            info!(
                job = self.identity.name(),
                option = %self.option,
                staged = self.staged.len(),
                "bookmark left unchanged"
            );
            self.transition(Operation::Commit)?;
            return Ok(CommitOutcome::Skipped(self.option));
        }

        let next = match &self.baseline {
            Some(baseline) => baseline.advance(&self.run_id, &self.staged.0),
            None => Bookmark::empty(self.identity.name()).advance(&self.run_id, &self.staged.0),
        };

        if let Err(e) = self.store.persist(&next) {
            error!(job = self.identity.name(), error = %e, "bookmark commit failed");
            self.failure = Some(e.to_string());
            self.staged = StagedCursors::default();
            self.transition(Operation::Fail)?;
            return Err(JobError::CommitPersistenceError(e));
        }

        info!(
            job = self.identity.name(),
            run_id = %self.run_id,
            bookmark_run = next.run,
            sources = next.cursors.len(),
            "job committed"
        );
        self.committed = Some(next.clone());
        self.transition(Operation::Commit)?;
        Ok(CommitOutcome::Persisted(next))
    }

    /// Marks the run FAILED and drops whatever was staged.
    pub fn fail(&mut self, reason: &str) -> Result<(), JobError> {
        self.transition(Operation::Fail)?;
        warn!(job = self.identity.name(), reason, "job failed");
        self.failure = Some(reason.to_string());
        self.staged = StagedCursors::default();
        Ok(())
    }

    /// Initializes, runs `work`, and commits only if `work` succeeded.
    ///
    /// A failing `work` moves the run to FAILED and the bookmark is left
    /// where it was, so the next run reprocesses the same window.
    pub fn run<F, W>(&mut self, factory: &F, work: W) -> Result<CommitOutcome, JobError>
    where
        F: ContextFactory,
        W: FnOnce(&mut F::Context, &mut StagedCursors) -> anyhow::Result<()>,
    {
        let mut context = self.initialize(factory)?;

        let mut staged = std::mem::take(&mut self.staged);
        let result = work(&mut context, &mut staged);
        self.staged = staged;

        match result {
            Ok(()) => self.commit(),
            Err(e) => {
                let reason = format!("{e:#}");
                self.fail(&reason)?;
                Err(JobError::ProcessingFailed(reason))
            }
        }
    }

    /// Summary of the run so far.
    pub fn record(&self) -> RunRecord {
        let now = Utc::now();
        let mut transitions = self.state_history.clone();
        transitions.push(self.state);

        RunRecord {
            job_name: self.identity.name().to_string(),
            run_id: self.run_id.clone(),
            mode: self.identity.mode(),
            bookmark_option: self.option,
            state: self.state,
            state_transitions: transitions,
            bookmark_run: self.committed.as_ref().map(|b| b.run),
            cursors: self
                .committed
                .as_ref()
                .map(|b| b.cursors.clone())
                .unwrap_or_default(),
            failure: self.failure.clone(),
            started_at: self.started_at,
            finished_at: now,
            duration_ms: (now - self.started_at).num_milliseconds(),
        }
    }
}

/// Structured record produced at the end of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub job_name: String,
    pub run_id: String,
    pub mode: JobMode,
    pub bookmark_option: BookmarkOption,
    pub state: JobState,
    pub state_transitions: Vec<JobState>,
    /// Run number of the bookmark this run committed, if it committed one.
    pub bookmark_run: Option<u64>,
    pub cursors: BTreeMap<String, String>,
    pub failure: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::{ArgumentResolver, BOOKMARK_OPTION, JOB_NAME, JOB_RUN_ID};
    use crate::bookmark::{MemoryBookmarkStore, StoreError};
    use anyhow::bail;

    // --- Mock collaborators ---

    /// Memory store whose calls can be made to fail.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryBookmarkStore,
        fail_load: bool,
        fail_persist: bool,
    }

    impl BookmarkStore for FlakyStore {
        fn load(&self, job_name: &str) -> Result<Option<Bookmark>, StoreError> {
            if self.fail_load {
                return Err(StoreError::Unavailable("load refused".into()));
            }
            self.inner.load(job_name)
        }

        fn persist(&self, bookmark: &Bookmark) -> Result<(), StoreError> {
            if self.fail_persist {
                return Err(StoreError::Unavailable("persist refused".into()));
            }
            self.inner.persist(bookmark)
        }

        fn reset(&self, job_name: &str) -> Result<bool, StoreError> {
            self.inner.reset(job_name)
        }
    }

    struct StubFactory {
        fail: bool,
    }

    impl ContextFactory for StubFactory {
        type Context = String;

        fn create(&self, request: &InitRequest<'_>) -> anyhow::Result<String> {
            if self.fail {
                bail!("engine unreachable");
            }
            Ok(format!("ctx:{}", request.identity.name()))
        }
    }

    const OK: StubFactory = StubFactory { fail: false };
    const BROKEN: StubFactory = StubFactory { fail: true };

    fn manager_with<S: BookmarkStore>(store: S, extra: &[&str]) -> LifecycleManager<S> {
        let mut raw = vec!["--JOB_NAME", "daily_etl", "--JOB_RUN_ID", "run-2"];
        raw.extend_from_slice(extra);
        let arguments = ArgumentResolver::new(&[JOB_NAME])
            .with_optional(&[JOB_RUN_ID, BOOKMARK_OPTION])
            .resolve(raw.as_slice())
            .unwrap();
        let identity = JobIdentity::new(&arguments, JobMode::Managed).unwrap();
        LifecycleManager::new(identity, arguments, store).unwrap()
    }

    fn seeded_store() -> FlakyStore {
        let store = FlakyStore::default();
        let mut staged = BTreeMap::new();
        staged.insert("orders".to_string(), "100".to_string());
        store
            .inner
            .persist(&Bookmark::empty("daily_etl").advance("run-1", &staged))
            .unwrap();
        store
    }

    fn stored(store: &FlakyStore) -> Option<Bookmark> {
        store.inner.load("daily_etl").unwrap()
    }

    // --- Lifecycle ---

    #[test]
    fn happy_path_commits_advanced_bookmark() {
        let store = seeded_store();
        let mut manager = manager_with(&store, &[]);
        assert_eq!(manager.state(), JobState::Uninitialized);

        let ctx = manager.initialize(&OK).unwrap();
        assert_eq!(ctx.as_str(), "ctx:daily_etl");
        assert_eq!(manager.state(), JobState::Initialized);
        assert_eq!(manager.baseline().unwrap().cursor("orders"), Some("100"));

        manager.stage("orders", "150").unwrap();
        manager.stage("customers", "9").unwrap();

        let outcome = manager.commit().unwrap();
        assert_eq!(manager.state(), JobState::Committed);

        let CommitOutcome::Persisted(committed) = outcome else {
            panic!("expected Persisted outcome");
        };
        assert_eq!(committed.run, 2);
        assert_eq!(committed.last_run_id.as_deref(), Some("run-2"));
        assert_eq!(stored(&store), Some(committed));
    }

    #[test]
    fn commit_before_initialize_is_rejected() {
        let store = seeded_store();
        let before = stored(&store);
        let mut manager = manager_with(&store, &[]);

        let err = manager.commit().unwrap_err();
        assert!(matches!(
            err,
            JobError::InvalidStateTransition {
                from: JobState::Uninitialized,
                operation: Operation::Commit
            }
        ));
        assert_eq!(manager.state(), JobState::Uninitialized);
        assert_eq!(stored(&store), before);
    }

    #[test]
    fn second_commit_is_rejected() {
        let store = seeded_store();
        let mut manager = manager_with(&store, &[]);
        manager.initialize(&OK).unwrap();
        manager.stage("orders", "150").unwrap();
        manager.commit().unwrap();
        let after_first = stored(&store);

        let err = manager.commit().unwrap_err();
        assert!(matches!(
            err,
            JobError::InvalidStateTransition {
                from: JobState::Committed,
                ..
            }
        ));
        assert_eq!(manager.state(), JobState::Committed);
        assert_eq!(stored(&store), after_first);
        assert_eq!(stored(&store).unwrap().run, 2);
    }

    #[test]
    fn commit_after_failure_is_rejected() {
        let store = seeded_store();
        let before = stored(&store);
        let mut manager = manager_with(&store, &[]);
        manager.initialize(&OK).unwrap();
        manager.stage("orders", "150").unwrap();
        manager.fail("transform blew up").unwrap();

        assert!(manager.staged().is_empty());
        let err = manager.commit().unwrap_err();
        assert_eq!(err.kind(), "InvalidStateTransition");
        assert_eq!(manager.state(), JobState::Failed);
        assert_eq!(stored(&store), before);
    }

    #[test]
    fn factory_failure_leaves_run_uninitialized() {
        let store = seeded_store();
        let before = stored(&store);
        let mut manager = manager_with(&store, &[]);

        let err = manager.initialize(&BROKEN).unwrap_err();
        assert!(matches!(err, JobError::InitializationError(ref msg) if msg.contains("engine unreachable")));
        assert_eq!(manager.state(), JobState::Uninitialized);
        assert!(manager.baseline().is_none());
        assert_eq!(stored(&store), before);

        // Nothing was half-done, so a later attempt can still succeed.
        manager.initialize(&OK).unwrap();
        assert_eq!(manager.state(), JobState::Initialized);
    }

    #[test]
    fn bookmark_read_failure_is_an_initialization_error() {
        let store = FlakyStore {
            fail_load: true,
            ..Default::default()
        };
        let mut manager = manager_with(&store, &[]);

        let err = manager.initialize(&OK).unwrap_err();
        assert_eq!(err.kind(), "InitializationError");
        assert_eq!(manager.state(), JobState::Uninitialized);
    }

    #[test]
    fn persist_failure_fails_run_and_keeps_old_bookmark() {
        let mut store = seeded_store();
        store.fail_persist = true;
        let before = stored(&store);
        let mut manager = manager_with(&store, &[]);
        manager.initialize(&OK).unwrap();
        manager.stage("orders", "999").unwrap();

        let err = manager.commit().unwrap_err();
        assert!(matches!(err, JobError::CommitPersistenceError(_)));
        assert_eq!(manager.state(), JobState::Failed);
        assert_eq!(stored(&store), before);

        // Retrying the commit is not allowed once the run has failed.
        assert!(manager.commit().is_err());
        assert_eq!(stored(&store), before);
    }

    #[test]
    fn stage_requires_initialized_run() {
        let mut manager = manager_with(MemoryBookmarkStore::new(), &[]);
        assert!(manager.stage("orders", "1").is_err());
        assert!(manager.staged().is_empty());
    }

    #[test]
    fn first_run_starts_from_empty_bookmark() {
        let store = MemoryBookmarkStore::new();
        let mut manager = manager_with(&store, &[]);
        manager.initialize(&OK).unwrap();
        assert_eq!(manager.baseline().unwrap().run, 0);

        manager.commit().unwrap();
        let committed = store.load("daily_etl").unwrap().unwrap();
        assert_eq!(committed.run, 1);
        assert!(committed.cursors.is_empty());
    }

    // --- Bookmark options ---

    #[test]
    fn pause_reads_but_does_not_persist() {
        let store = seeded_store();
        let before = stored(&store);
        let mut manager = manager_with(&store, &["--job-bookmark-option", "job-bookmark-pause"]);
        manager.initialize(&OK).unwrap();
        assert_eq!(manager.baseline().unwrap().cursor("orders"), Some("100"));
        manager.stage("orders", "150").unwrap();

        let outcome = manager.commit().unwrap();
        assert_eq!(outcome, CommitOutcome::Skipped(BookmarkOption::Pause));
        assert_eq!(manager.state(), JobState::Committed);
        assert_eq!(stored(&store), before);
    }

    #[test]
    fn disable_ignores_stored_bookmark() {
        let store = seeded_store();
        let before = stored(&store);
        let mut manager =
            manager_with(&store, &["--job-bookmark-option", "job-bookmark-disable"]);
        manager.initialize(&OK).unwrap();
        assert_eq!(manager.baseline().unwrap().cursor("orders"), None);

        manager.commit().unwrap();
        assert_eq!(stored(&store), before);
    }

    #[test]
    fn disable_skips_bookmark_read_entirely() {
        let store = FlakyStore {
            fail_load: true,
            ..Default::default()
        };
        let mut manager =
            manager_with(&store, &["--job-bookmark-option", "job-bookmark-disable"]);
        assert!(manager.initialize(&OK).is_ok());
    }

    #[test]
    fn unknown_bookmark_option_is_rejected() {
        let arguments = ArgumentResolver::new(&[JOB_NAME])
            .with_optional(&[BOOKMARK_OPTION])
            .resolve(&["--JOB_NAME", "a", "--job-bookmark-option", "nope"])
            .unwrap();
        let identity = JobIdentity::new(&arguments, JobMode::Local).unwrap();
        let result = LifecycleManager::new(identity, arguments, MemoryBookmarkStore::new());
        assert!(matches!(
            result,
            Err(JobError::InvalidArgument { ref value, .. }) if value == "nope"
        ));
    }

    // --- run() ---

    #[test]
    fn run_commits_after_successful_work() {
        let store = seeded_store();
        let mut manager = manager_with(&store, &[]);

        let outcome = manager
            .run(&OK, |ctx, staged| {
                assert_eq!(ctx.as_str(), "ctx:daily_etl");
                staged.stage("orders", "200");
                Ok(())
            })
            .unwrap();

        assert!(matches!(outcome, CommitOutcome::Persisted(_)));
        assert_eq!(manager.state(), JobState::Committed);
        assert_eq!(stored(&store).unwrap().cursor("orders"), Some("200"));
    }

    #[test]
    fn run_never_commits_after_failed_work() {
        let store = seeded_store();
        let before = stored(&store);
        let mut manager = manager_with(&store, &[]);

        let err = manager
            .run(&OK, |_, staged| {
                staged.stage("orders", "200");
                bail!("write to sink failed")
            })
            .unwrap_err();

        assert!(matches!(err, JobError::ProcessingFailed(ref msg) if msg.contains("sink")));
        assert_eq!(manager.state(), JobState::Failed);
        assert_eq!(stored(&store), before);
    }

    #[test]
    fn run_with_broken_factory_stays_uninitialized() {
        let store = seeded_store();
        let before = stored(&store);
        let mut manager = manager_with(&store, &[]);

        let mut called = false;
        let err = manager
            .run(&BROKEN, |_, _| {
                called = true;
                Ok(())
            })
            .unwrap_err();

        assert_eq!(err.kind(), "InitializationError");
        assert!(!called);
        assert_eq!(manager.state(), JobState::Uninitialized);
        assert_eq!(stored(&store), before);
    }

    // --- RunRecord ---

    #[test]
    fn record_of_committed_run() {
        let store = seeded_store();
        let mut manager = manager_with(&store, &[]);
        manager
            .run(&OK, |_, staged| {
                staged.stage("orders", "300");
                Ok(())
            })
            .unwrap();

        let record = manager.record();
        assert_eq!(record.job_name, "daily_etl");
        assert_eq!(record.run_id, "run-2");
        assert_eq!(record.mode, JobMode::Managed);
        assert_eq!(record.state, JobState::Committed);
        assert_eq!(
            record.state_transitions,
            vec![JobState::Uninitialized, JobState::Initialized, JobState::Committed]
        );
        assert_eq!(record.bookmark_run, Some(2));
        assert_eq!(record.cursors.get("orders").map(String::as_str), Some("300"));
        assert!(record.failure.is_none());
        assert!(record.duration_ms >= 0);
    }

    #[test]
    fn record_of_failed_run() {
        let mut manager = manager_with(MemoryBookmarkStore::new(), &[]);
        manager.initialize(&OK).unwrap();
        manager.fail("upstream step failed").unwrap();

        let record = manager.record();
        assert_eq!(record.state, JobState::Failed);
        assert_eq!(record.bookmark_run, None);
        assert!(record.cursors.is_empty());
        assert_eq!(record.failure.as_deref(), Some("upstream step failed"));
    }

    #[test]
    fn run_id_is_generated_when_not_supplied() {
        let arguments = ArgumentResolver::new(&[JOB_NAME])
            .resolve(&["--JOB_NAME", "daily_etl"])
            .unwrap();
        let identity = JobIdentity::new(&arguments, JobMode::Local).unwrap();
        let manager = LifecycleManager::new(identity, arguments, MemoryBookmarkStore::new()).unwrap();
        assert!(Uuid::parse_str(manager.run_id()).is_ok());
    }

    #[test]
    fn record_serializes_to_json() {
        let manager = manager_with(MemoryBookmarkStore::new(), &[]);
        let json = serde_json::to_value(manager.record()).unwrap();
        assert_eq!(json["state"], "Uninitialized");
        assert_eq!(json["mode"], "managed");
        assert_eq!(json["bookmark_option"], "job-bookmark-enable");
    }
}
