//! The execution-context seam.
//!
//! The distributed engine is an external collaborator: this crate only asks
//! a [`ContextFactory`] for a usable context or an explicit failure.

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::args::{JobArguments, JobIdentity, JobMode};
use crate::bookmark::Bookmark;

pub const LOCAL_MASTER: &str = "local[*]";

/// Everything a factory may look at when building a context.
#[derive(Debug)]
pub struct InitRequest<'a> {
    pub identity: &'a JobIdentity,
    pub arguments: &'a JobArguments,
    pub run_id: &'a str,
    /// Bookmark as it stood when the run started.
    pub bookmark: &'a Bookmark,
}

/// Builds the engine handle a job works with.
pub trait ContextFactory {
    type Context;

    fn create(&self, request: &InitRequest<'_>) -> Result<Self::Context>;
}

/// Descriptor of an engine session for one job run.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionContext {
    pub app_name: String,
    pub master: String,
    pub mode: JobMode,
    pub run_id: String,
    pub bookmark: Bookmark,
    pub created_at: DateTime<Utc>,
}

impl ExecutionContext {
    pub fn is_local(&self) -> bool {
        self.mode.is_local()
    }

    /// Where the previous successful run left `source`.
    pub fn cursor(&self, source: &str) -> Option<&str> {
        self.bookmark.cursor(source)
    }
}

/// Picks the engine master from the job mode.
#[derive(Debug, Clone)]
pub struct EngineContextFactory {
    managed_master: String,
}

impl EngineContextFactory {
    pub fn new(managed_master: impl Into<String>) -> Self {
        Self {
            managed_master: managed_master.into(),
        }
    }
}

impl ContextFactory for EngineContextFactory {
    type Context = ExecutionContext;

    fn create(&self, request: &InitRequest<'_>) -> Result<ExecutionContext> {
        let mode = request.identity.mode();
        let master = match mode {
            JobMode::Local => LOCAL_MASTER.to_string(),
            JobMode::Managed => {
                let master = self.managed_master.trim();
                if master.is_empty() {
                    bail!("no engine master configured for managed mode");
                }
                master.to_string()
            }
        };

        Ok(ExecutionContext {
            app_name: request.identity.name().to_string(),
            master,
            mode,
            run_id: request.run_id.to_string(),
            bookmark: request.bookmark.clone(),
            created_at: Utc::now(),
        })
    }
}
