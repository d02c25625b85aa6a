//! Job lifecycle and bookmark-commit manager for incremental ETL jobs.
//!
//! A run resolves its arguments, initializes an execution context through a
//! [`context::ContextFactory`], and commits through a
//! [`bookmark::BookmarkStore`] only after its work succeeded. See
//! [`lifecycle::LifecycleManager`] for the state machine.

pub mod args;
pub mod bookmark;
pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod runner;
pub mod ui;
