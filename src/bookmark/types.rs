use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How far a job has durably consumed each of its sources.
///
/// Cursors are opaque to this crate: the engine decides what a cursor means
/// for a given source (an offset, a max timestamp, a partition key).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub job_name: String,
    /// Number of runs that have committed this bookmark.
    pub run: u64,
    pub last_run_id: Option<String>,
    pub cursors: BTreeMap<String, String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Bookmark {
    /// The bookmark of a job that has never committed.
    pub fn empty(job_name: &str) -> Self {
        Self {
            job_name: job_name.to_string(),
            run: 0,
            last_run_id: None,
            cursors: BTreeMap::new(),
            updated_at: None,
        }
    }

    pub fn cursor(&self, source: &str) -> Option<&str> {
        self.cursors.get(source).map(String::as_str)
    }

    /// Returns the bookmark that a successful commit of `run_id` would store.
    ///
    /// Staged cursors replace the stored ones per source; sources the run
    /// did not touch keep their previous cursor.
    pub fn advance(&self, run_id: &str, staged: &BTreeMap<String, String>) -> Self {
        let mut cursors = self.cursors.clone();
        cursors.extend(staged.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self {
            job_name: self.job_name.clone(),
            run: self.run + 1,
            last_run_id: Some(run_id.to_string()),
            cursors,
            updated_at: Some(Utc::now()),
        }
    }
}

/// Bookmark behaviour selected with `--job-bookmark-option`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookmarkOption {
    /// Read the stored bookmark at init and advance it at commit.
    #[default]
    #[serde(rename = "job-bookmark-enable")]
    Enable,
    /// Read the stored bookmark but leave it where it is.
    #[serde(rename = "job-bookmark-pause")]
    Pause,
    /// Ignore the stored bookmark entirely.
    #[serde(rename = "job-bookmark-disable")]
    Disable,
}

impl BookmarkOption {
    pub fn reads(self) -> bool {
        !matches!(self, BookmarkOption::Disable)
    }

    pub fn persists(self) -> bool {
        matches!(self, BookmarkOption::Enable)
    }
}

impl fmt::Display for BookmarkOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookmarkOption::Enable => write!(f, "job-bookmark-enable"),
            BookmarkOption::Pause => write!(f, "job-bookmark-pause"),
            BookmarkOption::Disable => write!(f, "job-bookmark-disable"),
        }
    }
}

impl FromStr for BookmarkOption {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "job-bookmark-enable" => Ok(BookmarkOption::Enable),
            "job-bookmark-pause" => Ok(BookmarkOption::Pause),
            "job-bookmark-disable" => Ok(BookmarkOption::Disable),
            other => Err(format!("unknown bookmark option: {other}")),
        }
    }
}
