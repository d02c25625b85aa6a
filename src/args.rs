//! Resolution of the raw `--KEY value` token list a job is launched with.
//!
//! Only requested keys are resolved; anything else on the command line
//! (platform-reserved arguments, presence flags such as `--LOCAL`) is left
//! alone, the same way the managed platform treats unknown options.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::bookmark::BookmarkOption;
use crate::error::JobError;

pub const JOB_NAME: &str = "JOB_NAME";
pub const JOB_RUN_ID: &str = "JOB_RUN_ID";
pub const BOOKMARK_OPTION: &str = "job-bookmark-option";
pub const LOCAL_FLAG: &str = "--LOCAL";

/// Resolved job parameters. There is no mutating API once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobArguments {
    values: BTreeMap<String, String>,
}

impl JobArguments {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn job_name(&self) -> Option<&str> {
        self.get(JOB_NAME)
    }

    /// Run id handed over by the platform, if any.
    pub fn run_id(&self) -> Option<&str> {
        self.get(JOB_RUN_ID)
    }

    /// Bookmark behaviour requested through `--job-bookmark-option`.
    pub fn bookmark_option(&self) -> Result<BookmarkOption, JobError> {
        match self.get(BOOKMARK_OPTION) {
            None => Ok(BookmarkOption::default()),
            Some(raw) => raw.parse().map_err(|_| JobError::InvalidArgument {
                key: BOOKMARK_OPTION.to_string(),
                value: raw.to_string(),
            }),
        }
    }
}

/// Resolves a set of required and optional keys from raw tokens.
#[derive(Debug, Clone)]
pub struct ArgumentResolver {
    required: Vec<String>,
    optional: Vec<String>,
}

impl ArgumentResolver {
    pub fn new<S: AsRef<str>>(required: &[S]) -> Self {
        Self {
            required: required.iter().map(|k| k.as_ref().to_string()).collect(),
            optional: Vec::new(),
        }
    }

    pub fn with_optional<S: AsRef<str>>(mut self, optional: &[S]) -> Self {
        self.optional = optional.iter().map(|k| k.as_ref().to_string()).collect();
        self
    }

    fn is_requested(&self, key: &str) -> bool {
        self.required.iter().chain(&self.optional).any(|k| k == key)
    }

    pub fn resolve<S: AsRef<str>>(&self, raw_args: &[S]) -> Result<JobArguments, JobError> {
        let mut values = BTreeMap::new();
        let mut tokens = raw_args.iter().map(|token| token.as_ref()).peekable();

        while let Some(token) = tokens.next() {
            let Some(option) = token.strip_prefix("--") else {
                continue;
            };

            let (key, inline) = match option.split_once('=') {
                Some((key, value)) => (key, Some(value)),
                None => (option, None),
            };
            if !self.is_requested(key) {
                continue;
            }

            let value = match inline {
                Some(value) => value.to_string(),
                None => match tokens.next_if(|next| !next.starts_with("--")) {
                    Some(next) => next.to_string(),
                    None => return Err(JobError::MalformedArgument(key.to_string())),
                },
            };
            if value.is_empty() {
                return Err(JobError::MalformedArgument(key.to_string()));
            }

            values.insert(key.to_string(), value);
        }

        if let Some(missing) = self.required.iter().find(|k| !values.contains_key(*k)) {
            return Err(JobError::MissingArgument(missing.clone()));
        }

        Ok(JobArguments { values })
    }
}

/// Resolves `required_keys` from `raw_args`, ignoring every other token.
pub fn resolve_arguments<S: AsRef<str>, K: AsRef<str>>(
    raw_args: &[S],
    required_keys: &[K],
) -> Result<JobArguments, JobError> {
    ArgumentResolver::new(required_keys).resolve(raw_args)
}

/// Where the job's engine collaborators should be built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobMode {
    Local,
    Managed,
}

impl JobMode {
    pub fn is_local(self) -> bool {
        self == JobMode::Local
    }
}

impl fmt::Display for JobMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobMode::Local => write!(f, "local"),
            JobMode::Managed => write!(f, "managed"),
        }
    }
}

/// `Local` when the exact `flag` token appears among `raw_args`.
pub fn detect_mode<S: AsRef<str>>(raw_args: &[S], flag: &str) -> JobMode {
    if raw_args.iter().any(|token| token.as_ref() == flag) {
        JobMode::Local
    } else {
        JobMode::Managed
    }
}

/// Who this run is. Built once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobIdentity {
    name: String,
    mode: JobMode,
}

impl JobIdentity {
    pub fn new(arguments: &JobArguments, mode: JobMode) -> Result<Self, JobError> {
        let name = arguments
            .job_name()
            .ok_or_else(|| JobError::MissingArgument(JOB_NAME.to_string()))?;
        Ok(Self {
            name: name.to_string(),
            mode,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> JobMode {
        self.mode
    }
}
