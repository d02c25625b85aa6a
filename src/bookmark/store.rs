use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, warn};

use super::error::StoreError;
use super::types::Bookmark;

/// Durable home of job bookmarks.
///
/// Calls are synchronous and single-shot; implementations must not retry
/// internally. `persist` must be all-or-nothing: after a failed call the
/// previously stored bookmark is still the one `load` returns.
pub trait BookmarkStore {
    fn load(&self, job_name: &str) -> Result<Option<Bookmark>, StoreError>;

    fn persist(&self, bookmark: &Bookmark) -> Result<(), StoreError>;

    /// Forgets the job's bookmark. Returns whether one existed.
    fn reset(&self, job_name: &str) -> Result<bool, StoreError>;
}

impl<T: BookmarkStore + ?Sized> BookmarkStore for &T {
    fn load(&self, job_name: &str) -> Result<Option<Bookmark>, StoreError> {
        (**self).load(job_name)
    }

    fn persist(&self, bookmark: &Bookmark) -> Result<(), StoreError> {
        (**self).persist(bookmark)
    }

    fn reset(&self, job_name: &str) -> Result<bool, StoreError> {
        (**self).reset(job_name)
    }
}

/// Stores one pretty-printed JSON file per job under a directory.
pub struct FileBookmarkStore {
    dir: PathBuf,
}

impl FileBookmarkStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the job's bookmark file.
    ///
    /// Bytes outside `[A-Za-z0-9._-]` are percent-encoded, so distinct job
    /// names always get distinct files and no name can leave `dir`.
    pub fn path_for(&self, job_name: &str) -> PathBuf {
        let mut file_name = String::with_capacity(job_name.len() + 5);
        for byte in job_name.bytes() {
            if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.') {
                file_name.push(char::from(byte));
            } else {
                let _ = write!(file_name, "%{byte:02X}");
            }
        }
        file_name.push_str(".json");
        self.dir.join(file_name)
    }
}

/// Writes `contents` to `temp`, flushes it to disk and renames it over
/// `target`.
fn write_and_rename(temp: &Path, target: &Path, contents: &[u8]) -> io::Result<()> {
    let mut file = File::create(temp)?;
    file.write_all(contents)?;
    file.sync_all()?;
    drop(file);
    fs::rename(temp, target)
}

/// Makes a completed rename inside `dir` survive a crash.
#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

impl BookmarkStore for FileBookmarkStore {
    fn load(&self, job_name: &str) -> Result<Option<Bookmark>, StoreError> {
        let path = self.path_for(job_name);
        if !path.exists() {
            debug!(path = %path.display(), "no stored bookmark");
            return Ok(None);
        }
        let contents = fs::read_to_string(&path)?;
        let bookmark: Bookmark = serde_json::from_str(&contents)?;
        if bookmark.job_name != job_name {
            return Err(StoreError::JobMismatch {
                expected: job_name.to_string(),
                found: bookmark.job_name,
            });
        }
        Ok(Some(bookmark))
    }

    fn persist(&self, bookmark: &Bookmark) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(&bookmark.job_name);
        let json = serde_json::to_string_pretty(bookmark)?;

        // Write to temp file first, then rename atomically
        let temp_file = path.with_extension("json.tmp");
        if let Err(e) = write_and_rename(&temp_file, &path, json.as_bytes()) {
            let _ = fs::remove_file(&temp_file);
            return Err(e.into());
        }
        // The new bookmark is already in place; a failed directory sync must
        // not report the commit as lost.
        if let Err(e) = sync_dir(&self.dir) {
            warn!(dir = %self.dir.display(), error = %e, "could not sync bookmark directory");
        }

        debug!(path = %path.display(), run = bookmark.run, "bookmark persisted");
        Ok(())
    }

    fn reset(&self, job_name: &str) -> Result<bool, StoreError> {
        let path = self.path_for(job_name);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path)?;
        Ok(true)
    }
}

/// Keeps bookmarks in process memory.
#[derive(Default)]
pub struct MemoryBookmarkStore {
    bookmarks: Mutex<HashMap<String, Bookmark>>,
}

impl MemoryBookmarkStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Bookmark>>, StoreError> {
        self.bookmarks
            .lock()
            .map_err(|_| StoreError::Unavailable("bookmark map lock poisoned".into()))
    }
}

impl BookmarkStore for MemoryBookmarkStore {
    fn load(&self, job_name: &str) -> Result<Option<Bookmark>, StoreError> {
        Ok(self.lock()?.get(job_name).cloned())
    }

    fn persist(&self, bookmark: &Bookmark) -> Result<(), StoreError> {
        self.lock()?
            .insert(bookmark.job_name.clone(), bookmark.clone());
        Ok(())
    }

    fn reset(&self, job_name: &str) -> Result<bool, StoreError> {
        Ok(self.lock()?.remove(job_name).is_some())
    }
}
