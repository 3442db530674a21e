//! Per-call staging directories under a shared root.
//!
//! The root is created on first use and left in place for the lifetime of the
//! process. Each operation gets its own `{pid}-{random}` sub-directory, so
//! concurrent callers never collide and no locking is needed.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::AnyloadError;
use crate::security::ensure_allowed;

/// Manages the staging root.
#[derive(Clone, Debug)]
pub struct StagingArea {
    root: PathBuf,
    deny_list: Vec<PathBuf>,
}

impl StagingArea {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            deny_list: Vec::new(),
        }
    }

    /// Refuse to stage anywhere under these prefixes.
    pub fn with_deny_list(mut self, deny_list: Vec<PathBuf>) -> Self {
        self.deny_list = deny_list;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create a fresh, exclusively owned staging directory.
    ///
    /// The root is checked against the deny-list before anything is created.
    pub fn stage(&self) -> Result<StagingDir, AnyloadError> {
        ensure_allowed(&self.root, &self.deny_list)?;
        fs::create_dir_all(&self.root)?;

        loop {
            let name = format!("{}-{:016x}", std::process::id(), rand::random::<u64>());
            let path = self.root.join(name);
            match fs::create_dir(&path) {
                Ok(()) => {
                    debug!(path = %path.display(), "created staging directory");
                    return Ok(StagingDir { path });
                }
                Err(error) if error.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(error) => return Err(AnyloadError::Io(error)),
            }
        }
    }
}

/// A staging directory that is removed when dropped.
///
/// Removal failures are logged and never replace the result of the operation
/// that owned the directory.
#[derive(Debug)]
pub struct StagingDir {
    path: PathBuf,
}

impl StagingDir {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of a file named `file_name` inside this directory.
    pub fn file(&self, file_name: &str) -> PathBuf {
        self.path.join(file_name)
    }
}

impl Drop for StagingDir {
    fn drop(&mut self) {
        match fs::remove_dir_all(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "removed staging directory"),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
            Err(error) => warn!(
                path = %self.path.display(),
                %error,
                "failed to remove staging directory"
            ),
        }
    }
}
