//! Persistence for the allocation state.
//!
//! # Design
//!
//! The state file is the only shared resource between the allocator and the
//! four posters. Each process loads it, mutates it and writes it back.
//!
//! ## Loading never fails
//!
//! A missing file is the normal first-run case and yields an empty state.
//! A file that can't be read or parsed is logged as an error and also
//! yields an empty state, so a corrupt document never blocks a run.
//!
//! ## Writing
//!
//! 1. The current file is copied to `<state_file>.backup` (best effort).
//! 2. `last_updated` is stamped.
//! 3. The JSON is written to a temp file next to the target and renamed over
//!    it, so readers never observe a half-written document.
//! 4. If any step after the backup fails, the backup is copied back.
//!
//! The outcome is reported as a [`SaveOutcome`] and logged; saving never
//! returns an error to the caller.
//!
//! ## Concurrency
//!
//! There is no lock. If the allocator and a poster overlap, the last writer
//! wins and the other process's changes are lost. Runs are expected to be
//! scheduled at different times.

use crate::state::{AllocationState, now};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Could not replace {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// How a [`StateStore::save`] call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The new state is on disk.
    Saved,
    /// Writing failed and the previous document was restored from backup.
    RestoredBackup,
    /// Writing failed and no backup could be restored.
    Failed,
}

impl SaveOutcome {
    pub fn is_saved(self) -> bool {
        self == SaveOutcome::Saved
    }
}

/// File-backed store for [`AllocationState`].
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling file holding the previous version of the state.
    pub fn backup_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".backup");
        PathBuf::from(name)
    }

    /// Load the state, falling back to an empty one on any problem.
    pub fn load(&self) -> AllocationState {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "no allocation state yet, starting empty");
                return AllocationState::empty(now());
            }
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "could not read allocation state");
                return AllocationState::empty(now());
            }
        };
        match serde_json::from_str::<AllocationState>(&content) {
            Ok(state) => {
                info!(
                    used = state.used_images.len(),
                    pending = state.pending(),
                    "loaded allocation state"
                );
                state
            }
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "invalid allocation state, starting empty");
                AllocationState::empty(now())
            }
        }
    }

    /// Persist `state`, stamping `last_updated`.
    pub fn save(&self, state: &mut AllocationState) -> SaveOutcome {
        let had_backup = self.backup_existing();
        state.touch(now());

        match self.write(state) {
            Ok(()) => {
                info!(
                    path = %self.path.display(),
                    used = state.used_images.len(),
                    pending = state.pending(),
                    "saved allocation state"
                );
                SaveOutcome::Saved
            }
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "failed to save allocation state");
                if had_backup {
                    self.restore_backup()
                } else {
                    SaveOutcome::Failed
                }
            }
        }
    }

    /// Copy the current file to the backup path. Returns whether a backup exists now.
    fn backup_existing(&self) -> bool {
        if !self.path.is_file() {
            return false;
        }
        let backup = self.backup_path();
        match fs::copy(&self.path, &backup) {
            Ok(_) => {
                info!(backup = %backup.display(), "created state backup");
                true
            }
            Err(e) => {
                warn!(backup = %backup.display(), error = %e, "could not back up allocation state");
                false
            }
        }
    }

    fn write(&self, state: &AllocationState) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(state)?;
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| StoreError::Persist {
            path: self.path.clone(),
            source: e.error,
        })?;
        Ok(())
    }

    fn restore_backup(&self) -> SaveOutcome {
        let backup = self.backup_path();
        match fs::copy(&backup, &self.path) {
            Ok(_) => {
                warn!(backup = %backup.display(), "restored allocation state from backup");
                SaveOutcome::RestoredBackup
            }
            Err(e) => {
                error!(backup = %backup.display(), error = %e, "failed to restore allocation state backup");
                SaveOutcome::Failed
            }
        }
    }
}
