//! Filesystem execution of relocation decisions.
//!
//! Every action that changed the tree appends exactly one [`ChangeLogEntry`],
//! even when a later step of it (source removal, permissions) failed. Prior
//! destination content is never discarded: an update first copies the
//! destination to a timestamped `.backup.` sibling, and a conflict moves the
//! incoming file to a timestamped `.conflict.` sibling instead of touching the
//! destination at all.

use crate::error::RelocateError;
use crate::planner::RelocationDecision;
use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Action recorded in the change log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    CreateDir,
    Move,
    UpdateNewer,
    SkipOlder,
    Identical,
    Conflict,
    RewriteImports,
    /// A backup written for an update that then failed.
    Backup,
}

impl From<RelocationDecision> for ChangeAction {
    fn from(decision: RelocationDecision) -> Self {
        match decision {
            RelocationDecision::Move => Self::Move,
            RelocationDecision::UpdateNewer => Self::UpdateNewer,
            RelocationDecision::SkipOlder => Self::SkipOlder,
            RelocationDecision::Identical => Self::Identical,
            RelocationDecision::Conflict => Self::Conflict,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChangeLogEntry {
    pub action: ChangeAction,
    pub source: PathBuf,
    /// Where the content ended up; the quarantine path for conflicts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<PathBuf>,
    /// Copy of the replaced destination, for updates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup: Option<PathBuf>,
    pub timestamp: DateTime<Utc>,
}

/// A logged action, plus the failure of any step after its content landed.
#[derive(Debug)]
pub struct Executed {
    pub entry: ChangeLogEntry,
    pub incomplete: Option<RelocateError>,
}

/// Executes decisions and keeps the run's change log.
#[derive(Debug)]
pub struct Relocator {
    stamp: String,
    executable_extensions: Vec<String>,
    log: Vec<ChangeLogEntry>,
}

impl Relocator {
    pub fn new(executable_extensions: &[String]) -> Self {
        Self::with_stamp(
            executable_extensions,
            Local::now().format("%Y%m%d_%H%M%S").to_string(),
        )
    }

    /// Uses a fixed stamp for backup and quarantine names.
    pub fn with_stamp(executable_extensions: &[String], stamp: impl Into<String>) -> Self {
        Self {
            stamp: stamp.into(),
            executable_extensions: executable_extensions.to_vec(),
            log: Vec::new(),
        }
    }

    pub fn change_log(&self) -> &[ChangeLogEntry] {
        &self.log
    }

    pub fn into_change_log(self) -> Vec<ChangeLogEntry> {
        self.log
    }

    /// Carries out `decision` for `source` and `destination`.
    ///
    /// `Err` means the content did not land; a backup already written by then
    /// is logged as its own `backup` entry. Once the content is in place the
    /// action is logged, and a failure removing the source or marking the
    /// destination executable is returned in [`Executed::incomplete`].
    pub fn execute(
        &mut self,
        decision: RelocationDecision,
        source: &Path,
        destination: &Path,
    ) -> Result<Executed, RelocateError> {
        if source == destination {
            return Err(RelocateError::SamePath(source.to_path_buf()));
        }

        let mut backup = None;
        let mut incomplete = None;
        let landed = match decision {
            RelocationDecision::Move => {
                ensure_parent(destination)?;
                incomplete = move_file(source, destination)?;
                destination.to_path_buf()
            }
            RelocationDecision::UpdateNewer => {
                let backup_path = self.sibling(destination, "backup");
                fs::copy(destination, &backup_path).map_err(|source| RelocateError::Backup {
                    path: destination.to_path_buf(),
                    backup: backup_path.clone(),
                    source,
                })?;
                backup = Some(backup_path);
                match move_file(source, destination) {
                    Ok(leftover) => incomplete = leftover,
                    // The backup is on disk; keep it in the log.
                    Err(e) => {
                        self.record(ChangeAction::Backup, destination, backup, None);
                        return Err(e);
                    }
                }
                destination.to_path_buf()
            }
            RelocationDecision::SkipOlder | RelocationDecision::Identical => {
                fs::remove_file(source).map_err(|e| RelocateError::Remove {
                    path: source.to_path_buf(),
                    source: e,
                })?;
                destination.to_path_buf()
            }
            RelocationDecision::Conflict => {
                ensure_parent(destination)?;
                let quarantine = self.sibling(destination, "conflict");
                incomplete = move_file(source, &quarantine)?;
                quarantine
            }
        };

        if matches!(
            decision,
            RelocationDecision::Move | RelocationDecision::UpdateNewer
        ) && let Err(e) = self.mark_executable(&landed)
        {
            incomplete = incomplete.or(Some(e));
        }

        let entry = self.record(decision.into(), source, Some(landed), backup);
        Ok(Executed { entry, incomplete })
    }

    /// Creates `dir` (and parents) if missing. Returns the entry when
    /// something was created.
    pub fn create_dir(&mut self, dir: &Path) -> Result<Option<ChangeLogEntry>, RelocateError> {
        if dir.is_dir() {
            return Ok(None);
        }
        fs::create_dir_all(dir).map_err(|source| RelocateError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })?;
        Ok(Some(self.record(ChangeAction::CreateDir, dir, None, None)))
    }

    /// Records a completed import rewrite of `file`.
    pub fn record_rewrite(&mut self, file: &Path) -> ChangeLogEntry {
        self.record(ChangeAction::RewriteImports, file, None, None)
    }

    fn record(
        &mut self,
        action: ChangeAction,
        source: &Path,
        destination: Option<PathBuf>,
        backup: Option<PathBuf>,
    ) -> ChangeLogEntry {
        let entry = ChangeLogEntry {
            action,
            source: source.to_path_buf(),
            destination,
            backup,
            timestamp: Utc::now(),
        };
        self.log.push(entry.clone());
        entry
    }

    /// `dir/Name.<label>.<stamp>.ext` next to `path`, with a counter appended
    /// to the stamp if that name is already taken.
    fn sibling(&self, path: &Path, label: &str) -> PathBuf {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        let mut candidate = dir.join(format!("{}.{}.{}{}", stem, label, self.stamp, ext));
        let mut n = 1;
        while candidate.exists() {
            candidate = dir.join(format!("{}.{}.{}_{}{}", stem, label, self.stamp, n, ext));
            n += 1;
        }
        candidate
    }

    fn mark_executable(&self, path: &Path) -> Result<(), RelocateError> {
        let executable = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.executable_extensions.iter().any(|e| e == ext));
        if executable {
            set_executable(path)?;
        }
        Ok(())
    }
}

#[cfg(unix)]
fn set_executable(path: &Path) -> Result<(), RelocateError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).map_err(|source| {
        RelocateError::Permissions {
            path: path.to_path_buf(),
            source,
        }
    })
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> Result<(), RelocateError> {
    Ok(())
}

fn ensure_parent(path: &Path) -> Result<(), RelocateError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|source| RelocateError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })
        }
        _ => Ok(()),
    }
}

/// Renames `from` to `to`, falling back to copy and delete when a rename is
/// not possible (e.g. across filesystems). `Err` means `to` was not written;
/// a failure to delete `from` after the copy is returned as `Ok(Some(_))`.
fn move_file(from: &Path, to: &Path) -> Result<Option<RelocateError>, RelocateError> {
    if fs::rename(from, to).is_ok() {
        return Ok(None);
    }
    fs::copy(from, to).map_err(|source| RelocateError::Move {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    })?;
    Ok(fs::remove_file(from)
        .map_err(|source| RelocateError::Remove {
            path: from.to_path_buf(),
            source,
        })
        .err())
}
