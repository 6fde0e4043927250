//! Error types.
//!
//! Two layers: [`RelocateError`] is the typed failure of a single filesystem
//! action, returned by the relocator; [`Issue`] is a non-fatal problem
//! recorded for the report. Only an unusable root directory aborts a run.

use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failure while executing one relocation or rewrite.
#[derive(Debug, Error)]
pub enum RelocateError {
    #[error("failed to create directory {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("failed to back up {path} to {backup}: {source}")]
    Backup {
        path: PathBuf,
        backup: PathBuf,
        source: io::Error,
    },

    #[error("failed to move {from} to {to}: {source}")]
    Move {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },

    #[error("failed to remove {path}: {source}")]
    Remove { path: PathBuf, source: io::Error },

    #[error("failed to set permissions on {path}: {source}")]
    Permissions { path: PathBuf, source: io::Error },

    #[error("failed to rewrite imports in {path}: {source}")]
    Rewrite { path: PathBuf, source: io::Error },

    #[error("refusing to relocate {0} onto itself")]
    SamePath(PathBuf),
}

impl RelocateError {
    /// The file the failure should be reported against.
    pub fn path(&self) -> &Path {
        match self {
            Self::CreateDir { path, .. }
            | Self::Backup { path, .. }
            | Self::Remove { path, .. }
            | Self::Permissions { path, .. }
            | Self::Rewrite { path, .. } => path,
            Self::Move { from, .. } => from,
            Self::SamePath(path) => path,
        }
    }
}

/// Kinds of non-fatal problems collected during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// File could not be read; it was skipped.
    ReadError,
    /// An import resolves to no file on disk.
    MissingTarget,
    /// A relocation was quarantined for manual review.
    RelocationConflict,
    /// A filesystem action failed for one file.
    ExecutionError,
    /// The type checker or version control step failed.
    ExternalToolFailure,
}

#[derive(Debug, Clone, Serialize)]
pub struct Issue {
    pub kind: IssueKind,
    pub file: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    pub message: String,
}

impl Issue {
    pub fn new(kind: IssueKind, file: &Path, message: impl Into<String>) -> Self {
        Self {
            kind,
            file: file.to_path_buf(),
            line: None,
            message: message.into(),
        }
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }
}

impl From<&RelocateError> for Issue {
    fn from(err: &RelocateError) -> Self {
        Issue::new(IssueKind::ExecutionError, err.path(), err.to_string())
    }
}
