//! Relocation planning.
//!
//! Decides what should happen when a file is brought to its canonical
//! destination. Content equality is checked before timestamps, so identical
//! files are never treated as conflicting because of clock skew.

use crate::scanner::{FileRecord, content_hash};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Ordering;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Outcome for a `(source, destination)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RelocationDecision {
    /// Destination does not exist.
    Move,
    /// Destination differs and is older; back it up, then replace it.
    UpdateNewer,
    /// Destination differs and is newer; drop the source.
    SkipOlder,
    /// Destination holds the same bytes; drop the source.
    Identical,
    /// Destination differs and has the same modification time.
    Conflict,
}

impl RelocationDecision {
    pub const ALL: [RelocationDecision; 5] = [
        Self::Move,
        Self::UpdateNewer,
        Self::SkipOlder,
        Self::Identical,
        Self::Conflict,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Move => "move",
            Self::UpdateNewer => "update_newer",
            Self::SkipOlder => "skip_older",
            Self::Identical => "identical",
            Self::Conflict => "conflict",
        }
    }
}

/// Why a relocation was planned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanOrigin {
    /// A staged file going to its mapped destination.
    Staged,
    /// An in-place file renamed to its corrected extension.
    ExtensionFix,
}

#[derive(Debug, Clone, Serialize)]
pub struct RelocationPlan {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub decision: RelocationDecision,
    pub origin: PlanOrigin,
}

/// Compares `source` with whatever sits at `destination`.
///
/// 1. destination missing: `Move`
/// 2. same bytes: `Identical`
/// 3. source strictly newer: `UpdateNewer`
/// 4. destination strictly newer: `SkipOlder`
/// 5. same modification time: `Conflict`
pub fn plan(source: &FileRecord, destination: &Path) -> io::Result<RelocationDecision> {
    let dest_meta = match fs::metadata(destination) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(RelocationDecision::Move),
        Err(e) => return Err(e),
    };

    if same_content(source, destination, dest_meta.len())? {
        return Ok(RelocationDecision::Identical);
    }

    let dest_modified = DateTime::<Utc>::from(dest_meta.modified()?);
    Ok(decide_by_time(source.modified, dest_modified))
}

fn decide_by_time(source: DateTime<Utc>, destination: DateTime<Utc>) -> RelocationDecision {
    match source.cmp(&destination) {
        Ordering::Greater => RelocationDecision::UpdateNewer,
        Ordering::Less => RelocationDecision::SkipOlder,
        Ordering::Equal => RelocationDecision::Conflict,
    }
}

/// Compares the destination's bytes with the hash taken when `source` was
/// scanned.
fn same_content(source: &FileRecord, destination: &Path, dest_len: u64) -> io::Result<bool> {
    if source.size != dest_len {
        return Ok(false);
    }
    Ok(content_hash(&fs::read(destination)?) == source.content_hash)
}

/// Swaps the extension of a canonical destination for a corrected one, but
/// only when the mapping kept the source's original extension.
pub fn corrected_destination(destination: &Path, current: &str, suggested: &str) -> PathBuf {
    let dest_ext = destination
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    if dest_ext == current {
        destination.with_extension(suggested)
    } else {
        destination.to_path_buf()
    }
}
