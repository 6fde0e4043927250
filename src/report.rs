//! Run report.
//!
//! [`Report`] is a pure projection of one run's in-memory state: the survey,
//! the execution (absent on a dry run), the change log and the external tool
//! outcomes. It serialises to the JSON artifact written by `--output`, and
//! [`render_summary`] turns it into the plain-text summary printed at the
//! end of a run.

use crate::config::OrganizerConfig;
use crate::error::{Issue, IssueKind};
use crate::external::ExternalOutcomes;
use crate::pipeline::{Execution, Survey};
use crate::planner::{RelocationDecision, RelocationPlan};
use crate::relocator::ChangeLogEntry;
use crate::resolver::Strategy;
use crate::scanner::{FileRecord, Location};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write;
use std::path::{Path, PathBuf};

/// Extensions whose files should be named like components.
const COMPONENT_EXTENSIONS: [&str; 2] = ["tsx", "jsx"];

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub timestamp: DateTime<Utc>,
    pub root_dir: PathBuf,
    pub dry_run: bool,
    pub summary: Summary,
    pub extension_issues: Vec<ExtensionIssue>,
    pub destination_suggestions: BTreeMap<String, PathBuf>,
    pub relocations: Vec<RelocationPlan>,
    pub missing_imports: Vec<MissingImport>,
    pub conflicts: Vec<ConflictEntry>,
    pub accepted_corrections: Vec<ExtensionIssue>,
    pub naming_issues: Vec<NamingIssue>,
    pub issues: Vec<Issue>,
    pub external: ExternalOutcomes,
    pub change_log: Vec<ChangeLogEntry>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_files: usize,
    pub files_with_extension_issues: usize,
    pub staged_files: usize,
    pub source_files: usize,
    pub broken_imports: usize,
    pub accepted_corrections: usize,
    pub conflicts: usize,
    pub decisions: DecisionCounts,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionCounts {
    #[serde(rename = "move")]
    pub moved: usize,
    pub update_newer: usize,
    pub skip_older: usize,
    pub identical: usize,
    pub conflict: usize,
}

impl DecisionCounts {
    fn tally<'a>(decisions: impl IntoIterator<Item = &'a RelocationDecision>) -> Self {
        let mut counts = Self::default();
        for decision in decisions {
            *counts.slot(*decision) += 1;
        }
        counts
    }

    fn slot(&mut self, decision: RelocationDecision) -> &mut usize {
        match decision {
            RelocationDecision::Move => &mut self.moved,
            RelocationDecision::UpdateNewer => &mut self.update_newer,
            RelocationDecision::SkipOlder => &mut self.skip_older,
            RelocationDecision::Identical => &mut self.identical,
            RelocationDecision::Conflict => &mut self.conflict,
        }
    }

    pub fn get(&self, decision: RelocationDecision) -> usize {
        match decision {
            RelocationDecision::Move => self.moved,
            RelocationDecision::UpdateNewer => self.update_newer,
            RelocationDecision::SkipOlder => self.skip_older,
            RelocationDecision::Identical => self.identical,
            RelocationDecision::Conflict => self.conflict,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtensionIssue {
    pub file: PathBuf,
    pub current: String,
    pub suggested: String,
    pub reason: String,
    pub confidence: f64,
    pub accepted: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct MissingImport {
    pub file: PathBuf,
    pub line: usize,
    pub specifier: String,
    pub strategy: Strategy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConflictEntry {
    pub source: PathBuf,
    pub destination: PathBuf,
    /// Where the source was set aside; absent on a dry run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quarantine: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NamingIssue {
    pub file: PathBuf,
    pub message: String,
}

impl Report {
    pub fn build(
        root: &Path,
        config: &OrganizerConfig,
        survey: &Survey,
        execution: Option<&Execution>,
        change_log: &[ChangeLogEntry],
        external: ExternalOutcomes,
    ) -> Self {
        let threshold = config.acceptance_threshold;

        let extension_issues: Vec<ExtensionIssue> = survey
            .records
            .iter()
            .filter(|r| r.classification.changes_extension())
            .map(|r| extension_issue(r, threshold))
            .collect();
        let accepted_corrections: Vec<ExtensionIssue> = extension_issues
            .iter()
            .filter(|i| i.accepted)
            .cloned()
            .collect();

        let relocations: Vec<RelocationPlan> = match execution {
            Some(execution) => execution.executed.iter().map(|(p, _)| p.clone()).collect(),
            None => survey.plans.clone(),
        };

        let conflicts: Vec<ConflictEntry> = match execution {
            Some(execution) => execution
                .executed
                .iter()
                .filter(|(plan, _)| plan.decision == RelocationDecision::Conflict)
                .map(|(plan, entry)| ConflictEntry {
                    source: plan.source.clone(),
                    destination: plan.destination.clone(),
                    quarantine: entry.destination.clone(),
                })
                .collect(),
            None => survey
                .plans
                .iter()
                .filter(|plan| plan.decision == RelocationDecision::Conflict)
                .map(|plan| ConflictEntry {
                    source: plan.source.clone(),
                    destination: plan.destination.clone(),
                    quarantine: None,
                })
                .collect(),
        };

        let missing_imports: Vec<MissingImport> = survey
            .missing
            .iter()
            .map(|edge| MissingImport {
                file: edge.from_file.clone(),
                line: edge.line,
                specifier: edge.raw_specifier.clone(),
                strategy: edge.strategy,
                candidate: edge.candidate.clone(),
            })
            .collect();

        let mut issues = survey.issues.clone();
        issues.extend(conflicts.iter().map(|c| {
            Issue::new(
                IssueKind::RelocationConflict,
                &c.source,
                format!("conflicts with {}; needs manual review", c.destination.display()),
            )
        }));
        if let Some(execution) = execution {
            issues.extend(execution.issues.iter().cloned());
        }
        issues.extend(external.issues(root));

        let summary = Summary {
            total_files: survey.records.len(),
            files_with_extension_issues: extension_issues.len(),
            staged_files: count_location(&survey.records, Location::Staged),
            source_files: count_location(&survey.records, Location::InPlace),
            broken_imports: missing_imports.len(),
            accepted_corrections: accepted_corrections.len(),
            conflicts: conflicts.len(),
            decisions: DecisionCounts::tally(relocations.iter().map(|p| &p.decision)),
        };

        Self {
            timestamp: Utc::now(),
            root_dir: root.to_path_buf(),
            dry_run: execution.is_none(),
            summary,
            extension_issues,
            destination_suggestions: survey.destination_suggestions.clone(),
            relocations,
            missing_imports,
            conflicts,
            accepted_corrections,
            naming_issues: naming_issues(&survey.records),
            issues,
            external,
            change_log: change_log.to_vec(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Path relative to the report's root, for display.
    pub fn display_path<'a>(&self, path: &'a Path) -> std::path::Display<'a> {
        path.strip_prefix(&self.root_dir).unwrap_or(path).display()
    }
}

fn extension_issue(record: &FileRecord, threshold: f64) -> ExtensionIssue {
    let c = &record.classification;
    ExtensionIssue {
        file: record.path.clone(),
        current: c.current_extension.clone(),
        suggested: c.suggested_extension.clone(),
        reason: c.reason.clone(),
        confidence: c.confidence,
        accepted: c.is_accepted(threshold),
    }
}

fn count_location(records: &[FileRecord], location: Location) -> usize {
    records.iter().filter(|r| r.location == location).count()
}

/// Component files under the source root whose name starts lowercase.
fn naming_issues(records: &[FileRecord]) -> Vec<NamingIssue> {
    records
        .iter()
        .filter(|r| r.location == Location::InPlace)
        .filter(|r| COMPONENT_EXTENSIONS.contains(&r.current_extension.as_str()))
        .filter(|r| {
            r.path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.chars().next())
                .is_some_and(|c| c.is_lowercase())
        })
        .map(|r| NamingIssue {
            file: r.path.clone(),
            message: "component file name should be PascalCase".to_string(),
        })
        .collect()
}

/// Plain-text summary of a report.
pub fn render_summary(report: &Report) -> String {
    let mut out = String::new();
    let s = &report.summary;

    let mode = if report.dry_run { " (dry run)" } else { "" };
    let _ = writeln!(out, "Organize report{}", mode);
    let _ = writeln!(
        out,
        "  files: {} scanned ({} staged, {} in source)",
        s.total_files, s.staged_files, s.source_files
    );
    let _ = writeln!(
        out,
        "  extension issues: {} ({} accepted)",
        s.files_with_extension_issues, s.accepted_corrections
    );

    let decisions: Vec<String> = RelocationDecision::ALL
        .iter()
        .map(|d| format!("{} {}", s.decisions.get(*d), d.label()))
        .collect();
    let _ = writeln!(out, "  relocations: {}", decisions.join(", "));
    let _ = writeln!(out, "  broken imports: {}", s.broken_imports);
    let _ = writeln!(out, "  conflicts: {}", s.conflicts);

    if !report.accepted_corrections.is_empty() {
        let _ = writeln!(out, "\nAccepted corrections:");
        for c in &report.accepted_corrections {
            let _ = writeln!(
                out,
                "  {}: .{} -> .{} ({:.1}, {})",
                report.display_path(&c.file),
                c.current,
                c.suggested,
                c.confidence,
                c.reason
            );
        }
    }

    if !report.missing_imports.is_empty() {
        let _ = writeln!(out, "\nBroken imports:");
        for m in &report.missing_imports {
            let _ = writeln!(
                out,
                "  {}:{} '{}'",
                report.display_path(&m.file),
                m.line,
                m.specifier
            );
        }
    }

    if !report.conflicts.is_empty() {
        let _ = writeln!(out, "\nConflicts needing manual review:");
        for c in &report.conflicts {
            let _ = match &c.quarantine {
                Some(q) => writeln!(
                    out,
                    "  {} vs {} (kept as {})",
                    report.display_path(&c.source),
                    report.display_path(&c.destination),
                    report.display_path(q)
                ),
                None => writeln!(
                    out,
                    "  {} vs {}",
                    report.display_path(&c.source),
                    report.display_path(&c.destination)
                ),
            };
        }
    }

    if !report.naming_issues.is_empty() {
        let _ = writeln!(out, "\nNaming issues:");
        for n in &report.naming_issues {
            let _ = writeln!(out, "  {}: {}", report.display_path(&n.file), n.message);
        }
    }

    let failures = report
        .issues
        .iter()
        .filter(|i| {
            matches!(
                i.kind,
                IssueKind::ReadError | IssueKind::ExecutionError | IssueKind::ExternalToolFailure
            )
        })
        .collect::<Vec<_>>();
    if !failures.is_empty() {
        let _ = writeln!(out, "\nErrors:");
        for issue in failures {
            let _ = writeln!(out, "  {}: {}", report.display_path(&issue.file), issue.message);
        }
    }

    out
}
