//! External collaborators: the type checker and version control.
//!
//! Both run as child processes in the project root. Their results are
//! recorded in the report; a failure never undoes the relocation work.

use crate::error::{Issue, IssueKind};
use crate::relocator::{ChangeAction, ChangeLogEntry};
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;
use std::process::{Command, Output};

/// Number of change lines listed in a commit message body.
const COMMIT_CHANGE_LINES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Passed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolOutcome {
    pub tool: String,
    pub status: ToolStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ToolOutcome {
    fn new(tool: &str, status: ToolStatus, detail: Option<String>) -> Self {
        Self {
            tool: tool.to_string(),
            status,
            detail,
        }
    }

    /// The issue to report for a failed run, if any.
    pub fn issue(&self, root: &Path) -> Option<Issue> {
        (self.status == ToolStatus::Failed).then(|| {
            let message = match &self.detail {
                Some(detail) => format!("{} failed: {}", self.tool, detail),
                None => format!("{} failed", self.tool),
            };
            Issue::new(IssueKind::ExternalToolFailure, root, message)
        })
    }
}

/// Results of the optional post-execution steps.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExternalOutcomes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub typecheck: Option<ToolOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<ToolOutcome>,
}

impl ExternalOutcomes {
    pub fn issues(&self, root: &Path) -> Vec<Issue> {
        [&self.typecheck, &self.commit]
            .into_iter()
            .flatten()
            .filter_map(|outcome| outcome.issue(root))
            .collect()
    }
}

fn run(root: &Path, program: &str, args: &[&str]) -> Result<Output> {
    Command::new(program)
        .args(args)
        .current_dir(root)
        .output()
        .with_context(|| format!("Failed to run {} {}", program, args.join(" ")))
}

fn failure_detail(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let text = if stderr.trim().is_empty() {
        stdout.trim()
    } else {
        stderr.trim()
    };
    text.lines().take(20).collect::<Vec<_>>().join("\n")
}

/// Runs `npx tsc --noEmit` in `root`.
pub fn typecheck(root: &Path) -> ToolOutcome {
    const TOOL: &str = "tsc";
    match run(root, "npx", &["tsc", "--noEmit"]) {
        Ok(output) if output.status.success() => ToolOutcome::new(TOOL, ToolStatus::Passed, None),
        Ok(output) => ToolOutcome::new(TOOL, ToolStatus::Failed, Some(failure_detail(&output))),
        Err(e) => ToolOutcome::new(TOOL, ToolStatus::Failed, Some(format!("{:#}", e))),
    }
}

/// Stages everything and commits with a message generated from `log`.
///
/// Skipped when nothing changed, and refused while the log holds any
/// `conflict` entry.
pub fn commit(root: &Path, log: &[ChangeLogEntry], extension_fixes: usize) -> ToolOutcome {
    const TOOL: &str = "git";

    let conflicts = log
        .iter()
        .filter(|e| e.action == ChangeAction::Conflict)
        .count();
    if conflicts > 0 {
        return ToolOutcome::new(
            TOOL,
            ToolStatus::Skipped,
            Some(format!("{} conflicts need manual resolution", conflicts)),
        );
    }
    if log.is_empty() {
        return ToolOutcome::new(TOOL, ToolStatus::Skipped, Some("no changes".to_string()));
    }

    match try_commit(root, &commit_message(log, extension_fixes)) {
        Ok(()) => ToolOutcome::new(TOOL, ToolStatus::Passed, None),
        Err(e) => ToolOutcome::new(TOOL, ToolStatus::Failed, Some(format!("{:#}", e))),
    }
}

fn try_commit(root: &Path, message: &str) -> Result<()> {
    for args in [vec!["add", "-A"], vec!["commit", "-m", message]] {
        let output = run(root, "git", &args)?;
        if !output.status.success() {
            anyhow::bail!("git {} failed: {}", args[0], failure_detail(&output));
        }
    }
    Ok(())
}

/// Commit message summarising a change log: a count line, then up to ten
/// change lines.
pub fn commit_message(log: &[ChangeLogEntry], extension_fixes: usize) -> String {
    if log.is_empty() {
        return "tree-tidy: no changes".to_string();
    }

    let count = |action: ChangeAction| log.iter().filter(|e| e.action == action).count();
    let moves = count(ChangeAction::Move).saturating_sub(extension_fixes);
    let updates = count(ChangeAction::UpdateNewer);
    let skips = count(ChangeAction::SkipOlder);

    let mut message = format!(
        "tree-tidy: {} moves, {} updates, {} extensions\n\n",
        moves, updates, extension_fixes
    );
    if skips > 0 {
        message.push_str(&format!("{} files skipped (destination newer)\n\n", skips));
    }

    message.push_str("Changes:\n");
    for entry in log.iter().take(COMMIT_CHANGE_LINES) {
        let name = |p: &Path| {
            p.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        };
        let line = match &entry.destination {
            Some(dest) => format!("{} -> {}", name(&entry.source), name(dest)),
            None => name(&entry.source),
        };
        message.push_str(&format!("- {}: {}\n", action_label(entry.action), line));
    }
    if log.len() > COMMIT_CHANGE_LINES {
        message.push_str(&format!("- ... and {} more\n", log.len() - COMMIT_CHANGE_LINES));
    }

    message
}

fn action_label(action: ChangeAction) -> &'static str {
    match action {
        ChangeAction::CreateDir => "mkdir",
        ChangeAction::Move => "move",
        ChangeAction::UpdateNewer => "update",
        ChangeAction::SkipOlder => "skip",
        ChangeAction::Identical => "identical",
        ChangeAction::Conflict => "conflict",
        ChangeAction::RewriteImports => "imports",
        ChangeAction::Backup => "backup",
    }
}
