//! The organize pipeline.
//!
//! Strictly ordered passes over one project root:
//!
//! 1. **survey**: scan, classify, resolve the existing import graph, plan
//!    every relocation. Read-only; this is all a dry run does.
//! 2. **execute**: create required directories, carry out each plan
//!    (re-planned against the current disk state), then rewrite imports that
//!    the moves invalidated.
//!
//! Per-file failures become [`Issue`]s and the run continues. Only an unusable
//! root directory aborts.

use crate::config::OrganizerConfig;
use crate::error::{Issue, IssueKind, RelocateError};
use crate::external::ExternalOutcomes;
use crate::planner::{self, PlanOrigin, RelocationDecision, RelocationPlan};
use crate::relocator::{ChangeLogEntry, Executed, Relocator};
use crate::report::Report;
use crate::resolver::{ImportEdge, PathResolver};
use crate::rewriter::{self, Relocated};
use crate::scanner::{self, Excludes, FileRecord, Location};
use anyhow::{Context, Result};
use colored::Colorize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Everything learned about the tree before anything is touched.
#[derive(Debug, Clone, Default)]
pub struct Survey {
    pub records: Vec<FileRecord>,
    /// Resolvable imports of every readable source file, staged or in place.
    pub edges: Vec<ImportEdge>,
    /// Broken edges of in-place files.
    pub missing: Vec<ImportEdge>,
    pub plans: Vec<RelocationPlan>,
    /// Staged file name to destination, relative to the root.
    pub destination_suggestions: BTreeMap<String, PathBuf>,
    pub issues: Vec<Issue>,
}

impl Survey {
    pub fn record(&self, path: &Path) -> Option<&FileRecord> {
        self.records.iter().find(|r| r.path == path)
    }

    pub fn count(&self, decision: RelocationDecision) -> usize {
        self.plans.iter().filter(|p| p.decision == decision).count()
    }
}

/// What the execute pass did.
#[derive(Debug, Clone, Default)]
pub struct Execution {
    /// Plans as actually executed, with the decision made at execution time.
    pub executed: Vec<(RelocationPlan, ChangeLogEntry)>,
    /// Files whose imports were rewritten.
    pub rewritten: Vec<PathBuf>,
    pub issues: Vec<Issue>,
}

impl Execution {
    pub fn extension_fixes(&self) -> usize {
        self.executed
            .iter()
            .filter(|(plan, _)| {
                plan.origin == PlanOrigin::ExtensionFix
                    && plan.decision == RelocationDecision::Move
            })
            .count()
    }
}

pub struct Organizer {
    root: PathBuf,
    config: OrganizerConfig,
    excludes: Excludes,
    verbose: bool,
}

impl Organizer {
    /// Fails if `root` does not exist or is not a directory.
    pub fn new(root: &Path, config: OrganizerConfig) -> Result<Self> {
        let root = root
            .canonicalize()
            .with_context(|| format!("Cannot access project root {}", root.display()))?;
        if !root.is_dir() {
            anyhow::bail!("Project root {} is not a directory", root.display());
        }
        Ok(Self {
            root,
            config,
            excludes: Excludes::default(),
            verbose: false,
        })
    }

    pub fn with_excludes(mut self, excludes: Excludes) -> Self {
        self.excludes = excludes;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &OrganizerConfig {
        &self.config
    }

    fn info(&self, message: impl AsRef<str>) {
        if self.verbose {
            eprintln!("{} {}", "info:".blue().bold(), message.as_ref());
        }
    }

    /// Scans the tree, resolves imports and plans relocations without
    /// modifying anything.
    pub fn survey(&self) -> Survey {
        let scan = scanner::scan(&self.root, &self.config, &self.excludes);
        self.info(format!(
            "Scanned {} files ({} readable sources)",
            scan.records.len(),
            scan.sources.len()
        ));

        let resolver = PathResolver::new(&self.root, &self.config);
        let mut survey = Survey {
            issues: scan.issues,
            ..Survey::default()
        };

        for (path, text) in &scan.sources {
            let edges = resolver.edges(path, &scanner::extract_imports(text));
            let in_place = scan
                .records
                .iter()
                .any(|r| &r.path == path && r.location == Location::InPlace);
            if in_place {
                for edge in edges.iter().filter(|e| e.is_broken()) {
                    survey.issues.push(
                        Issue::new(
                            IssueKind::MissingTarget,
                            &edge.from_file,
                            format!("cannot resolve '{}'", edge.raw_specifier),
                        )
                        .at_line(edge.line),
                    );
                    survey.missing.push(edge.clone());
                }
            }
            survey.edges.extend(edges);
        }

        for record in &scan.records {
            let Some((destination, origin)) = self.destination(record) else {
                continue;
            };
            if record.location == Location::Staged
                && let Ok(relative) = destination.strip_prefix(&self.root)
            {
                survey
                    .destination_suggestions
                    .insert(record.file_name().to_string(), relative.to_path_buf());
            }
            if destination == record.path {
                continue;
            }

            match planner::plan(record, &destination) {
                Ok(decision) => survey.plans.push(RelocationPlan {
                    source: record.path.clone(),
                    destination,
                    decision,
                    origin,
                }),
                Err(e) => survey.issues.push(Issue::new(
                    IssueKind::ReadError,
                    &destination,
                    format!("cannot compare with {}: {}", record.path.display(), e),
                )),
            }
        }

        survey.records = scan.records;
        self.info(format!(
            "Planned {} relocations, {} broken imports",
            survey.plans.len(),
            survey.missing.len()
        ));
        survey
    }

    /// Where a record should end up, if anywhere. Staged files go to their
    /// mapped destination (with an accepted extension correction applied);
    /// in-place files only move when their extension is corrected.
    fn destination(&self, record: &FileRecord) -> Option<(PathBuf, PlanOrigin)> {
        let classification = &record.classification;
        let accepted = classification.is_accepted(self.config.acceptance_threshold);

        match record.location {
            Location::Staged => {
                let mapped = self.root.join(self.config.destination_for(record.file_name()));
                let destination = if accepted {
                    planner::corrected_destination(
                        &mapped,
                        &classification.current_extension,
                        &classification.suggested_extension,
                    )
                } else {
                    mapped
                };
                Some((destination, PlanOrigin::Staged))
            }
            Location::InPlace if accepted => Some((
                record
                    .path
                    .with_extension(&classification.suggested_extension),
                PlanOrigin::ExtensionFix,
            )),
            Location::InPlace => None,
        }
    }

    /// Carries out the surveyed plans. Every filesystem action is appended to
    /// `relocator`'s change log.
    pub fn execute(&self, survey: &Survey, relocator: &mut Relocator) -> Execution {
        let mut execution = Execution::default();

        for dir in &self.config.required_dirs {
            match relocator.create_dir(&self.root.join(dir)) {
                Ok(Some(_)) => self.info(format!("Created {}", dir.display())),
                Ok(None) => {}
                Err(e) => self.fail(&mut execution, &e),
            }
        }

        let mut moved: BTreeMap<PathBuf, Relocated> = BTreeMap::new();
        let mut landed: BTreeSet<PathBuf> = BTreeSet::new();
        for plan in &survey.plans {
            let Some(surveyed) = survey.record(&plan.source) else {
                continue;
            };

            // An earlier plan replaced this file, so its surveyed record is stale.
            let refreshed;
            let record = if landed.contains(&plan.source) {
                match self.refresh(surveyed, plan) {
                    Ok(Some(record)) => {
                        refreshed = record;
                        &refreshed
                    }
                    Ok(None) => {
                        self.info(format!(
                            "{}: replaced content no longer needs {}",
                            plan.source.display(),
                            plan.destination.display()
                        ));
                        continue;
                    }
                    Err(e) => {
                        eprintln!("{} {:#}", "warn:".yellow().bold(), e);
                        execution.issues.push(Issue::new(
                            IssueKind::ExecutionError,
                            &plan.source,
                            format!("{:#}", e),
                        ));
                        continue;
                    }
                }
            } else {
                surveyed
            };

            // Earlier plans may have changed the destination since the survey.
            let decision = match planner::plan(record, &plan.destination) {
                Ok(decision) => decision,
                Err(e) => {
                    eprintln!(
                        "{} cannot compare {} with {}: {}",
                        "warn:".yellow().bold(),
                        plan.source.display(),
                        plan.destination.display(),
                        e
                    );
                    execution.issues.push(Issue::new(
                        IssueKind::ExecutionError,
                        &plan.source,
                        e.to_string(),
                    ));
                    continue;
                }
            };
            if decision != plan.decision {
                self.info(format!(
                    "{}: {} became {}",
                    plan.source.display(),
                    plan.decision.label(),
                    decision.label()
                ));
            }

            match relocator.execute(decision, &plan.source, &plan.destination) {
                Ok(Executed { entry, incomplete }) => {
                    if let Some(e) = incomplete {
                        self.fail(&mut execution, &e);
                    }
                    let relocated = match decision {
                        RelocationDecision::Move | RelocationDecision::UpdateNewer => {
                            landed.insert(plan.destination.clone());
                            Relocated::Carried(plan.destination.clone())
                        }
                        RelocationDecision::SkipOlder | RelocationDecision::Identical => {
                            Relocated::Superseded(plan.destination.clone())
                        }
                        RelocationDecision::Conflict => Relocated::Quarantined,
                    };
                    moved.insert(plan.source.clone(), relocated);
                    execution.executed.push((
                        RelocationPlan {
                            decision,
                            ..plan.clone()
                        },
                        entry,
                    ));
                }
                Err(e) => self.fail(&mut execution, &e),
            }
        }

        for (file, edits) in rewriter::plan_rewrites(
            &survey.edges,
            &moved,
            &self.root.join(&self.config.source_dir),
        ) {
            match rewriter::apply_edits(&file, &edits) {
                Ok(true) => {
                    relocator.record_rewrite(&file);
                    self.info(format!(
                        "Rewrote {} import(s) in {}",
                        edits.len(),
                        file.display()
                    ));
                    execution.rewritten.push(file);
                }
                Ok(false) => {}
                Err(e) => self.fail(&mut execution, &e),
            }
        }

        execution
    }

    /// Re-reads a file that was overwritten during execution. Returns the
    /// fresh record if `plan` still applies to the new content.
    fn refresh(&self, surveyed: &FileRecord, plan: &RelocationPlan) -> Result<Option<FileRecord>> {
        let (record, _) = scanner::read_record(&surveyed.path, surveyed.location)?;
        let still_applies = self
            .destination(&record)
            .is_some_and(|(destination, _)| destination == plan.destination);
        Ok(still_applies.then_some(record))
    }

    fn fail(&self, execution: &mut Execution, err: &RelocateError) {
        eprintln!("{} {}", "warn:".yellow().bold(), err);
        execution.issues.push(Issue::from(err));
    }

    /// Survey, then (unless `dry_run`) execute, and report. External tools
    /// are not invoked.
    pub fn run(&self, dry_run: bool) -> Report {
        let survey = self.survey();
        if dry_run {
            return Report::build(
                &self.root,
                &self.config,
                &survey,
                None,
                &[],
                ExternalOutcomes::default(),
            );
        }

        let mut relocator = Relocator::new(&self.config.executable_extensions);
        let execution = self.execute(&survey, &mut relocator);
        Report::build(
            &self.root,
            &self.config,
            &survey,
            Some(&execution),
            relocator.change_log(),
            ExternalOutcomes::default(),
        )
    }
}
