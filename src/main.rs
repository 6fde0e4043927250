//! tree-tidy: move staged source files into a canonical layout.
//!
//! Classifies files by content, relocates staged files to their mapped
//! destinations without ever discarding existing content, and rewrites the
//! relative imports the moves invalidate.

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use dialoguer::Confirm;
use std::path::{Path, PathBuf};
use tree_tidy::cli::{Args, Commands};
use tree_tidy::external::{self, ExternalOutcomes, ToolStatus};
use tree_tidy::planner::RelocationDecision;
use tree_tidy::report::{self, Report};
use tree_tidy::scanner::{self, Excludes};
use tree_tidy::{Organizer, OrganizerConfig, Relocator, Survey};

fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Commands::Organize {
            root,
            dry_run,
            output,
            config,
            mappings,
            exclude,
            no_default_excludes,
            interactive,
            typecheck,
            commit,
            json,
            verbose,
        } => cmd_organize(OrganizeOptions {
            root,
            dry_run,
            output,
            config,
            mappings,
            excludes: Excludes::new(&exclude, !no_default_excludes)?,
            interactive,
            typecheck,
            commit,
            json,
            verbose,
        }),
        Commands::Validate {
            root,
            config,
            exclude,
            no_default_excludes,
            json,
        } => cmd_validate(
            &root,
            config.as_deref(),
            Excludes::new(&exclude, !no_default_excludes)?,
            json,
        ),
        Commands::Layout { config, mappings } => cmd_layout(config.as_deref(), mappings),
        Commands::Scan {
            root,
            config,
            exclude,
            no_default_excludes,
        } => cmd_scan(
            &root,
            config.as_deref(),
            &Excludes::new(&exclude, !no_default_excludes)?,
        ),
    }
}

struct OrganizeOptions {
    root: PathBuf,
    dry_run: bool,
    output: Option<PathBuf>,
    config: Option<PathBuf>,
    mappings: Vec<(String, String)>,
    excludes: Excludes,
    interactive: bool,
    typecheck: bool,
    commit: bool,
    json: bool,
    verbose: bool,
}

/// An explicit `--config` must load; otherwise the root's config file is
/// used when present.
fn load_config(
    root: &Path,
    explicit: Option<&Path>,
    mappings: Vec<(String, String)>,
) -> Result<OrganizerConfig> {
    let config = match explicit {
        Some(path) => OrganizerConfig::from_file(path)?,
        None => OrganizerConfig::load(root),
    };
    Ok(config.with_destinations(mappings))
}

fn cmd_organize(opts: OrganizeOptions) -> Result<()> {
    let config = load_config(&opts.root, opts.config.as_deref(), opts.mappings)?;
    let organizer = Organizer::new(&opts.root, config)?
        .with_excludes(opts.excludes)
        .verbose(opts.verbose);
    let root = organizer.root().to_path_buf();

    let survey = organizer.survey();

    let proceed = !opts.dry_run && (!opts.interactive || confirm_plan(&survey, &root)?);

    let report = if proceed {
        let mut relocator = Relocator::new(&organizer.config().executable_extensions);
        let execution = organizer.execute(&survey, &mut relocator);

        let mut outcomes = ExternalOutcomes::default();
        if opts.typecheck {
            let outcome = external::typecheck(&root);
            print_tool_outcome("Type check", outcome.status);
            outcomes.typecheck = Some(outcome);
        }
        if opts.commit {
            let outcome = external::commit(
                &root,
                relocator.change_log(),
                execution.extension_fixes(),
            );
            print_tool_outcome("Commit", outcome.status);
            if let Some(detail) = outcome
                .detail
                .as_deref()
                .filter(|_| outcome.status == ToolStatus::Skipped)
            {
                eprintln!("{} Commit skipped: {}", "warn:".yellow().bold(), detail);
            }
            outcomes.commit = Some(outcome);
        }

        Report::build(
            &root,
            organizer.config(),
            &survey,
            Some(&execution),
            relocator.change_log(),
            outcomes,
        )
    } else {
        Report::build(
            &root,
            organizer.config(),
            &survey,
            None,
            &[],
            ExternalOutcomes::default(),
        )
    };

    if let Some(path) = &opts.output {
        std::fs::write(path, report.to_json()?)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        eprintln!("{} Report written to {}", "ok:".green().bold(), path.display());
    }

    if opts.json {
        println!("{}", report.to_json()?);
    } else {
        print_report(&report);
        if opts.dry_run {
            println!(
                "\n{} Run without --dry-run to apply changes",
                "hint:".cyan().bold()
            );
        }
    }

    Ok(())
}

/// Prints the planned relocations and asks whether to go ahead.
fn confirm_plan(survey: &Survey, root: &Path) -> Result<bool> {
    if survey.plans.is_empty() {
        println!("{} No relocations planned", "info:".blue().bold());
    }
    for plan in &survey.plans {
        let label = match plan.decision {
            RelocationDecision::Move | RelocationDecision::UpdateNewer => {
                plan.decision.label().green()
            }
            RelocationDecision::SkipOlder | RelocationDecision::Identical => {
                plan.decision.label().dimmed()
            }
            RelocationDecision::Conflict => plan.decision.label().red(),
        };
        println!(
            "  {:>12} {} -> {}",
            label,
            relative(root, &plan.source).display(),
            relative(root, &plan.destination).display()
        );
    }

    let confirmed = Confirm::new()
        .with_prompt("Apply these changes?")
        .default(false)
        .interact()
        .context("Failed to read confirmation")?;
    if !confirmed {
        eprintln!("{} Aborted, nothing was changed", "info:".blue().bold());
    }
    Ok(confirmed)
}

fn print_tool_outcome(name: &str, status: ToolStatus) {
    match status {
        ToolStatus::Passed => eprintln!("{} {} passed", "ok:".green().bold(), name),
        ToolStatus::Failed => eprintln!("{} {} failed", "error:".red().bold(), name),
        ToolStatus::Skipped => {}
    }
}

fn print_report(report: &Report) {
    print!("{}", report::render_summary(report));

    let s = &report.summary;
    if s.conflicts > 0 {
        println!(
            "\n{} {} conflict(s) need manual review",
            "warn:".yellow().bold(),
            s.conflicts
        );
    } else if s.broken_imports == 0 {
        println!("\n{} No conflicts or broken imports", "ok:".green().bold());
    }
}

fn cmd_validate(root: &Path, config: Option<&Path>, excludes: Excludes, json: bool) -> Result<()> {
    let config = load_config(root, config, Vec::new())?;
    let organizer = Organizer::new(root, config)?.with_excludes(excludes);
    let survey = organizer.survey();
    let report = Report::build(
        organizer.root(),
        organizer.config(),
        &survey,
        None,
        &[],
        ExternalOutcomes::default(),
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&report.missing_imports)?);
        return Ok(());
    }

    if report.missing_imports.is_empty() {
        println!(
            "{} All imports resolve ({} source files)",
            "ok:".green().bold(),
            report.summary.source_files
        );
        return Ok(());
    }

    println!(
        "\n{} {} broken import(s):\n",
        "Found".red().bold(),
        report.missing_imports.len()
    );
    for missing in &report.missing_imports {
        let loc = format!("{}:{}", report.display_path(&missing.file), missing.line);
        println!("  {} {}", loc.dimmed(), missing.specifier.red());
    }
    for naming in &report.naming_issues {
        println!(
            "  {} {}",
            report.display_path(&naming.file).to_string().dimmed(),
            naming.message.yellow()
        );
    }

    Ok(())
}

fn cmd_layout(config: Option<&Path>, mappings: Vec<(String, String)>) -> Result<()> {
    let config = load_config(Path::new("."), config, mappings)?;

    println!("{} {}", "Staging:".bold(), config.staging_dir.display());
    println!("{} {}", "Source:".bold(), config.source_dir.display());
    println!("\n{}", "Required directories:".bold());
    for dir in &config.required_dirs {
        println!("  {}", dir.display());
    }

    println!("\n{}", "Destinations:".bold());
    let width = config.destinations.keys().map(|k| k.len()).max().unwrap_or(0);
    for (name, dest) in &config.destinations {
        println!("  {:width$} {} {}", name, "->".green(), dest.display(), width = width);
    }
    println!(
        "  {:width$} {} {}",
        "(other)".dimmed(),
        "->".green(),
        config.fallback_dir.join("<name>").display(),
        width = width
    );

    Ok(())
}

fn cmd_scan(root: &Path, config: Option<&Path>, excludes: &Excludes) -> Result<()> {
    let config = load_config(root, config, Vec::new())?;
    let staged = scanner::collect_files(&root.join(&config.staging_dir), excludes);
    let sources: Vec<PathBuf> = scanner::collect_files(&root.join(&config.source_dir), excludes)
        .into_iter()
        .filter(|p| config.is_source_extension(scanner::extension_of(p)))
        .collect();

    println!("Would scan {} files:", staged.len() + sources.len());
    for file in staged.iter().chain(&sources) {
        println!("  {}", relative(root, file).display());
    }
    Ok(())
}

fn relative<'a>(root: &Path, path: &'a Path) -> &'a Path {
    path.strip_prefix(root).unwrap_or(path)
}
