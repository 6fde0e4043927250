//! Command-line interface definitions.
//!
//! Defines the argument parser and subcommands using clap's derive API:
//! organizing a project, validating its import graph, printing the canonical
//! layout, or listing scan targets.

use crate::config::parse_mapping;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Move staged source files into a canonical layout and keep imports valid.
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Classify, relocate and rewrite imports in one run.
    Organize {
        /// Project root. Defaults to the current directory.
        #[arg(short, long, default_value = ".")]
        root: PathBuf,

        /// Plan everything and print the report without touching any file.
        #[arg(long)]
        dry_run: bool,

        /// Write the JSON report to this file.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Configuration file. Defaults to `.tree-tidy.toml` in the root, if present.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Destination overrides in `name=path` format, relative to the root.
        #[arg(long = "map", value_parser = parse_mapping)]
        mappings: Vec<(String, String)>,

        /// Glob patterns for directories/files to exclude (e.g., "*.generated.ts").
        /// By default, entries starting with `.` or `_` and `node_modules` are excluded.
        #[arg(short, long)]
        exclude: Vec<String>,

        /// Disable default exclusion of `.`/`_` prefixed entries and `node_modules`.
        #[arg(long)]
        no_default_excludes: bool,

        /// Show the plan and ask for confirmation before executing it.
        #[arg(short, long)]
        interactive: bool,

        /// Run `npx tsc --noEmit` after executing.
        #[arg(long)]
        typecheck: bool,

        /// Commit the result with git unless conflicts need review.
        #[arg(long)]
        commit: bool,

        /// Emit the JSON report on stdout instead of the summary.
        #[arg(long)]
        json: bool,

        /// Print additional diagnostics to stderr.
        #[arg(short, long)]
        verbose: bool,
    },

    /// Check the import graph of files already in the source tree.
    Validate {
        /// Project root. Defaults to the current directory.
        #[arg(short, long, default_value = ".")]
        root: PathBuf,

        /// Configuration file. Defaults to `.tree-tidy.toml` in the root, if present.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Glob patterns for directories/files to exclude.
        #[arg(short, long)]
        exclude: Vec<String>,

        /// Disable default exclusion of `.`/`_` prefixed entries and `node_modules`.
        #[arg(long)]
        no_default_excludes: bool,

        /// Emit JSON instead of human-readable output.
        #[arg(long)]
        json: bool,
    },

    /// Print the effective directory layout and destination table.
    Layout {
        /// Configuration file.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Destination overrides in `name=path` format.
        #[arg(long = "map", value_parser = parse_mapping)]
        mappings: Vec<(String, String)>,
    },

    /// List files that would be scanned without processing them.
    Scan {
        /// Project root. Defaults to the current directory.
        #[arg(short, long, default_value = ".")]
        root: PathBuf,

        /// Configuration file. Defaults to `.tree-tidy.toml` in the root, if present.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Glob patterns for directories/files to exclude.
        #[arg(short, long)]
        exclude: Vec<String>,

        /// Disable default exclusion of `.`/`_` prefixed entries and `node_modules`.
        #[arg(long)]
        no_default_excludes: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn parses_organize_flags() {
        let args = Args::try_parse_from([
            "tree-tidy",
            "organize",
            "--root",
            "app",
            "--dry-run",
            "--map",
            "foo.ts=src/lib/foo.ts",
            "--exclude",
            "*.generated.ts",
        ])
        .unwrap();
        match args.command {
            Commands::Organize {
                root,
                dry_run,
                mappings,
                exclude,
                commit,
                ..
            } => {
                assert_eq!(root, PathBuf::from("app"));
                assert!(dry_run);
                assert!(!commit);
                assert_eq!(
                    mappings,
                    vec![("foo.ts".to_string(), "src/lib/foo.ts".to_string())]
                );
                assert_eq!(exclude, vec!["*.generated.ts".to_string()]);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn rejects_malformed_mapping() {
        let result = Args::try_parse_from(["tree-tidy", "layout", "--map", "no-equals-sign"]);
        assert!(result.is_err());
    }
}
