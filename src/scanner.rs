//! Source tree scanner.
//!
//! Walks the staging area and the source root, building a [`FileRecord`] for
//! every file found (hash, modification time, classification), and extracts
//! import specifiers together with the byte span of the quoted path so the
//! rewriter can replace them in place. Entries whose names start with `.` or
//! `_`, and `node_modules`, are skipped unless default excludes are disabled.

use crate::classifier::{self, Classification};
use crate::config::OrganizerConfig;
use crate::error::{Issue, IssueKind};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use colored::Colorize;
use glob::Pattern;
use regex::Regex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use walkdir::WalkDir;

/// Where a scanned file currently lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    /// In the staging area, waiting for a canonical destination.
    Staged,
    /// Already under the source root.
    InPlace,
}

/// A scanned file. Built fresh on every run.
#[derive(Debug, Clone, Serialize)]
pub struct FileRecord {
    pub path: PathBuf,
    /// Extension without the leading dot, empty when there is none.
    pub current_extension: String,
    /// Lowercase hex SHA-256 of the content, empty when unreadable.
    pub content_hash: String,
    pub modified: DateTime<Utc>,
    pub size: u64,
    pub location: Location,
    pub classification: Classification,
}

impl FileRecord {
    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }
}

/// An import specifier found in source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportSpecifier {
    /// The path between the quotes, e.g. `"../services/auth"`.
    pub specifier: String,
    /// Line number, 1-indexed.
    pub line: usize,
    /// Byte offset of the first character inside the quotes.
    pub start: usize,
    /// Byte offset one past the last character inside the quotes.
    pub end: usize,
}

/// Everything collected by a scan.
#[derive(Debug, Default)]
pub struct Scan {
    pub records: Vec<FileRecord>,
    /// Source text of readable files under the source root or staging area
    /// with a source extension, keyed by path.
    pub sources: Vec<(PathBuf, String)>,
    pub issues: Vec<Issue>,
}

/// Path filter built from user glob patterns plus the default exclusions.
#[derive(Debug, Clone)]
pub struct Excludes {
    patterns: Vec<Pattern>,
    defaults: bool,
}

impl Default for Excludes {
    fn default() -> Self {
        Self {
            patterns: Vec::new(),
            defaults: true,
        }
    }
}

impl Excludes {
    pub fn new(patterns: &[String], defaults: bool) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| Pattern::new(p).with_context(|| format!("Invalid exclude pattern '{}'", p)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns, defaults })
    }

    fn is_excluded(&self, entry: &walkdir::DirEntry) -> bool {
        // The walk root itself is never excluded.
        if entry.depth() == 0 {
            return false;
        }
        let name = entry.file_name().to_str().unwrap_or_default();
        if self.defaults
            && (name.starts_with('.') || name.starts_with('_') || name == "node_modules")
        {
            return true;
        }
        self.patterns
            .iter()
            .any(|p| p.matches(name) || p.matches_path(entry.path()))
    }
}

/// Collects files under `dir`. A missing directory yields nothing; unreadable
/// entries are reported and skipped.
pub fn collect_files(dir: &Path, excludes: &Excludes) -> Vec<PathBuf> {
    walk(dir, excludes, &mut Vec::new())
}

fn walk(dir: &Path, excludes: &Excludes, issues: &mut Vec<Issue>) -> Vec<PathBuf> {
    let mut files = Vec::new();
    if !dir.is_dir() {
        return files;
    }

    for entry in WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !excludes.is_excluded(e))
    {
        match entry {
            Ok(entry) if entry.file_type().is_file() => files.push(entry.into_path()),
            Ok(_) => {}
            Err(e) => {
                eprintln!("{} Skipping unreadable entry: {}", "warn:".yellow().bold(), e);
                let path = e.path().unwrap_or(dir);
                issues.push(Issue::new(IssueKind::ReadError, path, e.to_string()));
            }
        }
    }

    files
}

/// Scans the staging area (every file) and the source root (files with a
/// source extension) under `root`.
///
/// A source file that is not valid UTF-8 is still recorded, with a neutral
/// classification, but its imports are not extracted and a `ReadError` is
/// reported for it.
pub fn scan(root: &Path, config: &OrganizerConfig, excludes: &Excludes) -> Scan {
    let mut scan = Scan::default();

    let staged = walk(&root.join(&config.staging_dir), excludes, &mut scan.issues);
    let in_place = walk(&root.join(&config.source_dir), excludes, &mut scan.issues)
        .into_iter()
        .filter(|p| config.is_source_extension(extension_of(p)));

    let located = staged
        .into_iter()
        .map(|p| (p, Location::Staged))
        .chain(in_place.map(|p| (p, Location::InPlace)));

    for (path, location) in located {
        match read_record(&path, location) {
            Ok((record, content)) => {
                if config.is_source_extension(&record.current_extension) {
                    match content {
                        Some(text) => scan.sources.push((record.path.clone(), text)),
                        None => {
                            eprintln!(
                                "{} {} is not UTF-8 text; not classified",
                                "warn:".yellow().bold(),
                                path.display()
                            );
                            scan.issues.push(Issue::new(
                                IssueKind::ReadError,
                                &path,
                                "not UTF-8 text; classification and imports skipped",
                            ));
                        }
                    }
                }
                scan.records.push(record);
            }
            Err(e) => {
                eprintln!("{} {:#}", "warn:".yellow().bold(), e);
                scan.issues.push(Issue::new(IssueKind::ReadError, &path, format!("{:#}", e)));
            }
        }
    }

    scan
}

/// Reads one file into a record. Returns the decoded text as well when the
/// content is valid UTF-8.
pub fn read_record(path: &Path, location: Location) -> Result<(FileRecord, Option<String>)> {
    let metadata =
        std::fs::metadata(path).with_context(|| format!("Failed to stat {}", path.display()))?;
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let modified = metadata
        .modified()
        .with_context(|| format!("No modification time for {}", path.display()))?;

    let extension = extension_of(path);
    let classification = classifier::classify_bytes(&bytes, extension);
    let content_hash = content_hash(&bytes);
    let text = String::from_utf8(bytes).ok();

    let record = FileRecord {
        path: path.to_path_buf(),
        current_extension: extension.to_string(),
        content_hash,
        modified: DateTime::<Utc>::from(modified),
        size: metadata.len(),
        location,
        classification,
    };

    Ok((record, text))
}

pub fn content_hash(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

pub fn extension_of(path: &Path) -> &str {
    path.extension().and_then(|e| e.to_str()).unwrap_or_default()
}

fn regex(pattern: &str) -> Regex {
    Regex::new(pattern).expect("valid regex literal")
}

/// Import forms recognised in source text. Each pattern captures the quoted
/// specifier in group 1.
fn import_patterns() -> &'static [Regex] {
    static RE: OnceLock<Vec<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        [
            // import x from '...', import { a, b } from "...", import type ...
            r#"(?m)^[ \t]*import\s+[^;'"]*?\bfrom\s*["']([^"'\n]+)["']"#,
            // import '...'
            r#"(?m)^[ \t]*import\s*["']([^"'\n]+)["']"#,
            // export { a } from '...', export * from '...'
            r#"(?m)^[ \t]*export\s+[^;'"]*?\bfrom\s*["']([^"'\n]+)["']"#,
            // import('...')
            r#"\bimport\s*\(\s*["']([^"'\n]+)["']\s*\)"#,
            // require('...')
            r#"\brequire\s*\(\s*["']([^"'\n]+)["']\s*\)"#,
        ]
        .into_iter()
        .map(regex)
        .collect()
    })
}

/// Extracts import specifiers from source text, ordered by position.
pub fn extract_imports(source: &str) -> Vec<ImportSpecifier> {
    let mut found: Vec<ImportSpecifier> = Vec::new();

    for re in import_patterns() {
        for caps in re.captures_iter(source) {
            let Some(m) = caps.get(1) else { continue };
            if found.iter().any(|f| f.start == m.start()) {
                continue;
            }
            found.push(ImportSpecifier {
                specifier: m.as_str().to_string(),
                line: offset_to_line(source, m.start()),
                start: m.start(),
                end: m.end(),
            });
        }
    }

    found.sort_by_key(|f| f.start);
    found
}

fn offset_to_line(source: &str, offset: usize) -> usize {
    source.as_bytes()[..offset.min(source.len())]
        .iter()
        .filter(|&&b| b == b'\n')
        .count()
        + 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn specifiers(source: &str) -> Vec<String> {
        extract_imports(source)
            .into_iter()
            .map(|i| i.specifier)
            .collect()
    }

    fn fixture_root() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/staged-project")
    }

    #[test]
    fn extracts_default_and_named_imports() {
        let source = r#"
import React from 'react';
import { login, logout } from "../services/auth";
import type { User } from './types';
"#;
        assert_eq!(
            specifiers(source),
            vec!["react", "../services/auth", "./types"]
        );
    }

    #[test]
    fn extracts_multiline_named_import() {
        let source = "import {\n  a,\n  b,\n} from './letters';\n";
        let imports = extract_imports(source);
        assert_eq!(imports.len(), 1);
        assert_eq!(imports[0].specifier, "./letters");
        assert_eq!(imports[0].line, 4);
    }

    #[test]
    fn extracts_side_effect_reexport_dynamic_and_require() {
        let source = r#"import './polyfills';
export * from './api';
export { thing } from './thing';
const lazy = import('./Lazy');
const legacy = require('../legacy');
"#;
        assert_eq!(
            specifiers(source),
            vec!["./polyfills", "./api", "./thing", "./Lazy", "../legacy"]
        );
    }

    #[test]
    fn ignores_commented_out_imports() {
        let source = "// import x from './gone';\nconst s = \"from './gone'\";\n";
        assert!(specifiers(source).is_empty());
    }

    #[test]
    fn spans_cover_specifier_text() {
        let source = "import a from './alpha';\n";
        let imports = extract_imports(source);
        let span = &source[imports[0].start..imports[0].end];
        assert_eq!(span, "./alpha");
        assert_eq!(imports[0].line, 1);
    }

    #[test]
    fn content_hash_is_stable() {
        assert_eq!(content_hash(b"abc"), content_hash(b"abc"));
        assert_eq!(
            content_hash(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn collects_files_skipping_hidden_and_underscore() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        std::fs::create_dir_all(root.join("src/.cache")).unwrap();
        std::fs::create_dir_all(root.join("src/_drafts")).unwrap();
        std::fs::write(root.join("src/a.ts"), "").unwrap();
        std::fs::write(root.join("src/.cache/b.ts"), "").unwrap();
        std::fs::write(root.join("src/_drafts/c.ts"), "").unwrap();

        let excludes = Excludes::new(&[], true).unwrap();
        let files = collect_files(&root.join("src"), &excludes);
        assert_eq!(files, vec![root.join("src/a.ts")]);

        let no_defaults = Excludes::new(&[], false).unwrap();
        assert_eq!(collect_files(&root.join("src"), &no_defaults).len(), 3);
    }

    #[test]
    fn exclude_patterns_match_file_names() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::write(root.join("src/keep.ts"), "").unwrap();
        std::fs::write(root.join("src/skip.generated.ts"), "").unwrap();

        let excludes = Excludes::new(&["*.generated.ts".to_string()], true).unwrap();
        let files = collect_files(&root.join("src"), &excludes);
        assert_eq!(files, vec![root.join("src/keep.ts")]);
    }

    #[test]
    fn invalid_exclude_pattern_is_rejected() {
        assert!(Excludes::new(&["[".to_string()], true).is_err());
    }

    #[test]
    fn missing_directory_collects_nothing() {
        let temp = TempDir::new().unwrap();
        let excludes = Excludes::default();
        assert!(collect_files(&temp.path().join("nope"), &excludes).is_empty());
    }

    #[test]
    fn scans_fixture_project() {
        let root = fixture_root();
        let config = OrganizerConfig::default();
        let excludes = Excludes::new(&[], true).unwrap();
        let scan = scan(&root, &config, &excludes);

        let mut staged: Vec<_> = scan
            .records
            .iter()
            .filter(|r| r.location == Location::Staged)
            .map(|r| r.file_name().to_string())
            .collect();
        staged.sort();
        assert_eq!(
            staged,
            vec!["auth_service.ts", "login_form.ts", "test_runner.sh"]
        );

        let in_place = scan
            .records
            .iter()
            .filter(|r| r.location == Location::InPlace)
            .count();
        assert_eq!(in_place, 3);
        assert!(scan.issues.is_empty());
    }

    #[test]
    fn fixture_login_form_is_classified_as_markup() {
        let path = fixture_root().join("downloads/login_form.ts");
        let (record, text) = read_record(&path, Location::Staged).unwrap();
        assert!(text.is_some());
        assert_eq!(record.classification.suggested_extension, "tsx");
        assert_eq!(record.classification.confidence, 0.9);
    }

    #[test]
    fn undecodable_sources_are_read_errors() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        std::fs::create_dir_all(root.join("downloads")).unwrap();
        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::write(root.join("downloads/blob.ts"), [0x89, b'P', 0x00, 0xff]).unwrap();
        std::fs::write(root.join("downloads/logo.png"), [0x89, b'P', b'N', b'G']).unwrap();
        std::fs::write(root.join("src/bad.ts"), [0xff, 0xfe]).unwrap();
        std::fs::write(root.join("src/good.ts"), "export {};\n").unwrap();

        let scan = scan(root, &OrganizerConfig::default(), &Excludes::default());

        assert_eq!(scan.records.len(), 4);
        let mut unreadable: Vec<_> = scan
            .issues
            .iter()
            .filter(|i| i.kind == IssueKind::ReadError)
            .map(|i| i.file.clone())
            .collect();
        unreadable.sort();
        assert_eq!(
            unreadable,
            vec![root.join("downloads/blob.ts"), root.join("src/bad.ts")]
        );
        assert_eq!(scan.sources, vec![(root.join("src/good.ts"), "export {};\n".to_string())]);
        let blob = scan
            .records
            .iter()
            .find(|r| r.path == root.join("downloads/blob.ts"))
            .unwrap();
        assert_eq!(blob.classification.confidence, 0.0);
    }
}
