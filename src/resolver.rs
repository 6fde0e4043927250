//! Import specifier resolution.
//!
//! Maps a specifier as written in source (`./Button`, `@/services/auth`,
//! `/types`) to the file it refers to. Library specifiers (`react`,
//! `@supabase/supabase-js`) are never resolved; they are assumed to come from
//! the package manager.

use crate::config::OrganizerConfig;
use crate::scanner::ImportSpecifier;
use serde::Serialize;
use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

/// How a specifier is anchored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// `./x`, `../x`: relative to the importing file's directory.
    Relative,
    /// `@/x`: an alias prefix standing for a configured directory.
    AliasPrefixed,
    /// `/x`: relative to the source root.
    RootRelative,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved { strategy: Strategy, path: PathBuf },
    /// The specifier is resolvable in principle but names no existing file.
    /// `candidate` is the normalised path that was probed, if the specifier
    /// stayed inside the root.
    Missing {
        strategy: Strategy,
        candidate: Option<PathBuf>,
    },
    /// Library-style specifier; out of scope.
    NotAttempted,
}

/// A resolvable import found in a file. `resolved_target` is `None` for a
/// broken reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportEdge {
    pub from_file: PathBuf,
    pub raw_specifier: String,
    pub line: usize,
    pub strategy: Strategy,
    pub resolved_target: Option<PathBuf>,
    /// Normalised path that was probed, kept for reporting broken edges.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate: Option<PathBuf>,
}

impl ImportEdge {
    pub fn is_broken(&self) -> bool {
        self.resolved_target.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
    source_root: PathBuf,
    /// Alias prefix and absolute directory, longest prefix first.
    aliases: Vec<(String, PathBuf)>,
    extensions: Vec<String>,
}

impl PathResolver {
    /// `root` must be absolute and normalised (the pipeline canonicalises it).
    pub fn new(root: &Path, config: &OrganizerConfig) -> Self {
        Self {
            root: root.to_path_buf(),
            source_root: root.join(&config.source_dir),
            aliases: config
                .alias_prefixes()
                .into_iter()
                .map(|(prefix, dir)| (prefix.to_string(), root.join(dir)))
                .collect(),
            extensions: config.probe_extensions.clone(),
        }
    }

    /// Picks the strategy for a specifier, returning the directory it is
    /// anchored at and the remainder to join onto it.
    fn anchor<'a>(&self, specifier: &'a str, origin: &Path) -> Option<(Strategy, PathBuf, &'a str)> {
        if is_relative(specifier) {
            let dir = origin.parent()?.to_path_buf();
            return Some((Strategy::Relative, dir, specifier));
        }

        for (prefix, dir) in &self.aliases {
            if let Some(rest) = specifier.strip_prefix(prefix.as_str()) {
                return Some((
                    Strategy::AliasPrefixed,
                    dir.clone(),
                    rest.trim_start_matches('/'),
                ));
            }
        }

        if let Some(rest) = specifier.strip_prefix('/') {
            return Some((Strategy::RootRelative, self.source_root.clone(), rest));
        }

        None
    }

    /// Classifies a specifier without touching the filesystem.
    pub fn strategy_for(&self, specifier: &str) -> Option<Strategy> {
        if is_relative(specifier) {
            return Some(Strategy::Relative);
        }
        if self
            .aliases
            .iter()
            .any(|(prefix, _)| specifier.starts_with(prefix.as_str()))
        {
            return Some(Strategy::AliasPrefixed);
        }
        specifier.starts_with('/').then_some(Strategy::RootRelative)
    }

    /// Resolves `specifier` as written in `origin`.
    pub fn resolve(&self, specifier: &str, origin: &Path) -> Resolution {
        let Some((strategy, base, rest)) = self.anchor(specifier, origin) else {
            return Resolution::NotAttempted;
        };

        let Some(candidate) = normalize_within(&self.root, &base.join(rest)) else {
            return Resolution::Missing {
                strategy,
                candidate: None,
            };
        };

        match self.probe(&candidate) {
            Some(path) => Resolution::Resolved { strategy, path },
            None => Resolution::Missing {
                strategy,
                candidate: Some(candidate),
            },
        }
    }

    /// Resolves every in-scope import of `file`. Library imports produce no
    /// edge.
    pub fn edges(&self, file: &Path, imports: &[ImportSpecifier]) -> Vec<ImportEdge> {
        imports
            .iter()
            .filter_map(|import| {
                let (strategy, resolved_target, candidate) =
                    match self.resolve(&import.specifier, file) {
                        Resolution::NotAttempted => return None,
                        Resolution::Resolved { strategy, path } => (strategy, Some(path), None),
                        Resolution::Missing {
                            strategy,
                            candidate,
                        } => (strategy, None, candidate),
                    };
                Some(ImportEdge {
                    from_file: file.to_path_buf(),
                    raw_specifier: import.specifier.clone(),
                    line: import.line,
                    strategy,
                    resolved_target,
                    candidate,
                })
            })
            .collect()
    }

    /// Finds the file a normalised candidate names. Paths without a known
    /// extension try each probe extension in order before the bare path, so
    /// `./lesson.service` still finds `lesson.service.ts`.
    fn probe(&self, candidate: &Path) -> Option<PathBuf> {
        let has_known_extension = candidate
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e == ext));

        if !has_known_extension {
            for ext in &self.extensions {
                let mut name = candidate.as_os_str().to_owned();
                name.push(".");
                name.push(ext);
                let with_ext = PathBuf::from(name);
                if with_ext.is_file() {
                    return Some(with_ext);
                }
            }
        }

        candidate.is_file().then(|| candidate.to_path_buf())
    }
}

pub fn is_relative(specifier: &str) -> bool {
    specifier.starts_with("./")
        || specifier.starts_with("../")
        || specifier == "."
        || specifier == ".."
}

/// Lexically normalises `path` (which must start with `root`), popping a
/// component for every `..`. Returns `None` if the path escapes `root`.
pub fn normalize_within(root: &Path, path: &Path) -> Option<PathBuf> {
    let relative = path.strip_prefix(root).ok()?;
    let mut parts: Vec<&OsStr> = Vec::new();

    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                parts.pop()?;
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    Some(parts.iter().fold(root.to_path_buf(), |acc, part| acc.join(part)))
}
