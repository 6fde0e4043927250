//! Import specifier rewriting.
//!
//! After files move, relative imports that pointed at them (or were written
//! inside them) go stale. This module computes the corrected specifiers and
//! splices them into source text using the byte spans found by
//! [`extract_imports`], applied from the end of the file backwards so earlier
//! offsets stay valid. Text that merely looks like a specifier (comments,
//! string literals) is never touched.

use crate::error::RelocateError;
use crate::resolver::{ImportEdge, Strategy};
use crate::scanner::extract_imports;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Replace every import of `raw` with `replacement`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecifierEdit {
    pub raw: String,
    pub replacement: String,
}

/// What happened to a file during execution, as far as imports care.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relocated {
    /// The content now lives at the new path (moved or replaced the
    /// destination).
    Carried(PathBuf),
    /// The file was dropped in favour of an existing file at this path.
    Superseded(PathBuf),
    /// The file was set aside for manual review.
    Quarantined,
}

#[derive(Debug, Clone)]
struct Replacement {
    start: usize,
    end: usize,
    new_text: String,
}

/// Rewrites the specifiers named in `edits` wherever they appear as the path
/// of an import statement in `content`.
pub fn rewrite(content: &str, edits: &[SpecifierEdit]) -> String {
    let mut replacements: Vec<Replacement> = extract_imports(content)
        .into_iter()
        .filter_map(|import| {
            edits
                .iter()
                .find(|edit| edit.raw == import.specifier)
                .map(|edit| Replacement {
                    start: import.start,
                    end: import.end,
                    new_text: edit.replacement.clone(),
                })
        })
        .collect();

    replacements.sort_by(|a, b| b.start.cmp(&a.start));

    let mut result = content.to_string();
    for rep in replacements {
        if rep.start <= rep.end && rep.end <= result.len() {
            result.replace_range(rep.start..rep.end, &rep.new_text);
        }
    }
    result
}

/// Applies `edits` to `file` in place. Returns whether the file changed.
pub fn apply_edits(file: &Path, edits: &[SpecifierEdit]) -> Result<bool, RelocateError> {
    let to_err = |source| RelocateError::Rewrite {
        path: file.to_path_buf(),
        source,
    };
    let content = fs::read_to_string(file).map_err(to_err)?;
    let updated = rewrite(&content, edits);
    if updated == content {
        return Ok(false);
    }
    fs::write(file, updated).map_err(to_err)?;
    Ok(true)
}

/// Relative specifier from `from_file` to `target`, always starting with
/// `./` or `../`. The extension is dropped unless `keep_extension` is set.
/// Returns `None` when the two paths share no common root.
pub fn relative_specifier(from_file: &Path, target: &Path, keep_extension: bool) -> Option<String> {
    let from_dir = from_file.parent()?;
    let target = if keep_extension {
        target.to_path_buf()
    } else {
        target.with_extension("")
    };

    let from: Vec<Component> = from_dir.components().collect();
    let to: Vec<Component> = target.components().collect();
    let common = from.iter().zip(&to).take_while(|(a, b)| a == b).count();
    if common == 0 || common == to.len() {
        return None;
    }

    let mut parts: Vec<String> = vec!["..".to_string(); from.len() - common];
    parts.extend(
        to[common..]
            .iter()
            .map(|c| c.as_os_str().to_string_lossy().into_owned()),
    );

    let joined = parts.join("/");
    if joined.starts_with("..") {
        Some(joined)
    } else {
        Some(format!("./{}", joined))
    }
}

/// `/`-anchored specifier for `target` under `source_root`, or `None` when
/// the target lies outside it.
pub fn root_specifier(source_root: &Path, target: &Path, keep_extension: bool) -> Option<String> {
    let target = if keep_extension {
        target.to_path_buf()
    } else {
        target.with_extension("")
    };
    let rest = target.strip_prefix(source_root).ok()?;
    let parts: Vec<String> = rest
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        return None;
    }
    Some(format!("/{}", parts.join("/")))
}

/// Computes the edits needed after the relocations in `moved` (keyed by the
/// original path). The result is keyed by the path of the file to rewrite as
/// it exists after execution.
///
/// Resolved relative edges are rewritten when their origin or target moved.
/// Root-relative edges are rewritten only when their target moved, staying
/// anchored at `source_root` while the target remains under it. Alias
/// specifiers survive moves unchanged, and broken ones are left for the
/// missing-import report.
pub fn plan_rewrites(
    edges: &[ImportEdge],
    moved: &BTreeMap<PathBuf, Relocated>,
    source_root: &Path,
) -> BTreeMap<PathBuf, Vec<SpecifierEdit>> {
    let mut plans: BTreeMap<PathBuf, Vec<SpecifierEdit>> = BTreeMap::new();

    for edge in edges {
        if edge.strategy == Strategy::AliasPrefixed {
            continue;
        }
        let Some(target) = &edge.resolved_target else {
            continue;
        };

        let origin = match moved.get(&edge.from_file) {
            None => edge.from_file.clone(),
            Some(Relocated::Carried(path)) => path.clone(),
            Some(_) => continue,
        };
        let new_target = match moved.get(target) {
            None => target.clone(),
            Some(Relocated::Carried(path) | Relocated::Superseded(path)) => path.clone(),
            Some(Relocated::Quarantined) => continue,
        };
        let target_moved = &new_target != target;
        if !target_moved && (edge.strategy == Strategy::RootRelative || origin == edge.from_file) {
            continue;
        }

        let keep_extension = Path::new(&edge.raw_specifier).extension() == target.extension();
        let replacement = match edge.strategy {
            Strategy::RootRelative => root_specifier(source_root, &new_target, keep_extension)
                .or_else(|| relative_specifier(&origin, &new_target, keep_extension)),
            _ => relative_specifier(&origin, &new_target, keep_extension),
        };
        let Some(replacement) = replacement else {
            continue;
        };
        if replacement == edge.raw_specifier {
            continue;
        }

        let edits = plans.entry(origin).or_default();
        if !edits.iter().any(|e| e.raw == edge.raw_specifier) {
            edits.push(SpecifierEdit {
                raw: edge.raw_specifier.clone(),
                replacement,
            });
        }
    }

    plans
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn edit(raw: &str, replacement: &str) -> SpecifierEdit {
        SpecifierEdit {
            raw: raw.to_string(),
            replacement: replacement.to_string(),
        }
    }

    fn edge(from: &str, raw: &str, target: Option<&str>, strategy: Strategy) -> ImportEdge {
        ImportEdge {
            from_file: PathBuf::from(from),
            raw_specifier: raw.to_string(),
            line: 1,
            strategy,
            resolved_target: target.map(PathBuf::from),
            candidate: None,
        }
    }

    #[test]
    fn replaces_single_import() {
        let content = "import { login } from './auth';\n";
        let result = rewrite(content, &[edit("./auth", "../services/authService")]);
        assert_eq!(result, "import { login } from '../services/authService';\n");
    }

    #[test]
    fn replaces_every_statement_with_the_same_specifier() {
        let content = "import a from './x';\nexport { b } from './x';\n";
        let result = rewrite(content, &[edit("./x", "./y")]);
        assert_eq!(result, "import a from './y';\nexport { b } from './y';\n");
    }

    #[test]
    fn handles_different_length_replacements() {
        let content = "import a from './a';\nimport b from './bbbbbb';\n";
        let result = rewrite(
            content,
            &[edit("./a", "../very/long/path/a"), edit("./bbbbbb", "./b")],
        );
        assert_eq!(
            result,
            "import a from '../very/long/path/a';\nimport b from './b';\n"
        );
    }

    #[test]
    fn does_not_modify_comments_or_strings_with_same_text() {
        let content = "// moved from './auth'\nimport { login } from './auth';\nconst note = \"./auth\";\n";
        let result = rewrite(content, &[edit("./auth", "./authService")]);
        assert_eq!(
            result,
            "// moved from './auth'\nimport { login } from './authService';\nconst note = \"./auth\";\n"
        );
    }

    #[test]
    fn leaves_library_imports_alone() {
        let content = "import React from 'react';\nimport x from './x';\n";
        let result = rewrite(content, &[edit("./x", "./lib/x")]);
        assert_eq!(result, "import React from 'react';\nimport x from './lib/x';\n");
    }

    #[test]
    fn empty_edits_return_original() {
        let content = "import x from './x';\n";
        assert_eq!(rewrite(content, &[]), content);
    }

    #[test]
    fn relative_specifier_walks_up_and_down() {
        assert_eq!(
            relative_specifier(
                Path::new("/p/src/screens/Home.tsx"),
                Path::new("/p/src/services/authService.ts"),
                false
            ),
            Some("../services/authService".to_string())
        );
        assert_eq!(
            relative_specifier(
                Path::new("/p/src/App.tsx"),
                Path::new("/p/src/components/Button.tsx"),
                false
            ),
            Some("./components/Button".to_string())
        );
        assert_eq!(
            relative_specifier(
                Path::new("/p/src/a.ts"),
                Path::new("/p/src/data.json"),
                true
            ),
            Some("./data.json".to_string())
        );
    }

    #[test]
    fn relative_specifier_keeps_inner_dots() {
        assert_eq!(
            relative_specifier(
                Path::new("/p/src/App.tsx"),
                Path::new("/p/src/services/lesson.service.ts"),
                false
            ),
            Some("./services/lesson.service".to_string())
        );
    }

    #[test]
    fn plans_edit_for_moved_target() {
        let edges = vec![edge(
            "/p/src/screens/Login.tsx",
            "../../downloads/auth_service",
            Some("/p/downloads/auth_service.ts"),
            Strategy::Relative,
        )];
        let moved = BTreeMap::from([(
            PathBuf::from("/p/downloads/auth_service.ts"),
            Relocated::Carried(PathBuf::from("/p/src/services/authService.ts")),
        )]);

        let plans = plan_rewrites(&edges, &moved, Path::new("/p/src"));
        assert_eq!(
            plans.get(Path::new("/p/src/screens/Login.tsx")),
            Some(&vec![edit(
                "../../downloads/auth_service",
                "../services/authService"
            )])
        );
    }

    #[test]
    fn plans_edit_inside_moved_origin() {
        let edges = vec![edge(
            "/p/src/utils/form.ts",
            "./helpers",
            Some("/p/src/utils/helpers.ts"),
            Strategy::Relative,
        )];
        let moved = BTreeMap::from([(
            PathBuf::from("/p/src/utils/form.ts"),
            Relocated::Carried(PathBuf::from("/p/src/components/form.tsx")),
        )]);

        let plans = plan_rewrites(&edges, &moved, Path::new("/p/src"));
        assert_eq!(
            plans.get(Path::new("/p/src/components/form.tsx")),
            Some(&vec![edit("./helpers", "../utils/helpers")])
        );
    }

    #[test]
    fn superseded_target_redirects_to_surviving_file() {
        let edges = vec![edge(
            "/p/src/index.ts",
            "../downloads/App",
            Some("/p/downloads/App.ts"),
            Strategy::Relative,
        )];
        let moved = BTreeMap::from([(
            PathBuf::from("/p/downloads/App.ts"),
            Relocated::Superseded(PathBuf::from("/p/src/App.tsx")),
        )]);
        let plans = plan_rewrites(&edges, &moved, Path::new("/p/src"));
        assert_eq!(
            plans.get(Path::new("/p/src/index.ts")),
            Some(&vec![edit("../downloads/App", "./App")])
        );
    }

    #[test]
    fn skips_alias_broken_and_quarantined_edges() {
        let edges = vec![
            edge(
                "/p/src/App.tsx",
                "@/services/auth",
                Some("/p/src/services/auth.ts"),
                Strategy::AliasPrefixed,
            ),
            edge("/p/src/App.tsx", "./gone", None, Strategy::Relative),
            edge(
                "/p/src/App.tsx",
                "../downloads/x",
                Some("/p/downloads/x.ts"),
                Strategy::Relative,
            ),
        ];
        let moved = BTreeMap::from([
            (
                PathBuf::from("/p/src/services/auth.ts"),
                Relocated::Carried(PathBuf::from("/p/src/services/authService.ts")),
            ),
            (PathBuf::from("/p/downloads/x.ts"), Relocated::Quarantined),
        ]);
        assert!(plan_rewrites(&edges, &moved, Path::new("/p/src")).is_empty());
    }

    #[test]
    fn extension_fix_keeps_explicit_extension_style() {
        let edges = vec![edge(
            "/p/src/App.tsx",
            "./widget.ts",
            Some("/p/src/widget.ts"),
            Strategy::Relative,
        )];
        let moved = BTreeMap::from([(
            PathBuf::from("/p/src/widget.ts"),
            Relocated::Carried(PathBuf::from("/p/src/widget.tsx")),
        )]);
        let plans = plan_rewrites(&edges, &moved, Path::new("/p/src"));
        assert_eq!(
            plans.get(Path::new("/p/src/App.tsx")),
            Some(&vec![edit("./widget.ts", "./widget.tsx")])
        );
    }

    #[test]
    fn root_relative_edge_follows_moved_target() {
        let edges = vec![
            edge(
                "/p/src/App.tsx",
                "/components/Card.ts",
                Some("/p/src/components/Card.ts"),
                Strategy::RootRelative,
            ),
            edge(
                "/p/src/App.tsx",
                "/components/Card",
                Some("/p/src/components/Card.ts"),
                Strategy::RootRelative,
            ),
        ];
        let moved = BTreeMap::from([(
            PathBuf::from("/p/src/components/Card.ts"),
            Relocated::Carried(PathBuf::from("/p/src/components/Card.tsx")),
        )]);
        let plans = plan_rewrites(&edges, &moved, Path::new("/p/src"));
        // the extension-less form still resolves, so only one edit is needed
        assert_eq!(
            plans.get(Path::new("/p/src/App.tsx")),
            Some(&vec![edit("/components/Card.ts", "/components/Card.tsx")])
        );
    }

    #[test]
    fn root_relative_edge_ignores_moved_origin() {
        let edges = vec![edge(
            "/p/src/utils/form.ts",
            "/services/auth",
            Some("/p/src/services/auth.ts"),
            Strategy::RootRelative,
        )];
        let moved = BTreeMap::from([(
            PathBuf::from("/p/src/utils/form.ts"),
            Relocated::Carried(PathBuf::from("/p/src/components/form.tsx")),
        )]);
        assert!(plan_rewrites(&edges, &moved, Path::new("/p/src")).is_empty());
    }

    #[test]
    fn root_relative_target_leaving_source_root_becomes_relative() {
        let edges = vec![edge(
            "/p/src/App.tsx",
            "/tools/run",
            Some("/p/src/tools/run.ts"),
            Strategy::RootRelative,
        )];
        let moved = BTreeMap::from([(
            PathBuf::from("/p/src/tools/run.ts"),
            Relocated::Carried(PathBuf::from("/p/scripts/run.ts")),
        )]);
        let plans = plan_rewrites(&edges, &moved, Path::new("/p/src"));
        assert_eq!(
            plans.get(Path::new("/p/src/App.tsx")),
            Some(&vec![edit("/tools/run", "../scripts/run")])
        );
    }

    #[test]
    fn apply_edits_writes_only_on_change() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("App.tsx");
        std::fs::write(&file, "import x from './x';\n").unwrap();

        assert!(!apply_edits(&file, &[edit("./y", "./z")]).unwrap());
        assert!(apply_edits(&file, &[edit("./x", "./lib/x")]).unwrap());
        assert_eq!(
            std::fs::read_to_string(&file).unwrap(),
            "import x from './lib/x';\n"
        );
    }

    #[test]
    fn apply_edits_reports_missing_file() {
        let temp = TempDir::new().unwrap();
        let err = apply_edits(&temp.path().join("gone.ts"), &[edit("./a", "./b")]).unwrap_err();
        assert!(matches!(err, RelocateError::Rewrite { .. }));
    }
}
