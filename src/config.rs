//! Project layout configuration.
//!
//! Everything the engine needs to know about a particular project lives here:
//! where staged files wait, which directories must exist, where each staged
//! filename belongs, which import aliases map to which roots, and how
//! confident the classifier must be before a correction is applied.
//!
//! Defaults describe a React/TypeScript app with `src/` and a `downloads/`
//! staging area. A `.tree-tidy.toml` at the project root (or an explicit file)
//! overrides any subset of the fields; tables given in a file replace the
//! defaults wholesale.

use anyhow::{Context, Result};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Name of the optional per-project configuration file.
pub const CONFIG_FILE_NAME: &str = ".tree-tidy.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrganizerConfig {
    /// Directory holding not-yet-placed files, relative to the root.
    pub staging_dir: PathBuf,
    /// Canonical source root, relative to the root.
    pub source_dir: PathBuf,
    /// Directories created before anything is relocated.
    pub required_dirs: Vec<PathBuf>,
    /// Staged filename to canonical path (relative to the root).
    pub destinations: BTreeMap<String, PathBuf>,
    /// Bucket for staged files missing from `destinations`.
    pub fallback_dir: PathBuf,
    /// Import alias prefix to the directory it stands for. Longest prefix wins.
    pub aliases: BTreeMap<String, PathBuf>,
    /// Extensions tried, in order, when a specifier has none.
    pub probe_extensions: Vec<String>,
    /// Extensions of files under the source root that are scanned.
    pub source_extensions: Vec<String>,
    /// Extensions that receive the executable bit after relocation.
    pub executable_extensions: Vec<String>,
    /// Classifier suggestions must score strictly above this to be applied.
    pub acceptance_threshold: f64,
}

impl Default for OrganizerConfig {
    fn default() -> Self {
        Self {
            staging_dir: PathBuf::from("downloads"),
            source_dir: PathBuf::from("src"),
            required_dirs: [
                "src/components",
                "src/services",
                "src/types",
                "src/data/curriculum",
                "src/data/templates",
                "src/data/samples",
                "src/database",
                "src/screens",
                "src/utils",
                "src/constants",
                "database",
                "docs",
                "scripts",
                "tests",
            ]
            .into_iter()
            .map(PathBuf::from)
            .collect(),
            destinations: default_destinations(),
            fallback_dir: PathBuf::from("src/utils"),
            aliases: BTreeMap::from([("@/".to_string(), PathBuf::from("src"))]),
            probe_extensions: strings(&["tsx", "ts", "jsx", "js"]),
            source_extensions: strings(&["ts", "tsx", "js", "jsx"]),
            executable_extensions: strings(&["sh"]),
            acceptance_threshold: 0.6,
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_destinations() -> BTreeMap<String, PathBuf> {
    [
        // Application entry points
        ("app_with_auth.ts", "src/App.tsx"),
        ("App.ts", "src/App.tsx"),
        // Services
        ("auth_service.ts", "src/services/authService.ts"),
        ("encryption_service.ts", "src/services/encryptionService.ts"),
        ("storage_service.ts", "src/services/storageService.ts"),
        ("auth.ts", "src/services/auth.ts"),
        // Types
        ("auth_types.ts", "src/types/auth.ts"),
        ("types.ts", "src/types/index.ts"),
        // Utilities
        ("accessibility_constants.ts", "src/utils/accessibilityConstants.ts"),
        ("accessible_login.ts", "src/utils/accessibleLogin.ts"),
        ("essential_components.ts", "src/utils/essentialComponents.ts"),
        ("database-test.ts", "src/utils/databaseTest.ts"),
        // Scripts
        ("enhanced_setup_auto-fixer.sh", "scripts/enhanced_setup_auto_fixer.sh"),
        ("smart_test_runner.sh", "scripts/smart_test_runner.sh"),
        ("test_runner.sh", "scripts/test_runner.sh"),
        // Data
        ("sample_curriculum_data.json", "src/data/sampleCurriculumData.json"),
        ("supabase_schema.sql", "database/schema.sql"),
        ("performing_arts_curriculum.ts", "src/data/curriculum/performingArts.ts"),
        ("performing_arts_templates.ts", "src/data/templates/performingArts.ts"),
    ]
    .into_iter()
    .map(|(name, dest)| (name.to_string(), PathBuf::from(dest)))
    .collect()
}

impl OrganizerConfig {
    /// Loads `.tree-tidy.toml` from `root`, falling back to defaults when the
    /// file is absent or unparsable.
    pub fn load(root: &Path) -> Self {
        let path = root.join(CONFIG_FILE_NAME);
        if !path.exists() {
            return Self::default();
        }

        match Self::from_file(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("{} {:#}, using defaults", "warn:".yellow().bold(), e);
                Self::default()
            }
        }
    }

    /// Loads an explicitly requested configuration file. Unlike [`load`](Self::load),
    /// a missing or malformed file is an error.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Adds or replaces destination table entries, e.g. from `--map name=path`.
    pub fn with_destinations(mut self, overrides: Vec<(String, String)>) -> Self {
        for (name, dest) in overrides {
            self.destinations.insert(name, PathBuf::from(dest));
        }
        self
    }

    /// Canonical path (relative to the root) for a staged file.
    pub fn destination_for(&self, filename: &str) -> PathBuf {
        self.destinations
            .get(filename)
            .cloned()
            .unwrap_or_else(|| self.fallback_dir.join(filename))
    }

    pub fn is_source_extension(&self, ext: &str) -> bool {
        self.source_extensions.iter().any(|e| e == ext)
    }

    /// Alias prefixes sorted longest first.
    pub fn alias_prefixes(&self) -> Vec<(&str, &Path)> {
        let mut aliases: Vec<_> = self
            .aliases
            .iter()
            .map(|(prefix, dir)| (prefix.as_str(), dir.as_path()))
            .collect();
        aliases.sort_by_key(|(prefix, _)| std::cmp::Reverse(prefix.len()));
        aliases
    }
}

/// Parses a `name=path` destination override.
pub fn parse_mapping(s: &str) -> Result<(String, String), String> {
    let parts: Vec<&str> = s.splitn(2, '=').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(format!("Invalid mapping '{}', expected 'name=path'", s));
    }
    Ok((parts[0].to_string(), parts[1].to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn mapped_filename_uses_table() {
        let config = OrganizerConfig::default();
        assert_eq!(
            config.destination_for("auth_service.ts"),
            PathBuf::from("src/services/authService.ts")
        );
    }

    #[test]
    fn unmapped_filename_falls_back_to_utils() {
        let config = OrganizerConfig::default();
        assert_eq!(
            config.destination_for("random_helper.ts"),
            PathBuf::from("src/utils/random_helper.ts")
        );
    }

    #[test]
    fn overrides_replace_table_entries() {
        let config = OrganizerConfig::default().with_destinations(vec![
            ("auth_service.ts".to_string(), "src/auth/service.ts".to_string()),
            ("extra.ts".to_string(), "src/extra/index.ts".to_string()),
        ]);
        assert_eq!(
            config.destination_for("auth_service.ts"),
            PathBuf::from("src/auth/service.ts")
        );
        assert_eq!(
            config.destination_for("extra.ts"),
            PathBuf::from("src/extra/index.ts")
        );
    }

    #[test]
    fn toml_overrides_subset_of_fields() {
        let config = OrganizerConfig::from_toml(
            r#"
staging_dir = "inbox"
acceptance_threshold = 0.75

[destinations]
"widget.ts" = "src/components/Widget.tsx"
"#,
        )
        .unwrap();
        assert_eq!(config.staging_dir, PathBuf::from("inbox"));
        assert_eq!(config.acceptance_threshold, 0.75);
        assert_eq!(config.destinations.len(), 1);
        assert_eq!(config.source_dir, PathBuf::from("src"));
        assert_eq!(config.probe_extensions, vec!["tsx", "ts", "jsx", "js"]);
    }

    #[test]
    fn load_missing_file_returns_defaults() {
        let temp = TempDir::new().unwrap();
        let config = OrganizerConfig::load(temp.path());
        assert_eq!(config.staging_dir, PathBuf::from("downloads"));
    }

    #[test]
    fn load_reads_project_file() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(CONFIG_FILE_NAME),
            "fallback_dir = \"src/misc\"\n",
        )
        .unwrap();
        let config = OrganizerConfig::load(temp.path());
        assert_eq!(
            config.destination_for("thing.ts"),
            PathBuf::from("src/misc/thing.ts")
        );
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let result = OrganizerConfig::from_file(&temp.path().join("nope.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn alias_prefixes_longest_first() {
        let mut config = OrganizerConfig::default();
        config
            .aliases
            .insert("@/components/".to_string(), PathBuf::from("src/components"));
        let prefixes: Vec<_> = config.alias_prefixes().into_iter().map(|(p, _)| p).collect();
        assert_eq!(prefixes, vec!["@/components/", "@/"]);
    }

    #[test]
    fn parse_mapping_valid() {
        assert_eq!(
            parse_mapping("a.ts=src/a.ts"),
            Ok(("a.ts".to_string(), "src/a.ts".to_string()))
        );
    }

    #[test]
    fn parse_mapping_rejects_missing_separator() {
        assert!(parse_mapping("a.ts").is_err());
        assert!(parse_mapping("=src/a.ts").is_err());
    }
}
