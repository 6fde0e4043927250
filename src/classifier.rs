//! Content-based extension classification.
//!
//! Detects whether a plain TypeScript/JavaScript file actually holds JSX by
//! looking for three families of patterns: markup syntax, framework imports,
//! and component declarations. Detection is regex-based and deliberately
//! approximate; the confidence score is what gates whether a suggestion is
//! acted on.

use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

/// Extension that is reclassified when it holds markup.
pub const PLAIN_EXTENSION: &str = "ts";
/// Markup-capable extension suggested for plain and legacy files.
pub const MARKUP_EXTENSION: &str = "tsx";
/// Untyped extension upgraded straight to the markup-capable one.
pub const LEGACY_EXTENSION: &str = "js";

/// Content signals, derived from the text alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Signals {
    pub has_markup_syntax: bool,
    pub has_framework_import: bool,
    pub has_component_declaration: bool,
}

/// Suggested extension for a file and how sure the classifier is about it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub current_extension: String,
    pub suggested_extension: String,
    pub reason: String,
    pub confidence: f64,
    pub signals: Signals,
}

impl Classification {
    pub fn changes_extension(&self) -> bool {
        self.suggested_extension != self.current_extension
    }

    /// True when the suggestion differs from the current extension and scores
    /// strictly above `threshold`.
    pub fn is_accepted(&self, threshold: f64) -> bool {
        self.changes_extension() && self.confidence > threshold
    }

    /// Result for content that could not be read or decoded.
    pub fn unreadable(current_extension: &str) -> Self {
        Self {
            current_extension: current_extension.to_string(),
            suggested_extension: current_extension.to_string(),
            reason: "cannot read file".to_string(),
            confidence: 0.0,
            signals: Signals::default(),
        }
    }
}

fn regex(pattern: &str) -> Regex {
    Regex::new(pattern).expect("valid regex literal")
}

fn markup_patterns() -> &'static [Regex] {
    static RE: OnceLock<Vec<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        [
            r"<[A-Z][a-zA-Z0-9]*\s*[^>]*>",
            r"<[a-z]+\s+[^>]*className\s*=",
            r"<[a-z]+\s+[^>]*onClick\s*=",
            r"React\.createElement",
            r"\bjsx\s*\(",
        ]
        .into_iter()
        .map(regex)
        .collect()
    })
}

fn framework_import_patterns() -> &'static [Regex] {
    static RE: OnceLock<Vec<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        [
            r#"(?m)^\s*import\s+[^;]*?\s+from\s+['"]react['"]"#,
            r"(?m)^\s*import\s+React\s+from",
            r"\buse(?:State|Effect|Context|Reducer|Memo|Callback|Ref)\s*[<(]",
        ]
        .into_iter()
        .map(regex)
        .collect()
    })
}

fn component_patterns() -> &'static [Regex] {
    static RE: OnceLock<Vec<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        [
            r"export\s+default\s+function\s+[A-Z]",
            r"export\s+function\s+[A-Z]",
            r"const\s+[A-Z][a-zA-Z0-9]*\s*=\s*\(",
            r"function\s+[A-Z][a-zA-Z0-9]*\s*\(",
            r"export\s+default\s+[A-Z][a-zA-Z0-9]*",
        ]
        .into_iter()
        .map(regex)
        .collect()
    })
}

pub fn detect_signals(content: &str) -> Signals {
    let any = |patterns: &[Regex]| patterns.iter().any(|re| re.is_match(content));
    Signals {
        has_markup_syntax: any(markup_patterns()),
        has_framework_import: any(framework_import_patterns()),
        has_component_declaration: any(component_patterns()),
    }
}

/// Classifies text content held under `current_extension` (without the dot).
///
/// Only the plain extension is reclassified by the first three rules, and the
/// markup-capable extension is never downgraded:
///
/// | current | signals                   | suggestion | confidence |
/// |---------|---------------------------|------------|------------|
/// | `ts`    | markup                    | `tsx`      | 0.9        |
/// | `ts`    | framework and component   | `tsx`      | 0.8        |
/// | `ts`    | framework                 | `tsx`      | 0.6        |
/// | `js`    | markup or framework       | `tsx`      | 0.7        |
/// | other   |                           | unchanged  | 0.5        |
pub fn classify(content: &str, current_extension: &str) -> Classification {
    let signals = detect_signals(content);

    let (suggested, reason, confidence) = match current_extension {
        PLAIN_EXTENSION if signals.has_markup_syntax => {
            (MARKUP_EXTENSION, "Contains JSX elements", 0.9)
        }
        PLAIN_EXTENSION if signals.has_framework_import && signals.has_component_declaration => {
            (MARKUP_EXTENSION, "Contains React components", 0.8)
        }
        PLAIN_EXTENSION if signals.has_framework_import => {
            (MARKUP_EXTENSION, "Contains React imports", 0.6)
        }
        LEGACY_EXTENSION if signals.has_markup_syntax || signals.has_framework_import => (
            MARKUP_EXTENSION,
            "JavaScript with React should be TypeScript",
            0.7,
        ),
        _ => (current_extension, "No changes needed", 0.5),
    };

    Classification {
        current_extension: current_extension.to_string(),
        suggested_extension: suggested.to_string(),
        reason: reason.to_string(),
        confidence,
        signals,
    }
}

/// Classifies raw file bytes. Binary or non-UTF-8 content cannot be
/// classified and keeps its extension with zero confidence.
pub fn classify_bytes(bytes: &[u8], current_extension: &str) -> Classification {
    if bytes.contains(&0) {
        return Classification::unreadable(current_extension);
    }
    match std::str::from_utf8(bytes) {
        Ok(content) => classify(content, current_extension),
        Err(_) => Classification::unreadable(current_extension),
    }
}
