//! tree-tidy library for reorganizing loosely structured source trees.
//!
//! Files dropped into a staging area (or sitting under the wrong extension)
//! are moved into a canonical layout while cross-file imports stay valid.
//! A run goes through these phases:
//!
//! 1. **Scanning**: walk the staging area and source root, hash and classify
//!    every file, extract import specifiers
//! 2. **Resolution**: resolve relative, alias-prefixed and root-relative
//!    imports to files on disk; broken ones are reported
//! 3. **Planning**: decide for each relocation whether to move, update, skip,
//!    drop as identical, or quarantine as a conflict
//! 4. **Execution**: carry out the plans with backups and quarantine copies,
//!    then rewrite the relative imports the moves invalidated
//!
//! # Example
//!
//! ```no_run
//! use tree_tidy::{Organizer, OrganizerConfig, Relocator};
//! use std::path::Path;
//!
//! let organizer = Organizer::new(Path::new("./app"), OrganizerConfig::default()).unwrap();
//!
//! // Read-only: this is everything a dry run does
//! let survey = organizer.survey();
//! println!("{} relocations planned", survey.plans.len());
//!
//! let mut relocator = Relocator::new(&organizer.config().executable_extensions);
//! let execution = organizer.execute(&survey, &mut relocator);
//! println!("{} files rewritten", execution.rewritten.len());
//! ```

pub mod classifier;
pub mod cli;
pub mod config;
pub mod error;
pub mod external;
pub mod pipeline;
pub mod planner;
pub mod relocator;
pub mod report;
pub mod resolver;
pub mod rewriter;
pub mod scanner;

// Re-export commonly used types at crate root
pub use classifier::{Classification, classify};
pub use config::OrganizerConfig;
pub use error::{Issue, IssueKind, RelocateError};
pub use pipeline::{Execution, Organizer, Survey};
pub use planner::{RelocationDecision, RelocationPlan};
pub use relocator::{ChangeLogEntry, Relocator};
pub use report::Report;
pub use resolver::{ImportEdge, PathResolver, Resolution};
pub use scanner::FileRecord;
