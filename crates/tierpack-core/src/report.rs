//! Run status: counters and recovered warnings.
//!
//! Nothing in here is fatal. Warnings are collected while a run proceeds
//! and printed in an end-of-run summary.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// A directory could not be listed during the walk.
    UnreadableDirectory { path: String, message: String },
    /// An entry was seen but not traversed (e.g. a symlinked directory).
    SkippedEntry { path: String, message: String },
    /// No leading comment block to anchor the tier marker.
    MalformedHeader { path: String },
    /// A file listed for tagging does not exist.
    MissingFile { path: String },
    /// An allow root is absent from the source tree.
    MissingRoot { path: String },
    /// The restricted manifest holds a path the full manifest lacks.
    SubsetViolation { path: String },
}

impl Warning {
    pub fn path(&self) -> &str {
        match self {
            Self::UnreadableDirectory { path, .. }
            | Self::SkippedEntry { path, .. }
            | Self::MalformedHeader { path }
            | Self::MissingFile { path }
            | Self::MissingRoot { path }
            | Self::SubsetViolation { path } => path,
        }
    }

    /// Invariant violations need a human to look at the rule set.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, Self::SubsetViolation { .. })
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnreadableDirectory { path, message } => {
                write!(f, "unreadable directory {path}: {message}")
            }
            Self::SkippedEntry { path, message } => write!(f, "skipped {path}: {message}"),
            Self::MalformedHeader { path } => {
                write!(f, "no leading comment block in {path}, left untouched")
            }
            Self::MissingFile { path } => write!(f, "file not found: {path}"),
            Self::MissingRoot { path } => write!(f, "allow root not found: {path}"),
            Self::SubsetViolation { path } => {
                write!(f, "restricted artifact contains {path} which the full artifact lacks")
            }
        }
    }
}

/// Per-run counters plus collected warnings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub included: usize,
    pub excluded: usize,
    pub warnings: Vec<Warning>,
}

impl RunReport {
    /// Record a warning and log it.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!(path = warning.path(), "{warning}");
        self.warnings.push(warning);
    }

    pub fn extend(&mut self, warnings: impl IntoIterator<Item = Warning>) {
        for warning in warnings {
            self.warn(warning);
        }
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn invariant_violations(&self) -> impl Iterator<Item = &Warning> {
        self.warnings.iter().filter(|w| w.is_invariant_violation())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warning_display_and_path() {
        let w = Warning::UnreadableDirectory {
            path: "locked".into(),
            message: "permission denied".into(),
        };
        assert_eq!(w.path(), "locked");
        assert_eq!(w.to_string(), "unreadable directory locked: permission denied");
    }

    #[test]
    fn test_report_collects_violations() {
        let mut report = RunReport::default();
        report.warn(Warning::MalformedHeader {
            path: "a.php".into(),
        });
        report.warn(Warning::SubsetViolation {
            path: "plugin/b.php".into(),
        });
        assert!(report.has_warnings());
        assert_eq!(report.invariant_violations().count(), 1);
    }

    #[test]
    fn test_warning_serializes_with_kind_tag() {
        let w = Warning::MissingRoot {
            path: "languages".into(),
        };
        let json = serde_json::to_string(&w).unwrap();
        assert_eq!(json, r#"{"kind":"missing_root","path":"languages"}"#);
    }
}
