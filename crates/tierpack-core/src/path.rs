//! Normalized tree-relative paths.
//!
//! Every comparison in the rule engine happens on `RelPath`, never on
//! `std::path::Path`, so rules behave the same on every platform.

use std::fmt;
use std::path::{Component, Path};

/// Canonical separator used by rules and archive paths.
pub const SEPARATOR: char = '/';

/// Whether a candidate is a directory (pruning target) or a leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    File,
    Directory,
}

/// A path relative to the tree root with `/` separators.
///
/// Normalization drops empty segments and `.`, converts `\` to `/`
/// and strips leading/trailing separators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelPath {
    normalized: String,
}

impl RelPath {
    pub fn new(raw: &str) -> Self {
        Self {
            normalized: normalize(raw),
        }
    }

    /// Build from a filesystem path relative to the root.
    pub fn from_path(path: &Path) -> Self {
        let joined = path
            .components()
            .filter_map(|c| match c {
                Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/");
        Self { normalized: joined }
    }

    pub fn as_str(&self) -> &str {
        &self.normalized
    }

    /// The tree root itself.
    pub fn is_root(&self) -> bool {
        self.normalized.is_empty()
    }

    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.normalized.split(SEPARATOR).filter(|s| !s.is_empty())
    }

    /// Final component, empty for the root.
    pub fn name(&self) -> &str {
        self.normalized
            .rsplit(SEPARATOR)
            .next()
            .unwrap_or_default()
    }

    /// First component, empty for the root.
    pub fn top_level(&self) -> &str {
        self.normalized.split(SEPARATOR).next().unwrap_or_default()
    }

    pub fn depth(&self) -> usize {
        self.components().count()
    }

    pub fn join(&self, name: &str) -> Self {
        if self.is_root() {
            Self::new(name)
        } else {
            Self::new(&format!("{}/{}", self.normalized, name))
        }
    }

    /// True when `self` equals `dir` or lies beneath it.
    pub fn is_within(&self, dir: &RelPath) -> bool {
        if dir.is_root() || self.normalized == dir.normalized {
            return true;
        }
        self.normalized
            .strip_prefix(dir.as_str())
            .is_some_and(|rest| rest.starts_with(SEPARATOR))
    }
}

impl fmt::Display for RelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.normalized)
    }
}

impl From<&str> for RelPath {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

/// Canonicalize separators and drop `.`/empty segments.
pub fn normalize(raw: &str) -> String {
    raw.replace('\\', "/")
        .split(SEPARATOR)
        .filter(|seg| !seg.is_empty() && *seg != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// A candidate path together with its entry kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Candidate {
    pub path: RelPath,
    pub kind: EntryKind,
}

impl Candidate {
    pub fn file(path: impl Into<RelPath>) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::File,
        }
    }

    pub fn dir(path: impl Into<RelPath>) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::Directory,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}
