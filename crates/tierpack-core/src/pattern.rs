//! Single-rule pattern matching.
//!
//! A `Rule` is one typed pattern. Matching is a pure function of the rule
//! and a normalized candidate path; rules never touch the filesystem.
//!
//! Supported kinds:
//!
//! - `name`: the final path component equals the pattern
//! - `path`: the whole relative path equals the pattern
//! - `component`: the pattern is one whole component of the path
//! - `prefix`: the path lies under the slash-delimited directory pattern
//! - `wildcard`: shell-style `*` glob against the name or the full path;
//!   `*` never crosses `/`

use std::fmt;

use glob::{MatchOptions, Pattern};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TierpackError};
use crate::path::{normalize, RelPath, SEPARATOR};

const WILDCARD: char = '*';
const UNSUPPORTED_GLOB_CHARS: &[char] = &['?', '[', ']', '{', '}', '!'];

/// `*` stays within one path segment.
const SEGMENT_MATCH: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// How a rule pattern is compared against a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleKind {
    #[serde(rename = "name")]
    ExactName,
    #[serde(rename = "path")]
    ExactPath,
    #[serde(rename = "component")]
    PathComponent,
    #[serde(rename = "prefix")]
    PathPrefix,
    #[serde(rename = "wildcard")]
    Wildcard,
}

impl RuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExactName => "name",
            Self::ExactPath => "path",
            Self::PathComponent => "component",
            Self::PathPrefix => "prefix",
            Self::Wildcard => "wildcard",
        }
    }
}

/// An immutable, validated rule.
#[derive(Debug, Clone)]
pub struct Rule {
    pattern: String,
    kind: RuleKind,
    glob: Option<Pattern>,
}

impl Rule {
    /// Build a rule with an explicit kind.
    ///
    /// A `prefix` rule containing `*` is evaluated as a wildcard against the
    /// full path. Empty patterns and glob syntax beyond `*` are rejected.
    pub fn new(pattern: &str, kind: RuleKind) -> Result<Self> {
        let normalized = normalize(pattern);
        if normalized.is_empty() {
            return Err(TierpackError::EmptyPattern);
        }
        if let Some(c) = normalized.chars().find(|c| UNSUPPORTED_GLOB_CHARS.contains(c)) {
            return Err(invalid(pattern, format!("unsupported glob character '{c}'")));
        }
        if normalized.contains("**") {
            return Err(invalid(pattern, "recursive '**' is not supported".into()));
        }

        let has_wildcard = normalized.contains(WILDCARD);
        let has_separator = normalized.contains(SEPARATOR);

        let kind = match kind {
            RuleKind::PathPrefix if has_wildcard => RuleKind::Wildcard,
            RuleKind::PathPrefix if !has_separator => {
                return Err(invalid(
                    pattern,
                    "prefix rules need a '/'; use kind = \"component\" for a single directory"
                        .into(),
                ));
            }
            RuleKind::Wildcard if !has_wildcard => {
                return Err(invalid(pattern, "wildcard rule without '*'".into()));
            }
            RuleKind::ExactName | RuleKind::PathComponent if has_separator => {
                return Err(invalid(pattern, "names cannot contain '/'".into()));
            }
            RuleKind::ExactName | RuleKind::PathComponent | RuleKind::ExactPath
                if has_wildcard =>
            {
                return Err(invalid(
                    pattern,
                    format!("'*' is only allowed in wildcard rules, not {}", kind.as_str()),
                ));
            }
            other => other,
        };

        let glob = if kind == RuleKind::Wildcard {
            Some(Pattern::new(&normalized).map_err(|e| invalid(pattern, e.to_string()))?)
        } else {
            None
        };

        Ok(Self {
            pattern: normalized,
            kind,
            glob,
        })
    }

    /// Build a rule whose kind is inferred from its shape.
    ///
    /// `*` means wildcard, an inner `/` means prefix and a single name with
    /// a trailing `/` means component. A bare name could be either an exact
    /// name or a component, so it is rejected as ambiguous.
    pub fn infer(pattern: &str) -> Result<Self> {
        let trimmed = pattern.trim();
        let normalized = normalize(trimmed);
        if normalized.is_empty() {
            return Err(TierpackError::EmptyPattern);
        }

        if normalized.contains(WILDCARD) {
            Self::new(trimmed, RuleKind::Wildcard)
        } else if normalized.contains(SEPARATOR) {
            Self::new(trimmed, RuleKind::PathPrefix)
        } else if trimmed.ends_with('/') || trimmed.ends_with('\\') {
            Self::new(trimmed, RuleKind::PathComponent)
        } else {
            Err(TierpackError::AmbiguousKind {
                pattern: trimmed.to_string(),
            })
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn kind(&self) -> RuleKind {
        self.kind
    }

    /// Evaluate this rule against a candidate path.
    pub fn matches(&self, path: &RelPath) -> bool {
        match self.kind {
            RuleKind::ExactName => path.name() == self.pattern,
            RuleKind::ExactPath => path.as_str() == self.pattern,
            RuleKind::PathComponent => path.components().any(|c| c == self.pattern),
            // The directory itself matches too, so the walker can prune it.
            RuleKind::PathPrefix => path.is_within(&RelPath::new(&self.pattern)),
            RuleKind::Wildcard => self
                .glob
                .as_ref()
                .is_some_and(|g| {
                    g.matches_with(path.name(), SEGMENT_MATCH)
                        || g.matches_with(path.as_str(), SEGMENT_MATCH)
                }),
        }
    }
}

impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.pattern == other.pattern
    }
}

impl Eq for Rule {}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.pattern)
    }
}

fn invalid(pattern: &str, reason: String) -> TierpackError {
    TierpackError::InvalidPattern {
        pattern: pattern.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(pattern: &str, kind: RuleKind) -> Rule {
        Rule::new(pattern, kind).unwrap()
    }

    fn path(raw: &str) -> RelPath {
        RelPath::new(raw)
    }

    #[test]
    fn test_exact_name() {
        let r = rule(".DS_Store", RuleKind::ExactName);
        assert!(r.matches(&path(".DS_Store")));
        assert!(r.matches(&path("includes/deep/.DS_Store")));
        assert!(!r.matches(&path("includes/.DS_Store.bak")));
    }

    #[test]
    fn test_exact_path() {
        let r = rule("composer.json", RuleKind::ExactPath);
        assert!(r.matches(&path("composer.json")));
        assert!(!r.matches(&path("vendor/pkg/composer.json")));

        let nested = rule(r"includes\legacy.php", RuleKind::ExactPath);
        assert!(nested.matches(&path("includes/legacy.php")));
    }

    #[test]
    fn test_component_requires_whole_segment() {
        let r = rule("vendor", RuleKind::PathComponent);
        assert!(r.matches(&path("vendor/anything")));
        assert!(r.matches(&path("lib/vendor/x.js")));
        assert!(!r.matches(&path("vendor-extra/readme.txt")));
        assert!(!r.matches(&path("includes/vendor-extra.php")));
    }

    #[test]
    fn test_prefix_does_not_leak_to_siblings() {
        let r = rule("resources/assets/scss", RuleKind::PathPrefix);
        assert!(r.matches(&path("resources/assets/scss/file.scss")));
        assert!(r.matches(&path("resources/assets/scss")));
        assert!(!r.matches(&path("resources/assets/css/file.css")));
        assert!(!r.matches(&path("resources/assets/scss-old/file.scss")));
        assert!(!r.matches(&path("other/resources/assets/scss/file.scss")));
    }

    #[test]
    fn test_wildcard_by_name_or_full_path() {
        let md = rule("*.md", RuleKind::Wildcard);
        assert!(md.matches(&path("README.md")));
        assert!(md.matches(&path("docs/deep/guide.md")));
        assert!(!md.matches(&path("docs/guide.mdx")));

        let test_files = rule("test-*.php", RuleKind::Wildcard);
        assert!(test_files.matches(&path("includes/test-cart.php")));
        assert!(!test_files.matches(&path("includes/cart-test.php")));
    }

    #[test]
    fn test_wildcard_star_stays_in_one_segment() {
        let test_files = rule("test-*.php", RuleKind::Wildcard);
        assert!(!test_files.matches(&path("test-helpers/src/cart.php")));
        assert!(test_files.matches(&path("test-helpers/src/test-cart.php")));

        let build = rule("build/*.js", RuleKind::Wildcard);
        assert!(build.matches(&path("build/app.js")));
        assert!(!build.matches(&path("build/vendor/lib.js")));
    }

    #[test]
    fn test_prefix_with_wildcard_becomes_wildcard() {
        let r = rule("resources/*.map", RuleKind::PathPrefix);
        assert_eq!(r.kind(), RuleKind::Wildcard);
        assert!(r.matches(&path("resources/app.js.map")));
        assert!(!r.matches(&path("app.js.map")));
    }

    #[test]
    fn test_empty_pattern_rejected() {
        assert!(matches!(
            Rule::new("", RuleKind::ExactName),
            Err(TierpackError::EmptyPattern)
        ));
        assert!(matches!(
            Rule::new("./", RuleKind::Wildcard),
            Err(TierpackError::EmptyPattern)
        ));
        assert!(matches!(Rule::infer("  "), Err(TierpackError::EmptyPattern)));
    }

    #[test]
    fn test_invalid_kind_combinations() {
        assert!(Rule::new("assets", RuleKind::PathPrefix).is_err());
        assert!(Rule::new("a/b", RuleKind::ExactName).is_err());
        assert!(Rule::new("*.md", RuleKind::ExactPath).is_err());
        assert!(Rule::new("plain", RuleKind::Wildcard).is_err());
        assert!(Rule::new("file?.php", RuleKind::Wildcard).is_err());
        assert!(Rule::new("src/**/x", RuleKind::Wildcard).is_err());
    }

    #[test]
    fn test_infer_kind() {
        assert_eq!(Rule::infer("*.log").unwrap().kind(), RuleKind::Wildcard);
        assert_eq!(
            Rule::infer("resources/assets/scss").unwrap().kind(),
            RuleKind::PathPrefix
        );
        assert_eq!(Rule::infer("tests/").unwrap().kind(), RuleKind::PathComponent);
        assert!(matches!(
            Rule::infer("assets"),
            Err(TierpackError::AmbiguousKind { .. })
        ));
    }

    #[test]
    fn test_equality_ignores_separator_style() {
        let a = rule(r"a\b", RuleKind::PathPrefix);
        let b = rule("a/b/", RuleKind::PathPrefix);
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "prefix:a/b");
    }
}
