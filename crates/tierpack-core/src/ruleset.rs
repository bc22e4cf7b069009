//! Rule set resolution.
//!
//! A `RuleSet` turns a candidate into a single `Decision`. Two strategies
//! share the same `decide` contract:
//!
//! - `Allowlist`: only paths under an allow root ship, minus deny matches
//! - `Denylist`: everything ships except deny matches and hidden
//!   top-level entries
//!
//! Evaluation order: structural exclusions, force-include (a directory on
//! the way to a force-included path counts too), strategy gate, deny rules.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TierpackError};
use crate::path::{normalize, Candidate, RelPath, SEPARATOR};
use crate::pattern::Rule;

/// Rule philosophy selected by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Explicit manifest of shipped roots, everything else excluded.
    Allowlist,
    /// Everything ships unless a deny rule matches.
    #[default]
    Denylist,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allowlist => "allowlist",
            Self::Denylist => "denylist",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decision {
    Included,
    Excluded,
}

impl Decision {
    pub fn is_included(&self) -> bool {
        *self == Self::Included
    }
}

/// Why a decision was reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reason {
    Root,
    Structural(String),
    ForceIncluded,
    /// A directory kept open because a force-included path lies below it.
    ForceIncludedAncestor,
    Hidden,
    OutsideAllowRoots,
    Denied(String),
    Default,
    /// Assigned by the walker to entries it could not read or follow.
    Skipped(String),
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root => write!(f, "tree root"),
            Self::Structural(name) => write!(f, "structural exclusion '{name}'"),
            Self::ForceIncluded => write!(f, "force-included"),
            Self::ForceIncludedAncestor => write!(f, "contains a force-included path"),
            Self::Hidden => write!(f, "hidden top-level entry"),
            Self::OutsideAllowRoots => write!(f, "outside allow roots"),
            Self::Denied(rule) => write!(f, "deny rule {rule}"),
            Self::Default => write!(f, "no rule matched"),
            Self::Skipped(message) => write!(f, "skipped: {message}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub decision: Decision,
    pub reason: Reason,
}

impl Evaluation {
    pub(crate) fn included(reason: Reason) -> Self {
        Self {
            decision: Decision::Included,
            reason,
        }
    }

    pub(crate) fn excluded(reason: Reason) -> Self {
        Self {
            decision: Decision::Excluded,
            reason,
        }
    }
}

/// Immutable rule set, built once per run.
#[derive(Debug, Clone)]
pub struct RuleSet {
    strategy: Strategy,
    allow_roots: Vec<RelPath>,
    deny: Vec<Rule>,
    force_include: BTreeSet<String>,
    /// Force-include entries that are relative paths rather than names.
    force_include_paths: Vec<RelPath>,
    structural: BTreeSet<String>,
}

impl RuleSet {
    pub fn builder(strategy: Strategy) -> RuleSetBuilder {
        RuleSetBuilder {
            strategy,
            allow_roots: Vec::new(),
            deny: Vec::new(),
            force_include: Vec::new(),
            structural: Vec::new(),
        }
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn allow_roots(&self) -> &[RelPath] {
        &self.allow_roots
    }

    pub fn deny_rules(&self) -> &[Rule] {
        &self.deny
    }

    pub fn force_include(&self) -> impl Iterator<Item = &str> {
        self.force_include.iter().map(String::as_str)
    }

    pub fn structural(&self) -> impl Iterator<Item = &str> {
        self.structural.iter().map(String::as_str)
    }

    /// Resolve the decision for one candidate.
    pub fn decide(&self, candidate: &Candidate) -> Decision {
        self.evaluate(candidate).decision
    }

    /// Resolve the decision together with the reason that produced it.
    pub fn evaluate(&self, candidate: &Candidate) -> Evaluation {
        let path = &candidate.path;
        if path.is_root() {
            return Evaluation::included(Reason::Root);
        }

        let top = path.top_level();
        if self.structural.contains(top) {
            return Evaluation::excluded(Reason::Structural(top.to_string()));
        }

        if self.is_force_included(path) {
            return Evaluation::included(Reason::ForceIncluded);
        }

        // Without this the walker would prune the way to a forced path.
        if candidate.is_dir()
            && self
                .force_include_paths
                .iter()
                .any(|forced| forced.is_within(path))
        {
            return Evaluation::included(Reason::ForceIncludedAncestor);
        }

        match self.strategy {
            Strategy::Denylist if top.starts_with('.') => {
                return Evaluation::excluded(Reason::Hidden);
            }
            Strategy::Allowlist if !self.is_allowed(candidate) => {
                return Evaluation::excluded(Reason::OutsideAllowRoots);
            }
            _ => {}
        }

        match self.deny.iter().find(|rule| rule.matches(path)) {
            Some(rule) => Evaluation::excluded(Reason::Denied(rule.to_string())),
            None => Evaluation::included(Reason::Default),
        }
    }

    /// A name entry matches the final component; a path entry matches
    /// itself and everything below it.
    fn is_force_included(&self, path: &RelPath) -> bool {
        self.force_include.contains(path.name())
            || self
                .force_include_paths
                .iter()
                .any(|forced| path.is_within(forced))
    }

    /// Allow-list membership. Directories on the way to a root stay open
    /// so the walker can descend to it.
    fn is_allowed(&self, candidate: &Candidate) -> bool {
        self.allow_roots.iter().any(|root| {
            candidate.path.is_within(root) || (candidate.is_dir() && root.is_within(&candidate.path))
        })
    }
}

/// Collects configuration entries and validates them into a `RuleSet`.
#[derive(Debug, Clone)]
pub struct RuleSetBuilder {
    strategy: Strategy,
    allow_roots: Vec<String>,
    deny: Vec<Rule>,
    force_include: Vec<String>,
    structural: Vec<String>,
}

impl RuleSetBuilder {
    pub fn allow(mut self, root: impl Into<String>) -> Self {
        self.allow_roots.push(root.into());
        self
    }

    pub fn deny(mut self, rule: Rule) -> Self {
        self.deny.push(rule);
        self
    }

    pub fn force_include(mut self, entry: impl Into<String>) -> Self {
        self.force_include.push(entry.into());
        self
    }

    pub fn structural(mut self, name: impl Into<String>) -> Self {
        self.structural.push(name.into());
        self
    }

    /// Validate every entry and drop duplicates, keeping first occurrence.
    pub fn build(self) -> Result<RuleSet> {
        let mut allow_roots: Vec<RelPath> = Vec::new();
        for raw in &self.allow_roots {
            if raw.trim().is_empty() {
                return Err(TierpackError::EmptyPattern);
            }
            let root = RelPath::new(raw);
            if !allow_roots.contains(&root) {
                allow_roots.push(root);
            }
        }

        let mut deny: Vec<Rule> = Vec::new();
        for rule in self.deny {
            if !deny.contains(&rule) {
                deny.push(rule);
            }
        }

        let force_include = self
            .force_include
            .iter()
            .map(|entry| non_empty(entry))
            .collect::<Result<BTreeSet<_>>>()?;

        let mut structural = BTreeSet::new();
        for name in &self.structural {
            let name = non_empty(name)?;
            if name.contains('/') {
                return Err(TierpackError::InvalidPattern {
                    pattern: name,
                    reason: "structural exclusions are top-level names".into(),
                });
            }
            structural.insert(name);
        }

        let force_include_paths = force_include
            .iter()
            .filter(|entry| entry.contains(SEPARATOR))
            .map(|entry| RelPath::new(entry))
            .collect();

        Ok(RuleSet {
            strategy: self.strategy,
            allow_roots,
            deny,
            force_include,
            force_include_paths,
            structural,
        })
    }
}

fn non_empty(raw: &str) -> Result<String> {
    let normalized = normalize(raw.trim());
    if normalized.is_empty() {
        Err(TierpackError::EmptyPattern)
    } else {
        Ok(normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::RuleKind;

    fn deny_set(rules: &[(&str, RuleKind)]) -> RuleSetBuilder {
        rules.iter().fold(RuleSet::builder(Strategy::Denylist), |b, (p, k)| {
            b.deny(Rule::new(p, *k).unwrap())
        })
    }

    fn file(raw: &str) -> Candidate {
        Candidate::file(raw)
    }

    #[test]
    fn test_decide_is_deterministic() {
        let set = deny_set(&[("*.md", RuleKind::Wildcard)]).build().unwrap();
        for raw in ["a.php", "b.md", "sub/c.md", ".git/config"] {
            let c = file(raw);
            assert_eq!(set.decide(&c), set.decide(&c));
            assert_eq!(set.evaluate(&c), set.evaluate(&c));
        }
    }

    #[test]
    fn test_force_include_beats_every_deny_rule() {
        let set = deny_set(&[
            ("*.md", RuleKind::Wildcard),
            ("docs", RuleKind::PathComponent),
            ("docs/notes.md", RuleKind::ExactPath),
            ("notes.md", RuleKind::ExactName),
        ])
        .force_include("docs/notes.md")
        .build()
        .unwrap();

        let eval = set.evaluate(&file("docs/notes.md"));
        assert_eq!(eval.decision, Decision::Included);
        assert_eq!(eval.reason, Reason::ForceIncluded);
        assert_eq!(set.decide(&file("docs/other.md")), Decision::Excluded);
    }

    #[test]
    fn test_force_include_by_name() {
        let set = deny_set(&[("*.md", RuleKind::Wildcard)])
            .force_include("readme.md")
            .build()
            .unwrap();
        assert!(set.decide(&file("readme.md")).is_included());
        assert!(set.decide(&file("nested/readme.md")).is_included());
    }

    #[test]
    fn test_prefix_does_not_leak_to_siblings() {
        let set = deny_set(&[("resources/assets/scss", RuleKind::PathPrefix)])
            .build()
            .unwrap();
        assert_eq!(
            set.decide(&file("resources/assets/css/file.css")),
            Decision::Included
        );
        assert_eq!(
            set.decide(&file("resources/assets/scss/file.scss")),
            Decision::Excluded
        );
    }

    #[test]
    fn test_component_does_not_match_substring() {
        let set = deny_set(&[("vendor", RuleKind::PathComponent)])
            .build()
            .unwrap();
        assert_eq!(
            set.decide(&file("vendor-extra/readme.txt")),
            Decision::Included
        );
        assert_eq!(set.decide(&file("vendor/anything")), Decision::Excluded);
    }

    #[test]
    fn test_denylist_excludes_hidden_top_level() {
        let set = RuleSet::builder(Strategy::Denylist).build().unwrap();
        assert_eq!(set.evaluate(&file(".gitignore")).reason, Reason::Hidden);
        assert_eq!(set.decide(&Candidate::dir(".github")), Decision::Excluded);
        assert!(set.decide(&file("includes/.htaccess")).is_included());
    }

    #[test]
    fn test_structural_exclusion_immune_to_force_include() {
        let set = RuleSet::builder(Strategy::Allowlist)
            .allow(".")
            .structural("assets")
            .force_include("index.php")
            .build()
            .unwrap();

        let eval = set.evaluate(&file("assets/index.php"));
        assert_eq!(eval.decision, Decision::Excluded);
        assert_eq!(eval.reason, Reason::Structural("assets".into()));
        assert!(set.decide(&file("resources/assets/css/a.css")).is_included());
        assert!(set.decide(&file("index.php")).is_included());
    }

    #[test]
    fn test_allowlist_roots_and_ancestors() {
        let set = RuleSet::builder(Strategy::Allowlist)
            .allow("plugin.php")
            .allow("includes")
            .allow("resources/assets/css")
            .deny(Rule::new("*.map", RuleKind::Wildcard).unwrap())
            .build()
            .unwrap();

        assert!(set.decide(&file("plugin.php")).is_included());
        assert!(set.decide(&file("includes/core/a.php")).is_included());
        assert!(set.decide(&Candidate::dir("resources")).is_included());
        assert!(set.decide(&Candidate::dir("resources/assets")).is_included());
        assert_eq!(
            set.evaluate(&Candidate::dir("resources/assets/scss")).reason,
            Reason::OutsideAllowRoots
        );
        assert_eq!(set.decide(&file("resources/readme.txt")), Decision::Excluded);
        assert_eq!(set.decide(&file("tests/a.php")), Decision::Excluded);
        assert_eq!(
            set.decide(&file("resources/assets/css/admin.css.map")),
            Decision::Excluded
        );
    }

    #[test]
    fn test_duplicate_rules_collapse() {
        let set = deny_set(&[
            ("*.md", RuleKind::Wildcard),
            ("*.md", RuleKind::Wildcard),
            ("./*.md", RuleKind::Wildcard),
        ])
        .allow("a")
        .allow("a/")
        .build()
        .unwrap();
        assert_eq!(set.deny_rules().len(), 1);
        assert_eq!(set.allow_roots().len(), 1);
    }

    #[test]
    fn test_empty_entries_rejected() {
        assert!(matches!(
            RuleSet::builder(Strategy::Allowlist).allow(" ").build(),
            Err(TierpackError::EmptyPattern)
        ));
        assert!(matches!(
            RuleSet::builder(Strategy::Denylist).force_include("").build(),
            Err(TierpackError::EmptyPattern)
        ));
        assert!(RuleSet::builder(Strategy::Denylist)
            .structural("a/b")
            .build()
            .is_err());
    }

    #[test]
    fn test_force_included_path_opens_its_ancestors() {
        let set = deny_set(&[("vendor", RuleKind::PathComponent)])
            .force_include("vendor/freemius")
            .build()
            .unwrap();

        assert_eq!(
            set.evaluate(&Candidate::dir("vendor")).reason,
            Reason::ForceIncludedAncestor
        );
        assert_eq!(
            set.evaluate(&Candidate::dir("vendor/freemius")).reason,
            Reason::ForceIncluded
        );
        assert!(set.decide(&file("vendor/freemius/start.php")).is_included());
        assert_eq!(set.decide(&file("vendor/other.php")), Decision::Excluded);
        assert_eq!(set.decide(&Candidate::dir("vendor/guzzle")), Decision::Excluded);
        // Only directories are held open.
        assert_eq!(set.decide(&file("vendor")), Decision::Excluded);
    }

    #[test]
    fn test_structural_beats_forced_ancestor() {
        let set = RuleSet::builder(Strategy::Denylist)
            .structural("build")
            .force_include("build/keep.txt")
            .build()
            .unwrap();
        assert_eq!(
            set.evaluate(&Candidate::dir("build")).reason,
            Reason::Structural("build".into())
        );
    }

    #[test]
    fn test_reason_for_denied_names_rule() {
        let set = deny_set(&[("*.log", RuleKind::Wildcard)]).build().unwrap();
        let eval = set.evaluate(&file("sub/d.log"));
        assert_eq!(eval.reason, Reason::Denied("wildcard:*.log".into()));
        assert_eq!(eval.reason.to_string(), "deny rule wildcard:*.log");
    }
}
