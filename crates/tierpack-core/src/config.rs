use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::assembly::ArtifactName;
use crate::compare::{Category, Taxonomy};
use crate::error::{Result, TierpackError};
use crate::pattern::{Rule, RuleKind};
use crate::ruleset::{RuleSet, Strategy};
use crate::tagger::{Tagger, DEFAULT_MARKER};

pub const CONFIG_FILE: &str = "tierpack.toml";

/// Top-level names that are never packaged.
pub const DEFAULT_STRUCTURAL: &[&str] = &[".git"];

pub const DEFAULT_SUFFIX: &str = "free";

/// Default config template with rich comments
const DEFAULT_CONFIG_TEMPLATE: &str = r#"# tierpack configuration file
# Location: <source root>/tierpack.toml

[package]
# Top-level folder inside every artifact
slug = "my-plugin"
# Optional, used in artifact names: my-plugin-1.2.0, my-plugin-1.2.0-free
# version = "1.2.0"

[rules]
# "denylist": everything is packaged unless a deny rule matches
# "allowlist": only paths under `allow` are packaged, then deny rules apply
strategy = "denylist"

# Allow roots (allowlist strategy only)
# Example: allow = ["my-plugin.php", "includes", "resources/assets/css"]
allow = []

# Names or relative paths that are always packaged, overriding deny rules
# Example: force_include = ["vendor"]
force_include = []

# Top-level names that are never packaged, not even when force-included
structural = [".git"]

# Deny rules. A bare string has its kind inferred:
#   contains '*'            -> wildcard   ("*.md")
#   contains '/'            -> prefix     ("resources/assets/scss")
#   ends with '/'           -> component  ("node_modules/")
# Anything else must say which kind it is:
#   { pattern = "composer.lock", kind = "name" }
#   { pattern = "tests", kind = "component" }
#   { pattern = "docs/internal.txt", kind = "path" }
deny = [
    "*.md",
    "node_modules/",
    { pattern = "tests", kind = "component" },
]

[tier]
# Sentinel that marks a file as full-tier only
marker = "@premium_only"
# Suffix of the restricted artifact name
suffix = "free"
# Files `tierpack tag` adds the marker to
tagged = []

# [compare]
# Replace the built-in taxonomy used by `tierpack compare`
# categories = [
#     { name = "reports", label = "Reports", keywords = ["report"] },
# ]
"#;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub package: PackageConfig,

    #[serde(default)]
    pub rules: RulesConfig,

    #[serde(default)]
    pub tier: TierConfig,

    #[serde(default)]
    pub compare: CompareConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PackageConfig {
    #[serde(default)]
    pub slug: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    #[serde(default)]
    pub strategy: Strategy,

    #[serde(default)]
    pub allow: Vec<String>,

    #[serde(default)]
    pub force_include: Vec<String>,

    #[serde(default = "default_structural")]
    pub structural: Vec<String>,

    #[serde(default)]
    pub deny: Vec<RuleSpec>,
}

fn default_structural() -> Vec<String> {
    DEFAULT_STRUCTURAL.iter().map(|s| s.to_string()).collect()
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            allow: Vec::new(),
            force_include: Vec::new(),
            structural: default_structural(),
            deny: Vec::new(),
        }
    }
}

/// A deny rule as written in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleSpec {
    Bare(String),
    Table {
        pattern: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        kind: Option<RuleKind>,
    },
}

impl RuleSpec {
    pub fn to_rule(&self) -> Result<Rule> {
        match self {
            Self::Bare(pattern)
            | Self::Table {
                pattern,
                kind: None,
            } => Rule::infer(pattern),
            Self::Table {
                pattern,
                kind: Some(kind),
            } => Rule::new(pattern, *kind),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierConfig {
    #[serde(default = "default_marker")]
    pub marker: String,

    #[serde(default = "default_suffix")]
    pub suffix: String,

    #[serde(default)]
    pub tagged: Vec<String>,
}

fn default_marker() -> String {
    DEFAULT_MARKER.to_string()
}

fn default_suffix() -> String {
    DEFAULT_SUFFIX.to_string()
}

impl Default for TierConfig {
    fn default() -> Self {
        Self {
            marker: default_marker(),
            suffix: default_suffix(),
            tagged: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CompareConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<Category>,
}

impl Config {
    /// Load `tierpack.toml` from a source root
    pub fn load(base_dir: &Path) -> Result<Self> {
        Self::load_from(&Self::path(base_dir))
    }

    /// Load from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(TierpackError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = fs::read_to_string(path)?;
        let config = Self::parse(&content).map_err(|message| TierpackError::ConfigParse {
            path: path.to_path_buf(),
            message,
        })?;

        Ok(config)
    }

    fn parse(content: &str) -> std::result::Result<Self, String> {
        let config: Config = toml::from_str(content).map_err(|e| e.to_string())?;
        if config.package.slug.trim().is_empty() {
            return Err("[package] slug is required".to_string());
        }
        if config.package.slug.contains('/') {
            return Err("[package] slug must be a single path segment".to_string());
        }
        Tagger::new(config.tier.marker.as_str()).map_err(|e| format!("[tier] {e}"))?;
        Ok(config)
    }

    /// Save config to base directory
    pub fn save(&self, base_dir: &Path) -> Result<()> {
        let path = Self::path(base_dir);
        fs::create_dir_all(base_dir)?;

        let content = toml::to_string_pretty(self).map_err(|e| TierpackError::ConfigParse {
            path: path.clone(),
            message: e.to_string(),
        })?;

        fs::write(&path, content)?;
        Ok(())
    }

    /// Get config file path
    pub fn path(base_dir: &Path) -> PathBuf {
        base_dir.join(CONFIG_FILE)
    }

    /// Initialize config with default template (rich comments)
    pub fn init(base_dir: &Path) -> Result<PathBuf> {
        let path = Self::path(base_dir);
        fs::create_dir_all(base_dir)?;

        if !path.exists() {
            fs::write(&path, DEFAULT_CONFIG_TEMPLATE)?;
        }

        Ok(path)
    }

    /// List all config keys with their current values
    pub fn list(&self) -> Vec<(String, String)> {
        let deny: Vec<String> = self
            .rules
            .deny
            .iter()
            .map(|spec| match spec.to_rule() {
                Ok(rule) => rule.to_string(),
                Err(e) => format!("<invalid: {e}>"),
            })
            .collect();
        let categories: Vec<String> = if self.compare.categories.is_empty() {
            vec!["(built-in)".to_string()]
        } else {
            self.compare.categories.iter().map(|c| c.name.clone()).collect()
        };

        vec![
            ("package.slug".to_string(), self.package.slug.clone()),
            (
                "package.version".to_string(),
                self.package.version.clone().unwrap_or_else(|| "-".to_string()),
            ),
            (
                "rules.strategy".to_string(),
                self.rules.strategy.as_str().to_string(),
            ),
            ("rules.allow".to_string(), format!("{:?}", self.rules.allow)),
            (
                "rules.force_include".to_string(),
                format!("{:?}", self.rules.force_include),
            ),
            (
                "rules.structural".to_string(),
                format!("{:?}", self.rules.structural),
            ),
            ("rules.deny".to_string(), format!("{:?}", deny)),
            ("tier.marker".to_string(), self.tier.marker.clone()),
            ("tier.suffix".to_string(), self.tier.suffix.clone()),
            ("tier.tagged".to_string(), format!("{:?}", self.tier.tagged)),
            ("compare.categories".to_string(), format!("{:?}", categories)),
        ]
    }

    /// Validate the `[rules]` section into a rule set.
    ///
    /// The config file itself is always a structural exclusion.
    pub fn rule_set(&self) -> Result<RuleSet> {
        let mut builder = RuleSet::builder(self.rules.strategy).structural(CONFIG_FILE);
        for root in &self.rules.allow {
            builder = builder.allow(root.as_str());
        }
        for entry in &self.rules.force_include {
            builder = builder.force_include(entry.as_str());
        }
        for name in &self.rules.structural {
            builder = builder.structural(name.as_str());
        }
        for spec in &self.rules.deny {
            builder = builder.deny(spec.to_rule()?);
        }
        builder.build()
    }

    pub fn tagger(&self) -> Result<Tagger> {
        Tagger::new(self.tier.marker.as_str())
    }

    pub fn artifact_name(&self) -> ArtifactName {
        ArtifactName {
            slug: self.package.slug.clone(),
            version: self.package.version.clone(),
            restricted_suffix: self.tier.suffix.clone(),
        }
    }

    pub fn taxonomy(&self) -> Taxonomy {
        if self.compare.categories.is_empty() {
            Taxonomy::builtin()
        } else {
            Taxonomy::new(self.compare.categories.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::Candidate;
    use crate::ruleset::Decision;

    fn config(toml: &str) -> Config {
        Config::parse(toml).unwrap()
    }

    #[test]
    fn test_default_template_parses() {
        let config = config(DEFAULT_CONFIG_TEMPLATE);
        assert_eq!(config.package.slug, "my-plugin");
        assert_eq!(config.tier.marker, DEFAULT_MARKER);
        assert_eq!(config.tier.suffix, DEFAULT_SUFFIX);

        let rules = config.rule_set().unwrap();
        assert_eq!(rules.deny_rules().len(), 3);
        assert_eq!(
            rules.decide(&Candidate::file("README.md")),
            Decision::Excluded
        );
        assert_eq!(
            rules.decide(&Candidate::dir(".git")),
            Decision::Excluded
        );
        assert_eq!(
            rules.decide(&Candidate::file(CONFIG_FILE)),
            Decision::Excluded
        );
    }

    #[test]
    fn test_rule_specs() {
        let config = config(
            r#"
[package]
slug = "plugin"

[rules]
deny = [
    "*.log",
    "resources/assets/scss",
    "node_modules/",
    { pattern = "composer.lock", kind = "name" },
    { pattern = "docs/internal.txt", kind = "path" },
    { pattern = "build/*" },
]
"#,
        );
        let kinds: Vec<RuleKind> = config
            .rules
            .deny
            .iter()
            .map(|spec| spec.to_rule().unwrap().kind())
            .collect();
        assert_eq!(
            kinds,
            vec![
                RuleKind::Wildcard,
                RuleKind::PathPrefix,
                RuleKind::PathComponent,
                RuleKind::ExactName,
                RuleKind::ExactPath,
                RuleKind::Wildcard,
            ]
        );
    }

    #[test]
    fn test_ambiguous_bare_name_is_rejected() {
        let config = config("[package]\nslug = \"plugin\"\n[rules]\ndeny = [\"tests\"]\n");
        let err = config.rule_set().unwrap_err();
        assert!(matches!(err, TierpackError::AmbiguousKind { ref pattern } if pattern == "tests"));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_missing_slug_is_a_parse_error() {
        assert!(Config::parse("[rules]\nstrategy = \"allowlist\"\n").is_err());
        assert!(Config::parse("[package]\nslug = \"a/b\"\n").is_err());
    }

    #[test]
    fn test_marker_must_be_one_word() {
        let base = "[package]\nslug = \"plugin\"\n\n[tier]\n";
        assert!(Config::parse(&format!("{base}marker = \"\"\n")).is_err());
        assert!(Config::parse(&format!("{base}marker = \"@premium only\"\n")).is_err());
        let config = Config::parse(&format!("{base}marker = \"@pro_only\"\n")).unwrap();
        assert_eq!(config.tagger().unwrap().marker(), "@pro_only");
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(dir.path()).unwrap_err();
        assert!(matches!(err, TierpackError::ConfigNotFound { .. }));

        fs::write(Config::path(dir.path()), "[package\n").unwrap();
        let err = Config::load(dir.path()).unwrap_err();
        assert!(matches!(err, TierpackError::ConfigParse { .. }));
    }

    #[test]
    fn test_init_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = Config::init(dir.path()).unwrap();
        assert!(path.ends_with(CONFIG_FILE));

        // A second init keeps the user's edits.
        fs::write(&path, "[package]\nslug = \"edited\"\n").unwrap();
        Config::init(dir.path()).unwrap();
        assert_eq!(Config::load(dir.path()).unwrap().package.slug, "edited");
    }

    #[test]
    fn test_save_roundtrip_keeps_rules() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config("[package]\nslug = \"plugin\"\nversion = \"1.0.0\"\n");
        config.rules.strategy = Strategy::Allowlist;
        config.rules.allow = vec!["includes".to_string()];
        config.rules.deny = vec![RuleSpec::Table {
            pattern: "tests".to_string(),
            kind: Some(RuleKind::PathComponent),
        }];
        config.save(dir.path()).unwrap();

        let loaded = Config::load(dir.path()).unwrap();
        assert_eq!(loaded.rules.strategy, Strategy::Allowlist);
        assert_eq!(loaded.rules.deny, config.rules.deny);
        assert_eq!(loaded.artifact_name().for_tier(crate::assembly::Tier::Full), "plugin-1.0.0");
    }

    #[test]
    fn test_custom_taxonomy_replaces_builtin() {
        let config = config(
            r#"
[package]
slug = "plugin"

[compare]
categories = [{ name = "reports", keywords = ["report"] }]
"#,
        );
        let taxonomy = config.taxonomy();
        assert_eq!(taxonomy.categories().len(), 1);
        assert_eq!(taxonomy.classify("includes/report.php"), "reports");
        assert!(config.list().iter().any(|(k, v)| k == "compare.categories" && v.contains("reports")));
    }

    #[test]
    fn test_default_taxonomy_is_builtin() {
        let config = config("[package]\nslug = \"plugin\"\n");
        assert_eq!(config.taxonomy(), Taxonomy::builtin());
        assert_eq!(config.rules.structural, vec![".git"]);
    }
}
