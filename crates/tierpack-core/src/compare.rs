//! Full vs restricted manifest comparison.
//!
//! The restricted artifact must be a subset of the full one. `diff`
//! reports what the restricted tier leaves out, grouped by a keyword
//! taxonomy, and flags anything that breaks the subset invariant.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::manifest::Manifest;
use crate::report::Warning;

/// Bucket for paths no category claims.
pub const OTHER_CATEGORY: &str = "other";

/// Static category definition.
#[derive(Debug, Clone)]
pub struct BuiltinCategory {
    pub name: &'static str,
    pub label: &'static str,
    /// Case-insensitive substrings matched against `/<path>`.
    pub keywords: &'static [&'static str],
}

pub const BUILTIN_CATEGORIES: &[BuiltinCategory] = &[
    BuiltinCategory {
        name: "analytics",
        label: "Analytics",
        keywords: &["analytics"],
    },
    BuiltinCategory {
        name: "api",
        label: "REST API",
        keywords: &["/api/"],
    },
    BuiltinCategory {
        name: "advanced-pricing",
        label: "Advanced Pricing",
        keywords: &["tiered", "bogo", "spend-threshold"],
    },
    BuiltinCategory {
        name: "scheduled-campaigns",
        label: "Scheduled Campaigns",
        keywords: &["recurring", "schedul"],
    },
    BuiltinCategory {
        name: "data-transfer",
        label: "Export/Import",
        keywords: &["export", "import"],
    },
];

/// Runtime category, built in or from config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub keywords: Vec<String>,
}

impl Category {
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }
}

impl From<&BuiltinCategory> for Category {
    fn from(builtin: &BuiltinCategory) -> Self {
        Self {
            name: builtin.name.to_string(),
            label: Some(builtin.label.to_string()),
            keywords: builtin.keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }
}

/// Ordered categories; the first match wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Taxonomy {
    categories: Vec<Category>,
}

impl Default for Taxonomy {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Taxonomy {
    pub fn builtin() -> Self {
        Self {
            categories: BUILTIN_CATEGORIES.iter().map(Category::from).collect(),
        }
    }

    pub fn new(categories: Vec<Category>) -> Self {
        let categories = categories
            .into_iter()
            .map(|mut c| {
                c.keywords = c.keywords.iter().map(|k| k.to_lowercase()).collect();
                c
            })
            .collect();
        Self { categories }
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Category name for one path (relative to the slug folder).
    pub fn classify(&self, path: &str) -> &str {
        let haystack = format!("/{}", path.to_lowercase());
        self.categories
            .iter()
            .find(|c| c.keywords.iter().any(|k| haystack.contains(k.as_str())))
            .map(|c| c.name.as_str())
            .unwrap_or(OTHER_CATEGORY)
    }

    fn label_for(&self, name: &str) -> String {
        self.categories
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.label().to_string())
            .unwrap_or_else(|| "Other".to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryGroup {
    pub name: String,
    pub label: String,
    pub paths: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffReport {
    pub slug: String,
    /// In the full artifact, absent from the restricted one.
    pub full_only: BTreeSet<String>,
    /// In the restricted artifact, absent from the full one. Should be empty.
    pub restricted_only: BTreeSet<String>,
    pub full_count: usize,
    pub restricted_count: usize,
    pub full_size: u64,
    pub restricted_size: u64,
    /// Full size minus restricted size, in bytes.
    pub size_delta: i64,
}

impl DiffReport {
    pub fn is_consistent(&self) -> bool {
        self.restricted_only.is_empty()
    }

    /// Subset-invariant violations as warnings.
    pub fn warnings(&self) -> Vec<Warning> {
        self.restricted_only
            .iter()
            .map(|path| Warning::SubsetViolation { path: path.clone() })
            .collect()
    }

    /// Relative size reduction in percent.
    pub fn reduction_percent(&self) -> f64 {
        if self.full_size == 0 {
            0.0
        } else {
            self.size_delta as f64 / self.full_size as f64 * 100.0
        }
    }

    /// Path with the leading slug folder removed.
    pub fn strip_slug<'p>(&self, path: &'p str) -> &'p str {
        path.strip_prefix(self.slug.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or(path)
    }

    /// Group `full_only` by taxonomy, in taxonomy order, with the
    /// "other" bucket last. Empty groups are omitted.
    pub fn categorize(&self, taxonomy: &Taxonomy) -> Vec<CategoryGroup> {
        let mut order: Vec<&str> = taxonomy.categories().iter().map(|c| c.name.as_str()).collect();
        order.push(OTHER_CATEGORY);

        let mut groups: Vec<CategoryGroup> = order
            .iter()
            .map(|name| CategoryGroup {
                name: name.to_string(),
                label: taxonomy.label_for(name),
                paths: Vec::new(),
            })
            .collect();

        for path in &self.full_only {
            let name = taxonomy.classify(self.strip_slug(path));
            if let Some(group) = groups.iter_mut().find(|g| g.name == name) {
                group.paths.push(path.clone());
            }
        }

        groups.retain(|g| !g.paths.is_empty());
        groups
    }
}

/// Compare two manifests.
pub fn diff(full: &Manifest, restricted: &Manifest) -> DiffReport {
    let full_paths: BTreeSet<String> = full.paths().map(str::to_string).collect();
    let restricted_paths: BTreeSet<String> = restricted.paths().map(str::to_string).collect();

    let report = DiffReport {
        slug: full.slug.clone(),
        full_only: full_paths.difference(&restricted_paths).cloned().collect(),
        restricted_only: restricted_paths.difference(&full_paths).cloned().collect(),
        full_count: full.len(),
        restricted_count: restricted.len(),
        full_size: full.total_size(),
        restricted_size: restricted.total_size(),
        size_delta: full.total_size() as i64 - restricted.total_size() as i64,
    };

    for path in &report.restricted_only {
        tracing::warn!(path = %path, "restricted artifact is not a subset of the full artifact");
    }
    report
}
