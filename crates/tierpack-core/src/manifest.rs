use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::assembly::Tier;
use crate::error::{Result, TierpackError};
use crate::path::RelPath;

/// Suffix of the manifest written next to an assembled artifact.
pub const MANIFEST_SUFFIX: &str = ".manifest.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub size: u64,
    pub hash: String,
}

/// Archive-relative paths produced by one assembly run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub slug: String,
    #[serde(default)]
    pub tier: Option<Tier>,
    pub created_at: DateTime<Utc>,
    pub files: BTreeMap<String, ManifestEntry>,
}

impl Manifest {
    pub fn new(slug: &str, tier: Option<Tier>) -> Self {
        Self {
            slug: slug.to_string(),
            tier,
            created_at: Utc::now(),
            files: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, archive_path: &str, entry: ManifestEntry) {
        self.files.insert(archive_path.to_string(), entry);
    }

    pub fn contains(&self, archive_path: &str) -> bool {
        self.files.contains_key(archive_path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn total_size(&self) -> u64 {
        self.files.values().map(|e| e.size).sum()
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(TierpackError::ManifestNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|source| TierpackError::Output {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Build a manifest by listing an assembled directory.
    ///
    /// Paths are relative to `dir`, so `dir` should be the directory that
    /// contains the slug folder.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(TierpackError::ManifestNotFound {
                path: dir.to_path_buf(),
            });
        }

        let mut files = BTreeMap::new();
        for entry in WalkDir::new(dir).sort_by_file_name() {
            // An unreadable subtree would silently shrink the listing.
            let entry = entry.map_err(io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(dir) else {
                continue;
            };
            let content = fs::read(entry.path())?;
            files.insert(
                RelPath::from_path(relative).to_string(),
                ManifestEntry {
                    size: content.len() as u64,
                    hash: compute_hash(&content),
                },
            );
        }

        let slug = files
            .keys()
            .next()
            .map(|p| RelPath::new(p).top_level().to_string())
            .unwrap_or_default();

        Ok(Self {
            slug,
            tier: None,
            created_at: Utc::now(),
            files,
        })
    }

    /// Load from a manifest file, or list an assembled directory.
    pub fn open(path: &Path) -> Result<Self> {
        if path.is_dir() {
            Self::from_dir(path)
        } else {
            Self::load(path)
        }
    }
}

pub fn compute_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("sha256:{}", hex::encode(hasher.finalize()))
}
