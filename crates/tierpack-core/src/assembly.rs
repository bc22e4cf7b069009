//! Turning a walk into an artifact.
//!
//! `Assembler::plan` consumes the walker's accepted files for one tier and
//! produces `(source, archive path)` pairs. `Assembler::assemble` hands
//! those pairs to an `ArchiveSink`. Writing the container format is the
//! sink's business; `DirectorySink` stages into a temporary directory and
//! renames it into place only on success.

use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, TierpackError};
use crate::manifest::{compute_hash, Manifest, ManifestEntry};
use crate::path::RelPath;
use crate::report::{RunReport, Warning};
use crate::ruleset::Strategy;
use crate::tagger::Tagger;
use crate::walker::{FileSystem, TreeWalker, WalkEntry};

const STAGING_SUFFIX: &str = ".partial";

/// Artifact variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Every included file.
    Full,
    /// Included files minus those carrying the tier marker.
    Restricted,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Restricted => "restricted",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "full" => Ok(Self::Full),
            "restricted" => Ok(Self::Restricted),
            other => Err(format!("unknown tier '{other}' (expected full or restricted)")),
        }
    }
}

/// Naming scheme for produced artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactName {
    pub slug: String,
    pub version: Option<String>,
    pub restricted_suffix: String,
}

impl ArtifactName {
    /// `slug[-version]` for the full tier, `slug[-version]-suffix` for
    /// the restricted one.
    pub fn for_tier(&self, tier: Tier) -> String {
        let mut name = self.slug.clone();
        if let Some(version) = &self.version {
            name.push('-');
            name.push_str(version);
        }
        if tier == Tier::Restricted {
            name.push('-');
            name.push_str(&self.restricted_suffix);
        }
        name
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanEntry {
    pub source: PathBuf,
    pub relative: RelPath,
    pub archive_path: String,
}

/// Ordered file list for one tier plus the run counters.
#[derive(Debug, Clone)]
pub struct AssemblyPlan {
    pub tier: Tier,
    pub entries: Vec<PlanEntry>,
    /// Included by the rule set but held back from this tier by the marker.
    pub withheld: Vec<RelPath>,
    /// Entries the rule set left out, pruned directories included.
    pub excluded: Vec<WalkEntry>,
    pub report: RunReport,
}

/// Receives files in archive order.
pub trait ArchiveSink {
    fn add_file(&mut self, archive_path: &str, content: &[u8]) -> Result<()>;

    /// Commit the artifact. Nothing is visible under the final name
    /// before this returns `Ok`.
    fn finish(&mut self) -> Result<PathBuf>;
}

pub struct Assembler<'a> {
    slug: &'a str,
    tagger: &'a Tagger,
}

impl<'a> Assembler<'a> {
    pub fn new(slug: &'a str, tagger: &'a Tagger) -> Self {
        Self { slug, tagger }
    }

    pub fn archive_path(&self, relative: &RelPath) -> String {
        format!("{}/{}", self.slug, relative)
    }

    /// Walk the tree and collect the files for `tier`.
    pub fn plan<F: FileSystem>(&self, walker: &TreeWalker<'_, F>, tier: Tier) -> AssemblyPlan {
        let mut entries = Vec::new();
        let mut withheld = Vec::new();
        let mut excluded = Vec::new();
        let mut missing_roots: BTreeSet<&str> = match walker.rules().strategy() {
            Strategy::Allowlist => walker
                .rules()
                .allow_roots()
                .iter()
                .filter(|root| !root.is_root())
                .map(RelPath::as_str)
                .collect(),
            Strategy::Denylist => BTreeSet::new(),
        };

        let mut walk = walker.walk();
        for entry in walk.by_ref() {
            if !missing_roots.is_empty() {
                mark_found(&mut missing_roots, &entry.path);
            }
            if !entry.decision().is_included() {
                excluded.push(entry);
                continue;
            }
            if !entry.is_included_file() {
                continue;
            }

            let source = walker.root().join(entry.path.as_str());
            if tier == Tier::Restricted && self.carries_marker(walker.fs(), &source) {
                debug!(path = %entry.path, "withheld from restricted tier");
                withheld.push(entry.path);
                continue;
            }

            entries.push(PlanEntry {
                archive_path: self.archive_path(&entry.path),
                source,
                relative: entry.path,
            });
        }
        let (stats, walk_warnings) = walk.finish();

        let mut report = RunReport {
            included: entries.len(),
            excluded: stats.rejected + withheld.len(),
            warnings: walk_warnings,
        };

        for root in walker.rules().allow_roots() {
            if missing_roots.contains(root.as_str()) {
                report.warn(Warning::MissingRoot {
                    path: root.to_string(),
                });
            }
        }

        AssemblyPlan {
            tier,
            entries,
            withheld,
            excluded,
            report,
        }
    }

    /// Stream a plan into a sink and return the resulting manifest.
    ///
    /// Sources are read through `fs`, normally the walker's own accessor.
    /// A source that vanished since planning becomes a warning; a sink
    /// failure aborts.
    pub fn assemble<F: FileSystem, S: ArchiveSink>(
        &self,
        fs: &F,
        plan: &AssemblyPlan,
        sink: &mut S,
        report: &mut RunReport,
    ) -> Result<Manifest> {
        let mut manifest = Manifest::new(self.slug, Some(plan.tier));

        for entry in &plan.entries {
            let content = match fs.read(&entry.source) {
                Ok(content) => content,
                Err(e) => {
                    report.warn(Warning::SkippedEntry {
                        path: entry.relative.to_string(),
                        message: e.to_string(),
                    });
                    report.included = report.included.saturating_sub(1);
                    report.excluded += 1;
                    continue;
                }
            };
            sink.add_file(&entry.archive_path, &content)?;
            manifest.insert(
                &entry.archive_path,
                ManifestEntry {
                    size: content.len() as u64,
                    hash: compute_hash(&content),
                },
            );
        }

        let location = sink.finish()?;
        info!(
            tier = %plan.tier,
            files = manifest.len(),
            path = %location.display(),
            "artifact assembled"
        );
        Ok(manifest)
    }

    fn carries_marker<F: FileSystem>(&self, fs: &F, source: &Path) -> bool {
        match fs.read(source) {
            Ok(bytes) => std::str::from_utf8(&bytes)
                .map(|text| self.tagger.is_tagged(text))
                .unwrap_or(false),
            Err(e) => {
                debug!(path = %source.display(), error = %e, "cannot inspect for marker");
                false
            }
        }
    }
}

/// Drop `path` and every ancestor of it from the roots still unseen.
fn mark_found(missing: &mut BTreeSet<&str>, path: &RelPath) {
    let path = path.as_str();
    for (end, _) in path.match_indices('/') {
        missing.remove(&path[..end]);
    }
    missing.remove(path);
}

/// Writes files into `<dest>.partial/` and renames it to `<dest>` on finish.
///
/// An unfinished sink removes its staging directory when dropped.
pub struct DirectorySink {
    dest: PathBuf,
    staging: PathBuf,
    finished: bool,
}

impl DirectorySink {
    pub fn create(dest: impl Into<PathBuf>) -> Result<Self> {
        let dest = dest.into();
        let mut staging = dest.clone().into_os_string();
        staging.push(STAGING_SUFFIX);
        let staging = PathBuf::from(staging);

        if staging.exists() {
            fs::remove_dir_all(&staging).map_err(|e| output_error(&staging, e))?;
        }
        fs::create_dir_all(&staging).map_err(|e| output_error(&staging, e))?;

        Ok(Self {
            dest,
            staging,
            finished: false,
        })
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging
    }
}

impl ArchiveSink for DirectorySink {
    fn add_file(&mut self, archive_path: &str, content: &[u8]) -> Result<()> {
        let target = self.staging.join(archive_path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| output_error(parent, e))?;
        }
        fs::write(&target, content).map_err(|e| output_error(&target, e))
    }

    fn finish(&mut self) -> Result<PathBuf> {
        if self.dest.exists() {
            fs::remove_dir_all(&self.dest).map_err(|e| output_error(&self.dest, e))?;
        }
        fs::rename(&self.staging, &self.dest).map_err(|e| output_error(&self.dest, e))?;
        self.finished = true;
        Ok(self.dest.clone())
    }
}

impl Drop for DirectorySink {
    fn drop(&mut self) {
        if !self.finished {
            let _ = fs::remove_dir_all(&self.staging);
        }
    }
}

fn output_error(path: &Path, source: std::io::Error) -> TierpackError {
    TierpackError::Output {
        path: path.to_path_buf(),
        source,
    }
}
