pub mod assembly;
pub mod compare;
pub mod config;
pub mod error;
pub mod manifest;
pub mod path;
pub mod pattern;
pub mod report;
pub mod ruleset;
pub mod summary;
pub mod tagger;
pub mod walker;

pub use assembly::{
    ArchiveSink, ArtifactName, Assembler, AssemblyPlan, DirectorySink, PlanEntry, Tier,
};
pub use compare::{
    diff, BuiltinCategory, Category, CategoryGroup, DiffReport, Taxonomy, BUILTIN_CATEGORIES,
    OTHER_CATEGORY,
};
pub use config::{Config, RuleSpec, CONFIG_FILE};
pub use error::{Result, TierpackError};
pub use manifest::{compute_hash, Manifest, ManifestEntry, MANIFEST_SUFFIX};
pub use path::{Candidate, EntryKind, RelPath};
pub use pattern::{Rule, RuleKind};
pub use report::{RunReport, Warning};
pub use ruleset::{Decision, Evaluation, Reason, RuleSet, RuleSetBuilder, Strategy};
pub use summary::{format_size, ExclusionSummary, RootFiles};
pub use tagger::{TagBatch, TagResult, Tagged, Tagger, DEFAULT_MARKER};
pub use walker::{
    FileSystem, FsEntry, FsEntryKind, OsFileSystem, TreeWalker, Walk, WalkEntry, WalkStats,
};
