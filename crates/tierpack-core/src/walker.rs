//! Lazy, pruning tree traversal.
//!
//! `TreeWalker::walk` returns an iterator that reads a directory only when
//! the consumer asks for the next entry. Each directory is decided before
//! it is read; excluded directories are yielded once and never listed.
//!
//! Filesystem access goes through the `FileSystem` trait so traversal can
//! run against an in-memory tree.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::vec;

use tracing::debug;

use crate::path::{Candidate, EntryKind, RelPath};
use crate::report::Warning;
use crate::ruleset::{Decision, Evaluation, Reason, RuleSet};

/// What `read_dir` reports for one child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsEntryKind {
    File,
    Directory,
    /// Anything the walker must not descend into or ship
    /// (symlinked directories, sockets, ...).
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEntry {
    pub name: String,
    pub kind: FsEntryKind,
}

impl FsEntry {
    pub fn new(name: impl Into<String>, kind: FsEntryKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Directory listing accessor supplied by the caller.
pub trait FileSystem {
    fn read_dir(&self, path: &Path) -> io::Result<Vec<FsEntry>>;

    /// Read a file as bytes; used when a tier needs to look inside files.
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }
}

impl<T: FileSystem + ?Sized> FileSystem for &T {
    fn read_dir(&self, path: &Path) -> io::Result<Vec<FsEntry>> {
        (**self).read_dir(path)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        (**self).read(path)
    }
}

/// The real filesystem. Symlinks to files are shipped as files,
/// symlinks to directories are not followed.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    fn read_dir(&self, path: &Path) -> io::Result<Vec<FsEntry>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            let kind = if file_type.is_dir() {
                FsEntryKind::Directory
            } else if file_type.is_file() {
                FsEntryKind::File
            } else if file_type.is_symlink() {
                match fs::metadata(entry.path()) {
                    Ok(meta) if meta.is_file() => FsEntryKind::File,
                    _ => FsEntryKind::Other,
                }
            } else {
                FsEntryKind::Other
            };
            entries.push(FsEntry::new(
                entry.file_name().to_string_lossy().into_owned(),
                kind,
            ));
        }
        Ok(entries)
    }
}

/// One decided entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    pub path: RelPath,
    pub kind: EntryKind,
    pub evaluation: Evaluation,
}

impl WalkEntry {
    pub fn decision(&self) -> Decision {
        self.evaluation.decision
    }

    pub fn is_included_file(&self) -> bool {
        self.kind == EntryKind::File && self.decision().is_included()
    }
}

/// Counters owned by one walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkStats {
    /// Included files.
    pub accepted: usize,
    /// Excluded files, pruned directories and unreadable entries.
    pub rejected: usize,
    /// Directories excluded before being listed.
    pub pruned: usize,
}

pub struct TreeWalker<'a, F: FileSystem> {
    root: PathBuf,
    fs: F,
    rules: &'a RuleSet,
}

impl<'a> TreeWalker<'a, OsFileSystem> {
    pub fn new(root: impl Into<PathBuf>, rules: &'a RuleSet) -> Self {
        Self::with_fs(root, OsFileSystem, rules)
    }
}

impl<'a, F: FileSystem> TreeWalker<'a, F> {
    pub fn with_fs(root: impl Into<PathBuf>, fs: F, rules: &'a RuleSet) -> Self {
        Self {
            root: root.into(),
            fs,
            rules,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn fs(&self) -> &F {
        &self.fs
    }

    pub fn rules(&self) -> &RuleSet {
        self.rules
    }

    /// Start a fresh traversal. Each call restarts from the root.
    pub fn walk(&self) -> Walk<'_, F> {
        Walk {
            walker: self,
            stack: Vec::new(),
            started: false,
            stats: WalkStats::default(),
            warnings: Vec::new(),
        }
    }
}

struct Frame {
    dir: RelPath,
    entries: vec::IntoIter<FsEntry>,
}

/// Iterator over decided entries, depth first, names sorted.
pub struct Walk<'w, F: FileSystem> {
    walker: &'w TreeWalker<'w, F>,
    stack: Vec<Frame>,
    started: bool,
    stats: WalkStats,
    warnings: Vec<Warning>,
}

impl<'w, F: FileSystem> Walk<'w, F> {
    pub fn stats(&self) -> WalkStats {
        self.stats
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Drain whatever is left and hand back counters and warnings.
    pub fn finish(mut self) -> (WalkStats, Vec<Warning>) {
        for _ in self.by_ref() {}
        (self.stats, self.warnings)
    }

    fn open(&mut self, dir: RelPath) -> io::Result<()> {
        let full = self.walker.root.join(dir.as_str());
        let mut entries = self.walker.fs.read_dir(&full)?;
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        self.stack.push(Frame {
            dir,
            entries: entries.into_iter(),
        });
        Ok(())
    }

    fn reject(&mut self, path: RelPath, kind: EntryKind, warning: Warning) -> WalkEntry {
        let reason = match &warning {
            Warning::UnreadableDirectory { message, .. }
            | Warning::SkippedEntry { message, .. } => message.clone(),
            other => other.to_string(),
        };
        tracing::warn!(path = %path, "{warning}");
        self.warnings.push(warning);
        self.stats.rejected += 1;
        WalkEntry {
            path,
            kind,
            evaluation: Evaluation::excluded(Reason::Skipped(reason)),
        }
    }
}

impl<'w, F: FileSystem> Iterator for Walk<'w, F> {
    type Item = WalkEntry;

    fn next(&mut self) -> Option<WalkEntry> {
        if !self.started {
            self.started = true;
            if let Err(e) = self.open(RelPath::new("")) {
                let warning = Warning::UnreadableDirectory {
                    path: self.walker.root.display().to_string(),
                    message: e.to_string(),
                };
                tracing::warn!("{warning}");
                self.warnings.push(warning);
                return None;
            }
        }

        loop {
            let frame = self.stack.last_mut()?;
            let Some(entry) = frame.entries.next() else {
                self.stack.pop();
                continue;
            };
            let path = frame.dir.join(&entry.name);

            match entry.kind {
                FsEntryKind::Directory => {
                    let evaluation = self.walker.rules.evaluate(&Candidate::dir(path.clone()));
                    if !evaluation.decision.is_included() {
                        debug!(path = %path, reason = %evaluation.reason, "pruned");
                        self.stats.rejected += 1;
                        self.stats.pruned += 1;
                        return Some(WalkEntry {
                            path,
                            kind: EntryKind::Directory,
                            evaluation,
                        });
                    }
                    if let Err(e) = self.open(path.clone()) {
                        let warning = Warning::UnreadableDirectory {
                            path: path.to_string(),
                            message: e.to_string(),
                        };
                        return Some(self.reject(path, EntryKind::Directory, warning));
                    }
                }
                FsEntryKind::File => {
                    let evaluation = self.walker.rules.evaluate(&Candidate::file(path.clone()));
                    if evaluation.decision.is_included() {
                        self.stats.accepted += 1;
                    } else {
                        debug!(path = %path, reason = %evaluation.reason, "excluded");
                        self.stats.rejected += 1;
                    }
                    return Some(WalkEntry {
                        path,
                        kind: EntryKind::File,
                        evaluation,
                    });
                }
                FsEntryKind::Other => {
                    let warning = Warning::SkippedEntry {
                        path: path.to_string(),
                        message: "not a regular file or directory".into(),
                    };
                    return Some(self.reject(path, EntryKind::File, warning));
                }
            }
        }
    }
}
