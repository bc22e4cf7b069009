//! Human-oriented listing of what a walk leaves out.

use std::collections::BTreeMap;

use crate::path::EntryKind;
use crate::walker::WalkEntry;

/// Root files are grouped by extension above this many.
pub const GROUP_THRESHOLD: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootFiles {
    Listed(Vec<String>),
    /// extension (or empty for none) -> count
    Grouped(BTreeMap<String, usize>),
}

impl RootFiles {
    pub fn lines(&self) -> Vec<String> {
        match self {
            Self::Listed(names) => names.clone(),
            Self::Grouped(groups) => groups
                .iter()
                .map(|(ext, count)| {
                    let noun = if *count == 1 { "file" } else { "files" };
                    if ext.is_empty() {
                        format!("(no extension) ({count} {noun})")
                    } else {
                        format!("*.{ext} ({count} {noun})")
                    }
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExclusionSummary {
    /// Excluded top-level directories, with a trailing `/`.
    pub dirs: Vec<String>,
    pub root_files: RootFiles,
    /// Excluded files below the top level.
    pub nested_files: usize,
}

impl ExclusionSummary {
    pub fn from_entries<'e>(entries: impl IntoIterator<Item = &'e WalkEntry>) -> Self {
        let mut dirs = Vec::new();
        let mut files = Vec::new();
        let mut nested_files = 0;

        for entry in entries {
            if entry.decision().is_included() {
                continue;
            }
            match (entry.kind, entry.path.depth()) {
                (EntryKind::Directory, 1) => dirs.push(format!("{}/", entry.path)),
                (EntryKind::File, 1) => files.push(entry.path.to_string()),
                (EntryKind::File, _) => nested_files += 1,
                _ => {}
            }
        }
        dirs.sort();
        files.sort();

        let root_files = if files.len() > GROUP_THRESHOLD {
            let mut groups = BTreeMap::new();
            for name in &files {
                *groups.entry(extension(name).to_string()).or_insert(0) += 1;
            }
            RootFiles::Grouped(groups)
        } else {
            RootFiles::Listed(files)
        };

        Self {
            dirs,
            root_files,
            nested_files,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
            && self.nested_files == 0
            && matches!(&self.root_files, RootFiles::Listed(f) if f.is_empty())
    }
}

fn extension(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext,
        _ => "",
    }
}

/// Byte count as B/KB/MB/GB/TB with two decimals.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{size:.2} {}", UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::RelPath;
    use crate::ruleset::{Evaluation, Reason};

    fn excluded(path: &str, kind: EntryKind) -> WalkEntry {
        WalkEntry {
            path: RelPath::new(path),
            kind,
            evaluation: Evaluation::excluded(Reason::Default),
        }
    }

    fn included(path: &str) -> WalkEntry {
        WalkEntry {
            path: RelPath::new(path),
            kind: EntryKind::File,
            evaluation: Evaluation::included(Reason::Default),
        }
    }

    #[test]
    fn test_lists_top_level_exclusions() {
        let entries = vec![
            excluded("tests", EntryKind::Directory),
            excluded(".git", EntryKind::Directory),
            excluded("README.md", EntryKind::File),
            excluded("includes/notes.md", EntryKind::File),
            included("plugin.php"),
        ];
        let summary = ExclusionSummary::from_entries(&entries);
        assert_eq!(summary.dirs, vec![".git/", "tests/"]);
        assert_eq!(summary.root_files, RootFiles::Listed(vec!["README.md".into()]));
        assert_eq!(summary.nested_files, 1);
        assert!(!summary.is_empty());
    }

    #[test]
    fn test_groups_root_files_by_extension() {
        let mut entries: Vec<WalkEntry> = (0..9)
            .map(|i| excluded(&format!("doc{i}.md"), EntryKind::File))
            .collect();
        entries.push(excluded("build.sh", EntryKind::File));
        entries.push(excluded("deploy.sh", EntryKind::File));
        entries.push(excluded("Makefile", EntryKind::File));

        let summary = ExclusionSummary::from_entries(&entries);
        assert_eq!(
            summary.root_files.lines(),
            vec![
                "(no extension) (1 file)".to_string(),
                "*.md (9 files)".to_string(),
                "*.sh (2 files)".to_string(),
            ]
        );
    }

    #[test]
    fn test_ten_root_files_stay_listed() {
        let entries: Vec<WalkEntry> = (0..10)
            .map(|i| excluded(&format!("f{i}.txt"), EntryKind::File))
            .collect();
        let summary = ExclusionSummary::from_entries(&entries);
        assert!(matches!(summary.root_files, RootFiles::Listed(ref f) if f.len() == 10));
    }

    #[test]
    fn test_dotfile_has_no_extension() {
        assert_eq!(extension(".distignore"), "");
        assert_eq!(extension("a.tar.gz"), "gz");
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0.00 B");
        assert_eq!(format_size(512), "512.00 B");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.00 MB");
        assert_eq!(format_size(3 * 1024_u64.pow(4)), "3.00 TB");
    }
}
