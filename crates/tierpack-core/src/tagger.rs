//! Tier marker insertion.
//!
//! Files that belong only to the full tier carry a sentinel line inside
//! their leading `/** ... */` block. `Tagger::tag` is a pure text
//! transform; `TagBatch` does the file I/O for a list of paths.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Result, TierpackError};
use crate::report::Warning;

pub const DEFAULT_MARKER: &str = "@premium_only";

const BLOCK_OPEN: &str = "/**";
const BLOCK_CLOSE: &str = "*/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tagged {
    pub content: String,
    pub changed: bool,
}

/// No leading comment block was found to anchor the marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoHeaderBlock;

/// Line span of the leading block: (opening line, closing line).
fn header_block(lines: &[&str]) -> Option<(usize, usize)> {
    let open = lines
        .iter()
        .position(|line| line.trim_start().starts_with(BLOCK_OPEN))?;
    // A one-line `/** ... */` has no closing line to anchor on.
    if lines[open].trim().len() > BLOCK_OPEN.len() && lines[open].trim_end().ends_with(BLOCK_CLOSE) {
        return None;
    }
    let close = lines[open + 1..]
        .iter()
        .position(|line| line.trim() == BLOCK_CLOSE)?;
    Some((open, open + 1 + close))
}

#[derive(Debug, Clone)]
pub struct Tagger {
    marker: String,
}

impl Default for Tagger {
    fn default() -> Self {
        Self {
            marker: DEFAULT_MARKER.to_string(),
        }
    }
}

impl Tagger {
    /// The marker must be one non-empty word, otherwise it could never be
    /// found again and every `tag` call would add another line.
    pub fn new(marker: impl Into<String>) -> Result<Self> {
        let marker = marker.into();
        let mut words = marker.split_whitespace();
        match (words.next(), words.next()) {
            (Some(word), None) if word == marker => Ok(Self { marker }),
            _ => Err(TierpackError::InvalidPattern {
                pattern: marker,
                reason: "tier marker must be a single word without whitespace".into(),
            }),
        }
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Whether the leading block already carries the marker.
    pub fn is_tagged(&self, content: &str) -> bool {
        let lines: Vec<&str> = content.split('\n').collect();
        match header_block(&lines) {
            Some((open, close)) => lines[open..=close]
                .iter()
                .any(|line| self.line_has_marker(line)),
            None => false,
        }
    }

    /// Insert the marker right before the closing `*/` of the leading block.
    ///
    /// Already-tagged content comes back unchanged.
    pub fn tag(&self, content: &str) -> std::result::Result<Tagged, NoHeaderBlock> {
        let mut lines: Vec<&str> = content.split('\n').collect();
        let (open, close) = header_block(&lines).ok_or(NoHeaderBlock)?;

        if lines[open..=close].iter().any(|line| self.line_has_marker(line)) {
            return Ok(Tagged {
                content: content.to_string(),
                changed: false,
            });
        }

        let closing = lines[close];
        let indent = &closing[..closing.len() - closing.trim_start().len()];
        let line_end = if closing.ends_with('\r') { "\r" } else { "" };
        let marker_line = format!("{indent}* {}{line_end}", self.marker);
        lines.insert(close, &marker_line);

        Ok(Tagged {
            content: lines.join("\n"),
            changed: true,
        })
    }

    fn line_has_marker(&self, line: &str) -> bool {
        line.split_whitespace().any(|word| word == self.marker)
    }
}

/// Outcome of tagging a list of files.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct TagResult {
    pub tagged: Vec<String>,
    pub already_tagged: Vec<String>,
    pub warnings: Vec<Warning>,
}

/// Applies a `Tagger` to files under a root.
///
/// Must not run while a walk or assembly reads the same tree.
pub struct TagBatch<'a> {
    root: PathBuf,
    tagger: &'a Tagger,
    dry_run: bool,
}

impl<'a> TagBatch<'a> {
    pub fn new(root: impl Into<PathBuf>, tagger: &'a Tagger) -> Self {
        Self {
            root: root.into(),
            tagger,
            dry_run: false,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Tag every listed file. Per-file problems become warnings, only
    /// a failed write aborts.
    pub fn run<S: AsRef<str>>(&self, relative_paths: &[S]) -> Result<TagResult> {
        let mut result = TagResult::default();

        for rel in relative_paths {
            let rel = rel.as_ref();
            let path = self.root.join(rel);
            if !path.is_file() {
                result.warnings.push(Warning::MissingFile {
                    path: rel.to_string(),
                });
                continue;
            }

            let content = match fs::read_to_string(&path) {
                Ok(content) => content,
                Err(e) => {
                    debug!(path = rel, error = %e, "unreadable as text");
                    result.warnings.push(Warning::MalformedHeader {
                        path: rel.to_string(),
                    });
                    continue;
                }
            };

            match self.tagger.tag(&content) {
                Ok(Tagged { changed: false, .. }) => result.already_tagged.push(rel.to_string()),
                Ok(Tagged { content, .. }) => {
                    if !self.dry_run {
                        write_file(&path, &content)?;
                    }
                    info!(path = rel, dry_run = self.dry_run, "tagged");
                    result.tagged.push(rel.to_string());
                }
                Err(NoHeaderBlock) => result.warnings.push(Warning::MalformedHeader {
                    path: rel.to_string(),
                }),
            }
        }

        Ok(result)
    }
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).map_err(|source| TierpackError::Output {
        path: path.to_path_buf(),
        source,
    })
}
