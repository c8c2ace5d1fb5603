// src/record.rs

//! In-memory file records flowing through stages.

use std::path::{Path, PathBuf};

/// A file read from the source tree, or produced by a transform.
///
/// Records are immutable once constructed: transforms produce *new* records
/// instead of mutating their inputs. The path is relative to the glob base of
/// the stage that produced the record (so writing `path` under a stage's
/// destination preserves the sub-directory structure, the way `src -> dest`
/// copies are expected to behave).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    path: PathBuf,
    content: Vec<u8>,
    content_hash: String,
}

impl FileRecord {
    /// Build a record, fingerprinting the content with blake3.
    pub fn new(path: impl Into<PathBuf>, content: Vec<u8>) -> Self {
        let content_hash = blake3::hash(&content).to_hex().to_string();
        Self {
            path: path.into(),
            content,
            content_hash,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Stable blake3 hex digest of the content.
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    /// Relative path with forward slashes, used for sorting and cache keys so
    /// results are identical across platforms.
    pub fn portable_path(&self) -> String {
        self.path.to_string_lossy().replace('\\', "/")
    }

    /// A new record at the same path with different content.
    pub fn with_content(&self, content: Vec<u8>) -> Self {
        Self::new(self.path.clone(), content)
    }

    /// A new record with the file extension rewritten (e.g. `style` -> `css`).
    pub fn with_extension(&self, ext: &str) -> Self {
        let mut rec = self.clone();
        rec.path = self.path.with_extension(ext);
        rec
    }
}
