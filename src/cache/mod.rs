// src/cache/mod.rs

//! Memoization of transform outputs keyed by content identity.
//!
//! The key is a pure function of exactly the inputs that influence a
//! transform's output: the transform's name and version plus the ordered
//! (path, content hash) sequence of the full input set. Two different input
//! sets therefore never share a key, and a hit is behaviorally equivalent to
//! re-running the transform.
//!
//! Store errors are never fatal; callers degrade them to a miss.
//!
//! The store is shared as `Arc<Mutex<Box<dyn Cache>>>`. Concurrent stages
//! touch disjoint keys (keys are content-derived); same-key races are
//! last-write-wins since both writers computed the same value.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use blake3::Hasher;
use tracing::{debug, info};

use crate::errors::{BuildpipeError, Result};
use crate::fs::FileSystem;
use crate::record::FileRecord;

/// Directory under the project root holding the persistent store.
pub const CACHE_DIR: &str = ".buildpipe/cache";

/// Compute the memoization key for running `transform` over `inputs`.
pub fn cache_key(transform_name: &str, transform_version: &str, inputs: &[FileRecord]) -> String {
    let mut hasher = Hasher::new();
    hasher.update(transform_name.as_bytes());
    hasher.update(&[0]);
    hasher.update(transform_version.as_bytes());
    hasher.update(&[0]);
    for record in inputs {
        hasher.update(record.portable_path().as_bytes());
        hasher.update(&[0]);
        hasher.update(record.content_hash().as_bytes());
        hasher.update(&[0]);
    }
    hasher.finalize().to_hex().to_string()
}

/// Abstract storage for memoized transform outputs.
pub trait Cache: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<FileRecord>>>;
    fn put(&mut self, key: &str, outputs: &[FileRecord]) -> Result<()>;
    fn invalidate_all(&mut self) -> Result<()>;
}

/// Persistent store under `<dir>/<key>/`: one blob file per output record
/// plus a `manifest` mapping blob names to record paths. The manifest is
/// written last, so an entry without one is simply not a hit.
pub struct FsCache {
    dir: PathBuf,
    fs: Arc<dyn FileSystem>,
}

impl FsCache {
    pub fn new(dir: PathBuf, fs: Arc<dyn FileSystem>) -> Self {
        Self { dir, fs }
    }

    fn entry_dir(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

impl Cache for FsCache {
    fn get(&self, key: &str) -> Result<Option<Vec<FileRecord>>> {
        let entry = self.entry_dir(key);
        let manifest_path = entry.join("manifest");
        if !self.fs.is_file(&manifest_path) {
            return Ok(None);
        }

        let manifest = self
            .fs
            .read_to_string(&manifest_path)
            .map_err(|e| BuildpipeError::CacheError(e.to_string()))?;

        let mut outputs = Vec::new();
        for line in manifest.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let (blob, rel_path) = trimmed
                .split_once('\t')
                .ok_or_else(|| BuildpipeError::CacheError(format!("bad manifest line: {trimmed}")))?;
            let content = self
                .fs
                .read(&entry.join(blob))
                .map_err(|e| BuildpipeError::CacheError(e.to_string()))?;
            outputs.push(FileRecord::new(rel_path, content));
        }

        debug!(key = %key, records = outputs.len(), "cache hit (fs)");
        Ok(Some(outputs))
    }

    fn put(&mut self, key: &str, outputs: &[FileRecord]) -> Result<()> {
        let entry = self.entry_dir(key);
        let mut manifest = String::new();

        for (i, record) in outputs.iter().enumerate() {
            let blob = format!("f{i}");
            self.fs
                .write(&entry.join(&blob), record.content())
                .map_err(|e| BuildpipeError::CacheError(e.to_string()))?;
            manifest.push_str(&blob);
            manifest.push('\t');
            manifest.push_str(&record.portable_path());
            manifest.push('\n');
        }

        self.fs
            .write(&entry.join("manifest"), manifest.as_bytes())
            .map_err(|e| BuildpipeError::CacheError(e.to_string()))?;

        info!(key = %key, records = outputs.len(), "stored transform output (fs)");
        Ok(())
    }

    fn invalidate_all(&mut self) -> Result<()> {
        self.fs
            .remove_dir_all(&self.dir)
            .map_err(|e| BuildpipeError::CacheError(e.to_string()))?;
        info!(dir = ?self.dir, "cleared transform output cache");
        Ok(())
    }
}

/// In-memory store, for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryCache {
    map: HashMap<String, Vec<FileRecord>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<Vec<FileRecord>>> {
        Ok(self.map.get(key).cloned())
    }

    fn put(&mut self, key: &str, outputs: &[FileRecord]) -> Result<()> {
        self.map.insert(key.to_string(), outputs.to_vec());
        debug!(key = %key, records = outputs.len(), "stored transform output (memory)");
        Ok(())
    }

    fn invalidate_all(&mut self) -> Result<()> {
        self.map.clear();
        Ok(())
    }
}
