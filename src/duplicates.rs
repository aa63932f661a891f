//! Duplicate file detection.
//!
//! Detection runs in two passes. Files are first bucketed by exact byte size
//! and singleton buckets are discarded, then each remaining bucket is split
//! either by file name or by a BLAKE3 digest of the full content. Only groups
//! with two or more members are reported. Nothing here deletes anything.

use crate::config::CompiledFilters;
use crate::error::{Error, Result};
use crate::operation::collect_files;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// How members of a size bucket are told apart.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum DetectionMode {
    /// Same size and same file name, case-sensitive.
    #[default]
    Name,
    /// Same size and same content digest.
    Hash,
}

impl fmt::Display for DetectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectionMode::Name => f.write_str("name"),
            DetectionMode::Hash => f.write_str("hash"),
        }
    }
}

/// A set of two or more files believed to be duplicates.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct DuplicateGroup {
    /// File name in name mode, hex digest in hash mode.
    pub key: String,
    /// Shared size in bytes.
    pub size: u64,
    /// Members in path order.
    pub members: BTreeSet<PathBuf>,
}

impl DuplicateGroup {
    /// The member that survives deletion: the first in path order.
    pub fn keeper(&self) -> Option<&PathBuf> {
        self.members.first()
    }

    /// Every member except the keeper.
    pub fn redundant(&self) -> impl Iterator<Item = &PathBuf> {
        self.members.iter().skip(1)
    }

    /// Bytes that deleting the redundant members would free.
    pub fn reclaimable_bytes(&self) -> u64 {
        self.size * (self.members.len() as u64).saturating_sub(1)
    }
}

/// Finds duplicate groups below a directory.
#[derive(Debug, Clone, Copy)]
pub struct DuplicateDetector {
    pub mode: DetectionMode,
    pub recursive: bool,
}

impl DuplicateDetector {
    pub fn new(mode: DetectionMode, recursive: bool) -> Self {
        Self { mode, recursive }
    }

    /// Returns every duplicate group under `root`, ordered by key then size.
    pub fn detect(&self, root: &Path, filters: &CompiledFilters) -> Result<Vec<DuplicateGroup>> {
        let files = collect_files(root, self.recursive, filters)?;
        debug!(
            root = %root.display(),
            files = files.len(),
            mode = %self.mode,
            "scanning for duplicates"
        );

        let mut groups = Vec::new();
        for (size, bucket) in size_buckets(&files) {
            let keyed = match self.mode {
                DetectionMode::Name => group_by_name(&bucket),
                DetectionMode::Hash => group_by_hash(&bucket),
            };
            groups.extend(
                keyed
                    .into_iter()
                    .filter(|(_, members)| members.len() >= 2)
                    .map(|(key, members)| DuplicateGroup { key, size, members }),
            );
        }

        groups.sort();
        debug!(groups = groups.len(), "duplicate scan finished");
        Ok(groups)
    }
}

/// Buckets files by size, keeping only buckets with at least two members.
fn size_buckets(files: &[PathBuf]) -> BTreeMap<u64, Vec<PathBuf>> {
    let mut buckets: BTreeMap<u64, Vec<PathBuf>> = BTreeMap::new();
    for path in files {
        match fs::metadata(path) {
            Ok(meta) => buckets.entry(meta.len()).or_default().push(path.clone()),
            Err(e) => warn!(path = %path.display(), error = %e, "skipping file without metadata"),
        }
    }
    buckets.retain(|_, bucket| bucket.len() >= 2);
    buckets
}

fn group_by_name(bucket: &[PathBuf]) -> BTreeMap<String, BTreeSet<PathBuf>> {
    let mut groups: BTreeMap<String, BTreeSet<PathBuf>> = BTreeMap::new();
    for path in bucket {
        if let Some(name) = path.file_name() {
            groups
                .entry(name.to_string_lossy().into_owned())
                .or_default()
                .insert(path.clone());
        }
    }
    groups
}

fn group_by_hash(bucket: &[PathBuf]) -> BTreeMap<String, BTreeSet<PathBuf>> {
    let mut groups: BTreeMap<String, BTreeSet<PathBuf>> = BTreeMap::new();
    for path in bucket {
        match hash_file(path) {
            Ok(digest) => {
                groups.entry(digest).or_default().insert(path.clone());
            }
            Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable file"),
        }
    }
    groups
}

/// Streams a file through BLAKE3 and returns the hex digest.
pub fn hash_file(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(|e| Error::io(path, e))?;
    let mut hasher = blake3::Hasher::new();
    io::copy(&mut file, &mut hasher).map_err(|e| Error::io(path, e))?;
    Ok(hasher.finalize().to_hex().to_string())
}
