//! Partition storage: in memory, optionally mirrored to disk.
//!
//! On-disk layout, one directory per partition:
//!   <root>/<partition dir>/index.json   name, creation rank, keys, statuses, headers, timestamps
//!   <root>/<partition dir>/<blob>.bin   response bodies

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::models::{Request, Response};
use crate::persist;

use super::{CachedEntry, ExpirationPolicy, Partition};

const INDEX_FILE: &str = "index.json";

#[derive(Debug, Serialize, Deserialize)]
struct PartitionIndex {
    name: String,
    #[serde(default)]
    created: u64,
    entries: Vec<IndexEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexEntry {
    key: String,
    status: u16,
    headers: BTreeMap<String, String>,
    cached_at: DateTime<Utc>,
    seq: u64,
    blob: String,
}

/// Every cache partition the worker owns, keyed by name.
pub struct CacheStorage {
    root: Option<PathBuf>,
    /// Kept in creation order; cross-partition lookups search oldest first.
    partitions: Mutex<Vec<Partition>>,
}

impl CacheStorage {
    /// Storage that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self {
            root: None,
            partitions: Mutex::new(Vec::new()),
        }
    }

    /// Open (or create) storage rooted at `root`, loading every partition
    /// found there.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create cache directory: {}", root.display()))?;

        let mut partitions = Vec::new();
        for dir_entry in std::fs::read_dir(&root)
            .with_context(|| format!("Failed to list cache directory: {}", root.display()))?
        {
            let path = dir_entry?.path();
            if !path.is_dir() {
                continue;
            }
            match Self::load_partition(&path) {
                Ok(Some(partition)) => partitions.push(partition),
                Ok(None) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable partition"),
            }
        }
        partitions.sort_by(|a, b| (a.created(), a.name()).cmp(&(b.created(), b.name())));
        debug!(count = partitions.len(), root = %root.display(), "Loaded cache partitions");

        Ok(Self {
            root: Some(root),
            partitions: Mutex::new(partitions),
        })
    }

    /// A fresh partition ranked after every existing one.
    fn new_partition(partitions: &[Partition], name: &str) -> Partition {
        let created = partitions.iter().map(|p| p.created() + 1).max().unwrap_or(0);
        Partition::new(name).with_created(created)
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Partition>> {
        self.partitions.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn keys(&self) -> Vec<String> {
        self.lock().iter().map(|p| p.name().to_string()).collect()
    }

    pub fn has(&self, name: &str) -> bool {
        self.lock().iter().any(|p| p.name() == name)
    }

    /// Number of entries in a partition, 0 when it doesn't exist.
    pub fn len(&self, name: &str) -> usize {
        self.lock()
            .iter()
            .find(|p| p.name() == name)
            .map(Partition::len)
            .unwrap_or(0)
    }

    /// Create the partition if it is missing.
    pub fn ensure(&self, name: &str) -> Result<()> {
        let mut partitions = self.lock();
        if partitions.iter().any(|p| p.name() == name) {
            return Ok(());
        }
        let partition = Self::new_partition(&partitions, name);
        self.write_index(&partition)?;
        partitions.push(partition);
        Ok(())
    }

    /// Delete a whole partition. Returns whether it existed.
    pub fn delete(&self, name: &str) -> Result<bool> {
        let mut partitions = self.lock();
        let Some(pos) = partitions.iter().position(|p| p.name() == name) else {
            return Ok(false);
        };
        partitions.remove(pos);
        if let Some(dir) = self.partition_dir(name) {
            if dir.exists() {
                std::fs::remove_dir_all(&dir)
                    .with_context(|| format!("Failed to delete partition: {}", name))?;
            }
        }
        Ok(true)
    }

    pub fn get(&self, name: &str, key: &str) -> Option<CachedEntry> {
        self.lock()
            .iter()
            .find(|p| p.name() == name)
            .and_then(|p| p.get(key).cloned())
    }

    /// Look a key up in one partition, honouring its expiration policy.
    /// Expired entries are removed instead of served.
    pub fn lookup(
        &self,
        name: &str,
        key: &str,
        policy: &ExpirationPolicy,
        now: DateTime<Utc>,
    ) -> Option<Response> {
        let entry = self.get(name, key)?;
        if policy.is_expired(entry.cached_at, now) {
            debug!(partition = name, key, "Cached entry expired");
            if let Err(e) = self.remove(name, key) {
                warn!(partition = name, key, error = %e, "Failed to remove expired entry");
            }
            return None;
        }
        Some(entry.response)
    }

    /// Search every partition for a key, oldest partition first.
    pub fn match_any(&self, key: &str) -> Option<Response> {
        self.lock()
            .iter()
            .find_map(|p| p.get(key).map(|e| e.response.clone()))
    }

    /// Single-key upsert, creating the partition if needed.
    /// The partition only changes in memory once its files are written.
    pub fn put(&self, name: &str, key: &str, response: Response, now: DateTime<Utc>) -> Result<()> {
        self.put_all(name, vec![(key.to_string(), response)], now)
    }

    /// Write a batch of entries as one unit: either every entry is stored or
    /// the partition is left exactly as it was.
    pub fn put_all(
        &self,
        name: &str,
        entries: Vec<(String, Response)>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mut partitions = self.lock();
        let pos = partitions.iter().position(|p| p.name() == name);
        let mut staged = match pos {
            Some(pos) => partitions[pos].clone(),
            None => Self::new_partition(&partitions, name),
        };

        for (key, response) in entries {
            let entry = staged.put(&key, response, now).clone();
            self.write_blob(name, &entry)?;
        }
        self.write_index(&staged)?;

        match pos {
            Some(pos) => partitions[pos] = staged,
            None => partitions.push(staged),
        }
        Ok(())
    }

    pub fn remove(&self, name: &str, key: &str) -> Result<bool> {
        let mut partitions = self.lock();
        let Some(partition) = partitions.iter_mut().find(|p| p.name() == name) else {
            return Ok(false);
        };
        if partition.remove(key).is_none() {
            return Ok(false);
        }
        self.remove_blob(name, key);
        self.write_index(partition)?;
        Ok(true)
    }

    /// Apply an expiration policy to a partition. Returns the number of
    /// entries evicted.
    pub fn expire(&self, name: &str, policy: &ExpirationPolicy, now: DateTime<Utc>) -> Result<usize> {
        let mut partitions = self.lock();
        let Some(partition) = partitions.iter_mut().find(|p| p.name() == name) else {
            return Ok(0);
        };
        let removed = partition.expire(policy, now);
        if removed.is_empty() {
            return Ok(0);
        }
        for entry in &removed {
            debug!(partition = name, key = %entry.key, "Evicted cache entry");
            self.remove_blob(name, &entry.key);
        }
        self.write_index(partition)?;
        Ok(removed.len())
    }

    /// Best-effort write-back shared by every caching strategy.
    ///
    /// Only cacheable responses to non-mutating requests are stored; the
    /// partition's expiration policy is applied right after the insert.
    /// Failures are logged and reported as `false`, never raised.
    pub fn store_if_cacheable(
        &self,
        name: &str,
        policy: &ExpirationPolicy,
        request: &Request,
        response: &Response,
        now: DateTime<Utc>,
    ) -> bool {
        let Some(key) = request.cache_key() else {
            return false;
        };
        if !response.is_cacheable() {
            debug!(url = %request.url, status = response.status, "Not caching response");
            return false;
        }

        if let Err(e) = self.put(name, &key, response.clone(), now) {
            warn!(partition = name, url = %request.url, error = %e, "Failed to cache response");
            return false;
        }
        debug!(partition = name, url = %request.url, "Cached response");

        if let Err(e) = self.expire(name, policy, now) {
            warn!(partition = name, error = %e, "Failed to apply expiration policy");
        }
        true
    }

    // ===== Disk persistence =====

    fn partition_dir(&self, name: &str) -> Option<PathBuf> {
        let dir_name: String = name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
            .collect();
        self.root.as_ref().map(|root| root.join(dir_name))
    }

    fn blob_name(key: &str) -> String {
        hex::encode(Sha256::digest(key.as_bytes()))
    }

    fn write_blob(&self, name: &str, entry: &CachedEntry) -> Result<()> {
        let Some(dir) = self.partition_dir(name) else {
            return Ok(());
        };
        let path = dir.join(format!("{}.bin", Self::blob_name(&entry.key)));
        persist::write_bytes(&path, &entry.response.body)
    }

    fn remove_blob(&self, name: &str, key: &str) {
        if let Some(dir) = self.partition_dir(name) {
            let path = dir.join(format!("{}.bin", Self::blob_name(key)));
            if let Err(e) = std::fs::remove_file(&path) {
                debug!(path = %path.display(), error = %e, "Failed to remove blob");
            }
        }
    }

    fn write_index(&self, partition: &Partition) -> Result<()> {
        let Some(dir) = self.partition_dir(partition.name()) else {
            return Ok(());
        };
        let index = PartitionIndex {
            name: partition.name().to_string(),
            created: partition.created(),
            entries: partition
                .entries()
                .into_iter()
                .map(|e| IndexEntry {
                    key: e.key.clone(),
                    status: e.response.status,
                    headers: e.response.headers.clone(),
                    cached_at: e.cached_at,
                    seq: e.seq,
                    blob: Self::blob_name(&e.key),
                })
                .collect(),
        };
        persist::write_json(&dir.join(INDEX_FILE), &index)
            .with_context(|| format!("Failed to write index for partition: {}", partition.name()))
    }

    fn load_partition(dir: &Path) -> Result<Option<Partition>> {
        let Some(index) = persist::read_json::<PartitionIndex>(&dir.join(INDEX_FILE))? else {
            return Ok(None);
        };

        let mut entries = Vec::with_capacity(index.entries.len());
        for entry in index.entries {
            let blob_path = dir.join(format!("{}.bin", entry.blob));
            let body = match std::fs::read(&blob_path) {
                Ok(body) => body,
                Err(e) => {
                    warn!(partition = %index.name, key = %entry.key, error = %e, "Dropping entry with missing body");
                    continue;
                }
            };
            entries.push(CachedEntry {
                key: entry.key,
                response: Response {
                    status: entry.status,
                    headers: entry.headers,
                    body,
                },
                cached_at: entry.cached_at,
                seq: entry.seq,
            });
        }

        Ok(Some(
            Partition::from_entries(index.name, entries).with_created(index.created),
        ))
    }
}

// ============================================================================
// Tests
// ============================================================================
