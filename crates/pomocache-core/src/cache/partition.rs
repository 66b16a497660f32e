use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Response;

use super::ExpirationPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedEntry {
    pub key: String,
    pub response: Response,
    /// Insertion or last update time.
    pub cached_at: DateTime<Utc>,
    /// Write order within the partition; breaks ties between equal timestamps.
    pub seq: u64,
}

/// One named cache: request identity -> stored response.
#[derive(Debug, Clone)]
pub struct Partition {
    name: String,
    entries: HashMap<String, CachedEntry>,
    next_seq: u64,
    /// Creation rank among the partitions of one storage.
    created: u64,
}

impl Partition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: HashMap::new(),
            next_seq: 0,
            created: 0,
        }
    }

    pub(crate) fn with_created(mut self, created: u64) -> Self {
        self.created = created;
        self
    }

    pub(crate) fn from_entries(name: String, entries: Vec<CachedEntry>) -> Self {
        let next_seq = entries.iter().map(|e| e.seq + 1).max().unwrap_or(0);
        Self {
            name,
            entries: entries.into_iter().map(|e| (e.key.clone(), e)).collect(),
            next_seq,
            created: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn created(&self) -> u64 {
        self.created
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&CachedEntry> {
        self.entries.get(key)
    }

    /// Entries from oldest to newest.
    pub fn entries(&self) -> Vec<&CachedEntry> {
        let mut entries: Vec<_> = self.entries.values().collect();
        entries.sort_by_key(|e| (e.cached_at, e.seq));
        entries
    }

    /// Upsert; an overwrite refreshes the entry's timestamp.
    pub fn put(&mut self, key: &str, response: Response, now: DateTime<Utc>) -> &CachedEntry {
        let entry = CachedEntry {
            key: key.to_string(),
            response,
            cached_at: now,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.entries.insert(key.to_string(), entry);
        &self.entries[key]
    }

    pub fn remove(&mut self, key: &str) -> Option<CachedEntry> {
        self.entries.remove(key)
    }

    /// Drop entries past `max_age`, then the oldest entries until at most
    /// `max_entries` remain. Returns what was removed.
    pub fn expire(&mut self, policy: &ExpirationPolicy, now: DateTime<Utc>) -> Vec<CachedEntry> {
        let mut removed = Vec::new();

        let expired: Vec<String> = self
            .entries
            .values()
            .filter(|e| policy.is_expired(e.cached_at, now))
            .map(|e| e.key.clone())
            .collect();
        for key in expired {
            removed.extend(self.entries.remove(&key));
        }

        if let Some(max_entries) = policy.max_entries {
            if self.entries.len() > max_entries {
                let overflow = self.entries.len() - max_entries;
                let oldest: Vec<String> = self
                    .entries()
                    .into_iter()
                    .take(overflow)
                    .map(|e| e.key.clone())
                    .collect();
                for key in oldest {
                    removed.extend(self.entries.remove(&key));
                }
            }
        }

        removed
    }
}
