use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::models::Request;
use crate::net::Network;
use crate::persist;

/// Queued requests not replayed within this window are dropped.
const DEFAULT_RETENTION_HOURS: i64 = 24;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedRequest {
    pub id: u64,
    pub request: Request,
    pub enqueued_at: DateTime<Utc>,
}

impl QueuedRequest {
    pub fn is_expired(&self, retention: Duration, now: DateTime<Utc>) -> bool {
        now - self.enqueued_at >= retention
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct QueueFile {
    name: String,
    next_id: u64,
    entries: VecDeque<QueuedRequest>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReplaySummary {
    pub replayed: usize,
    pub failed: usize,
    pub expired: usize,
}

/// Durable FIFO of mutating requests waiting for connectivity.
pub struct RetryQueue {
    name: String,
    path: Option<PathBuf>,
    retention: Duration,
    state: Mutex<QueueFile>,
    /// Held for a whole replay pass so concurrent triggers can't send an
    /// entry twice.
    replay_lock: tokio::sync::Mutex<()>,
}

impl RetryQueue {
    pub fn in_memory(name: &str) -> Self {
        Self::with_state(name, None, QueueFile::default())
    }

    /// Open the queue stored under `dir`, creating it if missing.
    pub fn open(name: &str, dir: &Path) -> Result<Self> {
        let path = dir.join(format!("{}.queue.json", name));
        let state = persist::read_json::<QueueFile>(&path)
            .with_context(|| format!("Failed to load retry queue: {}", name))?
            .unwrap_or_default();
        debug!(queue = name, count = state.entries.len(), "Loaded retry queue");
        Ok(Self::with_state(name, Some(path), state))
    }

    fn with_state(name: &str, path: Option<PathBuf>, mut state: QueueFile) -> Self {
        state.name = name.to_string();
        Self {
            name: name.to_string(),
            path,
            retention: Duration::hours(DEFAULT_RETENTION_HOURS),
            state: Mutex::new(state),
            replay_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    fn lock(&self) -> MutexGuard<'_, QueueFile> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn save(&self, state: &QueueFile) -> Result<()> {
        match self.path {
            Some(ref path) => persist::write_json(path, state)
                .with_context(|| format!("Failed to save retry queue: {}", self.name)),
            None => Ok(()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of queued entries, oldest first.
    pub fn entries(&self) -> Vec<QueuedRequest> {
        self.lock().entries.iter().cloned().collect()
    }

    /// Persist `staged` and only then make it the live queue, so a failed
    /// write leaves memory and disk agreeing.
    fn commit(&self, state: &mut QueueFile, staged: QueueFile) -> Result<()> {
        self.save(&staged)?;
        *state = staged;
        Ok(())
    }

    pub fn push(&self, request: Request, now: DateTime<Utc>) -> Result<u64> {
        let mut state = self.lock();
        let mut staged = state.clone();
        let id = staged.next_id;
        staged.next_id += 1;
        let (method, url) = (request.method, request.url.clone());
        staged.entries.push_back(QueuedRequest {
            id,
            request,
            enqueued_at: now,
        });
        self.commit(&mut state, staged)?;
        info!(queue = %self.name, id, %method, %url, "Queued request for background sync");
        Ok(id)
    }

    fn remove(&self, id: u64) -> Result<()> {
        let mut state = self.lock();
        let mut staged = state.clone();
        staged.entries.retain(|e| e.id != id);
        self.commit(&mut state, staged)
    }

    /// Drop entries older than the retention window.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut state = self.lock();
        let mut staged = state.clone();
        let retention = self.retention;
        staged.entries.retain(|e| {
            let expired = e.is_expired(retention, now);
            if expired {
                debug!(id = e.id, url = %e.request.url, "Dropping expired queued request");
            }
            !expired
        });
        let dropped = state.entries.len() - staged.entries.len();
        if dropped > 0 {
            self.commit(&mut state, staged)?;
        }
        Ok(dropped)
    }

    /// Try every live entry once, oldest first. Delivered entries are
    /// removed; entries that fail stay queued for the next trigger.
    pub async fn replay(&self, network: &dyn Network, clock: &dyn Clock) -> Result<ReplaySummary> {
        let _replaying = self.replay_lock.lock().await;

        let mut summary = ReplaySummary {
            expired: self.purge_expired(clock.now())?,
            ..ReplaySummary::default()
        };
        let pending = self.entries();
        if pending.is_empty() {
            return Ok(summary);
        }
        info!(queue = %self.name, count = pending.len(), "Replaying queued requests");

        for entry in pending {
            match network.fetch(&entry.request).await {
                Ok(response) => {
                    debug!(id = entry.id, url = %entry.request.url, status = response.status, "Replayed queued request");
                    self.remove(entry.id)?;
                    summary.replayed += 1;
                }
                Err(e) => {
                    warn!(id = entry.id, url = %entry.request.url, error = %e, "Replay failed, keeping request queued");
                    summary.failed += 1;
                }
            }
        }
        Ok(summary)
    }
}

// ============================================================================
// Tests
// ============================================================================
