//! Cache lifecycle: versioned partition names, install-time precaching and
//! activation-time cleanup.
//!
//! ## Lifecycle
//! 1. **Install**: fetch the whole manifest and store it in the precache
//!    partition, all or nothing
//! 2. **Activate**: delete every partition that does not belong to the
//!    current version, then claim open client sessions
//! 3. **Fetch**: route intercepted requests (see `routing`)

use std::fmt;

use anyhow::Result;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::cache::CacheStorage;
use crate::config::Config;
use crate::error::WorkerError;
use crate::models::{cache_key, Destination, Method, Request, Response};
use crate::net::{Network, NetworkError};

/// Maximum manifest fetches in flight during install.
const MAX_CONCURRENT_FETCHES: usize = 6;

/// Hex characters of the manifest digest embedded in partition names.
const DIGEST_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    /// Install failed; this version never becomes current.
    Redundant,
}

impl WorkerState {
    pub fn can_intercept_fetch(&self) -> bool {
        matches!(self, WorkerState::Activated)
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerState::Parsed => write!(f, "parsed"),
            WorkerState::Installing => write!(f, "installing"),
            WorkerState::Installed => write!(f, "installed"),
            WorkerState::Activating => write!(f, "activating"),
            WorkerState::Activated => write!(f, "activated"),
            WorkerState::Redundant => write!(f, "redundant"),
        }
    }
}

/// Partition names for one version of the app.
///
/// Every name embeds the version string and a digest of the manifest, so
/// changing either one produces a fresh set of partitions instead of merging
/// into the old ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheNames {
    pub precache: String,
    pub pages: String,
    pub assets: String,
    pub images: String,
    pub audio: String,
}

impl CacheNames {
    pub fn new(prefix: &str, version: &str, manifest: &[String]) -> Self {
        let digest = manifest_digest(version, manifest);
        let name = |kind: &str| format!("{}-{}-{}-{}", prefix, kind, version, digest);
        Self {
            precache: name("precache"),
            pages: name("pages"),
            assets: name("assets"),
            images: name("images"),
            audio: name("audio"),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.cache_prefix, &config.version, &config.manifest)
    }

    pub fn all(&self) -> [&str; 5] {
        [
            self.precache.as_str(),
            self.pages.as_str(),
            self.assets.as_str(),
            self.images.as_str(),
            self.audio.as_str(),
        ]
    }

    pub fn contains(&self, name: &str) -> bool {
        self.all().contains(&name)
    }
}

pub fn manifest_digest(version: &str, manifest: &[String]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(version.as_bytes());
    for url in manifest {
        hasher.update(b"\n");
        hasher.update(url.as_bytes());
    }
    let mut digest = hex::encode(hasher.finalize());
    digest.truncate(DIGEST_LEN);
    digest
}

/// Fetch every manifest URL and store the responses in `partition`.
///
/// Nothing is written unless every fetch succeeds with a cacheable response.
pub async fn precache(
    storage: &CacheStorage,
    network: &dyn Network,
    partition: &str,
    manifest: &[String],
    now: DateTime<Utc>,
) -> Result<usize, WorkerError> {
    info!(partition, count = manifest.len(), "Caching app shell and content");

    let responses: Vec<(String, Response)> = stream::iter(manifest)
        .map(move |url| async move {
            let request = Request::get(url.as_str(), Destination::Unknown);
            let response = network
                .fetch(&request)
                .await
                .map_err(|source| WorkerError::Install {
                    url: url.clone(),
                    source,
                })?;
            if !response.is_cacheable() {
                return Err(WorkerError::Install {
                    url: url.clone(),
                    source: NetworkError::from_status(url, response.status),
                });
            }
            debug!(url = %url, bytes = response.body.len(), "Fetched manifest entry");
            Ok((cache_key(Method::Get, url), response))
        })
        .buffered(MAX_CONCURRENT_FETCHES)
        .try_collect()
        .await?;

    let count = responses.len();
    storage
        .put_all(partition, responses, now)
        .map_err(|e| WorkerError::PrecacheStorage(format!("{:#}", e)))?;
    Ok(count)
}

/// Delete every partition that isn't one of `names`. Returns the deleted names.
pub fn purge_stale(storage: &CacheStorage, names: &CacheNames) -> Result<Vec<String>> {
    let mut removed = Vec::new();
    for name in storage.keys() {
        if names.contains(&name) {
            continue;
        }
        info!(partition = %name, "Removing old cache");
        if storage.delete(&name)? {
            removed.push(name);
        }
    }
    Ok(removed)
}

// ============================================================================
// Tests
// ============================================================================
