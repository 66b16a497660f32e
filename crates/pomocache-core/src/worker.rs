//! The offline worker: one object owning every piece of worker state.
//!
//! The host feeds it lifecycle, fetch, push, click and sync events and calls
//! `settle` before tearing it down, so background work registered during
//! those events (asset revalidation, notification timeouts) gets to finish.

use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::cache::CacheStorage;
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::error::WorkerError;
use crate::lifecycle::{self, CacheNames, WorkerState};
use crate::lifetime::EventLifetime;
use crate::models::{Notification, Request, Response, SessionKind};
use crate::net::Network;
use crate::notify::{ClickOutcome, Clients, NotificationCenter, Notifier};
use crate::routing::Router;
use crate::sync::{ReplaySummary, RetryQueue};

/// Collaborators provided by the hosting runtime.
#[derive(Clone)]
pub struct Host {
    pub network: Arc<dyn Network>,
    pub clients: Arc<dyn Clients>,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn Clock>,
}

impl Host {
    pub fn new(
        network: Arc<dyn Network>,
        clients: Arc<dyn Clients>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            network,
            clients,
            notifier,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PartitionStatus {
    pub name: String,
    pub entries: usize,
    /// Belongs to the running version.
    pub current: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkerStatus {
    pub state: WorkerState,
    pub version: String,
    pub partitions: Vec<PartitionStatus>,
    pub queued_requests: usize,
}

pub struct OfflineWorker {
    config: Config,
    names: CacheNames,
    host: Host,
    storage: Arc<CacheStorage>,
    queue: Arc<RetryQueue>,
    router: Router,
    notifications: NotificationCenter,
    state: Mutex<WorkerState>,
    lifetime: EventLifetime,
}

impl OfflineWorker {
    pub fn new(
        config: Config,
        host: Host,
        storage: CacheStorage,
        queue: RetryQueue,
    ) -> Result<Self> {
        let names = CacheNames::from_config(&config);
        let storage = Arc::new(storage);
        let queue = Arc::new(queue);
        let router = Router::new(
            &config,
            names.clone(),
            storage.clone(),
            host.network.clone(),
            host.clock.clone(),
            queue.clone(),
        )?;
        let notifications = NotificationCenter::new(
            config.origin_url()?,
            host.notifier.clone(),
            host.clients.clone(),
        );

        // A worker whose precache is already on disk was activated in an
        // earlier run and resumes serving.
        let state = if storage.has(&names.precache) {
            WorkerState::Activated
        } else {
            WorkerState::Parsed
        };
        debug!(%state, precache = %names.precache, "Worker created");

        Ok(Self {
            config,
            names,
            host,
            storage,
            queue,
            router,
            notifications,
            state: Mutex::new(state),
            lifetime: EventLifetime::new(),
        })
    }

    /// Worker backed by partitions and a retry queue under the configured
    /// data directory.
    pub fn open(config: Config, host: Host) -> Result<Self> {
        let data_dir = config.data_dir()?;
        let storage = CacheStorage::open(data_dir.join("caches"))
            .context("Failed to open cache storage")?;
        let queue = RetryQueue::open(&config.sync_tag, &data_dir)
            .context("Failed to open retry queue")?;
        Self::new(config, host, storage, queue)
    }

    fn lock_state(&self) -> MutexGuard<'_, WorkerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, state: WorkerState) {
        *self.lock_state() = state;
    }

    pub fn state(&self) -> WorkerState {
        *self.lock_state()
    }

    pub fn names(&self) -> &CacheNames {
        &self.names
    }

    pub fn storage(&self) -> &CacheStorage {
        &self.storage
    }

    pub fn queue(&self) -> &RetryQueue {
        &self.queue
    }

    pub fn lifetime(&self) -> &EventLifetime {
        &self.lifetime
    }

    // ===== Lifecycle =====

    /// Populate the precache from the manifest. All or nothing: on failure
    /// an already activated worker keeps serving what it has, otherwise the
    /// worker becomes redundant.
    ///
    /// Success means skip-waiting: the worker can be activated right away.
    pub async fn install(&self) -> Result<usize, WorkerError> {
        info!(version = %self.config.version, "Installing worker");
        let previous = self.state();
        self.set_state(WorkerState::Installing);

        let result = lifecycle::precache(
            &self.storage,
            self.host.network.as_ref(),
            &self.names.precache,
            &self.config.manifest,
            self.host.clock.now(),
        )
        .await;

        match result {
            Ok(count) => {
                info!(count, "Successfully installed and cached app shell");
                self.set_state(WorkerState::Installed);
                Ok(count)
            }
            Err(e) => {
                error!(error = %e, "Error during install");
                let state = match previous {
                    WorkerState::Activated => WorkerState::Activated,
                    _ => WorkerState::Redundant,
                };
                self.set_state(state);
                Err(e)
            }
        }
    }

    /// Purge partitions from other versions and take control of every open
    /// session. Safe to run more than once.
    pub async fn activate(&self) -> Result<Vec<String>> {
        let state = self.state();
        if !matches!(state, WorkerState::Installed | WorkerState::Activated) {
            return Err(WorkerError::InvalidState {
                action: "activate",
                state,
            }
            .into());
        }

        info!("Activating worker");
        self.set_state(WorkerState::Activating);
        let removed = match lifecycle::purge_stale(&self.storage, &self.names) {
            Ok(removed) => removed,
            Err(e) => {
                self.set_state(state);
                return Err(e.context("Failed to remove old caches"));
            }
        };

        let claimed = self.host.clients.claim().await.unwrap_or_else(|e| {
            warn!(error = %e, "Failed to claim clients");
            0
        });
        self.set_state(WorkerState::Activated);
        info!(removed = removed.len(), claimed, "Worker activated");
        Ok(removed)
    }

    // ===== Events =====

    /// Answer an intercepted request. Until the worker is activated requests
    /// go straight to the network.
    pub async fn fetch(&self, request: Request) -> Response {
        if !self.state().can_intercept_fetch() {
            debug!(url = %request.url, state = %self.state(), "Not intercepting fetch");
            return self.router.pass_through(&request).await;
        }
        self.router.handle(request, &self.lifetime).await
    }

    pub async fn push(&self, data: Option<&[u8]>) -> Result<Notification> {
        self.notifications.push(data, &self.lifetime).await
    }

    pub async fn notification_click(&self, notification: &Notification) -> Result<ClickOutcome> {
        self.notifications.click(notification).await
    }

    /// Local notification for a finished timer session.
    pub async fn notify_session_complete(&self, kind: SessionKind) -> Result<Notification> {
        self.notifications.session_complete(kind, &self.lifetime).await
    }

    /// Background sync event. Only the retry queue's tag triggers a replay.
    pub async fn sync(&self, tag: &str) -> Result<Option<ReplaySummary>> {
        info!(tag, "Background sync event");
        if tag != self.queue.name() {
            debug!(tag, "Ignoring sync event for unknown tag");
            return Ok(None);
        }
        self.replay().await.map(Some)
    }

    /// Connectivity came back.
    pub async fn online(&self) -> Result<ReplaySummary> {
        info!("Back online");
        self.replay().await
    }

    async fn replay(&self) -> Result<ReplaySummary> {
        self.queue
            .replay(self.host.network.as_ref(), self.host.clock.as_ref())
            .await
    }

    /// Wait for all background work started by earlier events.
    pub async fn settle(&self) -> usize {
        self.lifetime.settle().await
    }

    pub fn status(&self) -> WorkerStatus {
        let partitions = self
            .storage
            .keys()
            .into_iter()
            .map(|name| PartitionStatus {
                entries: self.storage.len(&name),
                current: self.names.contains(&name),
                name,
            })
            .collect();
        WorkerStatus {
            state: self.state(),
            version: self.config.version.clone(),
            partitions,
            queued_requests: self.queue.len(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
