//! In-memory stand-ins for the network and the hosting runtime.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Notification, Request, Response};
use crate::net::{Network, NetworkError};
use crate::notify::{ClientInfo, Clients, Notifier};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

#[derive(Default)]
struct NetworkState {
    routes: HashMap<String, Response>,
    delays: HashMap<String, Duration>,
    failing: HashSet<String>,
    offline: bool,
    requests: Vec<Request>,
}

/// Serves canned responses by URL and records every request it sees.
/// Unknown URLs answer 404.
#[derive(Default)]
pub struct FakeNetwork {
    state: Mutex<NetworkState>,
}

impl FakeNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(&self, url: &str, response: Response) {
        lock(&self.state).routes.insert(url.to_string(), response);
    }

    pub fn delay(&self, url: &str, by: Duration) {
        lock(&self.state).delays.insert(url.to_string(), by);
    }

    /// Make a single URL fail at the transport level.
    pub fn fail(&self, url: &str) {
        lock(&self.state).failing.insert(url.to_string());
    }

    pub fn set_offline(&self, offline: bool) {
        lock(&self.state).offline = offline;
    }

    pub fn calls(&self, url: &str) -> usize {
        lock(&self.state).requests.iter().filter(|r| r.url == url).count()
    }

    pub fn total_calls(&self) -> usize {
        lock(&self.state).requests.len()
    }

    pub fn requests(&self) -> Vec<Request> {
        lock(&self.state).requests.clone()
    }
}

#[async_trait]
impl Network for FakeNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, NetworkError> {
        let (delay, outcome) = {
            let mut state = lock(&self.state);
            state.requests.push(request.clone());
            let outcome = if state.offline || state.failing.contains(&request.url) {
                Err(NetworkError::Offline)
            } else {
                Ok(state
                    .routes
                    .get(&request.url)
                    .cloned()
                    .unwrap_or_else(|| Response::new(404, "not found")))
            };
            (state.delays.get(&request.url).copied(), outcome)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        outcome
    }
}

#[derive(Default)]
struct ClientsState {
    open: Vec<ClientInfo>,
    focused: Vec<String>,
    opened: Vec<String>,
    claims: usize,
}

#[derive(Default)]
pub struct FakeClients {
    state: Mutex<ClientsState>,
}

impl FakeClients {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_window(self, id: &str, url: &str) -> Self {
        lock(&self.state).open.push(ClientInfo {
            id: id.to_string(),
            url: url.to_string(),
            focused: false,
        });
        self
    }

    pub fn focused(&self) -> Vec<String> {
        lock(&self.state).focused.clone()
    }

    pub fn opened(&self) -> Vec<String> {
        lock(&self.state).opened.clone()
    }

    pub fn claims(&self) -> usize {
        lock(&self.state).claims
    }
}

#[async_trait]
impl Clients for FakeClients {
    async fn match_all(&self) -> Result<Vec<ClientInfo>> {
        Ok(lock(&self.state).open.clone())
    }

    async fn focus(&self, id: &str) -> Result<()> {
        let mut state = lock(&self.state);
        for client in state.open.iter_mut() {
            client.focused = client.id == id;
        }
        state.focused.push(id.to_string());
        Ok(())
    }

    async fn open_window(&self, url: &str) -> Result<ClientInfo> {
        let mut state = lock(&self.state);
        let client = ClientInfo {
            id: format!("window-{}", state.open.len() + 1),
            url: url.to_string(),
            focused: true,
        };
        state.open.push(client.clone());
        state.opened.push(url.to_string());
        Ok(client)
    }

    async fn claim(&self) -> Result<usize> {
        let mut state = lock(&self.state);
        state.claims += 1;
        Ok(state.open.len())
    }
}

#[derive(Default)]
struct NotifierState {
    shown: Vec<Notification>,
    closed: Vec<String>,
    failing: bool,
}

#[derive(Default)]
pub struct FakeNotifier {
    state: Mutex<NotifierState>,
}

impl FakeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `show` call fail.
    pub fn set_failing(&self, failing: bool) {
        lock(&self.state).failing = failing;
    }

    pub fn shown(&self) -> Vec<Notification> {
        lock(&self.state).shown.clone()
    }

    pub fn closed(&self) -> Vec<String> {
        lock(&self.state).closed.clone()
    }
}

#[async_trait]
impl Notifier for FakeNotifier {
    async fn show(&self, notification: &Notification) -> Result<()> {
        let mut state = lock(&self.state);
        if state.failing {
            anyhow::bail!("notification permission denied");
        }
        state.shown.push(notification.clone());
        Ok(())
    }

    async fn close(&self, tag: &str) -> Result<()> {
        lock(&self.state).closed.push(tag.to_string());
        Ok(())
    }
}
