use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::Notification;

/// An open application session (window or tab) as seen by the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub id: String,
    pub url: String,
    pub focused: bool,
}

/// Client sessions of the hosting runtime.
#[async_trait]
pub trait Clients: Send + Sync {
    /// Every open window, including ones this worker doesn't control yet.
    async fn match_all(&self) -> Result<Vec<ClientInfo>>;

    async fn focus(&self, id: &str) -> Result<()>;

    async fn open_window(&self, url: &str) -> Result<ClientInfo>;

    /// Take control of every open session without a reload. Returns how
    /// many sessions were claimed.
    async fn claim(&self) -> Result<usize>;
}

/// Displays and dismisses notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn show(&self, notification: &Notification) -> Result<()>;

    async fn close(&self, tag: &str) -> Result<()>;
}
