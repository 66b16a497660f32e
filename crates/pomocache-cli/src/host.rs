//! Host services for running the worker from a terminal.
//!
//! There is no window system here: notifications are written to the log and
//! the only "client" is the one the worker opens itself.

use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use pomocache_core::{ClientInfo, Clients, Notification, Notifier};

/// Logs notifications instead of displaying them.
#[derive(Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn show(&self, notification: &Notification) -> Result<()> {
        info!(
            tag = %notification.tag,
            title = %notification.title,
            body = %notification.body,
            url = %notification.url,
            "Showing notification"
        );
        Ok(())
    }

    async fn close(&self, tag: &str) -> Result<()> {
        info!(tag, "Closing notification");
        Ok(())
    }
}

/// Tracks windows opened during this run.
#[derive(Default)]
pub struct LogClients {
    windows: Mutex<Vec<ClientInfo>>,
}

impl LogClients {
    fn windows(&self) -> std::sync::MutexGuard<'_, Vec<ClientInfo>> {
        self.windows.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Clients for LogClients {
    async fn match_all(&self) -> Result<Vec<ClientInfo>> {
        Ok(self.windows().clone())
    }

    async fn focus(&self, id: &str) -> Result<()> {
        info!(id, "Focusing window");
        for window in self.windows().iter_mut() {
            window.focused = window.id == id;
        }
        Ok(())
    }

    async fn open_window(&self, url: &str) -> Result<ClientInfo> {
        info!(url, "Opening window");
        let mut windows = self.windows();
        let client = ClientInfo {
            id: format!("window-{}", windows.len() + 1),
            url: url.to_string(),
            focused: true,
        };
        windows.push(client.clone());
        Ok(client)
    }

    async fn claim(&self) -> Result<usize> {
        let count = self.windows().len();
        info!(count, "Claimed clients");
        Ok(count)
    }
}
