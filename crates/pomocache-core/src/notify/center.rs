use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};
use url::Url;

use crate::lifetime::EventLifetime;
use crate::models::notification::{DEFAULT_ICON, LOCAL_NOTIFICATION_TIMEOUT};
use crate::models::{Notification, SessionKind};

use super::push::notification_from_push;
use super::{Clients, Notifier};

/// What a notification click ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    /// An existing session was brought to the foreground.
    Focused(String),
    /// No session was open; a new one was opened at this URL.
    Opened(String),
}

/// Shows push and local notifications and routes clicks back to the app.
pub struct NotificationCenter {
    origin: Url,
    notifier: Arc<dyn Notifier>,
    clients: Arc<dyn Clients>,
    next_tag: AtomicU64,
}

impl NotificationCenter {
    pub fn new(origin: Url, notifier: Arc<dyn Notifier>, clients: Arc<dyn Clients>) -> Self {
        Self {
            origin,
            notifier,
            clients,
            next_tag: AtomicU64::new(1),
        }
    }

    fn next_tag(&self, kind: &str) -> String {
        format!("{}-{}", kind, self.next_tag.fetch_add(1, Ordering::Relaxed))
    }

    /// Handle a push message: build the notification and display it.
    pub async fn push(&self, data: Option<&[u8]>, lifetime: &EventLifetime) -> Result<Notification> {
        info!(bytes = data.map(|d| d.len()).unwrap_or(0), "Push received");
        let notification = notification_from_push(data, self.next_tag("push"), self.origin.as_str());
        self.show(notification, lifetime).await
    }

    /// Local notification raised by the timer when a session ends. Closes
    /// itself after a few seconds.
    pub async fn session_complete(
        &self,
        kind: SessionKind,
        lifetime: &EventLifetime,
    ) -> Result<Notification> {
        let (title, body) = kind.completion_message();
        let notification = Notification {
            title: title.to_string(),
            body: body.to_string(),
            icon: Some(DEFAULT_ICON.to_string()),
            badge: None,
            vibrate: Vec::new(),
            auto_close: Some(LOCAL_NOTIFICATION_TIMEOUT),
            ..Notification::fallback(self.next_tag("session"), self.origin.as_str())
        };
        self.show(notification, lifetime).await
    }

    async fn show(&self, notification: Notification, lifetime: &EventLifetime) -> Result<Notification> {
        self.notifier
            .show(&notification)
            .await
            .with_context(|| format!("Failed to show notification: {}", notification.title))?;
        debug!(tag = %notification.tag, title = %notification.title, "Notification shown");

        if let Some(timeout) = notification.auto_close {
            let notifier = self.notifier.clone();
            let tag = notification.tag.clone();
            lifetime.wait_until(async move {
                tokio::time::sleep(timeout).await;
                if let Err(e) = notifier.close(&tag).await {
                    warn!(tag = %tag, error = %e, "Failed to close notification");
                }
            });
        }
        Ok(notification)
    }

    /// Handle a click: close the notification, then focus an open app
    /// session or open a new one at the notification's deep link.
    pub async fn click(&self, notification: &Notification) -> Result<ClickOutcome> {
        info!(tag = %notification.tag, "Notification clicked");
        if let Err(e) = self.notifier.close(&notification.tag).await {
            warn!(tag = %notification.tag, error = %e, "Failed to close notification");
        }

        let clients = self.clients.match_all().await?;
        if let Some(client) = clients.iter().find(|c| self.is_same_origin(&c.url)) {
            self.clients.focus(&client.id).await?;
            return Ok(ClickOutcome::Focused(client.id.clone()));
        }

        let target = self.deep_link(&notification.url);
        self.clients.open_window(&target).await?;
        Ok(ClickOutcome::Opened(target))
    }

    fn is_same_origin(&self, url: &str) -> bool {
        Url::parse(url)
            .map(|u| u.origin() == self.origin.origin())
            .unwrap_or(false)
    }

    /// Resolve a (possibly relative) deep link against the app origin,
    /// falling back to the origin root.
    fn deep_link(&self, url: &str) -> String {
        match self.origin.join(url) {
            Ok(url) => url.to_string(),
            Err(e) => {
                debug!(url, error = %e, "Invalid deep link, opening app root");
                self.origin.join("/").map(|u| u.to_string()).unwrap_or_else(|_| self.origin.to_string())
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeClients, FakeNotifier};
    use std::time::Duration;

    fn center(clients: Arc<FakeClients>, notifier: Arc<FakeNotifier>) -> NotificationCenter {
        let origin = Url::parse("https://pomo.example").unwrap();
        NotificationCenter::new(origin, notifier, clients)
    }

    #[tokio::test]
    async fn test_click_without_session_opens_one_at_origin() {
        let clients = Arc::new(FakeClients::new().with_window("w1", "https://elsewhere.example/"));
        let notifier = Arc::new(FakeNotifier::new());
        let center = center(clients.clone(), notifier.clone());
        let lifetime = EventLifetime::new();

        let notification = center.push(None, &lifetime).await.unwrap();
        let outcome = center.click(&notification).await.unwrap();

        assert_eq!(outcome, ClickOutcome::Opened("https://pomo.example/".to_string()));
        assert_eq!(clients.opened(), vec!["https://pomo.example/"]);
        assert!(clients.focused().is_empty());
        assert_eq!(notifier.closed(), vec![notification.tag]);
    }

    #[tokio::test]
    async fn test_click_with_open_session_focuses_it() {
        let clients = Arc::new(
            FakeClients::new()
                .with_window("w1", "https://elsewhere.example/")
                .with_window("w2", "https://pomo.example/index.html"),
        );
        let notifier = Arc::new(FakeNotifier::new());
        let center = center(clients.clone(), notifier);

        let notification = Notification::fallback("push-9", "https://pomo.example");
        let outcome = center.click(&notification).await.unwrap();

        assert_eq!(outcome, ClickOutcome::Focused("w2".to_string()));
        assert_eq!(clients.focused(), vec!["w2"]);
        assert!(clients.opened().is_empty());
    }

    #[tokio::test]
    async fn test_click_opens_relative_deep_link() {
        let clients = Arc::new(FakeClients::new());
        let center = center(clients.clone(), Arc::new(FakeNotifier::new()));
        let lifetime = EventLifetime::new();

        let payload = br#"{"options": {"data": {"url": "/stats"}}}"#;
        let notification = center.push(Some(payload), &lifetime).await.unwrap();
        center.click(&notification).await.unwrap();

        assert_eq!(clients.opened(), vec!["https://pomo.example/stats"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_complete_closes_after_timeout() {
        let notifier = Arc::new(FakeNotifier::new());
        let center = center(Arc::new(FakeClients::new()), notifier.clone());
        let lifetime = EventLifetime::new();

        let started = tokio::time::Instant::now();
        let notification = center
            .session_complete(SessionKind::Pomodoro, &lifetime)
            .await
            .unwrap();
        assert_eq!(notification.title, "Pomodoro Complete!");
        assert_eq!(notification.body, "Time for a break!");
        assert!(notifier.closed().is_empty());

        lifetime.settle().await;
        assert_eq!(notifier.closed(), vec![notification.tag]);
        assert!(started.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_push_displays_payload_notification() {
        let notifier = Arc::new(FakeNotifier::new());
        let center = center(Arc::new(FakeClients::new()), notifier.clone());
        let lifetime = EventLifetime::new();

        let payload = br#"{"title": "Break over", "options": {"body": "Back to work", "vibrate": [200, 100]}}"#;
        center.push(Some(payload), &lifetime).await.unwrap();

        let shown = notifier.shown();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].title, "Break over");
        assert_eq!(shown[0].body, "Back to work");
        assert_eq!(shown[0].vibrate, vec![200, 100]);
        assert_eq!(lifetime.pending(), 0);
    }

    #[tokio::test]
    async fn test_failed_show_is_reported_and_schedules_nothing() {
        let notifier = Arc::new(FakeNotifier::new());
        notifier.set_failing(true);
        let center = center(Arc::new(FakeClients::new()), notifier.clone());
        let lifetime = EventLifetime::new();

        let err = center.push(None, &lifetime).await.unwrap_err();
        assert!(err.to_string().contains("Failed to show notification"));

        assert!(center.session_complete(SessionKind::ShortBreak, &lifetime).await.is_err());
        assert_eq!(lifetime.settle().await, 0);
        assert!(notifier.shown().is_empty());
        assert!(notifier.closed().is_empty());
    }
}
