use serde::Deserialize;
use tracing::warn;

use crate::models::Notification;

/// Push message body: `{"title": ..., "options": {"body", "icon", "badge",
/// "vibrate", "tag", "data": {"url"}}}`. Every field is optional.
#[derive(Debug, Default, Deserialize)]
struct PushPayload {
    title: Option<String>,
    options: Option<PushOptions>,
}

#[derive(Debug, Default, Deserialize)]
struct PushOptions {
    body: Option<String>,
    icon: Option<String>,
    badge: Option<String>,
    vibrate: Option<Vec<u32>>,
    tag: Option<String>,
    data: Option<PushData>,
}

#[derive(Debug, Default, Deserialize)]
struct PushData {
    url: Option<String>,
}

/// Build the notification for a push message.
///
/// Fields missing from the payload keep their defaults; an absent or
/// malformed payload yields the default notification.
pub fn notification_from_push(data: Option<&[u8]>, tag: String, default_url: &str) -> Notification {
    let mut notification = Notification::fallback(tag, default_url);

    let Some(data) = data.filter(|d| !d.is_empty()) else {
        return notification;
    };
    let payload: PushPayload = match serde_json::from_slice(data) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, "Error parsing push data, using defaults");
            return notification;
        }
    };

    let options = payload.options.unwrap_or_default();
    if let Some(title) = payload.title {
        notification.title = title;
    }
    if let Some(body) = options.body {
        notification.body = body;
    }
    if let Some(icon) = options.icon {
        notification.icon = Some(icon);
    }
    if let Some(badge) = options.badge {
        notification.badge = Some(badge);
    }
    if let Some(vibrate) = options.vibrate {
        notification.vibrate = vibrate;
    }
    if let Some(tag) = options.tag {
        notification.tag = tag;
    }
    if let Some(url) = options.data.and_then(|d| d.url) {
        notification.url = url;
    }
    notification
}
