use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_TITLE: &str = "Pomodoro Timer";
pub const DEFAULT_BODY: &str = "Time notification from Pomodoro Timer";
pub const DEFAULT_ICON: &str = "/tomato.png";
pub const DEFAULT_BADGE: &str = "/icons/manifest-icon-192.maskable.png";
pub const DEFAULT_VIBRATE: [u32; 3] = [100, 50, 100];

/// How long a locally raised notification stays on screen.
pub const LOCAL_NOTIFICATION_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Tag used to close the notification later.
    pub tag: String,
    pub title: String,
    pub body: String,
    pub icon: Option<String>,
    pub badge: Option<String>,
    #[serde(default)]
    pub vibrate: Vec<u32>,
    /// Deep link opened when the notification is clicked.
    pub url: String,
    #[serde(skip)]
    pub auto_close: Option<Duration>,
}

impl Notification {
    /// The notification shown when a push carries no usable payload.
    pub fn fallback(tag: impl Into<String>, origin: &str) -> Self {
        Self {
            tag: tag.into(),
            title: DEFAULT_TITLE.to_string(),
            body: DEFAULT_BODY.to_string(),
            icon: Some(DEFAULT_ICON.to_string()),
            badge: Some(DEFAULT_BADGE.to_string()),
            vibrate: DEFAULT_VIBRATE.to_vec(),
            url: origin.to_string(),
            auto_close: None,
        }
    }
}

/// Timer session that just finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionKind {
    Pomodoro,
    ShortBreak,
    LongBreak,
}

impl SessionKind {
    pub fn completion_message(&self) -> (&'static str, &'static str) {
        match self {
            SessionKind::Pomodoro => ("Pomodoro Complete!", "Time for a break!"),
            SessionKind::ShortBreak | SessionKind::LongBreak => {
                ("Break Complete!", "Ready to focus again?")
            }
        }
    }
}

impl std::str::FromStr for SessionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pomodoro" => Ok(SessionKind::Pomodoro),
            "shortBreak" | "short-break" => Ok(SessionKind::ShortBreak),
            "longBreak" | "long-break" => Ok(SessionKind::LongBreak),
            other => Err(format!("Unknown session kind: {}", other)),
        }
    }
}
