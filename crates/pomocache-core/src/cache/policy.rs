use chrono::{DateTime, Duration, Utc};

/// Max image entries kept in the images partition.
const IMAGE_MAX_ENTRIES: usize = 50;
const IMAGE_MAX_AGE_DAYS: i64 = 60;

/// Audio files are large, so fewer are kept but for longer.
const AUDIO_MAX_ENTRIES: usize = 20;
const AUDIO_MAX_AGE_DAYS: i64 = 90;

/// Bounds applied to a partition whenever an entry is written to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExpirationPolicy {
    pub max_entries: Option<usize>,
    pub max_age: Option<Duration>,
}

impl ExpirationPolicy {
    /// No eviction at all.
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn images() -> Self {
        Self {
            max_entries: Some(IMAGE_MAX_ENTRIES),
            max_age: Some(Duration::days(IMAGE_MAX_AGE_DAYS)),
        }
    }

    pub fn audio() -> Self {
        Self {
            max_entries: Some(AUDIO_MAX_ENTRIES),
            max_age: Some(Duration::days(AUDIO_MAX_AGE_DAYS)),
        }
    }

    pub fn is_expired(&self, cached_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self.max_age {
            Some(max_age) => now - cached_at > max_age,
            None => false,
        }
    }
}
