use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Body returned when neither the network nor the cache can answer.
pub const NETWORK_ERROR_BODY: &str = "Network error happened";

/// A response as stored in, or served from, a cache partition.
///
/// Cloning yields an independent copy of the body, so one copy can be
/// written to the cache while the other is handed to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// 0 marks an opaque cross-origin response.
    pub status: u16,
    /// Header names are stored lowercase.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self::new(200, body)
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Only opaque (0) and 200 responses may be written to a cache.
    pub fn is_cacheable(&self) -> bool {
        self.status == 0 || self.status == 200
    }

    /// Synthesized answer for a failed non-navigation fetch with no fallback.
    pub fn network_error() -> Self {
        Self::new(404, NETWORK_ERROR_BODY).with_header("content-type", "text/plain")
    }

    /// Answer for a mutating request that was queued for background sync.
    pub fn deferred() -> Self {
        Self::new(202, "Request queued for background sync")
            .with_header("content-type", "text/plain")
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
