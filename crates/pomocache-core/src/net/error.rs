use thiserror::Error;

#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Offline - no network available")]
    Offline,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Server error {status} for {url}")]
    ServerError { url: String, status: u16 },

    #[error("Unexpected status {status} for {url}")]
    UnexpectedStatus { url: String, status: u16 },

    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl NetworkError {
    /// Error for a response that arrived but cannot be used, e.g. while
    /// populating the precache.
    pub fn from_status(url: &str, status: u16) -> Self {
        match status {
            500..=599 => NetworkError::ServerError {
                url: url.to_string(),
                status,
            },
            _ => NetworkError::UnexpectedStatus {
                url: url.to_string(),
                status,
            },
        }
    }
}
