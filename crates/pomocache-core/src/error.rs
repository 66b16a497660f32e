use thiserror::Error;

use crate::lifecycle::WorkerState;
use crate::net::NetworkError;

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Install failed - could not cache {url}: {source}")]
    Install {
        url: String,
        #[source]
        source: NetworkError,
    },

    #[error("Install failed - could not store precache: {0}")]
    PrecacheStorage(String),

    #[error("Cannot {action} while worker is {state}")]
    InvalidState {
        action: &'static str,
        state: WorkerState,
    },
}
