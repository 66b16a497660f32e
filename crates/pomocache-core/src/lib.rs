//! Pomocache - offline cache manager for the Pomodoro web app.
//!
//! This crate keeps the app usable without a network connection. It
//! precaches the app shell for each release, answers intercepted requests
//! from versioned cache partitions, parks failed API writes in a durable
//! retry queue and turns push messages into notifications.
//!
//! Everything the hosting runtime provides (network, open windows, the
//! notification surface, the clock) sits behind a trait so the worker can
//! run under a browser-like host, a CLI or a test harness.

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod lifetime;
pub mod models;
pub mod net;
pub mod notify;
pub mod persist;
pub mod routing;
pub mod sync;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::{CacheStorage, ExpirationPolicy};
pub use clock::{Clock, SystemClock};
pub use config::Config;
pub use error::WorkerError;
pub use lifecycle::{CacheNames, WorkerState};
pub use models::{Destination, Method, Notification, Request, Response, SessionKind};
pub use net::{HttpNetwork, Network, NetworkError};
pub use notify::{ClickOutcome, ClientInfo, Clients, Notifier};
pub use sync::{ReplaySummary, RetryQueue};
pub use worker::{Host, OfflineWorker, WorkerStatus};
