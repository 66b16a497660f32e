//! Data models shared across the offline worker.
//!
//! - `Request`, `Method`, `Destination`: intercepted resource requests
//! - `Response`: stored and served responses
//! - `Notification`, `SessionKind`: push and local notifications

pub mod notification;
pub mod request;
pub mod response;

pub use notification::{Notification, SessionKind};
pub use request::{cache_key, Destination, Method, Request};
pub use response::Response;
