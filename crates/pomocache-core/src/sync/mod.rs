//! Background sync for mutating API requests.
//!
//! A POST/PUT/PATCH/DELETE under the API prefix that fails at the transport
//! level is parked in a `RetryQueue` and replayed, oldest first, when the
//! worker comes back online or receives a sync event with the queue's tag.
//! The queue is persisted on every change and entries expire after 24 hours.

pub mod queue;

pub use queue::{QueuedRequest, ReplaySummary, RetryQueue};
