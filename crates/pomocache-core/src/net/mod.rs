//! Network client module.
//!
//! Every fetch the worker makes, whether populating the precache, revalidating
//! a cached asset or replaying a queued mutation, goes through the `Network`
//! trait.

pub mod client;
pub mod error;

pub use client::{HttpNetwork, Network};
pub use error::NetworkError;
