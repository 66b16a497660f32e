//! Request routing and caching strategies.
//!
//! Every intercepted request is classified by its declared destination and
//! answered with the strategy for that class:
//!
//! | Class      | Strategy               | Partition | Eviction             |
//! |------------|------------------------|-----------|----------------------|
//! | Navigation | network-first          | pages     | none                 |
//! | Asset      | stale-while-revalidate | assets    | none                 |
//! | Image      | cache-first            | images    | 50 entries / 60 days |
//! | Audio      | cache-first            | audio     | 20 entries / 90 days |
//! | Other      | network only           | -         | -                    |
//!
//! Mutating API requests bypass the caches and fall back to the retry queue.

pub mod router;
pub mod strategies;

pub use router::Router;

use crate::cache::ExpirationPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceClass {
    /// Document loads.
    Navigation,
    /// Scripts, styles and workers.
    Asset,
    Image,
    Audio,
    /// Mutating request under the API prefix.
    ApiMutation,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    NetworkFirst,
    StaleWhileRevalidate,
    CacheFirst,
}

/// How one resource class is served and where it is cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePolicy {
    pub strategy: Strategy,
    pub partition: String,
    pub expiration: ExpirationPolicy,
}
