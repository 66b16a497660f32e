//! Named cache partitions for offline access.
//!
//! The worker keeps one partition per resource class (precache, pages,
//! assets, images, audio). Each partition maps a request identity
//! (`"GET <url>"`) to a stored response and carries its own expiration
//! policy, applied whenever an entry is written.
//!
//! Partitions are held in memory and, when opened with a root directory,
//! mirrored to disk so they survive a worker restart.

pub mod partition;
pub mod policy;
pub mod storage;

pub use partition::{CachedEntry, Partition};
pub use policy::ExpirationPolicy;
pub use storage::CacheStorage;
