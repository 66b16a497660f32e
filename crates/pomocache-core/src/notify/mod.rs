//! Push messages, local notifications and notification clicks.
//!
//! The hosting runtime is reached through two traits:
//! - `Notifier`: displays and dismisses notifications
//! - `Clients`: lists, focuses, opens and claims app sessions

pub mod center;
pub mod host;
pub mod push;

pub use center::{ClickOutcome, NotificationCenter};
pub use host::{ClientInfo, Clients, Notifier};
pub use push::notification_from_push;
