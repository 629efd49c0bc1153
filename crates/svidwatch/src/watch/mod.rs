//! Watch coordination.
//!
//! Turns caller intents into registry changes plus stream submissions, and
//! turns inbound update batches into [`WatchEvent`]s resolved against the
//! registry.
//!
//! ## Structure
//!
//! - [`id`] - subscription id generation.
//! - [`event`] - caller-visible events.
//! - [`coordinator`] - [`WatchCoordinator`]: add/remove intents.
//! - [`delivery`] - the delivery loop draining [`Updates`].
//! - [`session`] - [`WatchSession`]: everything wired together.
//!
//! [`Updates`]: crate::stream::Updates

pub mod coordinator;
pub mod delivery;
pub mod event;
pub mod id;
pub mod session;

pub use coordinator::WatchCoordinator;
pub use event::{WatchEvent, WatchTarget};
pub use id::{IdGenerator, RandomIdGenerator};
pub use session::WatchSession;
