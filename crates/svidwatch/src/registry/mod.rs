//! Subscription registry.
//!
//! The registry maps each locally generated [`SubscriptionId`] to the
//! [`SelectorSet`] it watches. It is touched by two concurrent flows: the
//! command flow inserts and removes entries, the delivery flow looks them up.
//! Rather than sharing a locked map, a single task owns the [`Registry`] and
//! every other flow talks to it through a cloneable [`RegistryHandle`].
//!
//! ## Structure
//!
//! - [`store`] - the plain map and its insert/remove/lookup rules.
//! - [`request`] - messages understood by the owning task.
//! - [`worker`] - the owning task loop.
//! - [`handle`] - async client side of the request channel.
//!
//! [`SubscriptionId`]: svidwatch_core::SubscriptionId
//! [`SelectorSet`]: svidwatch_core::SelectorSet

pub mod handle;
pub mod request;
pub mod store;
pub mod worker;

pub use handle::RegistryHandle;
pub use store::Registry;
