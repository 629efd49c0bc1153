use rand::Rng;
use svidwatch_core::{HANDSHAKE_ID, SubscriptionId};

/// Source of subscription ids.
///
/// Ids only need to be unique among the watches active on one stream. They
/// must never be [`HANDSHAKE_ID`].
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> SubscriptionId;
}

/// Draws ids uniformly from `1..=u64::MAX` using the thread-local RNG.
///
/// Collisions are possible but, by the birthday bound, negligible for far
/// fewer than 2^32 watches. The registry rejects any that do happen.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomIdGenerator;

impl IdGenerator for RandomIdGenerator {
    fn next_id(&self) -> SubscriptionId {
        rand::rng().random_range(HANDSHAKE_ID + 1..=SubscriptionId::MAX)
    }
}

impl<F> IdGenerator for F
where
    F: Fn() -> SubscriptionId + Send + Sync,
{
    fn next_id(&self) -> SubscriptionId {
        self()
    }
}
