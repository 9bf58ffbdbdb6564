//! Membership-keyed profile store and its resource specialization

pub use resource::ResourceAdvisor;
pub use store::{ProfileStore, ProfileStrategy};

pub mod resource;
pub mod store;

use crate::profile::Profile;
use crate::types::{MemberId, MemoryEvent};
use crate::wire::ProfileMessage;
use std::collections::BTreeSet;

/// Local resource manager collaborating with the advisor.
///
/// Fills outgoing profiles with the member's current usage and consumes
/// the events derived from incoming ones.
pub trait ResourceManagerHandle: Send + Sync {
    fn fill_in_profile(&self, profile: &Profile);
    fn deliver_event_from_remote(&self, event: MemoryEvent);
}

/// Best-effort broadcast transport.
///
/// `send` is fire-and-forget: it returns once the message is handed off
/// and never waits for acknowledgment.
pub trait Transport: Send + Sync {
    fn recipients(&self) -> BTreeSet<MemberId>;
    fn send(&self, message: ProfileMessage);
}

/// Cancellation predicate supplied by the host.
///
/// Once it fires, every advisory operation becomes a silent no-op.
pub trait CancelCriterion: Send + Sync {
    fn is_cancelled(&self) -> bool;
}
