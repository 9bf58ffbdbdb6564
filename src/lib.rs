//! Resource-state advisory layer for a distributed in-memory data grid.
//!
//! Each cluster member tracks its own memory pressure (heap and off-heap)
//! and broadcasts it to every other member as a versioned [`Profile`],
//! so admission control and eviction can be coordinated cluster-wide
//! without a central coordinator.
//!
//! The protocol is intentionally best-effort and last-writer-wins: there
//! is no acknowledgment, retry, or ordering across independent senders.
//! Membership and transport are external collaborators consumed through
//! the traits in [`advisor`].
//!
//! [`Profile`]: profile::Profile

pub mod advisor;
pub mod profile;
pub mod types;
pub mod wire;
