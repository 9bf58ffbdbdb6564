//! Generic membership-keyed store of the latest profile per member

use crate::advisor::CancelCriterion;
use crate::profile::Profile;
use crate::types::MemberId;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

/// Specialization hooks injected into the store at construction.
///
/// `evaluate` diffs an incoming profile against the previously stored
/// one and emits side effects; it is advisory, not gatekeeping, and
/// never rejects. `profile_removed` derives terminal events from the
/// last known state of a departed member.
pub trait ProfileStrategy: Send + Sync {
    fn evaluate(&self, new_profile: &Profile, old_profile: Option<&Profile>) -> bool;
    fn profile_removed(&self, profile: &Profile);
}

/// Authoritative local view of every other member's latest profile.
///
/// Reads (queries, filters) run concurrently; mutation takes a coarse
/// write lock, which also serializes strategy evaluation per store.
pub struct ProfileStore {
    local_member: MemberId,
    cancel: Arc<dyn CancelCriterion>,
    strategy: Box<dyn ProfileStrategy>,
    profiles: RwLock<HashMap<MemberId, Arc<Profile>>>,
}

impl ProfileStore {
    pub fn new(
        local_member: MemberId,
        strategy: Box<dyn ProfileStrategy>,
        cancel: Arc<dyn CancelCriterion>,
    ) -> Self {
        Self {
            local_member,
            cancel,
            strategy,
            profiles: RwLock::new(HashMap::new()),
        }
    }

    pub fn local_member(&self) -> &MemberId {
        &self.local_member
    }

    fn read_profiles(&self) -> RwLockReadGuard<'_, HashMap<MemberId, Arc<Profile>>> {
        self.profiles.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_profiles(&self) -> RwLockWriteGuard<'_, HashMap<MemberId, Arc<Profile>>> {
        self.profiles
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Diff `profile` against the stored entry for its owner and replace
    /// the entry. Returns false only when the host has already closed.
    pub fn put_profile(&self, profile: Profile) -> bool {
        if self.cancel.is_cancelled() {
            debug!(member = %profile.owner(), "Host closed, dropping incoming profile");
            return false;
        }

        let mut profiles = self.write_profiles();
        let old_profile = profiles.get(profile.owner()).cloned();
        let accepted = self
            .strategy
            .evaluate(&profile, old_profile.as_deref());
        if accepted {
            debug!(
                member = %profile.owner(),
                version = profile.version(),
                "Storing profile"
            );
            profiles.insert(profile.owner().clone(), Arc::new(profile));
        }
        accepted
    }

    pub fn profile(&self, member: &MemberId) -> Option<Arc<Profile>> {
        self.read_profiles().get(member).cloned()
    }

    /// Member ids whose stored profile satisfies `predicate`, excluding
    /// the local member. The returned set is caller-owned.
    pub fn advise_filter<F>(&self, predicate: F) -> BTreeSet<MemberId>
    where
        F: Fn(&Profile) -> bool,
    {
        self.read_profiles()
            .iter()
            .filter(|(member, profile)| **member != self.local_member && predicate(profile))
            .map(|(member, _)| member.clone())
            .collect()
    }

    /// Drop the departed member's entry and hand its last known state to
    /// the removal hook. Absent entries are a no-op.
    pub fn remove_profile(&self, member: &MemberId) {
        let removed = self.write_profiles().remove(member);
        if let Some(profile) = removed {
            debug!(member = %member, "Removed profile of departed member");
            self.strategy.profile_removed(&profile);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::types::{MemoryState, MemoryThresholds};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct NeverCancelled;
    impl CancelCriterion for NeverCancelled {
        fn is_cancelled(&self) -> bool {
            false
        }
    }

    struct Closed;
    impl CancelCriterion for Closed {
        fn is_cancelled(&self) -> bool {
            true
        }
    }

    #[derive(Default)]
    struct CountingStrategy {
        evaluations: AtomicUsize,
        removals: AtomicUsize,
        saw_old_profile: AtomicBool,
    }

    impl ProfileStrategy for &'static CountingStrategy {
        fn evaluate(&self, _new_profile: &Profile, old_profile: Option<&Profile>) -> bool {
            self.evaluations.fetch_add(1, Ordering::SeqCst);
            if old_profile.is_some() {
                self.saw_old_profile.store(true, Ordering::SeqCst);
            }
            true
        }

        fn profile_removed(&self, _profile: &Profile) {
            self.removals.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn profile(member: &str, version: i32, heap_state: MemoryState) -> Profile {
        let p = Profile::new(MemberId::from(member), version);
        p.set_heap_data(512, heap_state, MemoryThresholds::new(90.0, 80.0));
        p
    }

    fn store(strategy: &'static CountingStrategy) -> ProfileStore {
        ProfileStore::new(
            MemberId::from("local"),
            Box::new(strategy),
            Arc::new(NeverCancelled),
        )
    }

    #[test]
    fn replacement_hands_old_profile_to_strategy() {
        let strategy: &'static CountingStrategy = Box::leak(Box::default());
        let store = store(strategy);

        assert!(store.put_profile(profile("m1", 1, MemoryState::Normal)));
        assert!(!strategy.saw_old_profile.load(Ordering::SeqCst));

        assert!(store.put_profile(profile("m1", 2, MemoryState::Critical)));
        assert!(strategy.saw_old_profile.load(Ordering::SeqCst));
        assert_eq!(strategy.evaluations.load(Ordering::SeqCst), 2);

        let stored = store.profile(&MemberId::from("m1")).unwrap();
        assert_eq!(stored.version(), 2);
    }

    #[test]
    fn advise_filter_returns_fresh_set() {
        let strategy: &'static CountingStrategy = Box::leak(Box::default());
        let store = store(strategy);
        store.put_profile(profile("m1", 1, MemoryState::Normal));
        store.put_profile(profile("m2", 1, MemoryState::Critical));

        let mut critical = store.advise_filter(|p| p.heap_data().state.is_critical());
        assert_eq!(critical, BTreeSet::from([MemberId::from("m2")]));

        // Mutating the result never affects the store
        critical.clear();
        assert_eq!(
            store.advise_filter(|p| p.heap_data().state.is_critical()),
            BTreeSet::from([MemberId::from("m2")])
        );
    }

    #[test]
    fn remove_profile_invokes_hook_once() {
        let strategy: &'static CountingStrategy = Box::leak(Box::default());
        let store = store(strategy);
        store.put_profile(profile("m1", 1, MemoryState::Normal));

        store.remove_profile(&MemberId::from("m1"));
        assert_eq!(strategy.removals.load(Ordering::SeqCst), 1);
        assert!(store.profile(&MemberId::from("m1")).is_none());

        // Departed member whose profile was never established
        store.remove_profile(&MemberId::from("m1"));
        store.remove_profile(&MemberId::from("never-seen"));
        assert_eq!(strategy.removals.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn closed_host_drops_profiles_silently() {
        let strategy: &'static CountingStrategy = Box::leak(Box::default());
        let store = ProfileStore::new(
            MemberId::from("local"),
            Box::new(strategy),
            Arc::new(Closed),
        );

        assert!(!store.put_profile(profile("m1", 1, MemoryState::Normal)));
        assert_eq!(strategy.evaluations.load(Ordering::SeqCst), 0);
        assert!(store.profile(&MemberId::from("m1")).is_none());
    }
}
