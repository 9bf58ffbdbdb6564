//! Resource specialization: profile diffing, event derivation, broadcast

use crate::advisor::{CancelCriterion, ProfileStore, ProfileStrategy, ResourceManagerHandle, Transport};
use crate::profile::Profile;
use crate::types::{MemberId, MemoryEvent, MemoryState, ProtocolVersion, ResourceType};
use crate::wire::ProfileMessage;
use std::collections::BTreeSet;
use std::io::Read;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error};

/// Advisor associated with the local resource manager.
///
/// Keeps the latest remote resource profiles, derives memory events from
/// incoming replacements, and broadcasts the local member's own state.
/// All collaborators are injected at construction; nothing is looked up
/// from ambient global state.
pub struct ResourceAdvisor {
    store: ProfileStore,
    resource_manager: Arc<dyn ResourceManagerHandle>,
    transport: Arc<dyn Transport>,
    cancel: Arc<dyn CancelCriterion>,
    /// Local version counter; the lock is held across fill and send so
    /// outgoing versions are strictly increasing and never duplicated
    version: Mutex<i32>,
}

impl ResourceAdvisor {
    pub fn new(
        local_member: MemberId,
        resource_manager: Arc<dyn ResourceManagerHandle>,
        transport: Arc<dyn Transport>,
        cancel: Arc<dyn CancelCriterion>,
    ) -> Self {
        let strategy = ResourceProfileStrategy {
            resource_manager: resource_manager.clone(),
        };
        Self {
            store: ProfileStore::new(local_member, Box::new(strategy), cancel.clone()),
            resource_manager,
            transport,
            cancel,
            version: Mutex::new(0),
        }
    }

    pub fn local_member(&self) -> &MemberId {
        self.store.local_member()
    }

    /// Snapshot the local resource manager's state into a fresh profile
    /// and broadcast it to the currently known members.
    ///
    /// Serialized per advisor; a silent no-op once the host has closed.
    pub fn update_remote_profile(&self) {
        if self.cancel.is_cancelled() {
            debug!("Host closed, skipping profile broadcast");
            return;
        }

        let mut version = self.version.lock().unwrap_or_else(PoisonError::into_inner);
        *version += 1;

        let profile = Profile::new(self.local_member().clone(), *version);
        self.resource_manager.fill_in_profile(&profile);

        let recipients = self.transport.recipients();
        debug!(
            version = *version,
            recipients = recipients.len(),
            "Broadcasting local resource profile"
        );
        self.transport.send(ProfileMessage::new(recipients, profile));
    }

    /// Decode a received broadcast and apply its profiles.
    ///
    /// A decode failure abandons that message only; it is logged and
    /// never propagated to the transport thread's other work.
    pub fn receive<R: Read>(&self, r: &mut R, peer_version: ProtocolVersion) {
        match ProfileMessage::read(r, peer_version) {
            Ok(message) => self.process_message(message),
            Err(e) => {
                error!(error = %e, peer_version = %peer_version, "Failed to decode profile message")
            }
        }
    }

    /// Apply each carried profile. An empty message is a legal no-op.
    pub fn process_message(&self, message: ProfileMessage) {
        if self.cancel.is_cancelled() {
            debug!(message = %message, "Host closed, dropping message");
            return;
        }
        for profile in message.into_profiles() {
            self.store.put_profile(profile);
        }
    }

    pub fn put_profile(&self, profile: Profile) -> bool {
        self.store.put_profile(profile)
    }

    pub fn profile(&self, member: &MemberId) -> Option<Arc<Profile>> {
        self.store.profile(member)
    }

    /// Invoked by the external membership layer when a member departs
    pub fn remove_profile(&self, member: &MemberId) {
        self.store.remove_profile(member);
    }

    pub fn advise_filter<F>(&self, predicate: F) -> BTreeSet<MemberId>
    where
        F: Fn(&Profile) -> bool,
    {
        self.store.advise_filter(predicate)
    }

    /// Members whose last reported heap state is critical, excluding the
    /// local member
    pub fn advise_critical_members(&self) -> BTreeSet<MemberId> {
        self.advise_filter(|profile| profile.heap_data().state.is_critical())
    }

    /// False when no profile is known for `member`
    pub fn is_heap_critical(&self, member: &MemberId) -> bool {
        self.store
            .profile(member)
            .map(|profile| profile.heap_data().state.is_critical())
            .unwrap_or(false)
    }
}

/// Diff/removal hooks wired into the generic store
struct ResourceProfileStrategy {
    resource_manager: Arc<dyn ResourceManagerHandle>,
}

impl ProfileStrategy for ResourceProfileStrategy {
    fn evaluate(&self, new_profile: &Profile, old_profile: Option<&Profile>) -> bool {
        let new = new_profile.snapshot();
        let mut events = Vec::new();

        match old_profile {
            // First contact is unconditionally reported for both resource
            // types, even when the incoming state is itself DISABLED
            None => {
                for resource_type in enum_iterator::all::<ResourceType>() {
                    let data = new.resource(resource_type);
                    events.push(MemoryEvent {
                        resource_type,
                        old_state: MemoryState::Disabled,
                        new_state: data.state,
                        member: new_profile.owner().clone(),
                        bytes_used: data.bytes_used,
                        is_local_origin: false,
                        thresholds: data.thresholds,
                    });
                }
            }
            Some(old_profile) => {
                let old = old_profile.snapshot();
                for resource_type in enum_iterator::all::<ResourceType>() {
                    let old_data = old.resource(resource_type);
                    let new_data = new.resource(resource_type);

                    if old_data.state != new_data.state {
                        events.push(MemoryEvent {
                            resource_type,
                            old_state: old_data.state,
                            new_state: new_data.state,
                            member: new_profile.owner().clone(),
                            bytes_used: new_data.bytes_used,
                            is_local_origin: false,
                            thresholds: new_data.thresholds,
                        });
                    }

                    // A disabled report carries no meaningful usage data;
                    // keep the last known values for display and queries
                    if new_data.state == MemoryState::Disabled {
                        new_profile.set_resource_data(resource_type, old_data);
                    }
                }
            }
        }

        for event in events {
            self.resource_manager.deliver_event_from_remote(event);
        }

        true
    }

    fn profile_removed(&self, profile: &Profile) {
        for resource_type in enum_iterator::all::<ResourceType>() {
            self.resource_manager
                .deliver_event_from_remote(profile.disabled_event(resource_type));
        }
    }
}
