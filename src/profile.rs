//! Per-member snapshot of resource state with a versioned wire form

use crate::types::{
    MemberId, MemoryEvent, MemoryState, MemoryThresholds, ProtocolVersion, ResourceType,
};
use crate::wire::{self, legacy, Error};
use byteordered::byteorder::{ReadBytesExt, WriteBytesExt};
use byteordered::{ByteOrdered, Endian};
use derive_more::Display;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Usage, state, and thresholds of a single resource type
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display)]
#[display(fmt = "{bytes_used} bytes, {state}, {thresholds}")]
pub struct ResourceData {
    pub bytes_used: u64,
    pub state: MemoryState,
    pub thresholds: MemoryThresholds,
}

impl ResourceData {
    pub fn new(bytes_used: u64, state: MemoryState, thresholds: MemoryThresholds) -> Self {
        Self {
            bytes_used,
            state,
            thresholds,
        }
    }

    pub fn disabled() -> Self {
        Self::new(0, MemoryState::Disabled, MemoryThresholds::disabled())
    }
}

impl Default for ResourceData {
    fn default() -> Self {
        Self::disabled()
    }
}

/// Consistent copy of both resource sides of a profile, taken under a
/// single lock acquisition
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct ProfileSnapshot {
    pub heap: ResourceData,
    pub off_heap: ResourceData,
}

impl ProfileSnapshot {
    pub fn resource(&self, resource_type: ResourceType) -> ResourceData {
        match resource_type {
            ResourceType::Heap => self.heap,
            ResourceType::OffHeap => self.off_heap,
        }
    }
}

/// Versioned snapshot of one member's resource state.
///
/// Exactly one live profile exists per member inside a given advisor.
/// Both resource sides are guarded by a single internal mutex so
/// concurrent readers never observe a torn mix of usage, state, and
/// thresholds; the lock is never exposed.
#[derive(Debug)]
pub struct Profile {
    owner: MemberId,
    version: i32,
    data: Mutex<ProfileSnapshot>,
}

impl Profile {
    pub fn new(owner: MemberId, version: i32) -> Self {
        Self {
            owner,
            version,
            data: Mutex::new(ProfileSnapshot::default()),
        }
    }

    pub fn owner(&self) -> &MemberId {
        &self.owner
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    fn lock(&self) -> MutexGuard<'_, ProfileSnapshot> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_heap_data(&self, bytes_used: u64, state: MemoryState, thresholds: MemoryThresholds) {
        self.lock().heap = ResourceData::new(bytes_used, state, thresholds);
    }

    pub fn set_off_heap_data(
        &self,
        bytes_used: u64,
        state: MemoryState,
        thresholds: MemoryThresholds,
    ) {
        self.lock().off_heap = ResourceData::new(bytes_used, state, thresholds);
    }

    pub(crate) fn set_resource_data(&self, resource_type: ResourceType, data: ResourceData) {
        let mut guard = self.lock();
        match resource_type {
            ResourceType::Heap => guard.heap = data,
            ResourceType::OffHeap => guard.off_heap = data,
        }
    }

    pub fn heap_data(&self) -> ResourceData {
        self.lock().heap
    }

    pub fn off_heap_data(&self) -> ResourceData {
        self.lock().off_heap
    }

    pub fn resource_data(&self, resource_type: ResourceType) -> ResourceData {
        self.snapshot().resource(resource_type)
    }

    pub fn snapshot(&self) -> ProfileSnapshot {
        *self.lock()
    }

    /// Terminal event transitioning this profile's last known state for
    /// `resource_type` to [`MemoryState::Disabled`]
    pub fn disabled_event(&self, resource_type: ResourceType) -> MemoryEvent {
        let data = self.resource_data(resource_type);
        MemoryEvent {
            resource_type,
            old_state: data.state,
            new_state: MemoryState::Disabled,
            member: self.owner.clone(),
            bytes_used: data.bytes_used,
            is_local_origin: false,
            thresholds: data.thresholds,
        }
    }

    pub(crate) fn read<T, E>(
        r: &mut ByteOrdered<T, E>,
        peer_version: ProtocolVersion,
    ) -> Result<Self, Error>
    where
        T: ReadBytesExt,
        E: Endian + Copy,
    {
        let owner = MemberId::from(wire::read_utf(r)?);
        let version = r.read_i32()?;
        let profile = Profile::new(owner, version);

        if peer_version.supports_off_heap_profile() {
            let heap = read_resource_data(r)?;
            profile.set_heap_data(heap.bytes_used, heap.state, heap.thresholds);
            let off_heap = read_resource_data(r)?;
            profile.set_off_heap_data(off_heap.bytes_used, off_heap.state, off_heap.thresholds);
        } else {
            let _current_heap_usage_percent = r.read_i32()?;
            let bytes_used = r.read_u64()?;
            let heap_state = legacy::read_heap_state(r)?;
            let _tenured_generation_max_bytes = r.read_f64()?;
            let _has_tenured_generation_max_bytes = wire::read_bool(r)?;
            let critical_percent = r.read_f32()?;
            let _has_critical = wire::read_bool(r)?;
            let eviction_percent = r.read_f32()?;
            let _has_eviction = wire::read_bool(r)?;

            profile.set_heap_data(
                bytes_used,
                heap_state,
                MemoryThresholds::new(critical_percent, eviction_percent),
            );
            // Off-heap state does not exist before the threshold version
            profile.set_off_heap_data(0, MemoryState::Disabled, MemoryThresholds::disabled());
        }

        Ok(profile)
    }

    pub(crate) fn write<T, E>(
        &self,
        w: &mut ByteOrdered<T, E>,
        peer_version: ProtocolVersion,
    ) -> Result<(), Error>
    where
        T: WriteBytesExt,
        E: Endian + Copy,
    {
        let snapshot = self.snapshot();

        wire::write_utf(w, self.owner.as_ref())?;
        w.write_i32(self.version)?;

        if peer_version.supports_off_heap_profile() {
            write_resource_data(w, &snapshot.heap)?;
            write_resource_data(w, &snapshot.off_heap)?;
        } else {
            w.write_i32(0)?; // currentHeapUsagePercent
            w.write_u64(snapshot.heap.bytes_used)?;
            legacy::write_heap_state(w, snapshot.heap.state)?;
            w.write_f64(0.0)?; // tenuredGenerationMaxBytes
            wire::write_bool(w, false)?;
            w.write_f32(snapshot.heap.thresholds.critical_percent())?;
            wire::write_bool(w, snapshot.heap.thresholds.is_critical_enabled())?;
            w.write_f32(snapshot.heap.thresholds.eviction_percent())?;
            wire::write_bool(w, snapshot.heap.thresholds.is_eviction_enabled())?;
        }

        Ok(())
    }
}

impl PartialEq for Profile {
    fn eq(&self, other: &Self) -> bool {
        self.owner == other.owner
            && self.version == other.version
            && self.snapshot() == other.snapshot()
    }
}

impl Eq for Profile {}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = self.snapshot();
        write!(
            f,
            "ResourceProfile(owner={}, version={}; heap=[{}]; off-heap=[{}])",
            self.owner, self.version, snapshot.heap, snapshot.off_heap
        )
    }
}

fn read_resource_data<T, E>(r: &mut ByteOrdered<T, E>) -> Result<ResourceData, Error>
where
    T: ReadBytesExt,
    E: Endian + Copy,
{
    let bytes_used = r.read_u64()?;
    let code = r.read_u8()?;
    let state = MemoryState::from_wire_code(code).ok_or(Error::MemoryStateCode(code))?;
    let critical_percent = r.read_f32()?;
    let _has_critical = wire::read_bool(r)?;
    let eviction_percent = r.read_f32()?;
    let _has_eviction = wire::read_bool(r)?;
    Ok(ResourceData::new(
        bytes_used,
        state,
        MemoryThresholds::new(critical_percent, eviction_percent),
    ))
}

fn write_resource_data<T, E>(w: &mut ByteOrdered<T, E>, data: &ResourceData) -> Result<(), Error>
where
    T: WriteBytesExt,
    E: Endian + Copy,
{
    w.write_u64(data.bytes_used)?;
    w.write_u8(data.state.to_wire_code())?;
    w.write_f32(data.thresholds.critical_percent())?;
    wire::write_bool(w, data.thresholds.is_critical_enabled())?;
    w.write_f32(data.thresholds.eviction_percent())?;
    wire::write_bool(w, data.thresholds.is_eviction_enabled())?;
    Ok(())
}
