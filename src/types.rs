//! Types common to the advisor and the profile exchange protocol

use derive_more::{Display, From, Into};
use enum_iterator::Sequence;
use ordered_float::OrderedFloat;

/// Opaque identity of a cluster member.
///
/// Owned by the external membership layer; used here only as a map key
/// and wire field.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, From, Into, Display)]
#[display(fmt = "{_0}")]
pub struct MemberId(pub String);

impl From<&str> for MemberId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl AsRef<str> for MemberId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Resource types tracked by a profile, in the order events are
/// derived and delivered.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, Sequence)]
pub enum ResourceType {
    #[display(fmt = "heap")]
    Heap,
    #[display(fmt = "off-heap")]
    OffHeap,
}

/// Ordinal of the peer's wire protocol version.
///
/// Peers older than [`ProtocolVersion::OFF_HEAP_PROFILE`] use the legacy
/// profile layout during a rolling upgrade.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, From, Into, Display)]
#[display(fmt = "{_0}")]
pub struct ProtocolVersion(pub u16);

impl ProtocolVersion {
    /// First version carrying off-heap state and the compact profile layout
    pub const OFF_HEAP_PROFILE: Self = Self(90);

    /// Version spoken by this library
    pub const CURRENT: Self = Self::OFF_HEAP_PROFILE;

    pub fn supports_off_heap_profile(self) -> bool {
        self >= Self::OFF_HEAP_PROFILE
    }
}

/// Memory pressure state of a single resource on a single member.
///
/// No transition table is enforced; any state may follow any state.
/// Validity of transitions is a policy decision made by the resource
/// manager that fills profiles.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, Sequence)]
pub enum MemoryState {
    #[display(fmt = "DISABLED")]
    Disabled = 0,
    #[display(fmt = "NORMAL")]
    Normal = 1,
    #[display(fmt = "EVICTION")]
    Eviction = 2,
    #[display(fmt = "EVICTION_CRITICAL")]
    EvictionCritical = 3,
    #[display(fmt = "CRITICAL")]
    Critical = 4,
    #[display(fmt = "CRITICAL_DISABLED")]
    CriticalDisabled = 5,
}

impl MemoryState {
    /// True when the hard threshold has been breached and admission
    /// control should engage
    pub fn is_critical(self) -> bool {
        matches!(self, MemoryState::Critical | MemoryState::EvictionCritical)
    }

    pub(crate) fn to_wire_code(self) -> u8 {
        self as u8
    }

    pub(crate) fn from_wire_code(code: u8) -> Option<Self> {
        enum_iterator::all::<Self>().find(|s| s.to_wire_code() == code)
    }

    /// Heap state carried by the legacy single-flag enum envelope.
    /// Anything other than the critical labels reads as normal.
    pub(crate) fn from_legacy_event_name(name: &str) -> Self {
        match name {
            "CRITICAL_UP" => MemoryState::Critical,
            "CRITICAL_DISABLED" => MemoryState::CriticalDisabled,
            _ => MemoryState::Normal,
        }
    }

    /// Legacy single-flag label this state collapses to on the wire
    pub(crate) fn legacy_event_name(self) -> &'static str {
        match self {
            MemoryState::Critical | MemoryState::EvictionCritical => "CRITICAL_UP",
            MemoryState::CriticalDisabled => "CRITICAL_DISABLED",
            _ => "CRITICAL_DOWN",
        }
    }
}

/// Immutable threshold configuration carried verbatim inside a profile.
///
/// A threshold is enabled iff its percentage is greater than zero.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display)]
#[display(fmt = "critical={critical_percent}%, eviction={eviction_percent}%")]
pub struct MemoryThresholds {
    critical_percent: OrderedFloat<f32>,
    eviction_percent: OrderedFloat<f32>,
}

impl MemoryThresholds {
    pub fn new(critical_percent: f32, eviction_percent: f32) -> Self {
        Self {
            critical_percent: critical_percent.into(),
            eviction_percent: eviction_percent.into(),
        }
    }

    pub fn disabled() -> Self {
        Self::new(0.0, 0.0)
    }

    pub fn critical_percent(&self) -> f32 {
        self.critical_percent.into_inner()
    }

    pub fn eviction_percent(&self) -> f32 {
        self.eviction_percent.into_inner()
    }

    pub fn is_critical_enabled(&self) -> bool {
        self.critical_percent.into_inner() > 0.0
    }

    pub fn is_eviction_enabled(&self) -> bool {
        self.eviction_percent.into_inner() > 0.0
    }
}

impl Default for MemoryThresholds {
    fn default() -> Self {
        Self::disabled()
    }
}

/// State transition derived while diffing an incoming profile against
/// the stored one. Delivered synchronously to the resource manager and
/// never stored.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Display)]
#[display(
    fmt = "{resource_type}: {old_state} -> {new_state} (member={member}, {bytes_used} bytes)"
)]
pub struct MemoryEvent {
    pub resource_type: ResourceType,
    pub old_state: MemoryState,
    pub new_state: MemoryState,
    pub member: MemberId,
    pub bytes_used: u64,
    pub is_local_origin: bool,
    pub thresholds: MemoryThresholds,
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn critical_predicate() {
        assert!(MemoryState::Critical.is_critical());
        assert!(MemoryState::EvictionCritical.is_critical());
        assert!(!MemoryState::Disabled.is_critical());
        assert!(!MemoryState::Normal.is_critical());
        assert!(!MemoryState::Eviction.is_critical());
        assert!(!MemoryState::CriticalDisabled.is_critical());
    }

    #[test]
    fn wire_code_identity() {
        for state in enum_iterator::all::<MemoryState>() {
            assert_eq!(
                MemoryState::from_wire_code(state.to_wire_code()),
                Some(state)
            );
        }
        assert_eq!(MemoryState::from_wire_code(6), None);
    }

    #[test]
    fn legacy_event_name_mapping() {
        assert_eq!(
            MemoryState::from_legacy_event_name("CRITICAL_UP"),
            MemoryState::Critical
        );
        assert_eq!(
            MemoryState::from_legacy_event_name("CRITICAL_DISABLED"),
            MemoryState::CriticalDisabled
        );
        assert_eq!(
            MemoryState::from_legacy_event_name("CRITICAL_DOWN"),
            MemoryState::Normal
        );
        // Retired eviction labels read as normal
        assert_eq!(
            MemoryState::from_legacy_event_name("EVICTION_UP"),
            MemoryState::Normal
        );
        assert_eq!(
            MemoryState::from_legacy_event_name("UNKNOWN"),
            MemoryState::Normal
        );
    }

    #[test]
    fn legacy_event_name_collapse() {
        assert_eq!(MemoryState::Critical.legacy_event_name(), "CRITICAL_UP");
        assert_eq!(
            MemoryState::EvictionCritical.legacy_event_name(),
            "CRITICAL_UP"
        );
        assert_eq!(
            MemoryState::CriticalDisabled.legacy_event_name(),
            "CRITICAL_DISABLED"
        );
        assert_eq!(MemoryState::Normal.legacy_event_name(), "CRITICAL_DOWN");
        assert_eq!(MemoryState::Eviction.legacy_event_name(), "CRITICAL_DOWN");
        assert_eq!(MemoryState::Disabled.legacy_event_name(), "CRITICAL_DOWN");
    }

    #[test]
    fn threshold_enablement() {
        let t = MemoryThresholds::new(90.0, 80.0);
        assert!(t.is_critical_enabled());
        assert!(t.is_eviction_enabled());
        assert_eq!(t.critical_percent(), 90.0);
        assert_eq!(t.eviction_percent(), 80.0);

        let t = MemoryThresholds::disabled();
        assert!(!t.is_critical_enabled());
        assert!(!t.is_eviction_enabled());
    }
}
