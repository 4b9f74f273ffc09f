//! Change event cards: metadata-only records of "something changed".
//!
//! A card never carries the change payload. It records what kind of change
//! was seen, where it plausibly came from, what it targeted, and the version
//! references in effect, so an incident can later be attributed (or flagged
//! as opaque).

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::VersionRefs;
use crate::windowing::{WindowKind, WindowPolicy, WindowRef};

/// Kind of change observed on the device.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ChangeEventType {
    WifiChannelChange,
    WifiBandSteer,
    MeshTopologyChange,
    WanReattach,
    FirmwareUpgrade,
    DriverUpdate,
    ConfigChange,
    /// Adapter-specific change kind.
    Custom(String),
}

impl fmt::Display for ChangeEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WifiChannelChange => write!(f, "WIFI_CHANNEL_CHANGE"),
            Self::WifiBandSteer => write!(f, "WIFI_BAND_STEER"),
            Self::MeshTopologyChange => write!(f, "MESH_TOPOLOGY_CHANGE"),
            Self::WanReattach => write!(f, "WAN_REATTACH"),
            Self::FirmwareUpgrade => write!(f, "FIRMWARE_UPGRADE"),
            Self::DriverUpdate => write!(f, "DRIVER_UPDATE"),
            Self::ConfigChange => write!(f, "CONFIG_CHANGE"),
            Self::Custom(name) => write!(f, "{}", name),
        }
    }
}

impl From<String> for ChangeEventType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "WIFI_CHANNEL_CHANGE" => Self::WifiChannelChange,
            "WIFI_BAND_STEER" => Self::WifiBandSteer,
            "MESH_TOPOLOGY_CHANGE" => Self::MeshTopologyChange,
            "WAN_REATTACH" => Self::WanReattach,
            "FIRMWARE_UPGRADE" => Self::FirmwareUpgrade,
            "DRIVER_UPDATE" => Self::DriverUpdate,
            "CONFIG_CHANGE" => Self::ConfigChange,
            _ => Self::Custom(s),
        }
    }
}

impl From<ChangeEventType> for String {
    fn from(t: ChangeEventType) -> Self {
        t.to_string()
    }
}

/// Metadata-only record of one observed change.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChangeEventCard {
    pub event_time: DateTime<Utc>,
    pub event_type: ChangeEventType,
    /// Who or what plausibly initiated the change (`"controller"`, `"user"`, ...).
    pub origin_hint: Option<String>,
    /// What the adapter saw that revealed the change.
    pub trigger: Option<String>,
    pub target_scope: String,
    /// Reference to the change request/ticket, when one exists.
    pub change_ref: Option<String>,
    pub version_refs: VersionRefs,
    pub window_ref: WindowRef,
}

/// A change as reported by an adapter, before it is stamped into a card.
#[derive(Clone, Debug, PartialEq)]
pub struct ObservedChange {
    pub event_type: ChangeEventType,
    pub origin_hint: Option<String>,
    pub trigger: Option<String>,
    pub target_scope: String,
    pub change_ref: Option<String>,
}

impl ObservedChange {
    pub fn new(event_type: ChangeEventType, target_scope: impl Into<String>) -> Self {
        Self {
            event_type,
            origin_hint: None,
            trigger: None,
            target_scope: target_scope.into(),
            change_ref: None,
        }
    }

    pub fn with_origin(mut self, origin_hint: impl Into<String>) -> Self {
        self.origin_hint = Some(origin_hint.into());
        self
    }

    pub fn with_trigger(mut self, trigger: impl Into<String>) -> Self {
        self.trigger = Some(trigger.into());
        self
    }

    pub fn with_change_ref(mut self, change_ref: impl Into<String>) -> Self {
        self.change_ref = Some(change_ref.into());
        self
    }
}

/// Stamps observed changes into cards with the device's version refs and
/// the short window of the observation time.
#[derive(Clone, Debug)]
pub struct ChangeEventLogger {
    windows: WindowPolicy,
    version_refs: VersionRefs,
}

impl ChangeEventLogger {
    pub fn new(windows: WindowPolicy, version_refs: VersionRefs) -> Self {
        Self {
            windows,
            version_refs,
        }
    }

    /// Update the version refs after a firmware/driver change.
    pub fn set_version_refs(&mut self, version_refs: VersionRefs) {
        self.version_refs = version_refs;
    }

    pub fn version_refs(&self) -> &VersionRefs {
        &self.version_refs
    }

    /// Build the card for one observed change.
    pub fn card(&self, change: ObservedChange, at: DateTime<Utc>) -> ChangeEventCard {
        ChangeEventCard {
            event_time: at,
            event_type: change.event_type,
            origin_hint: change.origin_hint,
            trigger: change.trigger,
            target_scope: change.target_scope,
            change_ref: change.change_ref,
            version_refs: self.version_refs.clone(),
            window_ref: self.windows.window_ref(at, WindowKind::Short),
        }
    }
}
