//! Device identity reported alongside every payload.
//!
//! The collector attributes metrics to a device via an immutable identity
//! snapshot. Only `device_id` is owned by this library (generated once and
//! persisted forever); everything else is read fresh at send time from a
//! host-supplied [`DeviceProvider`].

use serde::{Deserialize, Serialize};

/// Host-supplied device metadata, read fresh at send time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    /// Hardware model identifier (e.g. `iPhone14,2`, `MacBookPro18,3`).
    pub model: String,
    /// Application version string.
    pub app_version: String,
    /// Application build number.
    pub build_number: String,
    /// Operating system name (e.g. `iOS`, `macOS`, `linux`).
    pub os_name: String,
    /// Operating system version (e.g. `17.2`).
    pub os_version: String,
    /// Extended, human-readable OS version string.
    pub os_version_string: String,
}

/// The full identity snapshot sent with every payload.
///
/// Combines the persisted `device_id` with a fresh [`DeviceSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    /// Stable random identifier for this installation.
    pub device_id: String,
    /// Hardware model identifier.
    pub model: String,
    /// Application version string.
    pub app_version: String,
    /// Application build number.
    pub build_number: String,
    /// Operating system name.
    pub os_name: String,
    /// Operating system version.
    pub os_version: String,
    /// Extended, human-readable OS version string.
    pub os_version_string: String,
}

impl DeviceIdentity {
    /// Builds an identity from a persisted device id and a fresh snapshot.
    pub fn from_snapshot(device_id: impl Into<String>, snapshot: DeviceSnapshot) -> Self {
        Self {
            device_id: device_id.into(),
            model: snapshot.model,
            app_version: snapshot.app_version,
            build_number: snapshot.build_number,
            os_name: snapshot.os_name,
            os_version: snapshot.os_version,
            os_version_string: snapshot.os_version_string,
        }
    }
}

/// Collaborator supplying device metadata at send time.
///
/// The buffer calls [`DeviceProvider::snapshot`] every time it builds a
/// payload, so fields like `os_version` always reflect the running host.
pub trait DeviceProvider: Send + Sync {
    /// Returns the current device metadata.
    fn snapshot(&self) -> DeviceSnapshot;
}

/// A fixed [`DeviceProvider`] for hosts whose metadata never changes at
/// runtime, and for tests.
#[derive(Debug, Clone)]
pub struct StaticDevice {
    snapshot: DeviceSnapshot,
}

impl StaticDevice {
    /// Wraps a fixed snapshot.
    pub fn new(snapshot: DeviceSnapshot) -> Self {
        Self { snapshot }
    }
}

impl DeviceProvider for StaticDevice {
    fn snapshot(&self) -> DeviceSnapshot {
        self.snapshot.clone()
    }
}
