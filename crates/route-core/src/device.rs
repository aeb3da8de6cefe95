//! Audio route device types
//!
//! This module defines the closed set of routable call-audio devices and the
//! ordered device set the controller reports to observers.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RouteError;

/// Call audio device
///
/// `None` is a sentinel for "nothing selected yet" and is never a routable
/// target. It is never stored in a [`DeviceSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioDevice {
    /// Built-in loudspeaker
    SpeakerPhone,
    /// Wired (or USB) headset
    WiredHeadset,
    /// Built-in earpiece
    Earpiece,
    /// Bluetooth headset over an SCO link
    Bluetooth,
    /// No device
    None,
}

impl AudioDevice {
    /// All routable devices, in reporting order
    pub const ROUTABLE: [AudioDevice; 4] = [
        AudioDevice::SpeakerPhone,
        AudioDevice::WiredHeadset,
        AudioDevice::Earpiece,
        AudioDevice::Bluetooth,
    ];

    /// Canonical upper-case name
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioDevice::SpeakerPhone => "SPEAKER_PHONE",
            AudioDevice::WiredHeadset => "WIRED_HEADSET",
            AudioDevice::Earpiece => "EARPIECE",
            AudioDevice::Bluetooth => "BLUETOOTH",
            AudioDevice::None => "NONE",
        }
    }

    /// Whether audio can actually be routed to this device
    pub fn is_routable(&self) -> bool {
        !matches!(self, AudioDevice::None)
    }

    /// Whether routing to this device needs the hardware loudspeaker switched on
    pub fn uses_loudspeaker(&self) -> bool {
        matches!(self, AudioDevice::SpeakerPhone)
    }

    /// Whether this device can serve as the automatic fallback
    pub fn is_builtin(&self) -> bool {
        matches!(self, AudioDevice::SpeakerPhone | AudioDevice::Earpiece)
    }
}

impl Default for AudioDevice {
    fn default() -> Self {
        AudioDevice::None
    }
}

impl fmt::Display for AudioDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AudioDevice {
    type Err = RouteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-' && !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();

        match normalized.as_str() {
            "speakerphone" | "speaker" | "loudspeaker" => Ok(AudioDevice::SpeakerPhone),
            "wiredheadset" | "wired" | "headset" => Ok(AudioDevice::WiredHeadset),
            "earpiece" | "ear" => Ok(AudioDevice::Earpiece),
            "bluetooth" | "bt" => Ok(AudioDevice::Bluetooth),
            "none" => Ok(AudioDevice::None),
            _ => Err(RouteError::UnknownDevice { name: s.to_string() }),
        }
    }
}

/// Ordered set of routable devices
///
/// Iteration order is stable (declaration order of [`AudioDevice`]) so logs
/// and notifications are deterministic. Inserting [`AudioDevice::None`] is
/// ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceSet(BTreeSet<AudioDevice>);

impl DeviceSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// Add a device; returns true if it was newly added
    pub fn insert(&mut self, device: AudioDevice) -> bool {
        if !device.is_routable() {
            return false;
        }
        self.0.insert(device)
    }

    /// Remove a device; returns true if it was present
    pub fn remove(&mut self, device: AudioDevice) -> bool {
        self.0.remove(&device)
    }

    pub fn contains(&self, device: AudioDevice) -> bool {
        self.0.contains(&device)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = AudioDevice> + '_ {
        self.0.iter().copied()
    }

    /// Whether the set holds exactly the given devices
    pub fn is_exactly(&self, devices: &[AudioDevice]) -> bool {
        self.len() == devices.len() && devices.iter().all(|d| self.contains(*d))
    }

    pub fn to_vec(&self) -> Vec<AudioDevice> {
        self.iter().collect()
    }
}

impl FromIterator<AudioDevice> for DeviceSet {
    fn from_iter<I: IntoIterator<Item = AudioDevice>>(iter: I) -> Self {
        let mut set = DeviceSet::new();
        for device in iter {
            set.insert(device);
        }
        set
    }
}

impl<const N: usize> From<[AudioDevice; N]> for DeviceSet {
    fn from(devices: [AudioDevice; N]) -> Self {
        devices.into_iter().collect()
    }
}

impl fmt::Display for DeviceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, device) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", device)?;
        }
        f.write_str("]")
    }
}
