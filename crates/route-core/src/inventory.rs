//! Available-device inventory

use crate::device::{AudioDevice, DeviceSet};

/// Raw signals the available-device set is derived from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InventorySignals {
    pub has_wired_headset: bool,
    pub has_earpiece_hardware: bool,
    pub bluetooth_available: bool,
}

/// Derives the available-device set from raw signals
pub struct DeviceInventory;

impl DeviceInventory {
    /// Compute the available devices.
    ///
    /// A wired headset suppresses both built-in outputs. Without one, the
    /// loudspeaker is always present, so the result is never empty.
    pub fn compute(signals: &InventorySignals) -> DeviceSet {
        let mut devices = DeviceSet::new();

        if signals.bluetooth_available {
            devices.insert(AudioDevice::Bluetooth);
        }

        if signals.has_wired_headset {
            devices.insert(AudioDevice::WiredHeadset);
        } else {
            devices.insert(AudioDevice::SpeakerPhone);
            if signals.has_earpiece_hardware {
                devices.insert(AudioDevice::Earpiece);
            }
        }

        devices
    }
}
