//! Device selection policy
//!
//! Pure decisions only. The controller feeds in the current signals and
//! carries out whatever the policy asks for.
//!
//! Precedence when choosing a device:
//!
//! 1. Bluetooth, once its audio link is connected
//! 2. Wired headset, when plugged
//! 3. The default device (loudspeaker or earpiece)
//!
//! On top of that, with only the two built-in outputs available and the
//! speakerphone preference on `auto`, the proximity sensor picks between
//! earpiece (near) and loudspeaker (far).
//!
//! The user's explicit choice never overrides steps 1-3. It decides whether
//! the Bluetooth link is brought up or torn down, and it is itself corrected
//! when the device it names goes away.

use serde::{Deserialize, Serialize};

use crate::device::{AudioDevice, DeviceSet};
use crate::platform::BluetoothState;

/// Proximity sensor reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Proximity {
    Near,
    Far,
}

impl Proximity {
    pub fn from_near(near: bool) -> Self {
        if near {
            Proximity::Near
        } else {
            Proximity::Far
        }
    }
}

/// What to do with the Bluetooth audio link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkAction {
    /// Leave the link alone
    Keep,
    /// Bring the link up
    Start,
    /// Tear the link down
    Stop,
}

/// Everything the device choice depends on
#[derive(Debug, Clone, Copy)]
pub struct SelectionInput<'a> {
    pub available: &'a DeviceSet,
    pub bluetooth: BluetoothState,
    pub has_wired_headset: bool,
    pub default_device: AudioDevice,
    pub proximity: Option<Proximity>,
    pub proximity_switching: bool,
}

pub struct SelectionPolicy;

impl SelectionPolicy {
    /// Fix up a user selection that names a device which went away.
    ///
    /// Bluetooth falls back to automatic selection. Loudspeaker and wired
    /// headset stand in for each other as the headset comes and goes.
    pub fn correct_user_selection(
        user_selected: AudioDevice,
        bluetooth: BluetoothState,
        has_wired_headset: bool,
    ) -> AudioDevice {
        let mut corrected = user_selected;

        if bluetooth == BluetoothState::HeadsetUnavailable && corrected == AudioDevice::Bluetooth {
            corrected = AudioDevice::None;
        }

        if has_wired_headset && corrected == AudioDevice::SpeakerPhone {
            corrected = AudioDevice::WiredHeadset;
        } else if !has_wired_headset && corrected == AudioDevice::WiredHeadset {
            corrected = AudioDevice::SpeakerPhone;
        }

        corrected
    }

    /// Decide the Bluetooth link action. Stop wins if both apply.
    pub fn link_action(bluetooth: BluetoothState, user_selected: AudioDevice) -> LinkAction {
        let wants_bluetooth = matches!(user_selected, AudioDevice::None | AudioDevice::Bluetooth);

        let should_stop = bluetooth.is_link_active() && !wants_bluetooth;
        let should_start = bluetooth == BluetoothState::HeadsetAvailable && wants_bluetooth;

        if should_stop {
            LinkAction::Stop
        } else if should_start {
            LinkAction::Start
        } else {
            LinkAction::Keep
        }
    }

    /// Hard precedence: connected Bluetooth, wired headset, default device
    pub fn preferred_device(input: &SelectionInput<'_>) -> AudioDevice {
        if input.bluetooth.is_link_connected() {
            AudioDevice::Bluetooth
        } else if input.has_wired_headset {
            AudioDevice::WiredHeadset
        } else {
            input.default_device
        }
    }

    /// Proximity override, only for the bare earpiece/loudspeaker inventory
    pub fn proximity_override(input: &SelectionInput<'_>) -> Option<AudioDevice> {
        if !input.proximity_switching {
            return None;
        }
        if !input.available.is_exactly(&[AudioDevice::Earpiece, AudioDevice::SpeakerPhone]) {
            return None;
        }
        input.proximity.map(|reading| match reading {
            Proximity::Near => AudioDevice::Earpiece,
            Proximity::Far => AudioDevice::SpeakerPhone,
        })
    }

    /// Choose the device to route to
    pub fn choose(input: &SelectionInput<'_>) -> AudioDevice {
        Self::proximity_override(input).unwrap_or_else(|| Self::preferred_device(input))
    }

    /// Stand-in when the chosen device is missing from the available set
    pub fn fallback_device(input: &SelectionInput<'_>) -> AudioDevice {
        if input.has_wired_headset {
            AudioDevice::WiredHeadset
        } else {
            input.default_device
        }
    }
}
