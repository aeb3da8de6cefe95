//! Platform ports
//!
//! The routing controller never talks to hardware directly. Everything it
//! needs from the outside world goes through three injected ports:
//!
//! - [`AudioPlatform`]: audio mode, loudspeaker switch, microphone mute,
//!   audio focus, headset-plug subscription and capability probes
//! - [`BluetoothPort`]: headset connection state and the SCO audio link
//! - [`ProximityPort`]: near/far readings
//!
//! Ports are fire-and-forget from the controller's point of view. Anything
//! they learn later is reported through the [`RouteEventSender`] they are
//! given when started.
//!
//! The `mock_impl` backend (feature `device-mock`) provides in-memory ports
//! with inspectable state for tests and the replay tool.

use serde::{Deserialize, Serialize};

use crate::error::RouteResult;
use crate::events::RouteEventSender;

#[cfg(feature = "device-mock")]
pub mod mock_impl;

/// Bluetooth headset / SCO link state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BluetoothState {
    /// Port not started
    #[default]
    Uninitialized,
    /// Port failed
    Error,
    /// No headset connected
    HeadsetUnavailable,
    /// Headset connected, no audio link
    HeadsetAvailable,
    /// Audio link being torn down
    ScoDisconnecting,
    /// Audio link requested
    ScoConnecting,
    /// Audio link up
    ScoConnected,
}

impl BluetoothState {
    /// States after which the port should re-query its connected headset
    pub fn needs_device_refresh(&self) -> bool {
        matches!(
            self,
            BluetoothState::HeadsetAvailable | BluetoothState::HeadsetUnavailable | BluetoothState::ScoDisconnecting
        )
    }

    /// Whether a Bluetooth device should be offered as a route
    pub fn is_available(&self) -> bool {
        matches!(
            self,
            BluetoothState::ScoConnected | BluetoothState::ScoConnecting | BluetoothState::HeadsetAvailable
        )
    }

    /// Whether the audio link is requested or up
    pub fn is_link_active(&self) -> bool {
        matches!(self, BluetoothState::ScoConnected | BluetoothState::ScoConnecting)
    }

    /// Whether audio can be routed over the link right now
    pub fn is_link_connected(&self) -> bool {
        matches!(self, BluetoothState::ScoConnected)
    }
}

/// Platform audio focus transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioFocusChange {
    Gain,
    Loss,
    LossTransient,
    LossTransientCanDuck,
    Unknown,
}

/// Platform audio configuration captured at session start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SavedAudioState {
    /// Whether the platform was already in communication mode
    pub communication_mode: bool,
    /// Loudspeaker switch
    pub speakerphone_on: bool,
    /// Microphone mute
    pub microphone_mute: bool,
}

/// Platform audio services
pub trait AudioPlatform: Send {
    /// Capture the configuration a session will change
    fn snapshot(&self) -> SavedAudioState;

    /// Put back a configuration captured by [`AudioPlatform::snapshot`]
    fn restore(&mut self, saved: &SavedAudioState);

    /// Switch call (communication) audio mode on or off
    fn set_communication_mode(&mut self, enabled: bool);

    fn set_microphone_mute(&mut self, muted: bool);

    fn is_speakerphone_on(&self) -> bool;

    /// Route to the hardware loudspeaker (true) or away from it (false)
    fn set_speakerphone_on(&mut self, on: bool);

    /// Request transient audio focus for voice. Focus changes are reported later
    /// through `events`.
    fn request_audio_focus(&mut self, events: RouteEventSender) -> RouteResult<()>;

    fn abandon_audio_focus(&mut self);

    /// Whether the device has earpiece (telephony) hardware
    fn has_earpiece(&self) -> bool;

    /// Probe for a wired or USB headset
    fn has_wired_headset(&self) -> bool;

    /// Start delivering plug/unplug events
    fn subscribe_headset_events(&mut self, events: RouteEventSender) -> RouteResult<()>;

    /// Stop delivering plug/unplug events
    fn unsubscribe_headset_events(&mut self) -> RouteResult<()>;
}

/// Bluetooth headset subsystem
pub trait BluetoothPort: Send {
    fn state(&self) -> BluetoothState;

    /// Start tracking headsets; state changes are reported through `events`
    fn start(&mut self, events: RouteEventSender);

    fn stop(&mut self);

    /// Drop every resource; the port may be started again afterwards
    fn release(&mut self);

    /// Re-query the connected headset and refresh the state
    fn update_device(&mut self);

    /// Ask for the SCO audio link; false if the request could not be made
    fn start_audio_link(&mut self) -> bool;

    fn stop_audio_link(&mut self);
}

/// Proximity sensor
pub trait ProximityPort: Send {
    /// Start reporting near/far transitions through `events`
    fn start(&mut self, events: RouteEventSender);

    fn stop(&mut self);

    /// Last reading
    fn is_near(&self) -> bool;
}
