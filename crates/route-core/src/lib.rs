//! # callroute-core - in-call audio route selection
//!
//! Picks the audio device a live call is routed to (earpiece, loudspeaker,
//! wired headset or Bluetooth headset) and keeps that choice consistent while
//! headsets come and go, the Bluetooth link changes state, the proximity
//! sensor fires and the user makes explicit choices.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────────────────────────────┐   ┌──────────────┐
//! │ RouteHandle  │   │ routing thread                           │   │ AudioPlatform│
//! │ start/stop   │──▶│ RouteActor ─▶ RoutingSessionController   │──▶│ BluetoothPort│
//! │ select/...   │   │                 │ DeviceInventory        │   │ ProximityPort│
//! └──────────────┘   │                 │ SelectionPolicy        │   └──────┬───────┘
//!        ▲           │                 ▼                        │          │
//!        │           │            RouteObserver                 │  RouteEventSender
//!   DeviceChange ◀───┤                                          │◀─────────┘
//!                    └──────────────────────────────────────────┘
//! ```
//!
//! - [`device`]: the closed [`AudioDevice`] enum and [`DeviceSet`]
//! - [`inventory`]: which devices are available given the raw signals
//! - [`policy`]: which available device to use
//! - [`controller`]: session lifecycle and the single re-evaluation routine
//! - [`manager`]: the actor that confines a controller to one thread
//! - [`platform`]: port traits, plus in-memory mocks behind `device-mock`
//!
//! ## Quick Start
//!
//! ```rust
//! use callroute_core::prelude::*;
//! use callroute_core::platform::mock_impl::{MockAudioPlatform, MockBluetooth, MockProximity};
//!
//! let platform = MockAudioPlatform::new();
//! let ports = RoutePorts::new(platform.clone(), MockBluetooth::new(), MockProximity::new());
//! let (events, mut queue) = event_channel();
//! let mut controller = RoutingSessionController::new(ports, PreferenceStore::default(), events);
//!
//! controller.start(|selected: AudioDevice, available: &DeviceSet| {
//!     println!("routing to {} out of {}", selected, available);
//! });
//! assert_eq!(controller.selected_audio_device(), AudioDevice::SpeakerPhone);
//!
//! platform.plug_headset(true);
//! controller.drain_events(&mut queue);
//! assert_eq!(controller.selected_audio_device(), AudioDevice::WiredHeadset);
//!
//! controller.stop();
//! ```

pub mod config;
pub mod controller;
pub mod device;
pub mod error;
pub mod events;
pub mod inventory;
pub mod manager;
pub mod platform;
pub mod policy;

pub use config::{PreferenceStore, RouteConfig, SpeakerphonePreference};
pub use controller::{Lifecycle, RoutePorts, RouteSnapshot, RoutingSessionController};
pub use device::{AudioDevice, DeviceSet};
pub use error::{RouteError, RouteResult};
pub use events::{
    event_channel, BroadcastObserver, DeviceChange, RouteEvent, RouteEventReceiver, RouteEventSender,
    RouteObserver,
};
pub use manager::{RouteHandle, RouteManager};
pub use platform::{AudioFocusChange, AudioPlatform, BluetoothPort, BluetoothState, ProximityPort, SavedAudioState};
pub use policy::Proximity;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Commonly used types
pub mod prelude {
    pub use crate::config::{PreferenceStore, RouteConfig, SpeakerphonePreference};
    pub use crate::controller::{RoutePorts, RoutingSessionController};
    pub use crate::device::{AudioDevice, DeviceSet};
    pub use crate::error::{RouteError, RouteResult};
    pub use crate::events::{event_channel, RouteEvent, RouteEventSender, RouteObserver};
    pub use crate::manager::{RouteHandle, RouteManager};
    pub use crate::platform::{AudioPlatform, BluetoothPort, BluetoothState, ProximityPort};
}
