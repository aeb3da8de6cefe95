//! Shared fixture: a controller wired to the in-memory ports with a recording observer

#![allow(dead_code)]

use std::sync::Arc;

use callroute_core::platform::mock_impl::{MockAudioPlatform, MockBluetooth, MockProximity};
use callroute_core::{
    event_channel, AudioDevice, DeviceChange, DeviceSet, PreferenceStore, RouteEventReceiver, RoutePorts,
    RoutingSessionController, SpeakerphonePreference,
};
use parking_lot::Mutex;

pub struct Harness {
    pub controller: RoutingSessionController,
    pub platform: MockAudioPlatform,
    pub bluetooth: MockBluetooth,
    pub proximity: MockProximity,
    pub preferences: PreferenceStore,
    pub queue: RouteEventReceiver,
    changes: Arc<Mutex<Vec<DeviceChange>>>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_ports(MockAudioPlatform::new(), MockBluetooth::new(), SpeakerphonePreference::Auto)
    }

    pub fn with_ports(
        platform: MockAudioPlatform,
        bluetooth: MockBluetooth,
        preference: SpeakerphonePreference,
    ) -> Self {
        let proximity = MockProximity::new();
        let preferences = PreferenceStore::new(preference);
        let (events, queue) = event_channel();
        let ports = RoutePorts::new(platform.clone(), bluetooth.clone(), proximity.clone());
        let controller = RoutingSessionController::new(ports, preferences.clone(), events);

        Self {
            controller,
            platform,
            bluetooth,
            proximity,
            preferences,
            queue,
            changes: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Start the session with an observer recording into this harness
    pub fn start(&mut self) {
        let sink = self.changes.clone();
        self.controller.start(move |selected: AudioDevice, available: &DeviceSet| {
            sink.lock().push(DeviceChange {
                selected,
                available: available.clone(),
            });
        });
    }

    /// Handle every event the ports have reported so far
    pub fn pump(&mut self) -> usize {
        self.controller.drain_events(&mut self.queue)
    }

    pub fn changes(&self) -> Vec<DeviceChange> {
        self.changes.lock().clone()
    }

    pub fn selections(&self) -> Vec<AudioDevice> {
        self.changes.lock().iter().map(|change| change.selected).collect()
    }

    pub fn notifications(&self) -> usize {
        self.changes.lock().len()
    }

    pub fn selected(&self) -> AudioDevice {
        self.controller.selected_audio_device()
    }

    pub fn available(&self) -> DeviceSet {
        self.controller.audio_devices()
    }
}
