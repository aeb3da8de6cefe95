//! Routing session controller
//!
//! Owns the per-call routing state and is the only place it changes. Every
//! entry point (session start, user choice, default-device changes and all
//! external events) ends in the same re-evaluation routine:
//!
//! ```text
//!  refresh bluetooth ─▶ inventory ─▶ correct user choice ─▶ bluetooth link
//!                                                               │
//!        notify observer ◀── apply route ◀── choose device ◀────┘
//! ```
//!
//! Mutating operations take `&mut self`, so two of them can never interleave
//! on one controller. [`crate::manager::RouteManager`] additionally pins the
//! controller to a single thread and feeds it one message at a time.
//!
//! Nothing here is fatal. Invalid calls are logged and rejected without
//! touching state, platform failures are logged and the session carries on,
//! and a Bluetooth link that cannot be started simply stops being offered.

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::{PreferenceStore, SpeakerphonePreference};
use crate::device::{AudioDevice, DeviceSet};
use crate::error::{RouteError, RouteResult};
use crate::events::{RouteEvent, RouteEventReceiver, RouteEventSender, RouteObserver};
use crate::inventory::{DeviceInventory, InventorySignals};
use crate::platform::{AudioPlatform, BluetoothPort, ProximityPort, SavedAudioState};
use crate::policy::{LinkAction, Proximity, SelectionInput, SelectionPolicy};

/// Controller lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    #[default]
    Uninitialized,
    Running,
}

/// The external ports a controller drives
pub struct RoutePorts {
    pub platform: Box<dyn AudioPlatform>,
    pub bluetooth: Box<dyn BluetoothPort>,
    pub proximity: Box<dyn ProximityPort>,
}

impl RoutePorts {
    pub fn new(
        platform: impl AudioPlatform + 'static,
        bluetooth: impl BluetoothPort + 'static,
        proximity: impl ProximityPort + 'static,
    ) -> Self {
        Self {
            platform: Box::new(platform),
            bluetooth: Box::new(bluetooth),
            proximity: Box::new(proximity),
        }
    }
}

/// Per-call routing state, reset at every start and stop
#[derive(Debug, Clone, Default)]
struct SessionState {
    available: DeviceSet,
    selected: AudioDevice,
    user_selected: AudioDevice,
    has_wired_headset: bool,
    proximity: Option<Proximity>,
    saved_audio: Option<SavedAudioState>,
}

/// Point-in-time view of the routing state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteSnapshot {
    pub lifecycle: Lifecycle,
    pub selected: AudioDevice,
    pub user_selected: AudioDevice,
    pub default_device: AudioDevice,
    pub available: DeviceSet,
}

/// Selects and applies the audio route for one call at a time
pub struct RoutingSessionController {
    platform: Box<dyn AudioPlatform>,
    bluetooth: Box<dyn BluetoothPort>,
    proximity_sensor: Box<dyn ProximityPort>,
    preferences: PreferenceStore,
    events: RouteEventSender,
    observer: Option<Box<dyn RouteObserver>>,
    lifecycle: Lifecycle,
    has_earpiece: bool,
    default_device: AudioDevice,
    session: SessionState,
}

impl RoutingSessionController {
    /// Create a controller.
    ///
    /// Earpiece hardware is probed once here, and the default device is
    /// derived from the speakerphone preference.
    pub fn new(ports: RoutePorts, preferences: PreferenceStore, events: RouteEventSender) -> Self {
        let has_earpiece = ports.platform.has_earpiece();
        let default_device = match preferences.speakerphone().default_device() {
            AudioDevice::Earpiece if !has_earpiece => AudioDevice::SpeakerPhone,
            device => device,
        };

        debug!(
            "Routing controller created: earpiece={}, default={}, preference={}",
            has_earpiece,
            default_device,
            preferences.speakerphone()
        );

        Self {
            platform: ports.platform,
            bluetooth: ports.bluetooth,
            proximity_sensor: ports.proximity,
            preferences,
            events,
            observer: None,
            lifecycle: Lifecycle::Uninitialized,
            has_earpiece,
            default_device,
            session: SessionState::default(),
        }
    }

    /// Start routing for a call
    pub fn start(&mut self, observer: impl RouteObserver + 'static) {
        self.start_boxed(Box::new(observer));
    }

    /// Start routing for a call with an already boxed observer
    pub fn start_boxed(&mut self, observer: Box<dyn RouteObserver>) {
        if self.is_running() {
            warn!("Audio routing is already running");
            return;
        }

        info!("Starting audio routing");
        self.observer = Some(observer);
        self.session = SessionState::default();

        self.session.saved_audio = Some(self.platform.snapshot());
        self.session.has_wired_headset = self.platform.has_wired_headset();

        if let Err(e) = self.platform.request_audio_focus(self.events.clone()) {
            warn!("Audio focus request failed: {}", e);
        }

        self.platform.set_communication_mode(true);
        self.platform.set_microphone_mute(false);

        self.bluetooth.start(self.events.clone());

        if let Err(e) = self.platform.subscribe_headset_events(self.events.clone()) {
            warn!("Failed to subscribe to headset events: {}", e);
        }

        self.proximity_sensor.start(self.events.clone());

        self.lifecycle = Lifecycle::Running;
        self.update_audio_device_state();
    }

    /// Stop routing and put the platform back the way it was
    pub fn stop(&mut self) {
        if !self.is_running() {
            warn!("Audio routing is not running");
            return;
        }

        info!("Stopping audio routing");
        self.lifecycle = Lifecycle::Uninitialized;

        if let Err(e) = self.platform.unsubscribe_headset_events() {
            error!("Failed to unsubscribe from headset events: {}", e);
        }

        self.bluetooth.stop();

        if let Some(saved) = self.session.saved_audio.take() {
            self.platform.restore(&saved);
        }
        self.platform.abandon_audio_focus();

        self.proximity_sensor.stop();

        self.observer = None;
        self.session = SessionState::default();
    }

    /// Stop if needed and release Bluetooth resources. Safe to call repeatedly.
    pub fn release(&mut self) {
        if self.is_running() {
            self.stop();
        }
        self.bluetooth.release();
        self.session.available.clear();
    }

    /// Set the automatic default device.
    ///
    /// Only the loudspeaker and the earpiece qualify; the earpiece becomes
    /// the loudspeaker on hardware without one. Returns the default actually
    /// stored.
    pub fn set_default_audio_device(&mut self, device: AudioDevice) -> RouteResult<AudioDevice> {
        let accepted = self.accept_default(device)?;

        self.default_device = accepted;
        if self.is_running() {
            self.update_audio_device_state();
        }
        Ok(accepted)
    }

    fn accept_default(&self, device: AudioDevice) -> RouteResult<AudioDevice> {
        match device {
            AudioDevice::SpeakerPhone => Ok(AudioDevice::SpeakerPhone),
            AudioDevice::Earpiece if self.has_earpiece => Ok(AudioDevice::Earpiece),
            AudioDevice::Earpiece => {
                debug!("No earpiece hardware, default device falls back to {}", AudioDevice::SpeakerPhone);
                Ok(AudioDevice::SpeakerPhone)
            }
            other => {
                warn!("Invalid default audio device: {}", other);
                Err(RouteError::unsupported(other, "default device"))
            }
        }
    }

    /// Record an explicit user choice among the available devices
    pub fn select_audio_device(&mut self, device: AudioDevice) -> RouteResult<()> {
        if !self.session.available.contains(device) {
            warn!("Device not available: {} (available: {})", device, self.session.available);
            return Err(RouteError::DeviceUnavailable { device });
        }

        info!("User selected audio device {}", device);
        self.session.user_selected = device;
        self.update_audio_device_state();
        Ok(())
    }

    /// Call-screen earpiece/loudspeaker toggle: make `device` the default and select it.
    ///
    /// Rejected without touching the default when the resulting device is not
    /// available, e.g. the built-ins while a wired headset is plugged in.
    pub fn toggle_audio_device(&mut self, device: AudioDevice) -> RouteResult<()> {
        if !device.is_builtin() {
            warn!("Cannot toggle to {}", device);
            return Err(RouteError::unsupported(device, "toggle"));
        }
        if !self.is_running() {
            warn!("Cannot toggle to {}: audio routing is not running", device);
            return Err(RouteError::invalid_state("audio routing is not running"));
        }

        let default = self.accept_default(device)?;
        if !self.session.available.contains(default) {
            warn!("Device not available: {} (available: {})", default, self.session.available);
            return Err(RouteError::DeviceUnavailable { device: default });
        }

        self.set_default_audio_device(default)?;
        self.select_audio_device(default)
    }

    /// Change the speakerphone preference and re-evaluate while running
    pub fn set_speakerphone_preference(&mut self, preference: SpeakerphonePreference) {
        debug!("Speakerphone preference set to {}", preference);
        self.preferences.set_speakerphone(preference);
        if self.is_running() {
            self.update_audio_device_state();
        }
    }

    /// Apply an external event.
    ///
    /// Raw signals are recorded even while stopped; re-evaluation only
    /// happens while running.
    pub fn handle_event(&mut self, event: RouteEvent) {
        debug!("Route event: {}", event);

        match event {
            RouteEvent::WiredHeadsetPresence { present } => {
                self.session.has_wired_headset = present;
            }
            RouteEvent::BluetoothStateChanged { state } => {
                debug!("Bluetooth reported {:?}, port state is {:?}", state, self.bluetooth.state());
            }
            RouteEvent::ProximityChanged { near } => {
                if !self.is_running() {
                    return;
                }
                self.session.proximity = Some(Proximity::from_near(near));
            }
            RouteEvent::AudioFocusChanged { change } => {
                debug!("Audio focus changed: {:?}", change);
                return;
            }
        }

        if self.is_running() {
            self.update_audio_device_state();
        }
    }

    /// Wired headset plugged or unplugged
    pub fn notify_wired_headset_presence(&mut self, present: bool) {
        self.handle_event(RouteEvent::WiredHeadsetPresence { present });
    }

    /// Bluetooth port changed state
    pub fn notify_bluetooth_state_changed(&mut self) {
        let state = self.bluetooth.state();
        self.handle_event(RouteEvent::BluetoothStateChanged { state });
    }

    /// Proximity sensor changed
    pub fn notify_proximity_changed(&mut self, near: bool) {
        self.handle_event(RouteEvent::ProximityChanged { near });
    }

    /// Handle every event already queued on `events`; returns how many were handled
    pub fn drain_events(&mut self, events: &mut RouteEventReceiver) -> usize {
        let mut handled = 0;
        while let Some(event) = events.try_recv() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    /// Re-evaluate the route from the current signals
    pub fn update_audio_device_state(&mut self) {
        if self.bluetooth.state().needs_device_refresh() {
            self.bluetooth.update_device();
        }

        let signals = InventorySignals {
            has_wired_headset: self.session.has_wired_headset,
            has_earpiece_hardware: self.has_earpiece,
            bluetooth_available: self.bluetooth.state().is_available(),
        };
        let candidate = DeviceInventory::compute(&signals);
        let availability_changed = candidate != self.session.available;
        if availability_changed {
            debug!("Available devices {} -> {}", self.session.available, candidate);
        }
        self.session.available = candidate;

        let user_selected = SelectionPolicy::correct_user_selection(
            self.session.user_selected,
            self.bluetooth.state(),
            self.session.has_wired_headset,
        );
        if user_selected != self.session.user_selected {
            debug!("User selection corrected {} -> {}", self.session.user_selected, user_selected);
            self.session.user_selected = user_selected;
        }

        match SelectionPolicy::link_action(self.bluetooth.state(), user_selected) {
            LinkAction::Stop => {
                debug!("Stopping Bluetooth audio link");
                self.bluetooth.stop_audio_link();
                self.bluetooth.update_device();
            }
            LinkAction::Start => {
                debug!("Starting Bluetooth audio link");
                if !self.bluetooth.start_audio_link() {
                    warn!("Bluetooth audio link could not be started");
                    self.session.available.remove(AudioDevice::Bluetooth);
                }
            }
            LinkAction::Keep => {}
        }

        let input = SelectionInput {
            available: &self.session.available,
            bluetooth: self.bluetooth.state(),
            has_wired_headset: self.session.has_wired_headset,
            default_device: self.default_device,
            proximity: self.session.proximity,
            proximity_switching: self.preferences.speakerphone().proximity_switching(),
        };
        let mut target = SelectionPolicy::choose(&input);

        if target.is_routable() && !self.session.available.contains(target) {
            let fallback = SelectionPolicy::fallback_device(&input);
            warn!("{} chosen but not available, using {}", target, fallback);
            target = fallback;
        }

        debug!(
            "Route evaluation: available={}, user={}, target={}, selected={}",
            self.session.available, self.session.user_selected, target, self.session.selected
        );

        if availability_changed || target != self.session.selected {
            self.apply_device(target);
        }
    }

    fn apply_device(&mut self, device: AudioDevice) {
        if !device.is_routable() {
            return;
        }
        self.set_speakerphone_on(device.uses_loudspeaker());

        if self.session.selected != device {
            info!("Audio device {} -> {} (available: {})", self.session.selected, device, self.session.available);
            self.session.selected = device;
            if let Some(observer) = self.observer.as_mut() {
                observer.on_selected_device_changed(device, &self.session.available);
            }
        }
    }

    fn set_speakerphone_on(&mut self, on: bool) {
        if self.platform.is_speakerphone_on() != on {
            self.platform.set_speakerphone_on(on);
        }
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle == Lifecycle::Running
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Devices currently available
    pub fn audio_devices(&self) -> DeviceSet {
        self.session.available.clone()
    }

    pub fn selected_audio_device(&self) -> AudioDevice {
        self.session.selected
    }

    pub fn user_selected_audio_device(&self) -> AudioDevice {
        self.session.user_selected
    }

    pub fn default_audio_device(&self) -> AudioDevice {
        self.default_device
    }

    pub fn has_earpiece(&self) -> bool {
        self.has_earpiece
    }

    pub fn preferences(&self) -> &PreferenceStore {
        &self.preferences
    }

    pub fn snapshot(&self) -> RouteSnapshot {
        RouteSnapshot {
            lifecycle: self.lifecycle,
            selected: self.session.selected,
            user_selected: self.session.user_selected,
            default_device: self.default_device,
            available: self.session.available.clone(),
        }
    }
}

impl std::fmt::Debug for RoutingSessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutingSessionController")
            .field("lifecycle", &self.lifecycle)
            .field("has_earpiece", &self.has_earpiece)
            .field("default_device", &self.default_device)
            .field("session", &self.session)
            .field("bluetooth", &self.bluetooth.state())
            .finish()
    }
}
