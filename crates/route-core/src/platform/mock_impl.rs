//! In-memory platform ports
//!
//! Each mock is a cheap clonable handle around shared state, so a test can
//! keep one clone to drive and inspect the "hardware" while the controller
//! owns another.
//!
//! [`MockBluetooth`] follows the behaviour of a real headset manager: the SCO
//! link can only be requested while a headset is connected and idle, at most
//! [`MAX_SCO_CONNECTION_ATTEMPTS`] times per connection, and connection
//! progress is reported through the event sender rather than returned.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::{RouteError, RouteResult};
use crate::events::RouteEventSender;
use crate::platform::{
    AudioFocusChange, AudioPlatform, BluetoothPort, BluetoothState, ProximityPort, SavedAudioState,
};

/// SCO requests allowed before the headset reconnects
pub const MAX_SCO_CONNECTION_ATTEMPTS: u32 = 2;

/// Observable state of a [`MockAudioPlatform`]
#[derive(Debug, Clone, Default)]
pub struct MockPlatformState {
    pub communication_mode: bool,
    pub speakerphone_on: bool,
    pub microphone_mute: bool,
    pub has_earpiece: bool,
    pub wired_headset_connected: bool,
    pub focus_held: bool,
    pub headset_subscribed: bool,
    /// Number of writes to the loudspeaker switch
    pub speakerphone_writes: usize,
    pub fail_focus_request: bool,
    pub fail_subscribe: bool,
    pub fail_unsubscribe: bool,
}

#[derive(Default)]
struct PlatformInner {
    state: MockPlatformState,
    headset_events: Option<RouteEventSender>,
    focus_events: Option<RouteEventSender>,
}

/// In-memory [`AudioPlatform`]
#[derive(Clone)]
pub struct MockAudioPlatform {
    inner: Arc<Mutex<PlatformInner>>,
}

impl MockAudioPlatform {
    /// Handset with an earpiece and nothing plugged in
    pub fn new() -> Self {
        let inner = PlatformInner {
            state: MockPlatformState {
                has_earpiece: true,
                ..Default::default()
            },
            ..Default::default()
        };
        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    /// Device without earpiece (telephony) hardware
    pub fn without_earpiece() -> Self {
        let platform = Self::new();
        platform.inner.lock().state.has_earpiece = false;
        platform
    }

    /// Start with a wired headset already plugged in
    pub fn with_wired_headset(self) -> Self {
        self.inner.lock().state.wired_headset_connected = true;
        self
    }

    /// Pre-session loudspeaker and microphone configuration
    pub fn with_initial_audio(self, speakerphone_on: bool, microphone_mute: bool) -> Self {
        {
            let mut inner = self.inner.lock();
            inner.state.speakerphone_on = speakerphone_on;
            inner.state.microphone_mute = microphone_mute;
        }
        self
    }

    /// Current mock state, for assertions
    pub fn inspect(&self) -> MockPlatformState {
        self.inner.lock().state.clone()
    }

    pub fn fail_focus_request(&self, fail: bool) {
        self.inner.lock().state.fail_focus_request = fail;
    }

    pub fn fail_subscribe(&self, fail: bool) {
        self.inner.lock().state.fail_subscribe = fail;
    }

    pub fn fail_unsubscribe(&self, fail: bool) {
        self.inner.lock().state.fail_unsubscribe = fail;
    }

    /// Plug or unplug the wired headset. Returns true if a subscriber was told.
    pub fn plug_headset(&self, present: bool) -> bool {
        let sender = {
            let mut inner = self.inner.lock();
            inner.state.wired_headset_connected = present;
            inner.headset_events.clone()
        };
        sender.map(|events| events.wired_headset(present)).unwrap_or(false)
    }

    /// Simulate another application taking or returning audio focus
    pub fn change_focus(&self, change: AudioFocusChange) -> bool {
        let sender = self.inner.lock().focus_events.clone();
        sender.map(|events| events.audio_focus(change)).unwrap_or(false)
    }
}

impl Default for MockAudioPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioPlatform for MockAudioPlatform {
    fn snapshot(&self) -> SavedAudioState {
        let inner = self.inner.lock();
        SavedAudioState {
            communication_mode: inner.state.communication_mode,
            speakerphone_on: inner.state.speakerphone_on,
            microphone_mute: inner.state.microphone_mute,
        }
    }

    fn restore(&mut self, saved: &SavedAudioState) {
        let mut inner = self.inner.lock();
        inner.state.speakerphone_on = saved.speakerphone_on;
        inner.state.microphone_mute = saved.microphone_mute;
        inner.state.communication_mode = saved.communication_mode;
    }

    fn set_communication_mode(&mut self, enabled: bool) {
        self.inner.lock().state.communication_mode = enabled;
    }

    fn set_microphone_mute(&mut self, muted: bool) {
        self.inner.lock().state.microphone_mute = muted;
    }

    fn is_speakerphone_on(&self) -> bool {
        self.inner.lock().state.speakerphone_on
    }

    fn set_speakerphone_on(&mut self, on: bool) {
        let mut inner = self.inner.lock();
        inner.state.speakerphone_on = on;
        inner.state.speakerphone_writes += 1;
    }

    fn request_audio_focus(&mut self, events: RouteEventSender) -> RouteResult<()> {
        let mut inner = self.inner.lock();
        if inner.state.fail_focus_request {
            return Err(RouteError::platform("request_audio_focus", "focus request denied"));
        }
        inner.state.focus_held = true;
        inner.focus_events = Some(events);
        Ok(())
    }

    fn abandon_audio_focus(&mut self) {
        let mut inner = self.inner.lock();
        inner.state.focus_held = false;
        inner.focus_events = None;
    }

    fn has_earpiece(&self) -> bool {
        self.inner.lock().state.has_earpiece
    }

    fn has_wired_headset(&self) -> bool {
        self.inner.lock().state.wired_headset_connected
    }

    fn subscribe_headset_events(&mut self, events: RouteEventSender) -> RouteResult<()> {
        let mut inner = self.inner.lock();
        if inner.state.fail_subscribe {
            return Err(RouteError::platform("subscribe_headset_events", "receiver registration failed"));
        }
        inner.state.headset_subscribed = true;
        inner.headset_events = Some(events);
        Ok(())
    }

    fn unsubscribe_headset_events(&mut self) -> RouteResult<()> {
        let mut inner = self.inner.lock();
        // The registration is dropped either way
        inner.state.headset_subscribed = false;
        inner.headset_events = None;
        if inner.state.fail_unsubscribe {
            return Err(RouteError::platform("unsubscribe_headset_events", "receiver not registered"));
        }
        Ok(())
    }
}

/// Observable state of a [`MockBluetooth`]
#[derive(Debug, Clone)]
pub struct MockBluetoothState {
    pub state: BluetoothState,
    pub supported: bool,
    pub headset_connected: bool,
    pub sco_attempts: u32,
    pub link_requests: usize,
    pub link_stops: usize,
    pub device_refreshes: usize,
    pub fail_link_start: bool,
    pub released: bool,
}

impl Default for MockBluetoothState {
    fn default() -> Self {
        Self {
            state: BluetoothState::Uninitialized,
            supported: true,
            headset_connected: false,
            sco_attempts: 0,
            link_requests: 0,
            link_stops: 0,
            device_refreshes: 0,
            fail_link_start: false,
            released: false,
        }
    }
}

#[derive(Default)]
struct BluetoothInner {
    state: MockBluetoothState,
    events: Option<RouteEventSender>,
}

impl BluetoothInner {
    fn stop_link(&mut self) -> bool {
        if !self.state.state.is_link_active() {
            return false;
        }
        self.state.state = BluetoothState::ScoDisconnecting;
        self.state.link_stops += 1;
        true
    }

    fn notify(&self) -> Option<(RouteEventSender, BluetoothState)> {
        self.events.clone().map(|events| (events, self.state.state))
    }
}

/// In-memory [`BluetoothPort`]
#[derive(Clone, Default)]
pub struct MockBluetooth {
    inner: Arc<Mutex<BluetoothInner>>,
}

impl MockBluetooth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adapter missing or SCO not usable: `start` leaves the port uninitialized
    pub fn unsupported() -> Self {
        let bluetooth = Self::new();
        bluetooth.inner.lock().state.supported = false;
        bluetooth
    }

    /// A headset is already connected when the port starts
    pub fn with_headset(self) -> Self {
        self.inner.lock().state.headset_connected = true;
        self
    }

    /// Current mock state, for assertions
    pub fn inspect(&self) -> MockBluetoothState {
        self.inner.lock().state.clone()
    }

    /// Make SCO requests fail
    pub fn fail_link_start(&self, fail: bool) {
        self.inner.lock().state.fail_link_start = fail;
    }

    /// Headset connected. The port's state is refreshed on the next device update.
    pub fn connect_headset(&self) -> bool {
        let pending = {
            let mut inner = self.inner.lock();
            inner.state.headset_connected = true;
            inner.state.sco_attempts = 0;
            inner.notify()
        };
        Self::send(pending)
    }

    /// Headset disconnected; any audio link is torn down
    pub fn disconnect_headset(&self) -> bool {
        let pending = {
            let mut inner = self.inner.lock();
            inner.state.headset_connected = false;
            inner.stop_link();
            inner.notify()
        };
        Self::send(pending)
    }

    /// The headset confirmed the SCO audio link
    pub fn audio_connected(&self) -> bool {
        let pending = {
            let mut inner = self.inner.lock();
            if inner.state.state != BluetoothState::ScoConnecting {
                return false;
            }
            inner.state.state = BluetoothState::ScoConnected;
            inner.state.sco_attempts = 0;
            inner.notify()
        };
        Self::send(pending)
    }

    /// The SCO request timed out without the headset confirming it
    pub fn audio_link_timeout(&self) -> bool {
        let pending = {
            let mut inner = self.inner.lock();
            if inner.state.state != BluetoothState::ScoConnecting {
                return false;
            }
            inner.stop_link();
            inner.notify()
        };
        Self::send(pending)
    }

    fn send(pending: Option<(RouteEventSender, BluetoothState)>) -> bool {
        pending.map(|(events, state)| events.bluetooth_state(state)).unwrap_or(false)
    }
}

impl BluetoothPort for MockBluetooth {
    fn state(&self) -> BluetoothState {
        self.inner.lock().state.state
    }

    fn start(&mut self, events: RouteEventSender) {
        let mut inner = self.inner.lock();
        if !inner.state.supported {
            warn!("Bluetooth not supported, staying uninitialized");
            return;
        }
        if inner.state.state != BluetoothState::Uninitialized {
            warn!("Bluetooth already started, current state: {:?}", inner.state.state);
            return;
        }
        inner.state.sco_attempts = 0;
        inner.state.released = false;
        inner.state.state = BluetoothState::HeadsetUnavailable;
        inner.events = Some(events);
    }

    fn stop(&mut self) {
        let mut inner = self.inner.lock();
        if inner.state.state == BluetoothState::Uninitialized {
            return;
        }
        inner.stop_link();
        inner.events = None;
        inner.state.state = BluetoothState::Uninitialized;
    }

    fn release(&mut self) {
        self.stop();
        let mut inner = self.inner.lock();
        inner.state.sco_attempts = 0;
        inner.state.released = true;
    }

    fn update_device(&mut self) {
        let mut inner = self.inner.lock();
        if inner.state.state == BluetoothState::Uninitialized {
            return;
        }
        inner.state.device_refreshes += 1;
        inner.state.state = if inner.state.headset_connected {
            BluetoothState::HeadsetAvailable
        } else {
            BluetoothState::HeadsetUnavailable
        };
    }

    fn start_audio_link(&mut self) -> bool {
        let mut inner = self.inner.lock();
        if inner.state.sco_attempts >= MAX_SCO_CONNECTION_ATTEMPTS {
            warn!("Max SCO connection attempts reached");
            return false;
        }
        if inner.state.state != BluetoothState::HeadsetAvailable {
            warn!("Cannot start SCO, wrong state: {:?}", inner.state.state);
            return false;
        }
        if inner.state.fail_link_start {
            debug!("SCO request refused");
            return false;
        }
        inner.state.state = BluetoothState::ScoConnecting;
        inner.state.sco_attempts += 1;
        inner.state.link_requests += 1;
        true
    }

    fn stop_audio_link(&mut self) {
        self.inner.lock().stop_link();
    }
}

/// Observable state of a [`MockProximity`]
#[derive(Debug, Clone, Default)]
pub struct MockProximityState {
    pub near: bool,
    pub running: bool,
    pub starts: usize,
}

#[derive(Default)]
struct ProximityInner {
    state: MockProximityState,
    events: Option<RouteEventSender>,
}

/// In-memory [`ProximityPort`]
#[derive(Clone, Default)]
pub struct MockProximity {
    inner: Arc<Mutex<ProximityInner>>,
}

impl MockProximity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current mock state, for assertions
    pub fn inspect(&self) -> MockProximityState {
        self.inner.lock().state.clone()
    }

    /// New sensor reading; reported only while the sensor is running
    pub fn set_near(&self, near: bool) -> bool {
        let sender = {
            let mut inner = self.inner.lock();
            inner.state.near = near;
            if !inner.state.running {
                return false;
            }
            inner.events.clone()
        };
        sender.map(|events| events.proximity(near)).unwrap_or(false)
    }
}

impl ProximityPort for MockProximity {
    fn start(&mut self, events: RouteEventSender) {
        let mut inner = self.inner.lock();
        inner.state.running = true;
        inner.state.starts += 1;
        inner.events = Some(events);
    }

    fn stop(&mut self) {
        let mut inner = self.inner.lock();
        inner.state.running = false;
        inner.events = None;
    }

    fn is_near(&self) -> bool {
        self.inner.lock().state.near
    }
}
