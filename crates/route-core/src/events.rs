//! Route events and observers
//!
//! Inbound: external ports (Bluetooth, proximity, headset detection, audio
//! focus) report through a [`RouteEventSender`]. Whatever owns the controller
//! drains those events one at a time, so a port that reports while a
//! re-evaluation is in progress is handled after it.
//!
//! Outbound: the controller calls a [`RouteObserver`] when the selected device
//! actually changes.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};

use crate::device::{AudioDevice, DeviceSet};
use crate::platform::{AudioFocusChange, BluetoothState};

/// External signal delivered to the routing controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RouteEvent {
    /// Wired headset plugged (true) or unplugged (false)
    WiredHeadsetPresence { present: bool },
    /// Bluetooth port moved to a new state
    BluetoothStateChanged { state: BluetoothState },
    /// Proximity sensor reading changed
    ProximityChanged { near: bool },
    /// Platform audio focus changed
    AudioFocusChanged { change: AudioFocusChange },
}

impl fmt::Display for RouteEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteEvent::WiredHeadsetPresence { present } => write!(f, "wired headset present={}", present),
            RouteEvent::BluetoothStateChanged { state } => write!(f, "bluetooth state={:?}", state),
            RouteEvent::ProximityChanged { near } => write!(f, "proximity near={}", near),
            RouteEvent::AudioFocusChanged { change } => write!(f, "audio focus {:?}", change),
        }
    }
}

/// Handle external ports use to report events
///
/// Cloneable and `Send`, so a port can hand it to whatever thread observes the
/// hardware. Sending never blocks.
#[derive(Clone)]
pub struct RouteEventSender {
    deliver: Arc<dyn Fn(RouteEvent) -> bool + Send + Sync>,
}

impl RouteEventSender {
    /// Build a sender from a delivery function returning false once the receiver is gone
    pub fn from_fn<F>(deliver: F) -> Self
    where
        F: Fn(RouteEvent) -> bool + Send + Sync + 'static,
    {
        Self {
            deliver: Arc::new(deliver),
        }
    }

    /// Sender that drops every event
    pub fn disconnected() -> Self {
        Self::from_fn(|_| false)
    }

    /// Deliver an event; returns false if nobody is listening any more
    pub fn send(&self, event: RouteEvent) -> bool {
        (self.deliver)(event)
    }

    pub fn wired_headset(&self, present: bool) -> bool {
        self.send(RouteEvent::WiredHeadsetPresence { present })
    }

    pub fn bluetooth_state(&self, state: BluetoothState) -> bool {
        self.send(RouteEvent::BluetoothStateChanged { state })
    }

    pub fn proximity(&self, near: bool) -> bool {
        self.send(RouteEvent::ProximityChanged { near })
    }

    pub fn audio_focus(&self, change: AudioFocusChange) -> bool {
        self.send(RouteEvent::AudioFocusChanged { change })
    }
}

impl fmt::Debug for RouteEventSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteEventSender").finish_non_exhaustive()
    }
}

/// Receiving half of [`event_channel`]
#[derive(Debug)]
pub struct RouteEventReceiver {
    rx: mpsc::UnboundedReceiver<RouteEvent>,
}

impl RouteEventReceiver {
    /// Take the next queued event without waiting
    pub fn try_recv(&mut self) -> Option<RouteEvent> {
        self.rx.try_recv().ok()
    }

    /// Wait for the next event
    pub async fn recv(&mut self) -> Option<RouteEvent> {
        self.rx.recv().await
    }
}

/// Unbounded event queue for driving a controller directly
pub fn event_channel() -> (RouteEventSender, RouteEventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sender = RouteEventSender::from_fn(move |event| tx.send(event).is_ok());
    (sender, RouteEventReceiver { rx })
}

/// Notification of a selection change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceChange {
    /// Newly selected device
    pub selected: AudioDevice,
    /// Devices available at the time of the change
    pub available: DeviceSet,
}

/// Receives selection changes
///
/// Called only when the selected device changes value, always from the thread
/// that owns the controller.
pub trait RouteObserver: Send {
    fn on_selected_device_changed(&mut self, selected: AudioDevice, available: &DeviceSet);
}

impl<F> RouteObserver for F
where
    F: FnMut(AudioDevice, &DeviceSet) + Send,
{
    fn on_selected_device_changed(&mut self, selected: AudioDevice, available: &DeviceSet) {
        self(selected, available)
    }
}

/// Observer that republishes changes on a tokio broadcast channel
#[derive(Debug, Clone)]
pub struct BroadcastObserver {
    sender: broadcast::Sender<DeviceChange>,
}

impl BroadcastObserver {
    /// Create a new observer with the specified capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to selection changes
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceChange> {
        self.sender.subscribe()
    }

    /// Get the number of active receivers
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastObserver {
    fn default() -> Self {
        Self::new(64)
    }
}

impl RouteObserver for BroadcastObserver {
    fn on_selected_device_changed(&mut self, selected: AudioDevice, available: &DeviceSet) {
        // No receivers is fine
        let _ = self.sender.send(DeviceChange {
            selected,
            available: available.clone(),
        });
    }
}
