//! Single-threaded routing actor
//!
//! [`RouteManager`] moves a [`RoutingSessionController`] onto its own OS
//! thread and feeds it from one unbounded channel. Commands from any
//! [`RouteHandle`] clone and events from any port share that channel, so
//! everything the controller sees is totally ordered by arrival and no two
//! operations ever overlap.
//!
//! ```rust,no_run
//! use callroute_core::config::RouteConfig;
//! use callroute_core::controller::RoutePorts;
//! use callroute_core::manager::RouteManager;
//! use callroute_core::platform::mock_impl::{MockAudioPlatform, MockBluetooth, MockProximity};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let ports = RoutePorts::new(MockAudioPlatform::new(), MockBluetooth::new(), MockProximity::new());
//! let manager = RouteManager::spawn(ports, RouteConfig::default())?;
//! let mut changes = manager.subscribe();
//!
//! let handle = manager.handle();
//! handle.start().await?;
//!
//! let change = changes.recv().await?;
//! println!("routing to {} out of {}", change.selected, change.available);
//!
//! handle.stop().await?;
//! manager.shutdown();
//! # Ok(())
//! # }
//! ```

use std::thread::JoinHandle;

use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, info};

use crate::config::{PreferenceStore, RouteConfig, SpeakerphonePreference};
use crate::controller::{RoutePorts, RouteSnapshot, RoutingSessionController};
use crate::device::{AudioDevice, DeviceSet};
use crate::error::{RouteError, RouteResult};
use crate::events::{BroadcastObserver, DeviceChange, RouteEvent, RouteEventSender, RouteObserver};

enum Command {
    Start {
        observer: Box<dyn RouteObserver>,
        reply: oneshot::Sender<()>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
    Release {
        reply: oneshot::Sender<()>,
    },
    Select {
        device: AudioDevice,
        reply: oneshot::Sender<RouteResult<()>>,
    },
    SetDefault {
        device: AudioDevice,
        reply: oneshot::Sender<RouteResult<AudioDevice>>,
    },
    Toggle {
        device: AudioDevice,
        reply: oneshot::Sender<RouteResult<()>>,
    },
    SetPreference {
        preference: SpeakerphonePreference,
    },
    Snapshot {
        reply: oneshot::Sender<RouteSnapshot>,
    },
    Shutdown,
}

enum Envelope {
    Command(Command),
    Event(RouteEvent),
}

/// Owns the controller on the routing thread
struct RouteActor {
    controller: RoutingSessionController,
    rx: mpsc::UnboundedReceiver<Envelope>,
}

impl RouteActor {
    fn run(mut self) {
        info!("Routing actor running");

        while let Some(envelope) = self.rx.blocking_recv() {
            match envelope {
                Envelope::Event(event) => self.controller.handle_event(event),
                Envelope::Command(command) => {
                    if !self.execute(command) {
                        break;
                    }
                }
            }
        }

        info!("Routing actor stopped");
    }

    /// Returns false once the actor should exit
    fn execute(&mut self, command: Command) -> bool {
        match command {
            Command::Start { observer, reply } => {
                self.controller.start_boxed(observer);
                let _ = reply.send(());
            }
            Command::Stop { reply } => {
                self.controller.stop();
                let _ = reply.send(());
            }
            Command::Release { reply } => {
                self.controller.release();
                let _ = reply.send(());
            }
            Command::Select { device, reply } => {
                let _ = reply.send(self.controller.select_audio_device(device));
            }
            Command::SetDefault { device, reply } => {
                let _ = reply.send(self.controller.set_default_audio_device(device));
            }
            Command::Toggle { device, reply } => {
                let _ = reply.send(self.controller.toggle_audio_device(device));
            }
            Command::SetPreference { preference } => {
                self.controller.set_speakerphone_preference(preference);
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.controller.snapshot());
            }
            Command::Shutdown => {
                self.controller.release();
                return false;
            }
        }
        true
    }
}

/// Cloneable, `Send` handle to the routing thread
#[derive(Clone)]
pub struct RouteHandle {
    tx: mpsc::UnboundedSender<Envelope>,
    changes: BroadcastObserver,
}

impl RouteHandle {
    fn send(&self, command: Command) -> RouteResult<()> {
        self.tx
            .send(Envelope::Command(command))
            .map_err(|_| RouteError::ChannelClosed)
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> RouteResult<T> {
        let (reply, response) = oneshot::channel();
        self.send(build(reply))?;
        response.await.map_err(|_| RouteError::ChannelClosed)
    }

    /// Start a session; changes go to the manager's broadcast subscribers
    pub async fn start(&self) -> RouteResult<()> {
        let observer = self.changes.clone();
        self.start_with_observer(observer).await
    }

    /// Start a session with a custom observer
    pub async fn start_with_observer(&self, observer: impl RouteObserver + 'static) -> RouteResult<()> {
        let observer: Box<dyn RouteObserver> = Box::new(observer);
        self.request(|reply| Command::Start { observer, reply }).await
    }

    pub async fn stop(&self) -> RouteResult<()> {
        self.request(|reply| Command::Stop { reply }).await
    }

    pub async fn release(&self) -> RouteResult<()> {
        self.request(|reply| Command::Release { reply }).await
    }

    /// Explicit user choice; rejected if the device is not available
    pub async fn select_audio_device(&self, device: AudioDevice) -> RouteResult<()> {
        self.request(|reply| Command::Select { device, reply }).await?
    }

    /// Change the automatic default; returns the default actually stored
    pub async fn set_default_audio_device(&self, device: AudioDevice) -> RouteResult<AudioDevice> {
        self.request(|reply| Command::SetDefault { device, reply }).await?
    }

    /// Earpiece/loudspeaker toggle
    pub async fn toggle_audio_device(&self, device: AudioDevice) -> RouteResult<()> {
        self.request(|reply| Command::Toggle { device, reply }).await?
    }

    /// Change the speakerphone preference and re-evaluate.
    ///
    /// The store is written on the routing thread, so events queued before
    /// this call are still judged under the old preference.
    pub fn set_speakerphone_preference(&self, preference: SpeakerphonePreference) -> RouteResult<()> {
        debug!("Queueing speakerphone preference {}", preference);
        self.send(Command::SetPreference { preference })
    }

    pub async fn snapshot(&self) -> RouteResult<RouteSnapshot> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    pub async fn selected_audio_device(&self) -> RouteResult<AudioDevice> {
        Ok(self.snapshot().await?.selected)
    }

    pub async fn audio_devices(&self) -> RouteResult<DeviceSet> {
        Ok(self.snapshot().await?.available)
    }

    /// Event sender feeding the same queue as the commands
    pub fn event_sender(&self) -> RouteEventSender {
        let tx = self.tx.clone();
        RouteEventSender::from_fn(move |event| tx.send(Envelope::Event(event)).is_ok())
    }

    pub fn notify_wired_headset_presence(&self, present: bool) -> RouteResult<()> {
        self.notify(RouteEvent::WiredHeadsetPresence { present })
    }

    pub fn notify_proximity_changed(&self, near: bool) -> RouteResult<()> {
        self.notify(RouteEvent::ProximityChanged { near })
    }

    fn notify(&self, event: RouteEvent) -> RouteResult<()> {
        self.tx
            .send(Envelope::Event(event))
            .map_err(|_| RouteError::ChannelClosed)
    }

    /// Subscribe to selection changes of sessions started with [`RouteHandle::start`]
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceChange> {
        self.changes.subscribe()
    }
}

impl std::fmt::Debug for RouteHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteHandle")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

/// Runs a routing controller on a dedicated thread
pub struct RouteManager {
    handle: RouteHandle,
    thread: Option<JoinHandle<()>>,
}

impl RouteManager {
    /// Spawn the routing thread with a preference store seeded from `config`
    pub fn spawn(ports: RoutePorts, config: RouteConfig) -> RouteResult<Self> {
        let preferences = config.preference_store();
        Self::spawn_with_preferences(ports, preferences, config)
    }

    /// Spawn the routing thread sharing an existing preference store
    pub fn spawn_with_preferences(
        ports: RoutePorts,
        preferences: PreferenceStore,
        config: RouteConfig,
    ) -> RouteResult<Self> {
        config.validate()?;

        let (tx, rx) = mpsc::unbounded_channel();
        let handle = RouteHandle {
            tx,
            changes: BroadcastObserver::new(config.event_channel_capacity),
        };

        let controller = RoutingSessionController::new(ports, preferences, handle.event_sender());
        let actor = RouteActor { controller, rx };

        let thread = std::thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || actor.run())
            .map_err(|e| RouteError::platform("spawn routing thread", e.to_string()))?;

        info!("Routing thread '{}' spawned", config.thread_name);

        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> RouteHandle {
        self.handle.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DeviceChange> {
        self.handle.subscribe()
    }

    /// Release the controller and wait for the routing thread to exit
    pub fn shutdown(mut self) {
        self.join();
    }

    fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = self.handle.send(Command::Shutdown);
            if thread.join().is_err() {
                error!("Routing thread panicked");
            }
        }
    }
}

impl Drop for RouteManager {
    fn drop(&mut self) {
        self.join();
    }
}
