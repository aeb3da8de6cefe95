//! Replays a script against a routing thread backed by the in-memory ports

use anyhow::{Context, Result};
use callroute_core::platform::mock_impl::{MockAudioPlatform, MockBluetooth, MockProximity};
use callroute_core::{DeviceChange, RouteConfig, RouteHandle, RouteManager, RoutePorts, RouteSnapshot};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, info, warn};

use crate::script::{Script, Step};

/// Simulated hardware at the start of a replay
#[derive(Debug, Clone, Default)]
pub struct ReplayOptions {
    pub no_earpiece: bool,
    pub wired_headset: bool,
    pub bluetooth_headset: bool,
}

/// What happened at one step
#[derive(Debug, Clone)]
pub struct StepOutcome {
    /// Zero-based index into the script, `None` for the implicit start
    pub index: Option<usize>,
    pub description: String,
    pub changes: Vec<DeviceChange>,
    pub rejected: Option<String>,
    pub snapshot: RouteSnapshot,
}

pub struct Replay {
    manager: RouteManager,
    handle: RouteHandle,
    changes: broadcast::Receiver<DeviceChange>,
    platform: MockAudioPlatform,
    bluetooth: MockBluetooth,
    proximity: MockProximity,
}

impl Replay {
    pub fn new(config: RouteConfig, options: &ReplayOptions) -> Result<Self> {
        let mut platform = if options.no_earpiece {
            MockAudioPlatform::without_earpiece()
        } else {
            MockAudioPlatform::new()
        };
        if options.wired_headset {
            platform = platform.with_wired_headset();
        }

        let mut bluetooth = MockBluetooth::new();
        if options.bluetooth_headset {
            bluetooth = bluetooth.with_headset();
        }
        let proximity = MockProximity::new();

        let ports = RoutePorts::new(platform.clone(), bluetooth.clone(), proximity.clone());
        let manager = RouteManager::spawn(ports, config).context("failed to start routing thread")?;
        let changes = manager.subscribe();
        let handle = manager.handle();

        Ok(Self {
            manager,
            handle,
            changes,
            platform,
            bluetooth,
            proximity,
        })
    }

    /// Start the session, run every step, then release
    pub async fn run(mut self, script: &Script) -> Result<Vec<StepOutcome>> {
        let mut outcomes = Vec::with_capacity(script.steps.len() + 1);

        self.handle.start().await?;
        outcomes.push(self.outcome(None, "start".to_string(), None).await?);

        for (index, step) in script.steps.iter().enumerate() {
            debug!("Step {}: {}", index, step);
            let rejected = self.apply(step).await?;
            outcomes.push(self.outcome(Some(index), step.to_string(), rejected).await?);
        }

        self.handle.release().await?;
        self.manager.shutdown();
        info!("Replay finished after {} steps", script.steps.len());
        Ok(outcomes)
    }

    /// Returns the rejection message for steps the controller refused
    async fn apply(&self, step: &Step) -> Result<Option<String>> {
        let result = match step {
            Step::WiredHeadset { present } => {
                self.platform.plug_headset(*present);
                Ok(())
            }
            Step::BluetoothHeadsetConnected { connected } => {
                if *connected {
                    self.bluetooth.connect_headset();
                } else {
                    self.bluetooth.disconnect_headset();
                }
                Ok(())
            }
            Step::BluetoothAudioConnected { connected } => {
                let reported = if *connected {
                    self.bluetooth.audio_connected()
                } else {
                    self.bluetooth.audio_link_timeout()
                };
                if !reported {
                    warn!("No Bluetooth audio link was pending");
                }
                Ok(())
            }
            Step::Proximity { near } => {
                self.proximity.set_near(*near);
                Ok(())
            }
            Step::Select { device } => self.handle.select_audio_device(*device).await,
            Step::SetDefault { device } => self.handle.set_default_audio_device(*device).await.map(|_| ()),
            Step::Toggle { device } => self.handle.toggle_audio_device(*device).await,
            Step::SetPreference { speakerphone } => self.handle.set_speakerphone_preference(*speakerphone),
            Step::Stop => self.handle.stop().await,
            Step::Start => self.handle.start().await,
        };

        match result {
            Ok(()) => Ok(None),
            Err(e) if e.is_invalid_call() => Ok(Some(e.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    async fn outcome(&mut self, index: Option<usize>, description: String, rejected: Option<String>) -> Result<StepOutcome> {
        // The snapshot reply is queued behind every event the step caused
        let snapshot = self.handle.snapshot().await?;

        let mut changes = Vec::new();
        loop {
            match self.changes.try_recv() {
                Ok(change) => changes.push(change),
                Err(TryRecvError::Lagged(skipped)) => warn!("Missed {} selection changes", skipped),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }

        Ok(StepOutcome {
            index,
            description,
            changes,
            rejected,
            snapshot,
        })
    }
}
