//! Replay scripts
//!
//! A script is a list of steps, each tagged with `step`:
//!
//! ```toml
//! [[steps]]
//! step = "wired_headset"
//! present = true
//!
//! [[steps]]
//! step = "select"
//! device = "speaker_phone"
//! ```
//!
//! JSON scripts use the same shape: `{"steps": [{"step": "proximity", "near": true}]}`.

use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use callroute_core::{AudioDevice, SpeakerphonePreference};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    /// Plug or unplug the wired headset
    WiredHeadset { present: bool },
    /// Connect or disconnect the Bluetooth headset
    BluetoothHeadsetConnected { connected: bool },
    /// Confirm (true) or time out (false) a pending Bluetooth audio link
    BluetoothAudioConnected { connected: bool },
    /// Proximity sensor reading
    Proximity { near: bool },
    Select { device: AudioDevice },
    SetDefault { device: AudioDevice },
    Toggle { device: AudioDevice },
    SetPreference { speakerphone: SpeakerphonePreference },
    Stop,
    Start,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::WiredHeadset { present } => write!(f, "wired headset {}", if *present { "plugged" } else { "unplugged" }),
            Step::BluetoothHeadsetConnected { connected } => {
                write!(f, "bluetooth headset {}", if *connected { "connected" } else { "disconnected" })
            }
            Step::BluetoothAudioConnected { connected } => {
                write!(f, "bluetooth audio {}", if *connected { "connected" } else { "timed out" })
            }
            Step::Proximity { near } => write!(f, "proximity {}", if *near { "near" } else { "far" }),
            Step::Select { device } => write!(f, "select {}", device),
            Step::SetDefault { device } => write!(f, "set default {}", device),
            Step::Toggle { device } => write!(f, "toggle {}", device),
            Step::SetPreference { speakerphone } => write!(f, "speakerphone preference {}", speakerphone),
            Step::Stop => write!(f, "stop"),
            Step::Start => write!(f, "start"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Script {
    pub fn from_json(input: &str) -> Result<Self> {
        serde_json::from_str(input).context("invalid JSON replay script")
    }

    pub fn from_toml(input: &str) -> Result<Self> {
        toml::from_str(input).context("invalid TOML replay script")
    }

    /// Load a script, picking the format from the file extension (JSON unless `.toml`)
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;

        let is_toml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("toml"))
            .unwrap_or(false);

        let script = if is_toml {
            Self::from_toml(&content)
        } else {
            Self::from_json(&content)
        };
        script.with_context(|| format!("failed to parse {}", path.display()))
    }
}
