//! Routing configuration
//!
//! The only routing preference is the speakerphone preference, which decides
//! the automatic default device and whether the proximity sensor may switch
//! between earpiece and loudspeaker:
//!
//! | preference | default device                       | proximity switch |
//! |------------|--------------------------------------|------------------|
//! | `auto`     | speaker phone                        | enabled          |
//! | `true`     | speaker phone                        | disabled         |
//! | `false`    | earpiece (speaker phone without one) | disabled         |
//!
//! ```rust
//! use callroute_core::config::{RouteConfig, SpeakerphonePreference};
//!
//! let config = RouteConfig::from_toml_str(r#"
//!     speakerphone = "false"
//!     thread_name = "call-audio"
//! "#).unwrap();
//!
//! assert_eq!(config.speakerphone, SpeakerphonePreference::Off);
//! assert_eq!(config.thread_name, "call-audio");
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::device::AudioDevice;
use crate::error::{RouteError, RouteResult};

/// Speakerphone preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SpeakerphonePreference {
    /// Loudspeaker by default, proximity sensor switches to the earpiece
    #[default]
    #[serde(rename = "auto")]
    Auto,
    /// Always prefer the loudspeaker
    #[serde(rename = "true", alias = "on")]
    On,
    /// Prefer the earpiece
    #[serde(rename = "false", alias = "off")]
    Off,
}

impl SpeakerphonePreference {
    /// Default device this preference asks for, before hardware checks
    pub fn default_device(&self) -> AudioDevice {
        match self {
            SpeakerphonePreference::Off => AudioDevice::Earpiece,
            SpeakerphonePreference::Auto | SpeakerphonePreference::On => AudioDevice::SpeakerPhone,
        }
    }

    /// Whether proximity readings may switch between earpiece and loudspeaker
    pub fn proximity_switching(&self) -> bool {
        matches!(self, SpeakerphonePreference::Auto)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SpeakerphonePreference::Auto => "auto",
            SpeakerphonePreference::On => "true",
            SpeakerphonePreference::Off => "false",
        }
    }
}

impl fmt::Display for SpeakerphonePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpeakerphonePreference {
    type Err = RouteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(SpeakerphonePreference::Auto),
            "true" | "on" => Ok(SpeakerphonePreference::On),
            "false" | "off" => Ok(SpeakerphonePreference::Off),
            other => Err(RouteError::config(format!(
                "Invalid speakerphone preference: {} (expected auto, true or false)",
                other
            ))),
        }
    }
}

/// Shared, mutable speakerphone preference
///
/// The controller reads it once when it is built (to derive the default
/// device) and again on every proximity decision, so a settings screen can
/// change it while a call is running.
#[derive(Debug, Clone, Default)]
pub struct PreferenceStore {
    speakerphone: Arc<RwLock<SpeakerphonePreference>>,
}

impl PreferenceStore {
    pub fn new(speakerphone: SpeakerphonePreference) -> Self {
        Self {
            speakerphone: Arc::new(RwLock::new(speakerphone)),
        }
    }

    pub fn speakerphone(&self) -> SpeakerphonePreference {
        *self.speakerphone.read()
    }

    pub fn set_speakerphone(&self, preference: SpeakerphonePreference) {
        *self.speakerphone.write() = preference;
    }
}

/// Routing configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteConfig {
    /// Speakerphone preference
    pub speakerphone: SpeakerphonePreference,
    /// Capacity of broadcast observer channels
    pub event_channel_capacity: usize,
    /// Name of the routing actor thread
    pub thread_name: String,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            speakerphone: SpeakerphonePreference::Auto,
            event_channel_capacity: 64,
            thread_name: "audio-route".to_string(),
        }
    }
}

impl RouteConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the speakerphone preference
    pub fn with_speakerphone(mut self, preference: SpeakerphonePreference) -> Self {
        self.speakerphone = preference;
        self
    }

    /// Set the broadcast observer capacity
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity;
        self
    }

    /// Set the routing thread name
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Check the configuration for values the router cannot run with
    pub fn validate(&self) -> RouteResult<()> {
        if self.event_channel_capacity == 0 {
            return Err(RouteError::config("event_channel_capacity must be greater than zero"));
        }
        if self.thread_name.trim().is_empty() {
            return Err(RouteError::config("thread_name must not be empty"));
        }
        Ok(())
    }

    /// Parse a TOML document
    pub fn from_toml_str(input: &str) -> RouteResult<Self> {
        let config: RouteConfig = toml::from_str(input)
            .map_err(|e| RouteError::config(format!("Failed to parse routing config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> RouteResult<Self> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path).map_err(|e| {
            RouteError::config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&input)
    }

    /// Build a preference store seeded from this configuration
    pub fn preference_store(&self) -> PreferenceStore {
        PreferenceStore::new(self.speakerphone)
    }
}
