//! Error types for audio route selection

use thiserror::Error;

use crate::device::AudioDevice;

/// Result type for routing operations
pub type RouteResult<T> = Result<T, RouteError>;

/// Errors that can occur while selecting and applying audio routes
///
/// None of these are fatal to a running session. Invalid calls leave the
/// session state untouched, and platform failures are logged by the
/// controller before the operation carries on.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RouteError {
    /// Operation not valid in the current lifecycle state
    #[error("Invalid state: {message}")]
    InvalidState { message: String },

    /// Device is not in the available set
    #[error("Audio device not available: {device}")]
    DeviceUnavailable { device: AudioDevice },

    /// Device is not accepted for this operation
    #[error("Audio device {device} not supported for {operation}")]
    UnsupportedDevice {
        device: AudioDevice,
        operation: String,
    },

    /// Device name could not be parsed
    #[error("Unknown audio device: {name}")]
    UnknownDevice { name: String },

    /// Platform audio call failed
    #[error("Platform audio error in {operation}: {message}")]
    Platform { operation: String, message: String },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// The routing actor is gone
    #[error("Routing channel closed")]
    ChannelClosed,
}

impl RouteError {
    /// Create an invalid state error
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Create an unsupported device error
    pub fn unsupported(device: AudioDevice, operation: impl Into<String>) -> Self {
        Self::UnsupportedDevice {
            device,
            operation: operation.into(),
        }
    }

    /// Create a platform error
    pub fn platform(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Platform {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Whether this error rejected a caller request rather than reporting a platform fault
    pub fn is_invalid_call(&self) -> bool {
        matches!(
            self,
            Self::InvalidState { .. } | Self::DeviceUnavailable { .. } | Self::UnsupportedDevice { .. }
        )
    }
}
