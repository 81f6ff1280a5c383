//! Error types for the beacon control system
use thiserror::Error;

/// Beacon control errors
#[derive(Error, Debug)]
pub enum ControlError {
    /// The host's USB/serial subsystem could not be queried
    #[error("Enumeration error: {0}")]
    EnumerationError(String),

    /// A matching bridge was found but could not be opened
    #[error("Unable to open device {serial}: {reason}")]
    DeviceOpenError { serial: String, reason: String },

    /// The bridge opened but one of the link setup steps failed
    #[error("Link init error ({step}): {reason}")]
    LinkInitError { step: &'static str, reason: String },

    /// Writing a frame to the bridge failed
    #[error("Device write error: {0}")]
    DeviceWriteError(String),

    /// Closing the bridge handle failed
    #[error("Device close error: {0}")]
    DeviceCloseError(String),

    /// No bridge was enumerated at startup
    #[error("No DMX controllers found")]
    NoDevice,

    /// Channel address or value outside of the DMX range
    #[error("Out of range: {0}")]
    OutOfRange(String),

    /// Invalid caller-supplied argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Invalid configuration
    #[error("Config error: {0}")]
    ConfigError(String),

    /// HTTP API error
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// I/O error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Serial port error
    #[error("Serial port error: {0}")]
    SerialError(#[from] serialport::Error),

    /// TOML deserialization error
    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),
}

impl ControlError {
    /// Errors the discovery loop logs and retries instead of aborting on
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ControlError::EnumerationError(_)
                | ControlError::DeviceOpenError { .. }
                | ControlError::LinkInitError { .. }
                | ControlError::DeviceWriteError(_)
                | ControlError::SerialError(_)
        )
    }
}

/// Result type for control operations
pub type Result<T> = std::result::Result<T, ControlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ControlError::EnumerationError("usb".into()).is_transient());
        assert!(ControlError::LinkInitError {
            step: "purge rx",
            reason: "io".into()
        }
        .is_transient());
        assert!(!ControlError::DeviceCloseError("busy".into()).is_transient());
        assert!(!ControlError::OutOfRange("513".into()).is_transient());
        assert!(!ControlError::NoDevice.is_transient());
    }

    #[test]
    fn test_error_display() {
        let err = ControlError::DeviceOpenError {
            serial: "EN0001".into(),
            reason: "busy".into(),
        };
        assert_eq!(err.to_string(), "Unable to open device EN0001: busy");
    }
}
