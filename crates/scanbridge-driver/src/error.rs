//! Error types for driver transport operations.
//!
//! These errors describe failures of the call into the driver itself, as
//! opposed to a driver that answered with a non-zero status. A `DriverError`
//! is fatal to the in-flight operation and is never retried automatically.

/// Result type alias for driver calls.
pub type Result<T> = std::result::Result<T, DriverError>;

/// Errors that can occur while calling into the scanner driver.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DriverError {
    /// The driver has not been opened, or was closed.
    #[error("Driver not open")]
    NotOpen,

    /// The device or the driver service went away.
    #[error("Device disconnected: {device}")]
    Disconnected { device: String },

    /// The driver did not answer in time.
    #[error("Driver call timeout after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// The call could not be delivered or its reply could not be read.
    #[error("Communication error: {message}")]
    CommunicationError { message: String },

    /// Generic error with custom message.
    #[error("{0}")]
    Other(String),
}

impl DriverError {
    /// Create a new disconnected error.
    pub fn disconnected(device: impl Into<String>) -> Self {
        Self::Disconnected {
            device: device.into(),
        }
    }

    /// Create a new timeout error.
    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    /// Create a new communication error.
    pub fn communication(message: impl Into<String>) -> Self {
        Self::CommunicationError {
            message: message.into(),
        }
    }

    /// Create a generic error with custom message.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

impl From<DriverError> for scanbridge_core::Error {
    fn from(error: DriverError) -> Self {
        scanbridge_core::Error::Driver(error.to_string())
    }
}
