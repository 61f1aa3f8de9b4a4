use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // Transport errors
    #[error("Driver error: {0}")]
    Driver(String),

    #[error("Command {opcode} failed with status {status}")]
    CommandFailed { opcode: u32, status: i32 },

    // Caller errors
    #[error("Unknown device: {serial}")]
    UnknownDevice { serial: String },

    #[error("Scan already in flight for device {serial}")]
    ScanAlreadyInFlight { serial: String },

    #[error("Trigger failed for device {serial}: {reason}")]
    TriggerFailed { serial: String, reason: String },

    #[error("Session not initialized")]
    NotInitialized,

    // Payload errors
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Invalid opcode: {0}")]
    InvalidOpcode(u32),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a new decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    /// Create a new unknown device error.
    pub fn unknown_device(serial: impl Into<String>) -> Self {
        Self::UnknownDevice {
            serial: serial.into(),
        }
    }

    /// Whether the failure came from the driver link rather than from the caller.
    pub fn is_driver_side(&self) -> bool {
        matches!(
            self,
            Self::Driver(_) | Self::CommandFailed { .. } | Self::Decode(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_failed_display() {
        let error = Error::CommandFailed {
            opcode: 2011,
            status: 1,
        };
        assert_eq!(error.to_string(), "Command 2011 failed with status 1");
    }

    #[test]
    fn test_unknown_device_display() {
        let error = Error::unknown_device("SN3");
        assert_eq!(error.to_string(), "Unknown device: SN3");
    }

    #[test]
    fn test_driver_side_classification() {
        assert!(Error::Driver("link down".into()).is_driver_side());
        assert!(Error::decode("bad xml").is_driver_side());
        assert!(!Error::NotInitialized.is_driver_side());
        assert!(
            !Error::ScanAlreadyInFlight {
                serial: "SN1".into()
            }
            .is_driver_side()
        );
    }
}
