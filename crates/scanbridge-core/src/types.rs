use crate::{
    Result,
    constants::{EVENT_BARCODE, EVENT_IMAGE, EVENT_PNP, EVENT_RMD, EVENT_VIDEO, STATUS_SUCCESS},
    error::Error,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One entry of a discovery snapshot: a device serial and the id the driver assigned it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub serial: String,
    pub device_id: u32,
}

impl DeviceRecord {
    pub fn new(serial: impl Into<String>, device_id: u32) -> Self {
        Self {
            serial: serial.into(),
            device_id,
        }
    }
}

impl fmt::Display for DeviceRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} (id {})", self.serial, self.device_id)
    }
}

/// Status and output payload of a single driver command.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandResult {
    pub status: i32,
    pub payload: String,
}

impl CommandResult {
    pub fn new(status: i32, payload: impl Into<String>) -> Self {
        Self {
            status,
            payload: payload.into(),
        }
    }

    /// A successful result with an empty payload.
    pub fn ok() -> Self {
        Self::new(STATUS_SUCCESS, "")
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == STATUS_SUCCESS
    }

    /// Convert a non-zero status into [`Error::CommandFailed`].
    ///
    /// # Errors
    /// Returns `Error::CommandFailed` carrying `opcode` and the status when the
    /// status is non-zero.
    pub fn check(self, opcode: u32) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(Error::CommandFailed {
                opcode,
                status: self.status,
            })
        }
    }
}

/// A decoded barcode event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanEvent {
    /// Serial number of the device that produced the read.
    pub device_serial: String,

    /// Label text decoded from the hex byte pairs; empty for a no-read.
    pub barcode_text: String,

    /// Symbology code as reported by the driver, uninterpreted.
    pub raw_label_type: String,

    /// Driver-assigned id of the device, when the event carries one.
    pub scanner_id: Option<u32>,

    /// When the event was decoded.
    pub received_at: DateTime<Utc>,
}

impl ScanEvent {
    pub fn new(device_serial: impl Into<String>, barcode_text: impl Into<String>) -> Self {
        Self {
            device_serial: device_serial.into(),
            barcode_text: barcode_text.into(),
            raw_label_type: String::new(),
            scanner_id: None,
            received_at: Utc::now(),
        }
    }

    pub fn with_label_type(mut self, label_type: impl Into<String>) -> Self {
        self.raw_label_type = label_type.into();
        self
    }

    pub fn with_scanner_id(mut self, scanner_id: u32) -> Self {
        self.scanner_id = Some(scanner_id);
        self
    }

    /// Whether the event carried no label.
    #[must_use]
    pub fn is_no_read(&self) -> bool {
        self.barcode_text.is_empty()
    }
}

/// Terminal state of a scan request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanOutcome {
    /// A matching barcode event arrived before the deadline.
    Resolved(String),

    /// The deadline passed without a read; the trigger was released.
    TimedOut,

    /// The session was torn down while the scan was pending.
    Abandoned,
}

impl ScanOutcome {
    /// Barcode text of the outcome; empty for every non-resolved outcome.
    #[must_use]
    pub fn into_barcode(self) -> String {
        match self {
            ScanOutcome::Resolved(barcode) => barcode,
            ScanOutcome::TimedOut | ScanOutcome::Abandoned => String::new(),
        }
    }
}

impl fmt::Display for ScanOutcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ScanOutcome::Resolved(barcode) => write!(f, "Resolved({barcode})"),
            ScanOutcome::TimedOut => write!(f, "TimedOut"),
            ScanOutcome::Abandoned => write!(f, "Abandoned"),
        }
    }
}

/// Class of a driver-initiated event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    Barcode,
    Image,
    Video,
    Rmd,
    Pnp,
    Other(u16),
}

impl EventType {
    pub fn from_code(code: u16) -> Self {
        match code {
            EVENT_BARCODE => EventType::Barcode,
            EVENT_IMAGE => EventType::Image,
            EVENT_VIDEO => EventType::Video,
            EVENT_RMD => EventType::Rmd,
            EVENT_PNP => EventType::Pnp,
            other => EventType::Other(other),
        }
    }

    pub fn code(&self) -> u16 {
        match self {
            EventType::Barcode => EVENT_BARCODE,
            EventType::Image => EVENT_IMAGE,
            EventType::Video => EVENT_VIDEO,
            EventType::Rmd => EVENT_RMD,
            EventType::Pnp => EVENT_PNP,
            EventType::Other(code) => *code,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EventType::Barcode => write!(f, "Barcode"),
            EventType::Image => write!(f, "Image"),
            EventType::Video => write!(f, "Video"),
            EventType::Rmd => write!(f, "RMD"),
            EventType::Pnp => write!(f, "PnP"),
            EventType::Other(code) => write!(f, "Other({code})"),
        }
    }
}

/// Beeper pattern understood by the device (0-26).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BeepPattern(u8);

impl BeepPattern {
    pub const MAX: u8 = 26;

    /// One high short beep.
    pub const ONE_HIGH_SHORT: BeepPattern = BeepPattern(0);

    /// Two high short beeps.
    pub const TWO_HIGH_SHORT: BeepPattern = BeepPattern(1);

    /// Four high short beeps.
    pub const FOUR_HIGH_SHORT: BeepPattern = BeepPattern(3);

    /// Create a new beep pattern with validation.
    ///
    /// # Errors
    /// Returns `Error::Config` if the pattern is above [`BeepPattern::MAX`].
    pub fn new(pattern: u8) -> Result<Self> {
        if pattern > Self::MAX {
            return Err(Error::Config(format!(
                "Beep pattern must be 0-{}, got {pattern}",
                Self::MAX
            )));
        }
        Ok(BeepPattern(pattern))
    }

    #[must_use]
    pub fn as_u8(&self) -> u8 {
        self.0
    }
}

impl std::str::FromStr for BeepPattern {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let pattern: u8 = s
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("Invalid beep pattern: {s}")))?;
        BeepPattern::new(pattern)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_command_result_check_success() {
        let result = CommandResult::new(0, "<outArgs/>").check(2011).unwrap();
        assert_eq!(result.payload, "<outArgs/>");
    }

    #[test]
    fn test_command_result_check_failure() {
        let err = CommandResult::new(-3, "").check(2012).unwrap_err();
        assert_eq!(
            err,
            Error::CommandFailed {
                opcode: 2012,
                status: -3
            }
        );
    }

    #[test]
    fn test_scan_event_builder() {
        let event = ScanEvent::new("SN1", "123")
            .with_label_type("8")
            .with_scanner_id(1);

        assert_eq!(event.device_serial, "SN1");
        assert_eq!(event.barcode_text, "123");
        assert_eq!(event.raw_label_type, "8");
        assert_eq!(event.scanner_id, Some(1));
        assert!(!event.is_no_read());
        assert!(ScanEvent::new("SN1", "").is_no_read());
    }

    #[rstest]
    #[case(ScanOutcome::Resolved("ABC".into()), "ABC")]
    #[case(ScanOutcome::TimedOut, "")]
    #[case(ScanOutcome::Abandoned, "")]
    fn test_outcome_into_barcode(#[case] outcome: ScanOutcome, #[case] expected: &str) {
        assert_eq!(outcome.into_barcode(), expected);
    }

    #[rstest]
    #[case(1, EventType::Barcode)]
    #[case(2, EventType::Image)]
    #[case(4, EventType::Video)]
    #[case(8, EventType::Rmd)]
    #[case(16, EventType::Pnp)]
    #[case(99, EventType::Other(99))]
    fn test_event_type_codes(#[case] code: u16, #[case] expected: EventType) {
        let event_type = EventType::from_code(code);
        assert_eq!(event_type, expected);
        assert_eq!(event_type.code(), code);
    }

    #[rstest]
    #[case("0", 0)]
    #[case("3", 3)]
    #[case(" 26 ", 26)]
    fn test_beep_pattern_valid(#[case] input: &str, #[case] expected: u8) {
        let pattern: BeepPattern = input.parse().unwrap();
        assert_eq!(pattern.as_u8(), expected);
    }

    #[rstest]
    #[case("27")]
    #[case("-1")]
    #[case("loud")]
    fn test_beep_pattern_invalid(#[case] input: &str) {
        let result: Result<BeepPattern> = input.parse();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = ScanOutcome::Resolved("123".into());
        let json = serde_json::to_string(&outcome).unwrap();
        let back: ScanOutcome = serde_json::from_str(&json).unwrap();
        assert_eq!(back, outcome);
    }
}
