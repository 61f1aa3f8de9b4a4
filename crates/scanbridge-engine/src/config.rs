//! Session configuration.

use std::time::Duration;

use scanbridge_core::constants::{
    DEFAULT_EXECUTOR_QUEUE_DEPTH, DEFAULT_SCAN_TIMEOUT_MS, DEFAULT_SUBSCRIBER_CAPACITY,
    MAX_SCAN_TIMEOUT_MS, OPEN_MODE_DEFAULT, SCANNER_TYPE_ALL,
};
use scanbridge_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Configuration for a [`Session`](crate::Session).
///
/// Missing fields fall back to their defaults when deserialized, so a
/// configuration file only needs to name what it changes.
///
/// # Example
///
/// ```
/// use scanbridge_engine::SessionConfig;
/// use std::time::Duration;
///
/// let config = SessionConfig {
///     default_scan_timeout: Duration::from_secs(2),
///     ..SessionConfig::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Mode passed to the driver's `open` and `close` calls.
    pub open_mode: i32,

    /// Scanner types requested when opening the driver.
    pub scanner_types: Vec<i16>,

    /// Timeout applied by callers that do not pick their own.
    #[serde(rename = "default_scan_timeout_ms", with = "duration_ms")]
    pub default_scan_timeout: Duration,

    /// Remember the most recent barcode seen on each device.
    pub track_last_barcode: bool,

    /// Events buffered per subscriber before new events are dropped.
    pub subscriber_capacity: usize,

    /// Driver requests queued before callers wait for room.
    pub executor_queue_depth: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            open_mode: OPEN_MODE_DEFAULT,
            scanner_types: vec![SCANNER_TYPE_ALL],
            default_scan_timeout: Duration::from_millis(DEFAULT_SCAN_TIMEOUT_MS),
            track_last_barcode: true,
            subscriber_capacity: DEFAULT_SUBSCRIBER_CAPACITY,
            executor_queue_depth: DEFAULT_EXECUTOR_QUEUE_DEPTH,
        }
    }
}

impl SessionConfig {
    /// Check the configuration for values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.scanner_types.is_empty() {
            return Err(Error::Config("scanner_types must not be empty".to_string()));
        }
        validate_scan_timeout(self.default_scan_timeout)?;
        if self.subscriber_capacity == 0 {
            return Err(Error::Config(
                "subscriber_capacity must be greater than zero".to_string(),
            ));
        }
        if self.executor_queue_depth == 0 {
            return Err(Error::Config(
                "executor_queue_depth must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Reject scan timeouts outside `1..=MAX_SCAN_TIMEOUT_MS` milliseconds.
pub(crate) fn validate_scan_timeout(timeout: Duration) -> Result<()> {
    let millis = timeout.as_millis();
    if millis == 0 || millis > u128::from(MAX_SCAN_TIMEOUT_MS) {
        return Err(Error::Config(format!(
            "scan timeout must be between 1 and {MAX_SCAN_TIMEOUT_MS}ms, got {millis}ms"
        )));
    }
    Ok(())
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
