//! Core constants for the scanner driver protocol.
//!
//! This module collects the protocol-level values shared by the codec, the
//! driver boundary and the engine: status codes, event type codes, the XML
//! element names used by the driver's structured payloads, and the default
//! timing parameters used by a session.
//!
//! # Payload Shape
//!
//! Every request sent to the driver is an `inArgs` document:
//!
//! ```text
//! <inArgs>
//!   <scannerID>1</scannerID>
//!   <cmdArgs><arg-int>3</arg-int></cmdArgs>
//! </inArgs>
//! ```
//!
//! Discovery responses and barcode events are `outArgs` / `scanners` documents
//! whose relevant fields are located by element name, wherever they appear.
//!
//! # Usage
//!
//! ```
//! use scanbridge_core::constants::*;
//! use std::time::Duration;
//!
//! assert_eq!(STATUS_SUCCESS, 0);
//! let timeout = Duration::from_millis(DEFAULT_SCAN_TIMEOUT_MS);
//! assert_eq!(timeout.as_secs(), 5);
//! ```

// ============================================================================
// Status Codes
// ============================================================================

/// Status returned by the driver for a successful call.
///
/// Any other value is a driver-reported failure, opaque beyond zero/non-zero.
pub const STATUS_SUCCESS: i32 = 0;

/// Generic failure status used by the simulated driver.
pub const STATUS_FAIL: i32 = 1;

// ============================================================================
// Driver Open Parameters
// ============================================================================

/// Application mode passed to `open`.
pub const OPEN_MODE_DEFAULT: i32 = 0;

/// Scanner type selector meaning "all scanner types".
pub const SCANNER_TYPE_ALL: i16 = 1;

/// Scanner type selector for SNAPI devices.
pub const SCANNER_TYPE_SNAPI: i16 = 2;

/// Scanner type selector for HID keyboard emulation devices.
///
/// These devices cannot be triggered remotely.
pub const SCANNER_TYPE_HID_KEYBOARD: i16 = 8;

/// Maximum number of devices a single discovery call reports.
pub const MAX_DEVICES: usize = 255;

// ============================================================================
// Event Types
// ============================================================================

/// Event type code for a decoded barcode.
pub const EVENT_BARCODE: u16 = 1;

/// Event type code for a captured image.
pub const EVENT_IMAGE: u16 = 2;

/// Event type code for a video frame.
pub const EVENT_VIDEO: u16 = 4;

/// Event type code for remote management notifications.
pub const EVENT_RMD: u16 = 8;

/// Event type code for plug-and-play (attach/detach) notifications.
pub const EVENT_PNP: u16 = 16;

// ============================================================================
// Payload Element Names
// ============================================================================

/// Request document root.
pub const TAG_IN_ARGS: &str = "inArgs";

/// Device id element, present in requests, discovery entries and events.
pub const TAG_SCANNER_ID: &str = "scannerID";

/// Command argument list element.
pub const TAG_CMD_ARGS: &str = "cmdArgs";

/// Integer argument element.
pub const TAG_ARG_INT: &str = "arg-int";

/// Discovery entry element.
pub const TAG_SCANNER: &str = "scanner";

/// Serial number element (discovery entries and scan events).
pub const TAG_SERIAL_NUMBER: &str = "serialnumber";

/// Hex-encoded label element of a scan event.
pub const TAG_DATA_LABEL: &str = "datalabel";

/// Symbology code element of a scan event.
pub const TAG_DATA_TYPE: &str = "datatype";

// ============================================================================
// Timing
// ============================================================================

/// Default deadline for a scan when the caller does not supply one (milliseconds).
pub const DEFAULT_SCAN_TIMEOUT_MS: u64 = 5000;

/// Largest scan deadline a caller may request (milliseconds).
pub const MAX_SCAN_TIMEOUT_MS: u64 = 60_000;

// ============================================================================
// Capacities
// ============================================================================

/// Default per-subscriber buffer of barcode notifications.
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 64;

/// Default depth of the executor request queue.
pub const DEFAULT_EXECUTOR_QUEUE_DEPTH: usize = 32;
