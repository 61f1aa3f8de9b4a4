//! Payload codec for the scanner driver's XML documents.
//!
//! The driver speaks a structured text format on both of its channels:
//! requests are small `inArgs` documents, while discovery responses and
//! barcode events are larger `outArgs`/`scanners` documents. This module turns
//! typed arguments into request bodies and pulls the few fields the engine
//! needs back out of responses. It holds no state and performs no I/O.
//!
//! # Decoding Policy
//!
//! Fields are located by element name anywhere in the document, because the
//! driver nests them differently depending on the event class and firmware.
//!
//! - A document that is not well-formed fails with [`Error::Decode`].
//! - A discovery entry missing its id or serial is skipped, not an error.
//! - A scan event without a label decodes to an empty barcode (a no-read).
//!
//! # Examples
//!
//! ```
//! use scanbridge_protocol::codec;
//!
//! let payload = "<scanners>\
//!     <scanner><scannerID>1</scannerID><serialnumber>SN1</serialnumber></scanner>\
//!     </scanners>";
//! let devices = codec::decode_discovery_list(payload).unwrap();
//! assert_eq!(devices[0].serial, "SN1");
//!
//! assert_eq!(codec::hex_pairs_to_text("0x41 0x42").unwrap(), "AB");
//! ```

use roxmltree::{Document, Node};
use scanbridge_core::constants::{
    EVENT_BARCODE, TAG_DATA_LABEL, TAG_DATA_TYPE, TAG_SCANNER, TAG_SCANNER_ID, TAG_SERIAL_NUMBER,
};
use scanbridge_core::{BeepPattern, DeviceRecord, Error, Result, ScanEvent};

use crate::builder::InArgsBuilder;

/// Element holding a single attribute id in an attribute list response.
const TAG_ATTRIBUTE: &str = "attribute";

// ============================================================================
// Encoding
// ============================================================================

/// Request body for pulling the trigger of a device.
pub fn encode_trigger(device_id: u32) -> String {
    InArgsBuilder::new().scanner_id(device_id).build()
}

/// Request body for releasing the trigger of a device.
pub fn encode_release(device_id: u32) -> String {
    InArgsBuilder::new().scanner_id(device_id).build()
}

/// Request body for sounding the beeper of a device.
pub fn encode_beep(device_id: u32, pattern: BeepPattern) -> String {
    InArgsBuilder::new()
        .scanner_id(device_id)
        .arg_int(pattern.as_u8())
        .build()
}

/// Request body for querying every attribute of a device.
pub fn encode_attribute_query(device_id: u32) -> String {
    InArgsBuilder::new().scanner_id(device_id).build()
}

/// Request body subscribing to barcode events.
pub fn encode_subscribe() -> String {
    encode_event_subscription(&[EVENT_BARCODE])
}

/// Request body unsubscribing from barcode events.
pub fn encode_unsubscribe() -> String {
    encode_event_subscription(&[EVENT_BARCODE])
}

/// Request body naming a set of event ids: the count, then the ids.
pub fn encode_event_subscription(event_ids: &[u16]) -> String {
    InArgsBuilder::new()
        .arg_int(event_ids.len() as i64)
        .arg_int_list(event_ids)
        .build()
}

// ============================================================================
// Decoding
// ============================================================================

fn parse(payload: &str) -> Result<Document<'_>> {
    Document::parse(payload).map_err(|e| Error::decode(format!("Malformed payload: {e}")))
}

fn child_text<'a>(node: Node<'a, '_>, tag: &str) -> Option<&'a str> {
    node.children()
        .find(|n| n.has_tag_name(tag))
        .and_then(|n| n.text())
        .map(str::trim)
}

fn descendant_text<'a>(doc: &'a Document<'_>, tag: &str) -> Option<&'a str> {
    doc.descendants()
        .find(|n| n.has_tag_name(tag))
        .and_then(|n| n.text())
        .map(str::trim)
}

/// Decode the device list returned by discovery.
///
/// Entries with a missing or non-numeric `scannerID`, or a missing or blank
/// `serialnumber`, are skipped. Serial numbers are trimmed.
///
/// # Errors
/// Returns `Error::Decode` if the payload is not a well-formed document.
pub fn decode_discovery_list(payload: &str) -> Result<Vec<DeviceRecord>> {
    let doc = parse(payload)?;

    let records = doc
        .descendants()
        .filter(|n| n.has_tag_name(TAG_SCANNER))
        .filter_map(|scanner| {
            let id = child_text(scanner, TAG_SCANNER_ID)?.parse::<u32>().ok()?;
            let serial = child_text(scanner, TAG_SERIAL_NUMBER).filter(|s| !s.is_empty())?;
            Some(DeviceRecord::new(serial, id))
        })
        .collect();

    Ok(records)
}

/// Decode a barcode event payload.
///
/// # Errors
/// Returns `Error::Decode` if the payload is not a well-formed document or if
/// the label is present but is not a valid hex pair sequence.
pub fn decode_scan_event(payload: &str) -> Result<ScanEvent> {
    let doc = parse(payload)?;

    let serial = descendant_text(&doc, TAG_SERIAL_NUMBER).unwrap_or_default();
    let barcode = match descendant_text(&doc, TAG_DATA_LABEL) {
        Some(label) if !label.is_empty() => hex_pairs_to_text(label)?,
        _ => String::new(),
    };
    let label_type = descendant_text(&doc, TAG_DATA_TYPE).unwrap_or_default();

    let mut event = ScanEvent::new(serial, barcode).with_label_type(label_type);
    if let Some(id) = descendant_text(&doc, TAG_SCANNER_ID).and_then(|s| s.parse().ok()) {
        event = event.with_scanner_id(id);
    }

    Ok(event)
}

/// Decode the attribute ids of an attribute list response.
///
/// Non-numeric entries are skipped.
///
/// # Errors
/// Returns `Error::Decode` if the payload is not a well-formed document.
pub fn decode_attribute_list(payload: &str) -> Result<Vec<u32>> {
    let doc = parse(payload)?;

    Ok(doc
        .descendants()
        .filter(|n| n.has_tag_name(TAG_ATTRIBUTE))
        .filter_map(|n| n.text()?.trim().parse().ok())
        .collect())
}

/// Extract the `scannerID` a request document is addressed to, if any.
///
/// # Errors
/// Returns `Error::Decode` if the payload is not a well-formed document.
pub fn decode_request_scanner_id(payload: &str) -> Result<Option<u32>> {
    let doc = parse(payload)?;
    Ok(child_text(doc.root_element(), TAG_SCANNER_ID).and_then(|s| s.parse().ok()))
}

/// Convert a whitespace-separated hex byte sequence into text.
///
/// Each token may carry a `0x` prefix, and a bare `0x` token is ignored. Every
/// byte becomes one character.
///
/// # Errors
/// Returns `Error::Decode` if a group is not exactly two hex digits.
///
/// # Examples
/// ```
/// use scanbridge_protocol::codec::hex_pairs_to_text;
///
/// assert_eq!(hex_pairs_to_text("0x31 0x32 0x33").unwrap(), "123");
/// assert!(hex_pairs_to_text("0xZZ").is_err());
/// ```
pub fn hex_pairs_to_text(hex: &str) -> Result<String> {
    let mut text = String::new();

    for token in hex.split_whitespace() {
        let group = token
            .strip_prefix("0x")
            .or_else(|| token.strip_prefix("0X"))
            .unwrap_or(token);
        if group.is_empty() {
            continue;
        }
        if group.len() != 2 {
            return Err(Error::decode(format!(
                "Invalid hex group '{token}': expected one byte"
            )));
        }

        let bytes = hex::decode(group)
            .map_err(|e| Error::decode(format!("Invalid hex group '{token}': {e}")))?;
        text.extend(bytes.into_iter().map(char::from));
    }

    Ok(text)
}
