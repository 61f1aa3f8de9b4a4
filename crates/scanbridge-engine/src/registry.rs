//! Device registry.
//!
//! Maps device serial numbers to the ids the driver assigned during the most
//! recent discovery. The mapping is replaced wholesale on every discovery
//! cycle.

use std::collections::HashMap;

use scanbridge_core::{DeviceRecord, Error, Result};
use scanbridge_protocol::codec;
use tracing::{debug, warn};

/// Serial number to device id mapping.
///
/// # Example
///
/// ```
/// use scanbridge_engine::DeviceRegistry;
///
/// let mut registry = DeviceRegistry::new();
/// registry
///     .rebuild("<scanners><scanner><scannerID>1</scannerID><serialnumber>SN1</serialnumber></scanner></scanners>")
///     .unwrap();
///
/// assert_eq!(registry.lookup("SN1").unwrap(), 1);
/// assert!(registry.lookup("SN3").is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    /// Records in discovery order.
    records: Vec<DeviceRecord>,

    /// Position of each serial in `records`.
    index: HashMap<String, usize>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the mapping with the devices listed in a discovery payload.
    ///
    /// The payload is decoded before anything is touched, so a malformed
    /// payload leaves the previous mapping in place. A serial listed twice
    /// keeps the id of its last entry.
    ///
    /// Returns the number of distinct devices registered.
    ///
    /// # Errors
    /// Returns `Error::Decode` if the payload is not a well-formed document.
    pub fn rebuild(&mut self, discovery_payload: &str) -> Result<usize> {
        let decoded = codec::decode_discovery_list(discovery_payload).inspect_err(|e| {
            warn!("Discovery payload rejected, keeping previous devices: {}", e);
        })?;

        self.records.clear();
        self.index.clear();

        for record in decoded {
            match self.index.get(&record.serial) {
                Some(&position) => {
                    debug!(
                        serial = %record.serial,
                        previous = self.records[position].device_id,
                        device_id = record.device_id,
                        "Duplicate serial in discovery, last entry wins"
                    );
                    self.records[position].device_id = record.device_id;
                }
                None => {
                    self.index.insert(record.serial.clone(), self.records.len());
                    self.records.push(record);
                }
            }
        }

        debug!(devices = self.records.len(), "Device registry rebuilt");
        Ok(self.records.len())
    }

    /// Device id currently assigned to `serial`.
    ///
    /// # Errors
    /// Returns `Error::UnknownDevice` if the serial was not discovered.
    pub fn lookup(&self, serial: &str) -> Result<u32> {
        self.index
            .get(serial)
            .map(|&position| self.records[position].device_id)
            .ok_or_else(|| Error::unknown_device(serial))
    }

    /// Serial numbers of all registered devices, in discovery order.
    pub fn list_serials(&self) -> Vec<String> {
        self.records.iter().map(|r| r.serial.clone()).collect()
    }

    pub fn records(&self) -> &[DeviceRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Forget every device.
    pub fn clear(&mut self) {
        self.records.clear();
        self.index.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    fn discovery(entries: &[(&str, u32)]) -> String {
        let scanners: String = entries
            .iter()
            .map(|(serial, id)| {
                format!(
                    "<scanner type=\"SNAPI\"><scannerID>{id}</scannerID><serialnumber>{serial}</serialnumber></scanner>"
                )
            })
            .collect();
        format!("<?xml version=\"1.0\"?><scanners>{scanners}</scanners>")
    }

    #[test]
    fn test_rebuild_and_lookup() {
        let mut registry = DeviceRegistry::new();
        let count = registry.rebuild(&discovery(&[("SN1", 1), ("SN2", 2)])).unwrap();

        assert_eq!(count, 2);
        assert_eq!(registry.lookup("SN1").unwrap(), 1);
        assert_eq!(registry.lookup("SN2").unwrap(), 2);
        assert_eq!(registry.list_serials(), vec!["SN1", "SN2"]);
    }

    #[test]
    fn test_lookup_unknown_serial() {
        let registry = DeviceRegistry::new();
        assert_eq!(registry.lookup("SN3"), Err(Error::unknown_device("SN3")));
    }

    #[test]
    fn test_rebuild_replaces_previous_mapping() {
        let mut registry = DeviceRegistry::new();
        registry.rebuild(&discovery(&[("SN1", 1), ("SN2", 2)])).unwrap();
        registry.rebuild(&discovery(&[("SN2", 7)])).unwrap();

        assert!(registry.lookup("SN1").is_err());
        assert_eq!(registry.lookup("SN2").unwrap(), 7);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_malformed_payload_keeps_previous_mapping() {
        let mut registry = DeviceRegistry::new();
        registry.rebuild(&discovery(&[("SN1", 1)])).unwrap();

        let result = registry.rebuild("<scanners><scanner>");
        assert!(matches!(result, Err(Error::Decode(_))));
        assert_eq!(registry.lookup("SN1").unwrap(), 1);
    }

    #[test]
    fn test_duplicate_serial_last_write_wins() {
        let mut registry = DeviceRegistry::new();
        let count = registry
            .rebuild(&discovery(&[("SN1", 1), ("SN2", 2), ("SN1", 5)]))
            .unwrap();

        assert_eq!(count, 2);
        assert_eq!(registry.lookup("SN1").unwrap(), 5);
        assert_eq!(registry.list_serials(), vec!["SN1", "SN2"]);
    }

    #[test]
    fn test_clear_forgets_all_devices() {
        let mut registry = DeviceRegistry::new();
        registry.rebuild(&discovery(&[("SN1", 1), ("SN2", 2)])).unwrap();

        registry.clear();
        assert!(registry.is_empty());
        assert!(registry.lookup("SN1").is_err());
        assert!(registry.list_serials().is_empty());
    }

    #[rstest]
    #[case::empty_list("<scanners/>")]
    #[case::no_scanner_elements("<scanners><other/></scanners>")]
    #[case::incomplete_entries(
        "<scanners><scanner><scannerID>x</scannerID><serialnumber>SN1</serialnumber></scanner><scanner><scannerID>2</scannerID></scanner></scanners>"
    )]
    fn test_rebuild_with_no_usable_entries(#[case] payload: &str) {
        let mut registry = DeviceRegistry::new();
        registry.rebuild(&discovery(&[("SN1", 1)])).unwrap();

        assert_eq!(registry.rebuild(payload).unwrap(), 0);
        assert!(registry.is_empty());
    }

    proptest! {
        #[test]
        fn prop_lookup_returns_last_registered_id(
            entries in prop::collection::vec(("SN[0-9]{1,2}", 1u32..1000), 0..40)
        ) {
            let borrowed: Vec<(&str, u32)> =
                entries.iter().map(|(s, id)| (s.as_str(), *id)).collect();

            let mut registry = DeviceRegistry::new();
            registry.rebuild(&discovery(&borrowed)).unwrap();

            let mut expected: HashMap<&str, u32> = HashMap::new();
            for (serial, id) in &borrowed {
                expected.insert(serial, *id);
            }

            prop_assert_eq!(registry.len(), expected.len());
            for (serial, id) in expected {
                prop_assert_eq!(registry.lookup(serial).unwrap(), id);
            }
        }
    }
}
