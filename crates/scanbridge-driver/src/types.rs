//! Types returned across the driver boundary.

use scanbridge_core::constants::STATUS_SUCCESS;
use serde::{Deserialize, Serialize};

/// Result of a discovery call.
///
/// The driver reports the number of devices, their ids, and an XML document
/// describing each of them. Only the document carries serial numbers.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Discovery {
    /// Number of devices reported.
    pub count: usize,

    /// Driver-assigned device ids.
    pub device_ids: Vec<u32>,

    /// Device list document.
    pub payload: String,

    /// Call status; `0` on success.
    pub status: i32,
}

impl Discovery {
    pub fn is_success(&self) -> bool {
        self.status == STATUS_SUCCESS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discovery_status() {
        let ok = Discovery::default();
        assert!(ok.is_success());

        let failed = Discovery {
            status: 1,
            ..Discovery::default()
        };
        assert!(!failed.is_success());
    }
}
