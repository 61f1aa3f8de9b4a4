//! Opcode definitions for the scanner driver command channel.
//!
//! Every request sent to the driver is a numeric operation code paired with an
//! XML payload. The pairing between an opcode, the shape of the payload it
//! expects, and the shape of the payload it returns is kept as data in
//! [`PROTOCOL_TABLE`] rather than spread across call sites.
//!
//! # Protocol Table
//!
//! | Opcode | Code | Payload | Response |
//! |--------|------|---------|----------|
//! | `RegisterForEvents` | 1001 | event subscription | empty |
//! | `UnregisterForEvents` | 1002 | event subscription | empty |
//! | `PullTrigger` | 2011 | scanner id | empty |
//! | `ReleaseTrigger` | 2012 | scanner id | empty |
//! | `Beep` | 2018 | scanner id + argument | empty |
//! | `AttributeGetAll` | 5001 | scanner id | attribute list |
//!
//! # Examples
//!
//! ```
//! use scanbridge_protocol::{Opcode, PayloadShape};
//!
//! let op = Opcode::from_code(2011).unwrap();
//! assert_eq!(op, Opcode::PullTrigger);
//! assert_eq!(op.code(), 2011);
//! assert_eq!(op.payload_shape(), PayloadShape::ScannerId);
//!
//! assert!(Opcode::from_code(42).is_err());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use scanbridge_core::{Error, Result};

/// Operations issued over the driver command channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    // Event management
    RegisterForEvents,   // 1001
    UnregisterForEvents, // 1002

    // Device actions
    PullTrigger,    // 2011
    ReleaseTrigger, // 2012
    Beep,           // 2018

    // Device queries
    AttributeGetAll, // 5001
}

/// Shape of the `inArgs` document an opcode expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayloadShape {
    /// `cmdArgs` carrying the number of event ids followed by the ids.
    EventSubscription,

    /// A bare `scannerID`.
    ScannerId,

    /// `scannerID` plus a single integer argument.
    ScannerIdWithArgument,
}

/// Shape of the `outArgs` document an opcode returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseShape {
    /// Nothing beyond the status code.
    Empty,

    /// An attribute list describing the device.
    AttributeList,
}

/// One row of the protocol table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeSpec {
    pub opcode: Opcode,
    pub code: u32,
    pub payload: PayloadShape,
    pub response: ResponseShape,
}

/// The protocol table: every opcode with its wire code and payload shapes.
pub const PROTOCOL_TABLE: &[OpcodeSpec] = &[
    OpcodeSpec {
        opcode: Opcode::RegisterForEvents,
        code: 1001,
        payload: PayloadShape::EventSubscription,
        response: ResponseShape::Empty,
    },
    OpcodeSpec {
        opcode: Opcode::UnregisterForEvents,
        code: 1002,
        payload: PayloadShape::EventSubscription,
        response: ResponseShape::Empty,
    },
    OpcodeSpec {
        opcode: Opcode::PullTrigger,
        code: 2011,
        payload: PayloadShape::ScannerId,
        response: ResponseShape::Empty,
    },
    OpcodeSpec {
        opcode: Opcode::ReleaseTrigger,
        code: 2012,
        payload: PayloadShape::ScannerId,
        response: ResponseShape::Empty,
    },
    OpcodeSpec {
        opcode: Opcode::Beep,
        code: 2018,
        payload: PayloadShape::ScannerIdWithArgument,
        response: ResponseShape::Empty,
    },
    OpcodeSpec {
        opcode: Opcode::AttributeGetAll,
        code: 5001,
        payload: PayloadShape::ScannerId,
        response: ResponseShape::AttributeList,
    },
];

impl Opcode {
    /// Look up an opcode by its wire code.
    ///
    /// # Errors
    /// Returns `Error::InvalidOpcode` if the code is not in the protocol table.
    pub fn from_code(code: u32) -> Result<Self> {
        PROTOCOL_TABLE
            .iter()
            .find(|row| row.code == code)
            .map(|row| row.opcode)
            .ok_or(Error::InvalidOpcode(code))
    }

    /// The protocol table row for this opcode.
    pub fn spec(&self) -> &'static OpcodeSpec {
        // Rows are ordered by variant declaration.
        &PROTOCOL_TABLE[*self as usize]
    }

    #[inline]
    pub fn code(&self) -> u32 {
        self.spec().code
    }

    #[inline]
    pub fn payload_shape(&self) -> PayloadShape {
        self.spec().payload
    }

    #[inline]
    pub fn response_shape(&self) -> ResponseShape {
        self.spec().response
    }

    /// Returns `true` if the opcode addresses a single device.
    #[inline]
    pub fn targets_device(&self) -> bool {
        matches!(
            self.payload_shape(),
            PayloadShape::ScannerId | PayloadShape::ScannerIdWithArgument
        )
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Opcode::RegisterForEvents => "RegisterForEvents",
            Opcode::UnregisterForEvents => "UnregisterForEvents",
            Opcode::PullTrigger => "PullTrigger",
            Opcode::ReleaseTrigger => "ReleaseTrigger",
            Opcode::Beep => "Beep",
            Opcode::AttributeGetAll => "AttributeGetAll",
        };
        write!(f, "{}({})", name, self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const ALL: [Opcode; 6] = [
        Opcode::RegisterForEvents,
        Opcode::UnregisterForEvents,
        Opcode::PullTrigger,
        Opcode::ReleaseTrigger,
        Opcode::Beep,
        Opcode::AttributeGetAll,
    ];

    #[test]
    fn test_table_covers_every_opcode() {
        assert_eq!(PROTOCOL_TABLE.len(), ALL.len());
        for (row, op) in PROTOCOL_TABLE.iter().zip(ALL) {
            assert_eq!(row.opcode, op);
        }
        for op in ALL {
            let rows = PROTOCOL_TABLE.iter().filter(|r| r.opcode == op).count();
            assert_eq!(rows, 1, "{op:?} must appear exactly once");
        }
    }

    #[test]
    fn test_codes_are_unique() {
        for (i, a) in PROTOCOL_TABLE.iter().enumerate() {
            for b in &PROTOCOL_TABLE[i + 1..] {
                assert_ne!(a.code, b.code);
            }
        }
    }

    #[rstest]
    #[case(1001, Opcode::RegisterForEvents)]
    #[case(1002, Opcode::UnregisterForEvents)]
    #[case(2011, Opcode::PullTrigger)]
    #[case(2012, Opcode::ReleaseTrigger)]
    #[case(2018, Opcode::Beep)]
    #[case(5001, Opcode::AttributeGetAll)]
    fn test_from_code(#[case] code: u32, #[case] expected: Opcode) {
        let op = Opcode::from_code(code).unwrap();
        assert_eq!(op, expected);
        assert_eq!(op.code(), code);
    }

    #[rstest]
    #[case(0)]
    #[case(1000)]
    #[case(9999)]
    fn test_from_code_unknown(#[case] code: u32) {
        assert_eq!(Opcode::from_code(code), Err(Error::InvalidOpcode(code)));
    }

    #[test]
    fn test_device_targeting() {
        assert!(Opcode::PullTrigger.targets_device());
        assert!(Opcode::Beep.targets_device());
        assert!(Opcode::AttributeGetAll.targets_device());
        assert!(!Opcode::RegisterForEvents.targets_device());
    }

    #[test]
    fn test_display() {
        assert_eq!(Opcode::PullTrigger.to_string(), "PullTrigger(2011)");
    }
}
