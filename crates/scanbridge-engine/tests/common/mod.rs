//! Common test utilities for engine integration tests.
//!
//! Every test drives a real [`Session`] over the simulated driver. The
//! helpers here build the standard two-device bench used throughout:
//!
//! | Serial | Device id |
//! |--------|-----------|
//! | `SN1`  | 1         |
//! | `SN2`  | 2         |

#![allow(dead_code)]

use std::time::Duration;

use scanbridge_driver::mock::{CommandRecord, MockDriver, MockDriverHandle};
use scanbridge_engine::{Session, SessionConfig};
use scanbridge_protocol::Opcode;

pub const SERIAL_1: &str = "SN1";
pub const SERIAL_2: &str = "SN2";
pub const UNKNOWN_SERIAL: &str = "SN3";

/// Delay before a scripted read reaches the session.
pub const READ_DELAY: Duration = Duration::from_millis(50);

/// Build a session over a mock driver with `SN1 -> 1` and `SN2 -> 2` attached.
pub fn bench_session(config: SessionConfig) -> (Session, MockDriverHandle) {
    let (driver, handle) = MockDriver::with_name("test bench".to_string());
    handle.attach_device(SERIAL_1, 1);
    handle.attach_device(SERIAL_2, 2);

    let session = Session::new(driver, config).expect("valid session config");
    (session, handle)
}

/// [`bench_session`] with the default configuration, already initialized.
pub async fn initialized_session() -> (Session, MockDriverHandle) {
    let (session, handle) = bench_session(SessionConfig::default());
    session.initialize().await.expect("session initializes");
    handle.clear_commands();
    (session, handle)
}

/// Commands recorded by the driver with `opcode`.
pub fn commands_with(handle: &MockDriverHandle, opcode: Opcode) -> Vec<CommandRecord> {
    handle
        .commands()
        .into_iter()
        .filter(|c| c.opcode == opcode.code())
        .collect()
}

/// Assert the driver saw exactly `expected` commands with `opcode`.
pub fn assert_command_count(handle: &MockDriverHandle, opcode: Opcode, expected: usize) {
    let actual = handle.command_count(opcode);
    assert_eq!(
        actual, expected,
        "expected {expected} {opcode} command(s), driver saw {actual}: {:?}",
        handle.commands()
    );
}
