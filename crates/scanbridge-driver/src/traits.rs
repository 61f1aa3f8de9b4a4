//! Driver boundary trait.
//!
//! The vendor driver is a black box offering a blocking request/response
//! command channel and a callback-based event stream. [`ScannerDriver`] is the
//! contract the engine consumes; implementations wrap the vendor library or,
//! in tests, simulate it (see [`crate::mock::MockDriver`]).
//!
//! # Threading Contract
//!
//! Every method blocks the calling thread until the driver replies. The
//! driver is not safe for overlapping requests: callers must make sure that
//! at most one method call is outstanding at any time. The engine's command
//! executor guarantees this by owning the driver on a single worker thread.
//!
//! The event handler, once installed, is invoked on a thread owned by the
//! driver, for every event of every connected device.

use std::sync::Arc;

use scanbridge_core::CommandResult;

use crate::error::Result;
use crate::types::Discovery;

/// Callback invoked by the driver with `(event_type, payload)`.
pub type EventHandler = Arc<dyn Fn(u16, &str) + Send + Sync>;

/// Blocking interface to the scanner driver.
///
/// All methods return `Err` only when the call into the driver fails at the
/// transport level. A call that reaches the driver and is refused reports a
/// non-zero status instead.
///
/// # Examples
///
/// ```
/// use scanbridge_driver::ScannerDriver;
/// use scanbridge_driver::mock::MockDriver;
///
/// let (mut driver, handle) = MockDriver::new();
/// handle.attach_device("SN1", 1);
///
/// assert_eq!(driver.open(0, &[1]).unwrap(), 0);
/// let discovery = driver.get_devices().unwrap();
/// assert_eq!(discovery.count, 1);
/// ```
pub trait ScannerDriver: Send + 'static {
    /// Connect to the driver service.
    fn open(&mut self, mode: i32, scanner_types: &[i16]) -> Result<i32>;

    /// Disconnect from the driver service.
    fn close(&mut self, mode: i32) -> Result<i32>;

    /// Enumerate connected devices.
    fn get_devices(&mut self) -> Result<Discovery>;

    /// Execute one command.
    fn exec_command(&mut self, opcode: u32, in_payload: &str) -> Result<CommandResult>;

    /// Install or remove the event callback.
    fn set_event_handler(&mut self, handler: Option<EventHandler>);

    /// Human readable driver name, used in logs.
    fn name(&self) -> &str {
        "scanner-driver"
    }
}

impl<D: ScannerDriver + ?Sized> ScannerDriver for Box<D> {
    fn open(&mut self, mode: i32, scanner_types: &[i16]) -> Result<i32> {
        (**self).open(mode, scanner_types)
    }

    fn close(&mut self, mode: i32) -> Result<i32> {
        (**self).close(mode)
    }

    fn get_devices(&mut self) -> Result<Discovery> {
        (**self).get_devices()
    }

    fn exec_command(&mut self, opcode: u32, in_payload: &str) -> Result<CommandResult> {
        (**self).exec_command(opcode, in_payload)
    }

    fn set_event_handler(&mut self, handler: Option<EventHandler>) {
        (**self).set_event_handler(handler)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
