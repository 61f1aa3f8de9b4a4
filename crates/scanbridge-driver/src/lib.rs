//! Scanner driver boundary for the scanbridge engine.
//!
//! This crate defines the contract between the engine and the vendor scanner
//! driver, together with a mock implementation used for development and
//! testing without physical hardware.
//!
//! # Driver Model
//!
//! The vendor driver exposes four blocking calls and one callback:
//!
//! - `open` / `close` connect to and disconnect from the driver service.
//! - `get_devices` reports connected devices as an XML document.
//! - `exec_command` runs one opcode against an XML argument document and
//!   answers with a status code and an XML reply.
//! - The event handler receives `(event_type, payload)` from a driver-owned
//!   thread for every device event.
//!
//! ```no_run
//! use scanbridge_core::BeepPattern;
//! use scanbridge_driver::{ScannerDriver, mock::MockDriver};
//! use scanbridge_protocol::{Opcode, codec};
//!
//! let (mut driver, handle) = MockDriver::new();
//! handle.attach_device("SN1", 1);
//!
//! driver.open(0, &[1])?;
//! let reply = driver.exec_command(Opcode::Beep.code(), &codec::encode_beep(1, BeepPattern::TWO_HIGH_SHORT))?;
//! assert!(reply.is_success());
//! # Ok::<(), scanbridge_driver::DriverError>(())
//! ```
//!
//! # Error Handling
//!
//! A call that reaches the driver reports its outcome as a status code. Only
//! transport failures are returned as [`DriverError`]; the engine converts
//! them into [`scanbridge_core::Error::Driver`].

pub mod error;
pub mod mock;
pub mod traits;
pub mod types;

pub use error::{DriverError, Result};
pub use traits::{EventHandler, ScannerDriver};
pub use types::Discovery;
