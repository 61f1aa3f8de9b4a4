//! Coordination engine for barcode scanners behind a vendor driver.
//!
//! The engine turns the driver's blocking command channel and asynchronous
//! event callback into a small request/response API: "scan this device now
//! and give me the barcode, or an empty string on timeout".
//!
//! # Architecture
//!
//! ```text
//!  caller ──► Session ──► CommandExecutor ──(worker thread)──► driver
//!                │                                               │
//!                └──► ScanCoordinator ◄── EventDispatcher ◄──────┘
//!                                              │
//!                                              └──► subscribers
//! ```
//!
//! - [`DeviceRegistry`] maps serial numbers to driver-assigned ids.
//! - [`CommandExecutor`] owns the driver and serializes every call into it.
//! - [`ScanCoordinator`] tracks one pending scan per device and arbitrates
//!   between the barcode event and the timeout.
//! - [`EventDispatcher`] is the driver callback; it resolves pending scans and
//!   fans barcode events out to subscribers.
//! - [`Session`] composes all of the above.
//!
//! # Example
//!
//! ```no_run
//! use scanbridge_driver::mock::MockDriver;
//! use scanbridge_engine::{Session, SessionConfig};
//! use std::time::Duration;
//!
//! # async fn example() -> scanbridge_core::Result<()> {
//! let (driver, handle) = MockDriver::new();
//! handle.attach_device("SN1", 1);
//! handle.script_read("SN1", "123", Duration::from_millis(50));
//!
//! let session = Session::new(driver, SessionConfig::default())?;
//! session.initialize().await?;
//!
//! let barcode = session.scan("SN1", Duration::from_millis(500)).await?;
//! assert_eq!(barcode, "123");
//!
//! session.dispose().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod coordinator;
pub mod dispatcher;
pub mod executor;
pub mod registry;
pub mod session;

pub use config::SessionConfig;
pub use coordinator::{ScanCoordinator, ScanHandle};
pub use dispatcher::{DispatchStats, EventDispatcher, Subscription, SubscriptionId};
pub use executor::CommandExecutor;
pub use registry::DeviceRegistry;
pub use session::Session;
