//! Mock driver implementation for testing and development.
//!
//! This module provides a simulated scanner driver that can be controlled
//! programmatically without requiring the vendor service or physical devices.

pub mod driver;

pub use driver::{CommandRecord, MockDevice, MockDriver, MockDriverHandle};
