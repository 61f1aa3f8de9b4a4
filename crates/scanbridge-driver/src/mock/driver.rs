//! Mock scanner driver implementation for testing and development.
//!
//! This module provides a simulated driver that behaves like the vendor
//! service: it answers commands with status codes, reports a configurable
//! device list, and invokes the installed event handler from its own threads.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use scanbridge_core::CommandResult;
use scanbridge_core::constants::{EVENT_BARCODE, STATUS_FAIL, STATUS_SUCCESS};
use scanbridge_protocol::{Opcode, codec};

use crate::{
    Result,
    error::DriverError,
    traits::{EventHandler, ScannerDriver},
    types::Discovery,
};

/// Model number reported for devices attached without one.
const DEFAULT_MODEL: &str = "DS2208-SR00007ZZWW";

/// Mock scanner driver for testing and development.
///
/// The driver keeps its state behind a shared lock so that a
/// [`MockDriverHandle`] can reconfigure it and push events while the driver
/// itself is owned by the engine.
///
/// # Examples
///
/// ```
/// use scanbridge_driver::ScannerDriver;
/// use scanbridge_driver::mock::MockDriver;
/// use scanbridge_protocol::{Opcode, codec};
///
/// let (mut driver, handle) = MockDriver::new();
/// handle.attach_device("SN1", 1);
///
/// driver.open(0, &[1]).unwrap();
/// let result = driver
///     .exec_command(Opcode::PullTrigger.code(), &codec::encode_trigger(1))
///     .unwrap();
///
/// assert!(result.is_success());
/// assert_eq!(handle.command_count(Opcode::PullTrigger), 1);
/// ```
#[derive(Debug)]
pub struct MockDriver {
    /// Shared state
    state: Arc<Mutex<MockState>>,

    /// Driver name
    name: String,
}

impl MockDriver {
    /// Create a new mock driver with the default name.
    ///
    /// Returns a tuple of (MockDriver, MockDriverHandle) where the handle
    /// can be used to configure devices and simulate events.
    pub fn new() -> (Self, MockDriverHandle) {
        Self::with_name("Mock Scanner Driver".to_string())
    }

    /// Create a new mock driver with a custom name.
    pub fn with_name(name: String) -> (Self, MockDriverHandle) {
        let state = Arc::new(Mutex::new(MockState::default()));

        let driver = Self {
            state: Arc::clone(&state),
            name,
        };

        (driver, MockDriverHandle { state })
    }
}

impl ScannerDriver for MockDriver {
    fn open(&mut self, _mode: i32, _scanner_types: &[i16]) -> Result<i32> {
        let mut state = self.state.lock();
        state.check_transport()?;
        state.open_calls += 1;

        let status = state.open_status;
        if status == STATUS_SUCCESS {
            state.open = true;
        }
        Ok(status)
    }

    fn close(&mut self, _mode: i32) -> Result<i32> {
        let mut state = self.state.lock();
        state.check_transport()?;
        state.close_calls += 1;

        if !state.open {
            return Ok(STATUS_FAIL);
        }
        state.open = false;
        state.subscribed = false;
        state.triggered.clear();
        Ok(STATUS_SUCCESS)
    }

    fn get_devices(&mut self) -> Result<Discovery> {
        let state = self.state.lock();
        state.check_transport()?;
        if !state.open {
            return Err(DriverError::NotOpen);
        }

        if state.discovery_status != STATUS_SUCCESS {
            return Ok(Discovery {
                status: state.discovery_status,
                ..Discovery::default()
            });
        }

        let payload = state
            .discovery_override
            .clone()
            .unwrap_or_else(|| discovery_payload(&state.devices));

        Ok(Discovery {
            count: state.devices.len(),
            device_ids: state.devices.iter().map(|d| d.device_id).collect(),
            payload,
            status: STATUS_SUCCESS,
        })
    }

    fn exec_command(&mut self, opcode: u32, in_payload: &str) -> Result<CommandResult> {
        let latency = {
            let mut state = self.state.lock();
            state.check_transport()?;
            if !state.open {
                return Err(DriverError::NotOpen);
            }

            state.in_flight += 1;
            state.max_in_flight = state.max_in_flight.max(state.in_flight);
            state.commands.push(CommandRecord {
                opcode,
                payload: in_payload.to_string(),
            });
            state.latency
        };

        if !latency.is_zero() {
            thread::sleep(latency);
        }

        let (result, scripted) = {
            let mut state = self.state.lock();
            state.in_flight -= 1;
            state.respond(opcode, in_payload)
        };

        if let Some(read) = scripted {
            spawn_delayed_event(Arc::clone(&self.state), read);
        }

        Ok(result)
    }

    fn set_event_handler(&mut self, handler: Option<EventHandler>) {
        self.state.lock().handler = handler;
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A device known to the mock driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockDevice {
    pub serial: String,
    pub device_id: u32,
    pub model: String,
}

/// A command received by the mock driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRecord {
    pub opcode: u32,
    pub payload: String,
}

/// A read delivered automatically after the trigger of a device is pulled.
#[derive(Debug, Clone)]
struct ScriptedRead {
    serial: String,
    device_id: u32,
    label_hex: String,
    delay: Duration,
}

#[derive(Default)]
struct MockState {
    open: bool,
    subscribed: bool,
    handler: Option<EventHandler>,
    devices: Vec<MockDevice>,
    discovery_override: Option<String>,
    status_overrides: HashMap<u32, i32>,
    open_status: i32,
    discovery_status: i32,
    transport_failure: Option<String>,
    latency: Duration,
    commands: Vec<CommandRecord>,
    in_flight: usize,
    max_in_flight: usize,
    triggered: HashSet<u32>,
    scripted: HashMap<String, VecDeque<(String, Duration)>>,
    open_calls: usize,
    close_calls: usize,
}

impl std::fmt::Debug for MockState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockState")
            .field("open", &self.open)
            .field("subscribed", &self.subscribed)
            .field("has_handler", &self.handler.is_some())
            .field("devices", &self.devices)
            .field("commands", &self.commands.len())
            .finish()
    }
}

impl MockState {
    fn check_transport(&self) -> Result<()> {
        match &self.transport_failure {
            Some(message) => Err(DriverError::communication(message.clone())),
            None => Ok(()),
        }
    }

    fn device_by_id(&self, device_id: u32) -> Option<&MockDevice> {
        self.devices.iter().find(|d| d.device_id == device_id)
    }

    fn respond(&mut self, opcode: u32, payload: &str) -> (CommandResult, Option<ScriptedRead>) {
        if let Some(&status) = self.status_overrides.get(&opcode) {
            return (CommandResult::new(status, ""), None);
        }

        let fail = CommandResult::new(STATUS_FAIL, "");
        let target = codec::decode_request_scanner_id(payload).ok().flatten();
        let device = target.and_then(|id| self.device_by_id(id).cloned());

        match (Opcode::from_code(opcode), device) {
            (Ok(Opcode::RegisterForEvents), _) => {
                self.subscribed = true;
                (CommandResult::ok(), None)
            }
            (Ok(Opcode::UnregisterForEvents), _) => {
                self.subscribed = false;
                (CommandResult::ok(), None)
            }
            (Ok(Opcode::PullTrigger), Some(device)) => {
                self.triggered.insert(device.device_id);
                let scripted = self
                    .scripted
                    .get_mut(&device.serial)
                    .and_then(VecDeque::pop_front)
                    .map(|(label_hex, delay)| ScriptedRead {
                        serial: device.serial.clone(),
                        device_id: device.device_id,
                        label_hex,
                        delay,
                    });
                (CommandResult::ok(), scripted)
            }
            (Ok(Opcode::ReleaseTrigger), Some(device)) => {
                self.triggered.remove(&device.device_id);
                (CommandResult::ok(), None)
            }
            (Ok(Opcode::Beep), Some(_)) => (CommandResult::ok(), None),
            (Ok(Opcode::AttributeGetAll), Some(device)) => {
                (CommandResult::new(STATUS_SUCCESS, attribute_payload(&device)), None)
            }
            _ => (fail, None),
        }
    }
}

/// Handle for controlling a mock scanner driver.
///
/// Cloning the handle shares the same driver state.
///
/// # Examples
///
/// ```
/// use scanbridge_driver::mock::MockDriver;
/// use std::time::Duration;
///
/// let (_driver, handle) = MockDriver::new();
///
/// handle.attach_device("SN1", 1);
/// handle.attach_device("SN2", 2);
/// handle.script_read("SN1", "123", Duration::from_millis(50));
///
/// assert_eq!(handle.devices().len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct MockDriverHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockDriverHandle {
    /// Attach a device, replacing any device with the same serial.
    pub fn attach_device(&self, serial: impl Into<String>, device_id: u32) {
        self.attach_device_with_model(serial, device_id, DEFAULT_MODEL);
    }

    /// Attach a device with an explicit model number.
    pub fn attach_device_with_model(
        &self,
        serial: impl Into<String>,
        device_id: u32,
        model: impl Into<String>,
    ) {
        let device = MockDevice {
            serial: serial.into(),
            device_id,
            model: model.into(),
        };

        let mut state = self.state.lock();
        state.devices.retain(|d| d.serial != device.serial);
        state.devices.push(device);
    }

    /// Detach a device. Returns `true` if it was attached.
    pub fn detach_device(&self, serial: &str) -> bool {
        let mut state = self.state.lock();
        let before = state.devices.len();
        state.devices.retain(|d| d.serial != serial);
        before != state.devices.len()
    }

    /// Devices currently attached.
    pub fn devices(&self) -> Vec<MockDevice> {
        self.state.lock().devices.clone()
    }

    /// Return `payload` from discovery instead of the generated device list.
    pub fn set_discovery_payload(&self, payload: Option<String>) {
        self.state.lock().discovery_override = payload;
    }

    /// Answer every command with `opcode` using `status`.
    pub fn set_status(&self, opcode: Opcode, status: i32) {
        self.state.lock().status_overrides.insert(opcode.code(), status);
    }

    /// Restore the default behavior for `opcode`.
    pub fn clear_status(&self, opcode: Opcode) {
        self.state.lock().status_overrides.remove(&opcode.code());
    }

    /// Status returned by `open`.
    pub fn set_open_status(&self, status: i32) {
        self.state.lock().open_status = status;
    }

    /// Status returned by discovery.
    pub fn set_discovery_status(&self, status: i32) {
        self.state.lock().discovery_status = status;
    }

    /// Make every driver call fail at the transport level.
    pub fn fail_transport(&self, message: impl Into<String>) {
        self.state.lock().transport_failure = Some(message.into());
    }

    /// Undo [`fail_transport`](Self::fail_transport).
    pub fn restore_transport(&self) {
        self.state.lock().transport_failure = None;
    }

    /// Time every command takes to complete.
    pub fn set_latency(&self, latency: Duration) {
        self.state.lock().latency = latency;
    }

    /// Queue a read of `text` for the next trigger pull on `serial`.
    ///
    /// The event is delivered `delay` after the trigger command completes.
    pub fn script_read(&self, serial: impl Into<String>, text: &str, delay: Duration) {
        self.state
            .lock()
            .scripted
            .entry(serial.into())
            .or_default()
            .push_back((text_to_hex(text), delay));
    }

    /// Deliver a barcode event for `serial` carrying `text`.
    ///
    /// Returns `false` if no handler is installed or events are not registered.
    pub fn emit_barcode(&self, serial: &str, text: &str) -> bool {
        self.emit_barcode_hex(serial, &text_to_hex(text))
    }

    /// Deliver a barcode event whose label is the raw hex sequence `label_hex`.
    pub fn emit_barcode_hex(&self, serial: &str, label_hex: &str) -> bool {
        let device_id = {
            let state = self.state.lock();
            state
                .devices
                .iter()
                .find(|d| d.serial == serial)
                .map(|d| d.device_id)
                .unwrap_or(0)
        };
        deliver(
            &self.state,
            EVENT_BARCODE,
            &scan_payload(serial, device_id, label_hex),
        )
    }

    /// Deliver an arbitrary event.
    pub fn emit_event(&self, event_type: u16, payload: &str) -> bool {
        deliver(&self.state, event_type, payload)
    }

    /// Commands received so far, oldest first.
    pub fn commands(&self) -> Vec<CommandRecord> {
        self.state.lock().commands.clone()
    }

    /// Number of commands received with `opcode`.
    pub fn command_count(&self, opcode: Opcode) -> usize {
        let code = opcode.code();
        self.state
            .lock()
            .commands
            .iter()
            .filter(|c| c.opcode == code)
            .count()
    }

    /// Forget the command log.
    pub fn clear_commands(&self) {
        self.state.lock().commands.clear();
    }

    /// Largest number of commands observed executing at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.state.lock().max_in_flight
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().open
    }

    pub fn is_subscribed(&self) -> bool {
        self.state.lock().subscribed
    }

    pub fn has_handler(&self) -> bool {
        self.state.lock().handler.is_some()
    }

    /// Whether the trigger of `device_id` is currently pulled.
    pub fn is_triggered(&self, device_id: u32) -> bool {
        self.state.lock().triggered.contains(&device_id)
    }

    pub fn open_calls(&self) -> usize {
        self.state.lock().open_calls
    }

    pub fn close_calls(&self) -> usize {
        self.state.lock().close_calls
    }
}

/// Invoke the installed handler outside the state lock.
fn deliver(state: &Mutex<MockState>, event_type: u16, payload: &str) -> bool {
    let handler = {
        let state = state.lock();
        if !state.subscribed {
            return false;
        }
        state.handler.clone()
    };

    match handler {
        Some(handler) => {
            handler(event_type, payload);
            true
        }
        None => false,
    }
}

fn spawn_delayed_event(state: Arc<Mutex<MockState>>, read: ScriptedRead) {
    thread::spawn(move || {
        thread::sleep(read.delay);
        let payload = scan_payload(&read.serial, read.device_id, &read.label_hex);
        deliver(&state, EVENT_BARCODE, &payload);
    });
}

fn text_to_hex(text: &str) -> String {
    text.bytes()
        .map(|b| format!("0x{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn scan_payload(serial: &str, device_id: u32, label_hex: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <outArgs><scannerID>{device_id}</scannerID><arg-xml><scandata>\
         <modelnumber>{DEFAULT_MODEL}</modelnumber>\
         <serialnumber>{serial}</serialnumber>\
         <datatype>8</datatype>\
         <datalabel>{label_hex}</datalabel>\
         </scandata></arg-xml></outArgs>"
    )
}

fn discovery_payload(devices: &[MockDevice]) -> String {
    let entries: String = devices
        .iter()
        .map(|d| {
            format!(
                "<scanner type=\"SNAPI\"><scannerID>{}</scannerID>\
                 <serialnumber>{}</serialnumber><modelnumber>{}</modelnumber></scanner>",
                d.device_id, d.serial, d.model
            )
        })
        .collect();
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?><scanners>{entries}</scanners>")
}

fn attribute_payload(device: &MockDevice) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <outArgs><scannerID>{}</scannerID><arg-xml>\
         <modelnumber>{}</modelnumber><serialnumber>{}</serialnumber>\
         <response><opcode>{}</opcode><attrib_list>\
         <attribute>0</attribute><attribute>1</attribute><attribute>533</attribute>\
         </attrib_list></response></arg-xml></outArgs>",
        device.device_id,
        device.model,
        device.serial,
        Opcode::AttributeGetAll.code()
    )
}
