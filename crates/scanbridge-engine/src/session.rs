//! Scanner session.
//!
//! A [`Session`] owns one driver connection and everything built on top of
//! it. Its lifecycle is:
//!
//! 1. [`Session::new`] validates the configuration and starts the executor.
//! 2. [`Session::initialize`] opens the driver, discovers devices and
//!    registers for events.
//! 3. The public operations (`scan`, `beep`, `is_healthy`, ...) may be called
//!    concurrently from any number of tasks.
//! 4. [`Session::dispose`] releases pending scans, unregisters and closes.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use scanbridge_core::constants::STATUS_SUCCESS;
use scanbridge_core::{BeepPattern, Error, Result};
use scanbridge_driver::ScannerDriver;
use scanbridge_protocol::{Opcode, codec};
use tracing::{debug, info, warn};

use crate::config::{SessionConfig, validate_scan_timeout};
use crate::coordinator::ScanCoordinator;
use crate::dispatcher::{DispatchStats, EventDispatcher, Subscription, SubscriptionId};
use crate::executor::CommandExecutor;
use crate::registry::DeviceRegistry;

/// Connection to the scanner driver and the devices behind it.
///
/// # Example
///
/// ```no_run
/// use scanbridge_core::BeepPattern;
/// use scanbridge_driver::mock::MockDriver;
/// use scanbridge_engine::{Session, SessionConfig};
/// use std::time::Duration;
///
/// # async fn example() -> scanbridge_core::Result<()> {
/// let (driver, handle) = MockDriver::new();
/// handle.attach_device("SN1", 1);
///
/// let session = Session::new(driver, SessionConfig::default())?;
/// session.initialize().await?;
///
/// println!("devices: {:?}", session.list_devices()?);
/// session.beep("SN1", BeepPattern::TWO_HIGH_SHORT).await?;
/// let barcode = session.scan("SN1", Duration::from_secs(5)).await?;
///
/// session.dispose().await;
/// # Ok(())
/// # }
/// ```
pub struct Session {
    config: SessionConfig,
    executor: Arc<CommandExecutor>,
    registry: Arc<RwLock<DeviceRegistry>>,
    coordinator: Arc<ScanCoordinator>,
    dispatcher: Arc<EventDispatcher>,
    initialized: AtomicBool,
    disposed: AtomicBool,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("driver", &self.executor.driver_name())
            .field("initialized", &self.is_initialized())
            .field("devices", &self.registry.read().len())
            .finish()
    }
}

impl Session {
    /// Create a session over `driver`.
    ///
    /// The driver is moved onto the executor's worker thread right away, but
    /// nothing is sent to it until [`initialize`](Self::initialize).
    ///
    /// # Errors
    /// Returns `Error::Config` for an invalid configuration and
    /// `Error::Driver` if the executor cannot start.
    pub fn new<D: ScannerDriver>(driver: D, config: SessionConfig) -> Result<Self> {
        config.validate()?;

        let executor = Arc::new(CommandExecutor::spawn(driver, config.executor_queue_depth)?);
        let registry = Arc::new(RwLock::new(DeviceRegistry::new()));
        let coordinator = Arc::new(ScanCoordinator::new(
            Arc::clone(&registry),
            Arc::clone(&executor),
            config.track_last_barcode,
        ));
        let dispatcher = Arc::new(EventDispatcher::new(
            Arc::clone(&coordinator),
            config.subscriber_capacity,
        ));

        Ok(Self {
            config,
            executor,
            registry,
            coordinator,
            dispatcher,
            initialized: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        })
    }

    /// Open the driver, discover devices and register for barcode events.
    ///
    /// Stops at the first failing step and leaves the session uninitialized.
    /// Once the driver has opened, a later failure removes the event handler,
    /// closes the driver again and forgets discovered devices before the error
    /// is returned. Calling it again re-runs the whole sequence.
    pub async fn initialize(&self) -> Result<()> {
        self.initialized.store(false, Ordering::SeqCst);
        info!(driver = %self.executor.driver_name(), "Initializing scanner session");

        let status = self
            .executor
            .open(self.config.open_mode, &self.config.scanner_types)
            .await?;
        if status != STATUS_SUCCESS {
            warn!(status, "Driver refused to open");
            return Err(Error::Driver(format!("open failed with status {status}")));
        }

        let devices = match self.attach().await {
            Ok(devices) => devices,
            Err(e) => {
                self.rollback_open().await;
                return Err(e);
            }
        };

        self.disposed.store(false, Ordering::SeqCst);
        self.initialized.store(true, Ordering::SeqCst);
        info!(devices, "Scanner session initialized");
        Ok(())
    }

    /// Tear the session down.
    ///
    /// Pending scans are abandoned and their triggers released, then events
    /// are unregistered and the driver closed. Failures are logged and
    /// otherwise ignored. The executor is stopped, so the session cannot be
    /// initialized again. A second call does nothing.
    pub async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.initialized.store(false, Ordering::SeqCst);
        info!("Disposing scanner session");

        for device in self.coordinator.abandon_all() {
            if let Err(e) = self
                .executor
                .execute_checked(
                    Opcode::ReleaseTrigger,
                    codec::encode_release(device.device_id),
                )
                .await
            {
                warn!(serial = %device.serial, "Release during teardown failed: {}", e);
            }
        }

        if let Err(e) = self
            .executor
            .execute_checked(Opcode::UnregisterForEvents, codec::encode_unsubscribe())
            .await
        {
            warn!("Event unregistration failed: {}", e);
        }

        if let Err(e) = self.executor.set_event_handler(None).await {
            warn!("Removing event handler failed: {}", e);
        }

        match self.executor.close(self.config.open_mode).await {
            Ok(STATUS_SUCCESS) => {}
            Ok(status) => warn!(status, "Driver close reported failure"),
            Err(e) => warn!("Driver close failed: {}", e),
        }

        self.executor.shutdown().await;
        debug!("Scanner session disposed");
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Trigger `serial` and wait up to `timeout` for its barcode.
    ///
    /// A no-read is not an error: it yields an empty string.
    ///
    /// # Errors
    /// - `Error::NotInitialized` before a successful [`initialize`](Self::initialize).
    /// - `Error::Config` for a zero or oversized timeout.
    /// - `Error::UnknownDevice`, `Error::ScanAlreadyInFlight` or
    ///   `Error::TriggerFailed` from the scan coordinator.
    pub async fn scan(&self, serial: &str, timeout: Duration) -> Result<String> {
        self.ensure_initialized()?;
        validate_scan_timeout(timeout)?;

        let handle = self.coordinator.start_scan(serial, timeout).await?;
        Ok(self.coordinator.await_result(handle, timeout).await)
    }

    /// [`scan`](Self::scan) with the configured default timeout.
    pub async fn scan_default(&self, serial: &str) -> Result<String> {
        self.scan(serial, self.config.default_scan_timeout).await
    }

    /// Play a beep pattern on `serial`.
    pub async fn beep(&self, serial: &str, pattern: BeepPattern) -> Result<()> {
        self.ensure_initialized()?;
        let device_id = self.registry.read().lookup(serial)?;

        self.executor
            .execute_checked(Opcode::Beep, codec::encode_beep(device_id, pattern))
            .await?;
        debug!(serial, pattern = pattern.as_u8(), "Beep sent");
        Ok(())
    }

    /// Ask `serial` for its attribute list.
    ///
    /// The device is healthy when it answers with success and a well-formed
    /// list. A refused command is `Ok(false)`; only a driver transport failure
    /// is an error.
    pub async fn is_healthy(&self, serial: &str) -> Result<bool> {
        self.ensure_initialized()?;
        let device_id = self.registry.read().lookup(serial)?;

        let result = self
            .executor
            .execute(Opcode::AttributeGetAll, codec::encode_attribute_query(device_id))
            .await?;

        let healthy =
            result.is_success() && codec::decode_attribute_list(&result.payload).is_ok();
        debug!(serial, status = result.status, healthy, "Health check");
        Ok(healthy)
    }

    /// Serial numbers of the devices found by the last discovery.
    pub fn list_devices(&self) -> Result<Vec<String>> {
        self.ensure_initialized()?;
        Ok(self.registry.read().list_serials())
    }

    /// Run discovery again, replacing the device list.
    ///
    /// Returns the number of devices found.
    pub async fn rediscover(&self) -> Result<usize> {
        self.ensure_initialized()?;
        self.discover().await
    }

    /// Receive every barcode read by any device.
    pub fn subscribe(&self) -> Subscription {
        self.dispatcher.subscribe()
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.dispatcher.unsubscribe(id)
    }

    /// Most recent barcode read on `serial`.
    pub fn last_barcode(&self, serial: &str) -> Option<String> {
        self.coordinator.last_barcode(serial)
    }

    pub fn is_scanning(&self, serial: &str) -> bool {
        self.coordinator.is_scanning(serial)
    }

    pub fn dispatch_stats(&self) -> DispatchStats {
        self.dispatcher.stats()
    }

    /// Steps of `initialize` that run against an open driver.
    async fn attach(&self) -> Result<usize> {
        let devices = self.discover().await?;

        self.executor
            .set_event_handler(Some(self.dispatcher.handler()))
            .await?;
        self.executor
            .execute_checked(Opcode::RegisterForEvents, codec::encode_subscribe())
            .await
            .inspect_err(|e| warn!("Event registration failed: {}", e))?;

        Ok(devices)
    }

    /// Undo a successful `open` after a later initialization step failed.
    async fn rollback_open(&self) {
        debug!("Rolling back partial initialization");

        if let Err(e) = self.executor.set_event_handler(None).await {
            warn!("Removing event handler during rollback failed: {}", e);
        }

        match self.executor.close(self.config.open_mode).await {
            Ok(STATUS_SUCCESS) => {}
            Ok(status) => warn!(status, "Driver close during rollback reported failure"),
            Err(e) => warn!("Driver close during rollback failed: {}", e),
        }

        self.registry.write().clear();
    }

    async fn discover(&self) -> Result<usize> {
        let discovery = self.executor.discover().await?;
        if !discovery.is_success() {
            warn!(status = discovery.status, "Discovery failed");
            return Err(Error::Driver(format!(
                "discovery failed with status {}",
                discovery.status
            )));
        }

        let count = self.registry.write().rebuild(&discovery.payload)?;
        if count != discovery.count {
            debug!(
                reported = discovery.count,
                registered = count,
                "Driver device count differs from decoded list"
            );
        }
        info!(devices = count, "Devices discovered");
        Ok(count)
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(Error::NotInitialized)
        }
    }
}
