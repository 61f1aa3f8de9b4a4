//! Scan coordinator.
//!
//! Tracks at most one pending scan per device serial and decides how each one
//! ends: with a barcode event, with a timeout, or abandoned at teardown.
//!
//! # State Machine
//!
//! ```text
//!          start_scan                 resolve_with_event
//!   Idle ─────────────► Triggered ─────────────────────► Resolved(barcode)
//!    ▲                      │                                   │
//!    │                      │ deadline          abandon_all     │
//!    │                      ├───────────► TimedOut              │
//!    │                      └───────────► Abandoned             │
//!    └──────────────── await_result observes the outcome ◄──────┘
//! ```
//!
//! Leaving `Triggered` happens inside one critical section, whichever of the
//! event, the timer or teardown gets there first. The others then find the
//! scan no longer awaiting and do nothing. Every scan carries an id, so a
//! timer left over from an earlier scan cannot end a newer one on the same
//! device.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use scanbridge_core::{DeviceRecord, Error, Result, ScanOutcome};
use scanbridge_protocol::{Opcode, codec};
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::executor::CommandExecutor;
use crate::registry::DeviceRegistry;

/// In-flight record of a scan request.
#[derive(Debug)]
struct PendingScan {
    scan_id: u64,
    device_id: u32,
    awaiting: bool,
    deadline: Instant,
    outcome: Option<ScanOutcome>,
    waker: Option<oneshot::Sender<ScanOutcome>>,
}

/// A started scan, redeemed with [`ScanCoordinator::await_result`].
#[derive(Debug)]
pub struct ScanHandle {
    serial: String,
    scan_id: u64,
    device_id: u32,
    deadline: Instant,
    outcome_rx: oneshot::Receiver<ScanOutcome>,
}

impl ScanHandle {
    pub fn serial(&self) -> &str {
        &self.serial
    }

    pub fn device_id(&self) -> u32 {
        self.device_id
    }

    /// When the coordinator gives up on the scan.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }
}

/// Pairs trigger commands with the barcode events that answer them.
///
/// Shared as `Arc<ScanCoordinator>`: the session starts scans on it from
/// caller tasks while the event dispatcher resolves them from the driver's
/// callback thread.
pub struct ScanCoordinator {
    registry: Arc<RwLock<DeviceRegistry>>,
    executor: Arc<CommandExecutor>,
    pending: Mutex<HashMap<String, PendingScan>>,
    last_barcodes: Mutex<HashMap<String, String>>,
    next_scan_id: AtomicU64,
    track_last_barcode: bool,
}

impl std::fmt::Debug for ScanCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanCoordinator")
            .field("pending", &self.pending.lock().len())
            .field("track_last_barcode", &self.track_last_barcode)
            .finish()
    }
}

impl ScanCoordinator {
    pub fn new(
        registry: Arc<RwLock<DeviceRegistry>>,
        executor: Arc<CommandExecutor>,
        track_last_barcode: bool,
    ) -> Self {
        Self {
            registry,
            executor,
            pending: Mutex::new(HashMap::new()),
            last_barcodes: Mutex::new(HashMap::new()),
            next_scan_id: AtomicU64::new(1),
            track_last_barcode,
        }
    }

    /// Pull the trigger of `serial` and arm a timer for `timeout`.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    /// - `Error::UnknownDevice` if the serial is not registered. No command is sent.
    /// - `Error::ScanAlreadyInFlight` if a scan on this serial is still awaiting.
    /// - `Error::TriggerFailed` if the trigger command fails. The pending record
    ///   is cleared, so the deadline timer finds nothing to release.
    ///
    /// Dropping the returned future before it completes is safe: the deadline
    /// timer is armed before the trigger is sent and expires the scan.
    pub async fn start_scan(self: &Arc<Self>, serial: &str, timeout: Duration) -> Result<ScanHandle> {
        let device_id = self.registry.read().lookup(serial)?;
        let scan_id = self.next_scan_id.fetch_add(1, Ordering::Relaxed);
        let deadline = Instant::now() + timeout;
        let (waker, outcome_rx) = oneshot::channel();

        {
            let mut pending = self.pending.lock();
            if pending.get(serial).is_some_and(|scan| scan.awaiting) {
                return Err(Error::ScanAlreadyInFlight {
                    serial: serial.to_string(),
                });
            }
            pending.insert(
                serial.to_string(),
                PendingScan {
                    scan_id,
                    device_id,
                    awaiting: true,
                    deadline,
                    outcome: None,
                    waker: Some(waker),
                },
            );
        }

        // Armed before the trigger so a caller dropping this future mid-command
        // still gets the scan expired and the trigger released.
        let coordinator = Arc::clone(self);
        let timer_serial = serial.to_string();
        tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            coordinator.expire(&timer_serial, scan_id).await;
        });

        debug!(serial, device_id, scan_id, "Pulling trigger");

        if let Err(e) = self
            .executor
            .execute_checked(Opcode::PullTrigger, codec::encode_trigger(device_id))
            .await
        {
            warn!(serial, device_id, "Trigger failed: {}", e);
            self.clear(serial, scan_id);
            return Err(Error::TriggerFailed {
                serial: serial.to_string(),
                reason: e.to_string(),
            });
        }

        Ok(ScanHandle {
            serial: serial.to_string(),
            scan_id,
            device_id,
            deadline,
            outcome_rx,
        })
    }

    /// Hand a decoded barcode to the scan waiting on `serial`, if any.
    ///
    /// The barcode is remembered as the device's last barcode either way when
    /// tracking is enabled. Returns `true` if a waiting scan was resolved.
    pub fn resolve_with_event(&self, serial: &str, barcode: &str) -> bool {
        let resolved = {
            let mut pending = self.pending.lock();
            match pending.get_mut(serial).filter(|scan| scan.awaiting) {
                Some(scan) => {
                    let outcome = ScanOutcome::Resolved(barcode.to_string());
                    scan.awaiting = false;
                    scan.outcome = Some(outcome.clone());
                    if let Some(waker) = scan.waker.take() {
                        let _ = waker.send(outcome);
                    }
                    debug!(serial, scan_id = scan.scan_id, "Scan resolved by event");
                    true
                }
                None => false,
            }
        };

        if self.track_last_barcode {
            self.last_barcodes
                .lock()
                .insert(serial.to_string(), barcode.to_string());
        }

        resolved
    }

    /// Wait for the scan to end, for at most `wait`.
    ///
    /// Returns the barcode, or an empty string on timeout, abandonment or a
    /// no-read. The pending record is cleared once its outcome is observed.
    /// If `wait` elapses first the scan is expired here, releasing the trigger.
    pub async fn await_result(&self, handle: ScanHandle, wait: Duration) -> String {
        let ScanHandle {
            serial,
            scan_id,
            mut outcome_rx,
            ..
        } = handle;

        let outcome = match tokio::time::timeout(wait, &mut outcome_rx).await {
            Ok(outcome) => outcome.unwrap_or(ScanOutcome::Abandoned),
            Err(_) => {
                if self.expire(&serial, scan_id).await {
                    ScanOutcome::TimedOut
                } else {
                    // another path ended the scan and sends its outcome when done
                    outcome_rx.await.unwrap_or(ScanOutcome::Abandoned)
                }
            }
        };

        self.clear(&serial, scan_id);
        info!(serial = %serial, scan_id, %outcome, "Scan finished");
        outcome.into_barcode()
    }

    /// End every awaiting scan as `Abandoned` and wake its caller.
    ///
    /// Returns the devices whose trigger is still pulled so the caller can
    /// release them.
    pub fn abandon_all(&self) -> Vec<DeviceRecord> {
        let mut pending = self.pending.lock();
        let mut triggered = Vec::new();

        for (serial, scan) in pending.iter_mut().filter(|(_, scan)| scan.awaiting) {
            scan.awaiting = false;
            scan.outcome = Some(ScanOutcome::Abandoned);
            if let Some(waker) = scan.waker.take() {
                let _ = waker.send(ScanOutcome::Abandoned);
            }
            triggered.push(DeviceRecord::new(serial.clone(), scan.device_id));
        }
        pending.clear();

        if !triggered.is_empty() {
            debug!(count = triggered.len(), "Abandoned pending scans");
        }
        triggered
    }

    /// Most recent barcode seen on `serial`, if tracking is enabled.
    pub fn last_barcode(&self, serial: &str) -> Option<String> {
        self.last_barcodes.lock().get(serial).cloned()
    }

    /// Whether a scan on `serial` is waiting for its barcode.
    pub fn is_scanning(&self, serial: &str) -> bool {
        self.pending
            .lock()
            .get(serial)
            .is_some_and(|scan| scan.awaiting)
    }

    /// Time the scan awaiting on `serial` runs out.
    pub fn deadline(&self, serial: &str) -> Option<Instant> {
        self.pending
            .lock()
            .get(serial)
            .filter(|scan| scan.awaiting)
            .map(|scan| scan.deadline)
    }

    /// Time out scan `scan_id` on `serial` if it is still awaiting.
    ///
    /// The trigger is released before the caller is woken. Returns `true` if
    /// this call ended the scan.
    async fn expire(&self, serial: &str, scan_id: u64) -> bool {
        let (device_id, waker) = {
            let mut pending = self.pending.lock();
            match pending.get_mut(serial) {
                Some(scan) if scan.scan_id == scan_id && scan.awaiting => {
                    scan.awaiting = false;
                    scan.outcome = Some(ScanOutcome::TimedOut);
                    (scan.device_id, scan.waker.take())
                }
                _ => return false,
            }
        };

        debug!(serial, device_id, scan_id, "Scan timed out, releasing trigger");
        if let Err(e) = self
            .executor
            .execute_checked(Opcode::ReleaseTrigger, codec::encode_release(device_id))
            .await
        {
            warn!(serial, device_id, "Release after timeout failed: {}", e);
        }

        if let Some(waker) = waker {
            let _ = waker.send(ScanOutcome::TimedOut);
        }
        true
    }

    fn clear(&self, serial: &str, scan_id: u64) {
        let mut pending = self.pending.lock();
        if pending.get(serial).is_some_and(|scan| scan.scan_id == scan_id) {
            pending.remove(serial);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scanbridge_core::constants::STATUS_FAIL;
    use scanbridge_driver::mock::{MockDriver, MockDriverHandle};

    async fn setup(track_last_barcode: bool) -> (Arc<ScanCoordinator>, MockDriverHandle) {
        let (driver, handle) = MockDriver::new();
        handle.attach_device("SN1", 1);
        handle.attach_device("SN2", 2);

        let executor = Arc::new(CommandExecutor::spawn(driver, 8).unwrap());
        executor.open(0, &[1]).await.unwrap();
        let discovery = executor.discover().await.unwrap();

        let mut registry = DeviceRegistry::new();
        registry.rebuild(&discovery.payload).unwrap();

        let coordinator = ScanCoordinator::new(
            Arc::new(RwLock::new(registry)),
            executor,
            track_last_barcode,
        );
        (Arc::new(coordinator), handle)
    }

    #[tokio::test]
    async fn test_event_before_deadline_resolves_scan() {
        let (coordinator, handle) = setup(true).await;

        let scan = coordinator
            .start_scan("SN1", Duration::from_millis(500))
            .await
            .unwrap();
        assert!(coordinator.is_scanning("SN1"));
        assert!(handle.is_triggered(1));

        assert!(coordinator.resolve_with_event("SN1", "123"));
        let barcode = coordinator
            .await_result(scan, Duration::from_millis(500))
            .await;

        assert_eq!(barcode, "123");
        assert!(!coordinator.is_scanning("SN1"));
        assert_eq!(handle.command_count(Opcode::ReleaseTrigger), 0);
    }

    #[tokio::test]
    async fn test_timeout_yields_empty_and_releases_once() {
        let (coordinator, handle) = setup(true).await;

        let scan = coordinator
            .start_scan("SN1", Duration::from_millis(30))
            .await
            .unwrap();
        let barcode = coordinator
            .await_result(scan, Duration::from_millis(30))
            .await;

        assert_eq!(barcode, "");
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(handle.command_count(Opcode::ReleaseTrigger), 1);
        assert!(!handle.is_triggered(1));
    }

    #[tokio::test]
    async fn test_late_event_does_not_resolve() {
        let (coordinator, _handle) = setup(true).await;

        let scan = coordinator
            .start_scan("SN1", Duration::from_millis(20))
            .await
            .unwrap();
        assert_eq!(
            coordinator
                .await_result(scan, Duration::from_millis(20))
                .await,
            ""
        );

        assert!(!coordinator.resolve_with_event("SN1", "late"));
        assert_eq!(coordinator.last_barcode("SN1").as_deref(), Some("late"));
    }

    #[tokio::test]
    async fn test_unknown_device_sends_nothing() {
        let (coordinator, handle) = setup(true).await;

        let result = coordinator
            .start_scan("SN3", Duration::from_millis(100))
            .await;

        assert!(matches!(result, Err(Error::UnknownDevice { .. })));
        assert!(handle.commands().is_empty());
    }

    #[tokio::test]
    async fn test_second_scan_on_same_serial_rejected() {
        let (coordinator, _handle) = setup(true).await;

        let first = coordinator
            .start_scan("SN1", Duration::from_millis(500))
            .await
            .unwrap();
        let second = coordinator
            .start_scan("SN1", Duration::from_millis(500))
            .await;
        assert_eq!(
            second.err(),
            Some(Error::ScanAlreadyInFlight {
                serial: "SN1".to_string()
            })
        );

        coordinator.resolve_with_event("SN1", "A");
        assert_eq!(
            coordinator
                .await_result(first, Duration::from_millis(500))
                .await,
            "A"
        );

        // the serial is free again once the first scan is observed
        let third = coordinator
            .start_scan("SN1", Duration::from_millis(500))
            .await;
        assert!(third.is_ok());
    }

    #[tokio::test]
    async fn test_trigger_failure_clears_pending_scan() {
        let (coordinator, handle) = setup(true).await;
        handle.set_status(Opcode::PullTrigger, STATUS_FAIL);

        let result = coordinator
            .start_scan("SN1", Duration::from_millis(20))
            .await;
        assert!(matches!(result, Err(Error::TriggerFailed { ref serial, .. }) if serial == "SN1"));
        assert!(!coordinator.is_scanning("SN1"));

        // the armed timer finds the record cleared and releases nothing
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(handle.command_count(Opcode::ReleaseTrigger), 0);
    }

    #[tokio::test]
    async fn test_start_scan_dropped_mid_trigger_still_expires() {
        let (coordinator, handle) = setup(true).await;
        handle.set_latency(Duration::from_millis(100));

        let dropped = tokio::time::timeout(
            Duration::from_millis(20),
            coordinator.start_scan("SN1", Duration::from_millis(200)),
        )
        .await;
        assert!(dropped.is_err());

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(!coordinator.is_scanning("SN1"));
        assert!(!handle.is_triggered(1));
        assert_eq!(handle.command_count(Opcode::ReleaseTrigger), 1);

        handle.set_latency(Duration::ZERO);
        let next = coordinator
            .start_scan("SN1", Duration::from_millis(200))
            .await;
        assert!(next.is_ok());
    }

    #[tokio::test]
    async fn test_event_without_waiter_is_recorded() {
        let (coordinator, _handle) = setup(true).await;

        assert!(!coordinator.resolve_with_event("SN2", "987"));
        assert_eq!(coordinator.last_barcode("SN2").as_deref(), Some("987"));
    }

    #[tokio::test]
    async fn test_last_barcode_tracking_disabled() {
        let (coordinator, _handle) = setup(false).await;

        coordinator.resolve_with_event("SN2", "987");
        assert_eq!(coordinator.last_barcode("SN2"), None);
    }

    #[tokio::test]
    async fn test_abandon_all_wakes_waiters() {
        let (coordinator, _handle) = setup(true).await;

        let scan = coordinator
            .start_scan("SN2", Duration::from_secs(5))
            .await
            .unwrap();

        let abandoned = coordinator.abandon_all();
        assert_eq!(abandoned, vec![DeviceRecord::new("SN2", 2)]);
        assert!(!coordinator.is_scanning("SN2"));

        let barcode = coordinator.await_result(scan, Duration::from_secs(5)).await;
        assert_eq!(barcode, "");
    }

    #[tokio::test]
    async fn test_deadline_reported_while_awaiting() {
        let (coordinator, _handle) = setup(true).await;

        let scan = coordinator
            .start_scan("SN1", Duration::from_millis(500))
            .await
            .unwrap();
        assert_eq!(coordinator.deadline("SN1"), Some(scan.deadline()));
        assert_eq!(scan.serial(), "SN1");
        assert_eq!(scan.device_id(), 1);

        coordinator.resolve_with_event("SN1", "x");
        assert_eq!(coordinator.deadline("SN1"), None);
    }
}
