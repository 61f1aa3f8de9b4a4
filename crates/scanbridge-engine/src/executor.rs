//! Command executor.
//!
//! The driver cannot handle overlapping calls, so the executor moves it onto
//! a dedicated worker thread and feeds it requests from a bounded channel, one
//! at a time. Callers await a one-shot reply.
//!
//! ```text
//!  task A ──┐
//!  task B ──┼──► mpsc (bounded) ──► worker thread ──► driver
//!  task C ──┘        ▲                    │
//!                    └──── oneshot ◄──────┘
//! ```
//!
//! Driver errors are returned to the caller as `Error::Driver` and never
//! retried here; the caller decides what to do.

use std::thread;

use parking_lot::Mutex;
use scanbridge_core::{CommandResult, Error, Result};
use scanbridge_driver::{Discovery, EventHandler, ScannerDriver};
use scanbridge_protocol::Opcode;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace, warn};

const STOPPED: &str = "executor stopped";

/// One call into the driver, with the channel its outcome is sent back on.
enum DriverRequest {
    Open {
        mode: i32,
        scanner_types: Vec<i16>,
        reply: oneshot::Sender<scanbridge_driver::Result<i32>>,
    },
    Close {
        mode: i32,
        reply: oneshot::Sender<scanbridge_driver::Result<i32>>,
    },
    Discover {
        reply: oneshot::Sender<scanbridge_driver::Result<Discovery>>,
    },
    Exec {
        opcode: Opcode,
        payload: String,
        reply: oneshot::Sender<scanbridge_driver::Result<CommandResult>>,
    },
    SetHandler {
        handler: Option<EventHandler>,
        reply: oneshot::Sender<()>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Serializes every call into a [`ScannerDriver`].
///
/// # Example
///
/// ```no_run
/// use scanbridge_driver::mock::MockDriver;
/// use scanbridge_core::BeepPattern;
/// use scanbridge_engine::CommandExecutor;
/// use scanbridge_protocol::{Opcode, codec};
///
/// # async fn example() -> scanbridge_core::Result<()> {
/// let (driver, handle) = MockDriver::new();
/// handle.attach_device("SN1", 1);
///
/// let executor = CommandExecutor::spawn(driver, 16)?;
/// executor.open(0, &[1]).await?;
/// executor
///     .execute_checked(Opcode::Beep, codec::encode_beep(1, BeepPattern::ONE_HIGH_SHORT))
///     .await?;
/// executor.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct CommandExecutor {
    request_tx: mpsc::Sender<DriverRequest>,
    worker: Mutex<Option<thread::JoinHandle<()>>>,
    driver_name: String,
}

impl std::fmt::Debug for CommandExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandExecutor")
            .field("driver", &self.driver_name)
            .field("running", &self.is_running())
            .finish()
    }
}

impl CommandExecutor {
    /// Move `driver` onto a new worker thread.
    ///
    /// `queue_depth` bounds the number of requests waiting for the worker.
    ///
    /// # Errors
    /// Returns `Error::Driver` if the worker thread cannot be started.
    pub fn spawn<D: ScannerDriver>(driver: D, queue_depth: usize) -> Result<Self> {
        let driver_name = driver.name().to_string();
        let (request_tx, request_rx) = mpsc::channel(queue_depth.max(1));

        let worker = thread::Builder::new()
            .name("scanbridge-driver".to_string())
            .spawn(move || run_worker(driver, request_rx))
            .map_err(|e| Error::Driver(format!("failed to start driver worker: {e}")))?;

        debug!(driver = %driver_name, queue_depth, "Command executor started");

        Ok(Self {
            request_tx,
            worker: Mutex::new(Some(worker)),
            driver_name,
        })
    }

    pub fn driver_name(&self) -> &str {
        &self.driver_name
    }

    /// Whether the worker still accepts requests.
    pub fn is_running(&self) -> bool {
        !self.request_tx.is_closed()
    }

    pub async fn open(&self, mode: i32, scanner_types: &[i16]) -> Result<i32> {
        let scanner_types = scanner_types.to_vec();
        let status = self
            .request(|reply| DriverRequest::Open {
                mode,
                scanner_types,
                reply,
            })
            .await??;
        Ok(status)
    }

    pub async fn close(&self, mode: i32) -> Result<i32> {
        let status = self
            .request(|reply| DriverRequest::Close { mode, reply })
            .await??;
        Ok(status)
    }

    /// Ask the driver for the connected devices.
    pub async fn discover(&self) -> Result<Discovery> {
        let discovery = self
            .request(|reply| DriverRequest::Discover { reply })
            .await??;
        Ok(discovery)
    }

    /// Execute one command and return the driver's reply as is.
    ///
    /// # Errors
    /// Returns `Error::Driver` if the call could not be completed. A non-zero
    /// status is not an error here; see [`execute_checked`](Self::execute_checked).
    pub async fn execute(&self, opcode: Opcode, payload: String) -> Result<CommandResult> {
        trace!(%opcode, "Queueing driver command");

        let result = self
            .request(|reply| DriverRequest::Exec {
                opcode,
                payload,
                reply,
            })
            .await?
            .inspect_err(|e| warn!(%opcode, "Driver command failed: {}", e))?;

        trace!(%opcode, status = result.status, "Driver command completed");
        Ok(result)
    }

    /// Execute one command, treating a non-zero status as failure.
    ///
    /// # Errors
    /// Returns `Error::Driver` on transport failure and
    /// `Error::CommandFailed` when the driver reports a non-zero status.
    pub async fn execute_checked(&self, opcode: Opcode, payload: String) -> Result<CommandResult> {
        self.execute(opcode, payload).await?.check(opcode.code())
    }

    /// Install or remove the driver's event callback.
    pub async fn set_event_handler(&self, handler: Option<EventHandler>) -> Result<()> {
        self.request(|reply| DriverRequest::SetHandler { handler, reply })
            .await
    }

    /// Stop the worker once every request queued so far has been served.
    ///
    /// Requests issued afterwards fail with `Error::Driver`. Calling this more
    /// than once is harmless.
    pub async fn shutdown(&self) {
        if self
            .request(|reply| DriverRequest::Shutdown { reply })
            .await
            .is_err()
        {
            return;
        }

        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            match tokio::task::spawn_blocking(move || worker.join()).await {
                Ok(Ok(())) => {}
                _ => warn!("Driver worker did not stop cleanly"),
            }
        }

        debug!(driver = %self.driver_name, "Command executor stopped");
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> DriverRequest,
    ) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.request_tx
            .send(build(reply_tx))
            .await
            .map_err(|_| Error::Driver(STOPPED.to_string()))?;

        reply_rx
            .await
            .map_err(|_| Error::Driver(STOPPED.to_string()))
    }
}

/// Serve requests until shutdown or until every sender is gone.
fn run_worker<D: ScannerDriver>(mut driver: D, mut request_rx: mpsc::Receiver<DriverRequest>) {
    while let Some(request) = request_rx.blocking_recv() {
        match request {
            DriverRequest::Open {
                mode,
                scanner_types,
                reply,
            } => {
                let _ = reply.send(driver.open(mode, &scanner_types));
            }
            DriverRequest::Close { mode, reply } => {
                let _ = reply.send(driver.close(mode));
            }
            DriverRequest::Discover { reply } => {
                let _ = reply.send(driver.get_devices());
            }
            DriverRequest::Exec {
                opcode,
                payload,
                reply,
            } => {
                let _ = reply.send(driver.exec_command(opcode.code(), &payload));
            }
            DriverRequest::SetHandler { handler, reply } => {
                driver.set_event_handler(handler);
                let _ = reply.send(());
            }
            DriverRequest::Shutdown { reply } => {
                request_rx.close();
                let _ = reply.send(());
                break;
            }
        }
    }

    trace!(driver = driver.name(), "Driver worker exiting");
}
