//! Event dispatcher.
//!
//! The dispatcher is the single callback the driver invokes, on its own
//! thread, for every device event. Barcode events are decoded, handed to the
//! scan coordinator, and then fanned out to every subscriber. The callback
//! never blocks: subscribers are bounded channels fed with `try_send`, and a
//! subscriber that falls behind loses events rather than stalling the driver.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use scanbridge_core::{EventType, ScanEvent};
use scanbridge_driver::EventHandler;
use scanbridge_protocol::codec;
use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, trace, warn};

use crate::coordinator::ScanCoordinator;

/// Identifies a subscription for [`EventDispatcher::unsubscribe`].
pub type SubscriptionId = u64;

/// Receiving end of a barcode subscription.
///
/// Dropping it ends the subscription; the dispatcher prunes it on the next
/// event.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    event_rx: mpsc::Receiver<ScanEvent>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Receive the next barcode event.
    ///
    /// Returns `None` once the subscription was removed.
    pub async fn recv(&mut self) -> Option<ScanEvent> {
        self.event_rx.recv().await
    }

    /// Take a barcode event if one is buffered.
    pub fn try_recv(&mut self) -> Option<ScanEvent> {
        self.event_rx.try_recv().ok()
    }
}

/// Counters of dispatcher activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DispatchStats {
    /// Events received from the driver, of any type.
    pub events_received: u64,

    /// Barcode events decoded and dispatched.
    pub barcodes_dispatched: u64,

    /// Barcode events that resolved a waiting scan.
    pub scans_resolved: u64,

    /// Barcode events whose payload could not be decoded.
    pub decode_failures: u64,

    /// Deliveries skipped because a subscriber's buffer was full.
    pub deliveries_dropped: u64,

    /// Events of types other than barcode.
    pub events_ignored: u64,
}

#[derive(Debug, Default)]
struct Counters {
    events_received: AtomicU64,
    barcodes_dispatched: AtomicU64,
    scans_resolved: AtomicU64,
    decode_failures: AtomicU64,
    deliveries_dropped: AtomicU64,
    events_ignored: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Debug)]
struct Subscriber {
    id: SubscriptionId,
    event_tx: mpsc::Sender<ScanEvent>,
}

/// Routes driver events to the scan coordinator and to subscribers.
#[derive(Debug)]
pub struct EventDispatcher {
    coordinator: Arc<ScanCoordinator>,
    subscribers: Mutex<Vec<Subscriber>>,
    next_subscription_id: AtomicU64,
    capacity: usize,
    counters: Counters,
}

impl EventDispatcher {
    /// Create a dispatcher whose subscribers each buffer up to `capacity` events.
    pub fn new(coordinator: Arc<ScanCoordinator>, capacity: usize) -> Self {
        Self {
            coordinator,
            subscribers: Mutex::new(Vec::new()),
            next_subscription_id: AtomicU64::new(1),
            capacity: capacity.max(1),
            counters: Counters::default(),
        }
    }

    /// Wrap the dispatcher as the callback installed into the driver.
    ///
    /// The callback holds a weak reference: the driver lives on the executor
    /// thread, which the dispatcher keeps alive through the coordinator.
    pub fn handler(self: &Arc<Self>) -> EventHandler {
        let dispatcher = Arc::downgrade(self);
        Arc::new(move |event_type, payload: &str| {
            if let Some(dispatcher) = dispatcher.upgrade() {
                dispatcher.handle_event(event_type, payload);
            }
        })
    }

    /// Process one event delivered by the driver.
    pub fn handle_event(&self, event_type: u16, payload: &str) {
        Counters::bump(&self.counters.events_received);

        match EventType::from_code(event_type) {
            EventType::Barcode => self.handle_barcode(payload),
            other => {
                Counters::bump(&self.counters.events_ignored);
                trace!(event_type = %other, bytes = payload.len(), "Ignoring non-barcode event");
            }
        }
    }

    fn handle_barcode(&self, payload: &str) {
        let event = match codec::decode_scan_event(payload) {
            Ok(event) => event,
            Err(e) => {
                Counters::bump(&self.counters.decode_failures);
                warn!("Dropping undecodable barcode event: {}", e);
                return;
            }
        };

        debug!(
            serial = %event.device_serial,
            label_type = %event.raw_label_type,
            no_read = event.is_no_read(),
            "Barcode event"
        );

        if self
            .coordinator
            .resolve_with_event(&event.device_serial, &event.barcode_text)
        {
            Counters::bump(&self.counters.scans_resolved);
        }

        Counters::bump(&self.counters.barcodes_dispatched);
        self.deliver(event);
    }

    fn deliver(&self, event: ScanEvent) {
        let mut subscribers = self.subscribers.lock();

        subscribers.retain(|subscriber| match subscriber.event_tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                Counters::bump(&self.counters.deliveries_dropped);
                warn!(
                    subscription = subscriber.id,
                    "Subscriber buffer full, dropping barcode event"
                );
                true
            }
            Err(TrySendError::Closed(_)) => {
                debug!(subscription = subscriber.id, "Pruning closed subscriber");
                false
            }
        });
    }

    /// Register a new barcode subscriber.
    pub fn subscribe(&self) -> Subscription {
        let id = self.next_subscription_id.fetch_add(1, Ordering::Relaxed);
        let (event_tx, event_rx) = mpsc::channel(self.capacity);

        self.subscribers.lock().push(Subscriber { id, event_tx });
        debug!(subscription = id, "Subscriber added");

        Subscription { id, event_rx }
    }

    /// Remove a subscriber. Returns `true` if it was registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|subscriber| subscriber.id != id);
        before != subscribers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    pub fn stats(&self) -> DispatchStats {
        let c = &self.counters;
        DispatchStats {
            events_received: c.events_received.load(Ordering::Relaxed),
            barcodes_dispatched: c.barcodes_dispatched.load(Ordering::Relaxed),
            scans_resolved: c.scans_resolved.load(Ordering::Relaxed),
            decode_failures: c.decode_failures.load(Ordering::Relaxed),
            deliveries_dropped: c.deliveries_dropped.load(Ordering::Relaxed),
            events_ignored: c.events_ignored.load(Ordering::Relaxed),
        }
    }
}
