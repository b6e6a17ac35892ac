//! Typed event bus: a tagged union of the six event kinds the engine produces during replay,
//! plus a subscriber-table pub/sub dispatcher with a synchronous and an optional queued mode.
//!
//! The engine itself drives its strategies, risk manager and execution handler through plain
//! owned method calls (see `crate::engine`) rather than through bus subscriptions — wiring a
//! set of trait objects behind shared interior mutability just to satisfy a generic
//! `FnMut(&Event)` callback buys nothing in a single-threaded deterministic loop. What the bus
//! gives callers instead is a genuine, independently testable observer channel: the engine
//! publishes every event it produces here too, so anything external (a live dashboard, an
//! audit log, a test harness) can subscribe without the engine knowing about it.

use crate::scalar::Timestamp;
use backtest_markets::{Fill, Order, StrategyId, Tick};
use backtest_risk::Violation;
use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::warn;

/// A tick delivered for one instrument at the clock's current time.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketEvent {
    pub timestamp: Timestamp,
    pub tick: Tick,
}

/// A strategy's sized-but-not-yet-risk-checked directional signal.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalEvent {
    pub timestamp: Timestamp,
    pub strategy: StrategyId,
    pub signal: backtest_execution::Signal,
}

/// An order that has passed the risk check and was submitted to its book.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderEvent {
    pub timestamp: Timestamp,
    pub order: Order,
}

/// A fill produced by the order book, after cost-model attachment.
#[derive(Debug, Clone, PartialEq)]
pub struct FillEvent {
    pub timestamp: Timestamp,
    pub fill: Fill,
}

/// A risk rejection or other risk-manager notice, routed to the owning strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskEvent {
    pub timestamp: Timestamp,
    pub strategy: StrategyId,
    pub violation: Option<Violation>,
    pub message: String,
}

/// A scheduled wake-up with no payload beyond the time it fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerEvent {
    pub timestamp: Timestamp,
}

/// Tagged union of everything the engine can publish.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Market(MarketEvent),
    Signal(SignalEvent),
    Order(OrderEvent),
    Fill(FillEvent),
    Risk(RiskEvent),
    Timer(TimerEvent),
}

impl Event {
    pub fn timestamp(&self) -> Timestamp {
        match self {
            Event::Market(e) => e.timestamp,
            Event::Signal(e) => e.timestamp,
            Event::Order(e) => e.timestamp,
            Event::Fill(e) => e.timestamp,
            Event::Risk(e) => e.timestamp,
            Event::Timer(e) => e.timestamp,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Event::Market(_) => EventKind::Market,
            Event::Signal(_) => EventKind::Signal,
            Event::Order(_) => EventKind::Order,
            Event::Fill(_) => EventKind::Fill,
            Event::Risk(_) => EventKind::Risk,
            Event::Timer(_) => EventKind::Timer,
        }
    }
}

/// The discriminant of [`Event`], used to address a typed subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Market,
    Signal,
    Order,
    Fill,
    Risk,
    Timer,
}

/// Opaque handle returned by [`EventBus::subscribe`]; pass it to [`EventBus::unsubscribe`].
pub type SubscriptionId = u64;

/// A subscriber callback. Boxed as `FnMut` so it may carry mutable captured state (a counter,
/// an output buffer); bounded `Send` so the bus can hand it to an optional worker thread.
pub type Callback = Box<dyn FnMut(&Event) + Send>;

#[derive(Default)]
struct SubscriberTable {
    typed: HashMap<EventKind, Vec<(SubscriptionId, Callback)>>,
    catch_all: Vec<(SubscriptionId, Callback)>,
}

impl SubscriberTable {
    fn dispatch(&mut self, event: &Event) {
        if let Some(subs) = self.typed.get_mut(&event.kind()) {
            for (id, callback) in subs.iter_mut() {
                invoke(*id, callback, event);
            }
        }
        for (id, callback) in self.catch_all.iter_mut() {
            invoke(*id, callback, event);
        }
    }

    fn remove(&mut self, id: SubscriptionId) -> bool {
        let mut removed = false;
        for subs in self.typed.values_mut() {
            if let Some(pos) = subs.iter().position(|(sid, _)| *sid == id) {
                subs.remove(pos);
                removed = true;
            }
        }
        if let Some(pos) = self.catch_all.iter().position(|(sid, _)| *sid == id) {
            self.catch_all.remove(pos);
            removed = true;
        }
        removed
    }
}

/// A subscriber callback that panics is isolated: the panic is caught, logged, and dispatch
/// continues with the remaining subscribers.
fn invoke(id: SubscriptionId, callback: &mut Callback, event: &Event) {
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| callback(event)));
    if result.is_err() {
        warn!(subscription = id, kind = ?event.kind(), "event subscriber panicked; continuing dispatch");
    }
}

/// Typed publish/subscribe dispatcher over [`Event`].
///
/// [`EventBus::publish_sync`] dispatches immediately on the caller's thread. [`EventBus::publish`]
/// enqueues for later delivery via [`EventBus::process_pending`] (called manually) or via a
/// background worker started with [`EventBus::spawn_worker`].
pub struct EventBus {
    subscribers: Arc<Mutex<SubscriberTable>>,
    next_id: AtomicU64,
    queue: Arc<Mutex<VecDeque<Event>>>,
    queue_cv: Arc<Condvar>,
    worker_running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("worker_running", &self.worker_running.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscribers: Arc::new(Mutex::new(SubscriberTable::default())),
            next_id: AtomicU64::new(0),
            queue: Arc::new(Mutex::new(VecDeque::new())),
            queue_cv: Arc::new(Condvar::new()),
            worker_running: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    /// Subscribes to one event kind, or every kind if `kind` is `None`. Returns a handle
    /// for [`Self::unsubscribe`].
    pub fn subscribe(&self, kind: Option<EventKind>, callback: Callback) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut subs = self.subscribers.lock();
        match kind {
            Some(kind) => subs.typed.entry(kind).or_default().push((id, callback)),
            None => subs.catch_all.push((id, callback)),
        }
        id
    }

    /// Removes a subscription. A no-op (returns `false`) if the handle is unknown, e.g.
    /// already unsubscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscribers.lock().remove(id)
    }

    /// Dispatches `event` to every matching subscriber immediately, on the caller's thread.
    pub fn publish_sync(&self, event: Event) {
        self.subscribers.lock().dispatch(&event);
    }

    /// Enqueues `event` for later delivery. Wakes a worker thread if one is running.
    pub fn publish(&self, event: Event) {
        self.queue.lock().push_back(event);
        self.queue_cv.notify_one();
    }

    /// Drains and dispatches every currently queued event. Returns the number dispatched.
    pub fn process_pending(&self) -> usize {
        let drained: Vec<Event> = std::mem::take(&mut *self.queue.lock()).into_iter().collect();
        let count = drained.len();
        for event in drained {
            self.publish_sync(event);
        }
        count
    }

    /// Starts a background thread that calls [`Self::process_pending`] whenever the queue is
    /// non-empty, parked on a condvar otherwise. Idempotent: a second call while a worker is
    /// already running is a no-op.
    pub fn spawn_worker(&mut self) {
        if self.worker_running.swap(true, Ordering::SeqCst) {
            return;
        }
        let subscribers = self.subscribers.clone();
        let queue = self.queue.clone();
        let queue_cv = self.queue_cv.clone();
        let running = self.worker_running.clone();

        self.worker = Some(std::thread::spawn(move || {
            while running.load(Ordering::SeqCst) {
                let mut guard = queue.lock();
                if guard.is_empty() {
                    let timeout = std::time::Duration::from_millis(50);
                    queue_cv.wait_for(&mut guard, timeout);
                }
                let drained: Vec<Event> = std::mem::take(&mut *guard).into_iter().collect();
                drop(guard);
                if !drained.is_empty() {
                    let mut subs = subscribers.lock();
                    for event in &drained {
                        subs.dispatch(event);
                    }
                }
            }
        }));
    }

    /// Stops and joins the worker thread started by [`Self::spawn_worker`]. A no-op if no
    /// worker is running.
    pub fn stop_worker(&mut self) {
        if !self.worker_running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.queue_cv.notify_all();
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for EventBus {
    fn drop(&mut self) {
        self.stop_worker();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backtest_markets::InstrumentId;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use std::sync::atomic::AtomicUsize;

    fn tick(ts: i64) -> Tick {
        Tick::new(
            Timestamp(ts),
            InstrumentId::new("PETR4"),
            dec!(10),
            100,
            dec!(11),
            100,
            dec!(10.5),
            1,
            dec!(10),
            dec!(11),
            dec!(9.5),
            dec!(10.5),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        )
    }

    #[test]
    fn typed_subscriber_only_sees_its_kind() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        bus.subscribe(
            Some(EventKind::Market),
            Box::new(move |_event| {
                count_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );

        bus.publish_sync(Event::Market(MarketEvent {
            timestamp: Timestamp(0),
            tick: tick(0),
        }));
        bus.publish_sync(Event::Timer(TimerEvent { timestamp: Timestamp(1) }));

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn catch_all_subscriber_sees_every_kind() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        bus.subscribe(
            None,
            Box::new(move |_event| {
                count_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );

        bus.publish_sync(Event::Market(MarketEvent {
            timestamp: Timestamp(0),
            tick: tick(0),
        }));
        bus.publish_sync(Event::Timer(TimerEvent { timestamp: Timestamp(1) }));

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unsubscribe_is_a_no_op_for_unknown_handle() {
        let bus = EventBus::new();
        assert!(!bus.unsubscribe(999));
    }

    #[test]
    fn unsubscribe_stops_further_delivery() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        let id = bus.subscribe(
            None,
            Box::new(move |_event| {
                count_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );
        bus.publish_sync(Event::Timer(TimerEvent { timestamp: Timestamp(0) }));
        assert!(bus.unsubscribe(id));
        bus.publish_sync(Event::Timer(TimerEvent { timestamp: Timestamp(1) }));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_subscriber_does_not_block_the_rest() {
        let bus = EventBus::new();
        bus.subscribe(None, Box::new(|_event| panic!("boom")));
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        bus.subscribe(
            None,
            Box::new(move |_event| {
                count_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );
        bus.publish_sync(Event::Timer(TimerEvent { timestamp: Timestamp(0) }));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn publish_queues_until_process_pending_drains_it() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        bus.subscribe(
            None,
            Box::new(move |_event| {
                count_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );
        bus.publish(Event::Timer(TimerEvent { timestamp: Timestamp(0) }));
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(bus.process_pending(), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn worker_thread_drains_published_events() {
        let mut bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        bus.subscribe(
            None,
            Box::new(move |_event| {
                count_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );
        bus.spawn_worker();
        bus.publish(Event::Timer(TimerEvent { timestamp: Timestamp(0) }));

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(2);
        while count.load(Ordering::SeqCst) == 0 && std::time::Instant::now() < deadline {
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        bus.stop_worker();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
