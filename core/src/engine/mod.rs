//! The replay engine: owns the tick store, clock, event bus, risk manager, execution
//! handler, analytics summary and every registered strategy, and drives the tick-by-tick
//! loop described in the module-level docs of [`crate`].
//!
//! The engine does not route market data, signals, orders or fills to its owned
//! components through the [`crate::event::EventBus`] — it calls them directly, since
//! wiring a set of trait objects behind shared interior mutability just to satisfy a
//! generic subscriber callback buys nothing in a single-threaded deterministic loop (see
//! [`crate::event`]'s module docs). Every event the engine produces is still published to
//! the bus, so external observers (a dashboard, an audit log, a test) can subscribe
//! without the engine knowing about them.

use crate::clock::SimClock;
use crate::error::EngineError;
use crate::event::{Event, EventBus, FillEvent, MarketEvent, OrderEvent, RiskEvent, SignalEvent, TimerEvent};
use crate::scalar::{Duration, Timestamp};
use backtest_analytics::TradingSummaryGenerator;
use backtest_data::{TickSeries, TickStore};
use backtest_execution::{CostModel, ExecutionHandler, LinearSlippage, Signal, SizingPolicy, UnitSizer};
use backtest_markets::{Fill, InstrumentId, LatencyConfig, Order, OrderId, StrategyId, Tick};
use backtest_risk::{RiskLimits, RiskManager, Violation};
use backtest_strategy::{Strategy, StrategyContext};
use fnv::FnvHashMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration as WallDuration, Instant};
use tracing::{debug, warn};

/// The final report of a completed (or in-progress) run, as produced by
/// [`backtest_analytics::summary::TradingSummaryGenerator`]. Re-exported here so callers
/// can write `backtest_core::engine::BacktestResults` / `backtest_core::BacktestResults`
/// without a separate dependency on `backtest-analytics`.
pub use backtest_analytics::BacktestResults;

/// Run-level configuration that does not change once a backtest starts: the clock's
/// starting instant, the equity mark the drawdown curve and risk manager's peak-equity
/// tracking begin from, and the risk-free rate the Sharpe ratio is computed against.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub start_time: Timestamp,
    pub starting_equity: Decimal,
    pub risk_free_return: Decimal,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            start_time: Timestamp::ZERO,
            starting_equity: Decimal::ZERO,
            risk_free_return: Decimal::ZERO,
        }
    }
}

/// Engine-level processing statistics, distinct from the trading statistics in
/// [`BacktestResults`].
#[derive(Debug, Clone, Default)]
pub struct EngineStats {
    pub events_processed: u64,
    pub orders_submitted: u64,
    pub orders_filled: u64,
    pub orders_rejected: u64,
    pub processing_time: WallDuration,
}

impl EngineStats {
    pub fn events_per_second(&self) -> f64 {
        let secs = self.processing_time.as_secs_f64();
        if secs > 0.0 {
            self.events_processed as f64 / secs
        } else {
            0.0
        }
    }
}

/// The engine-owned handle passed to every [`Strategy`] callback. Carries the simulated
/// time the callback is running at and lets the strategy emit signals or request a timer
/// without holding any reference back into the engine.
struct EngineContext<'a> {
    now: Timestamp,
    strategy_id: StrategyId,
    clock: &'a mut SimClock,
    signals: &'a mut Vec<Signal>,
    timer_queue: Arc<Mutex<VecDeque<(StrategyId, Timestamp)>>>,
}

impl<'a> StrategyContext for EngineContext<'a> {
    fn now(&self) -> Timestamp {
        self.now
    }

    fn emit_signal(&mut self, signal: Signal) {
        self.signals.push(signal);
    }

    fn schedule_timer(&mut self, at: Timestamp) {
        let strategy_id = self.strategy_id.clone();
        let queue = self.timer_queue.clone();
        self.clock.schedule(
            at,
            Box::new(move |fired_at| {
                queue.lock().push_back((strategy_id.clone(), fired_at));
            }),
        );
    }
}

/// Builds an [`Engine`] from tick data, strategies and configuration.
pub struct EngineBuilder {
    tick_store: TickStore,
    strategies: Vec<Box<dyn Strategy>>,
    cost_model: CostModel,
    sizing: Box<dyn SizingPolicy + Send + Sync>,
    risk_limits: RiskLimits,
    strategy_risk_limits: HashMap<StrategyId, RiskLimits>,
    latency: LatencyConfig,
    config: EngineConfig,
    progress_callback: Option<Box<dyn FnMut(f64) + Send>>,
    update_callback: Option<Box<dyn FnMut(&BacktestResults) + Send>>,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self {
            tick_store: TickStore::new(),
            strategies: Vec::new(),
            cost_model: CostModel::new(LinearSlippage {
                base: Decimal::ZERO,
                impact: Decimal::ZERO,
            }),
            sizing: Box::new(UnitSizer),
            risk_limits: RiskLimits::default(),
            strategy_risk_limits: HashMap::new(),
            latency: LatencyConfig::default(),
            config: EngineConfig::default(),
            progress_callback: None,
            update_callback: None,
        }
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingests ticks for one instrument. A book is registered for every instrument seen
    /// here once [`Self::build`] runs.
    pub fn add_ticks(mut self, instrument: InstrumentId, ticks: impl IntoIterator<Item = Tick>) -> Self {
        self.tick_store.append_batch(instrument, ticks);
        self
    }

    pub fn add_strategy(mut self, strategy: impl Strategy + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    pub fn set_cost_model(mut self, cost_model: CostModel) -> Self {
        self.cost_model = cost_model;
        self
    }

    pub fn set_sizing(mut self, sizing: impl SizingPolicy + Send + Sync + 'static) -> Self {
        self.sizing = Box::new(sizing);
        self
    }

    pub fn set_risk_limits(mut self, limits: RiskLimits) -> Self {
        self.risk_limits = limits;
        self
    }

    pub fn set_strategy_risk_limits(mut self, strategy: StrategyId, limits: RiskLimits) -> Self {
        self.strategy_risk_limits.insert(strategy, limits);
        self
    }

    pub fn configure_latency(mut self, market_data_latency: Duration, order_latency: Duration) -> Self {
        self.latency = LatencyConfig {
            market_data_latency,
            order_latency,
        };
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn set_progress_callback(mut self, callback: impl FnMut(f64) + Send + 'static) -> Self {
        self.progress_callback = Some(Box::new(callback));
        self
    }

    pub fn set_update_callback(mut self, callback: impl FnMut(&BacktestResults) + Send + 'static) -> Self {
        self.update_callback = Some(Box::new(callback));
        self
    }

    pub fn build(self) -> Engine {
        let mut execution = ExecutionHandler::new(self.cost_model, self.latency);
        execution.set_sizing(self.sizing);

        let instruments: Vec<InstrumentId> = self.tick_store.instruments().cloned().collect();
        for instrument in instruments {
            execution.register_book(instrument);
        }

        let mut risk = RiskManager::new(self.risk_limits);
        for (strategy, limits) in self.strategy_risk_limits {
            risk.set_strategy_limits(strategy, limits);
        }

        let mut strategy_index = HashMap::new();
        for (idx, strategy) in self.strategies.iter().enumerate() {
            strategy_index.insert(strategy.id().clone(), idx);
        }

        Engine {
            tick_store: self.tick_store,
            clock: SimClock::new(self.config.start_time),
            bus: EventBus::new(),
            risk,
            execution,
            analytics: TradingSummaryGenerator::init(
                self.config.risk_free_return,
                self.config.start_time,
                self.config.starting_equity,
            ),
            strategies: self.strategies,
            strategy_index,
            pending_signals: Vec::new(),
            order_queue: Arc::new(Mutex::new(VecDeque::new())),
            timer_queue: Arc::new(Mutex::new(VecDeque::new())),
            visible_tick_queue: Arc::new(Mutex::new(VecDeque::new())),
            config: self.config,
            stats: EngineStats::default(),
            initialized: false,
            paused: AtomicBool::new(false),
            stop_requested: AtomicBool::new(false),
            running: AtomicBool::new(false),
            progress_callback: self.progress_callback,
            update_callback: self.update_callback,
        }
    }
}

enum LifecycleHook {
    Initialize,
    Start,
    Stop,
}

enum RejectReason {
    UnknownInstrument,
    Risk(Violation),
}

/// Wires a [`TickStore`], [`SimClock`], [`EventBus`], [`RiskManager`], [`ExecutionHandler`]
/// and a set of [`Strategy`]s into a single-threaded, reproducible backtest loop.
pub struct Engine {
    tick_store: TickStore,
    clock: SimClock,
    bus: EventBus,
    risk: RiskManager,
    execution: ExecutionHandler,
    analytics: TradingSummaryGenerator,
    strategies: Vec<Box<dyn Strategy>>,
    strategy_index: HashMap<StrategyId, usize>,
    pending_signals: Vec<Signal>,
    order_queue: Arc<Mutex<VecDeque<OrderId>>>,
    timer_queue: Arc<Mutex<VecDeque<(StrategyId, Timestamp)>>>,
    visible_tick_queue: Arc<Mutex<VecDeque<Tick>>>,
    config: EngineConfig,
    stats: EngineStats,
    initialized: bool,
    paused: AtomicBool,
    stop_requested: AtomicBool,
    running: AtomicBool,
    progress_callback: Option<Box<dyn FnMut(f64) + Send>>,
    update_callback: Option<Box<dyn FnMut(&BacktestResults) + Send>>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("strategies", &self.strategies.len())
            .field("stats", &self.stats)
            .field("running", &self.running.load(Ordering::Relaxed))
            .finish()
    }
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Ingests ticks for one instrument after construction, registering a book for it if
    /// this is the first time it has been seen.
    pub fn add_ticks(&mut self, instrument: InstrumentId, ticks: impl IntoIterator<Item = Tick>) {
        self.execution.register_book(instrument.clone());
        self.tick_store.append_batch(instrument, ticks);
    }

    pub fn add_strategy(&mut self, strategy: impl Strategy + 'static) {
        let boxed: Box<dyn Strategy> = Box::new(strategy);
        self.strategy_index.insert(boxed.id().clone(), self.strategies.len());
        self.strategies.push(boxed);
    }

    pub fn set_cost_model(&mut self, cost_model: CostModel) {
        self.execution.set_cost_model(cost_model);
    }

    pub fn set_risk_limits(&mut self, limits: RiskLimits) {
        self.risk.set_global_limits(limits);
    }

    pub fn set_strategy_risk_limits(&mut self, strategy: StrategyId, limits: RiskLimits) {
        self.risk.set_strategy_limits(strategy, limits);
    }

    pub fn configure_latency(&mut self, market_data_latency: Duration, order_latency: Duration) {
        self.execution.set_latency(LatencyConfig {
            market_data_latency,
            order_latency,
        });
    }

    pub fn set_progress_callback(&mut self, callback: impl FnMut(f64) + Send + 'static) {
        self.progress_callback = Some(Box::new(callback));
    }

    pub fn set_update_callback(&mut self, callback: impl FnMut(&BacktestResults) + Send + 'static) {
        self.update_callback = Some(Box::new(callback));
    }

    /// The bus every `MarketEvent`/`SignalEvent`/`OrderEvent`/`FillEvent`/`RiskEvent`/
    /// `TimerEvent` is published to, for external observers.
    pub fn event_bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn results(&self) -> BacktestResults {
        self.analytics.generate()
    }

    pub fn stats(&self) -> EngineStats {
        self.stats.clone()
    }

    /// Clears all run state — clock, order books, risk accounting, analytics, engine
    /// statistics and control flags — while configuration (risk limits, cost model,
    /// latency, registered strategies and ticks) survives, so a second [`Self::run`] with
    /// identical input reproduces an identical [`BacktestResults`] (property 6).
    pub fn reset(&mut self, start_time: Timestamp) {
        self.clock.reset(start_time);
        self.execution.reset();
        self.risk.reset_state();
        self.analytics = TradingSummaryGenerator::init(
            self.config.risk_free_return,
            start_time,
            self.config.starting_equity,
        );
        self.stats = EngineStats::default();
        self.order_queue.lock().clear();
        self.timer_queue.lock().clear();
        self.visible_tick_queue.lock().clear();
        self.pending_signals.clear();
        self.stop_requested.store(false, Ordering::SeqCst);
        self.paused.store(false, Ordering::SeqCst);
        self.initialized = false;
    }

    /// Replays every tick currently in the store.
    pub fn run(&mut self) -> Result<(), EngineError> {
        self.tick_store.sort_by_time();
        let Some((start, end)) = full_span(self.tick_store.all_ticks()) else {
            return Ok(());
        };
        self.run_range(start, end)
    }

    /// Replays only ticks with `start <= timestamp <= end`.
    pub fn run_range(&mut self, start: Timestamp, end: Timestamp) -> Result<(), EngineError> {
        let started_at = Instant::now();
        self.tick_store.sort_by_time();
        self.running.store(true, Ordering::SeqCst);
        self.stop_requested.store(false, Ordering::SeqCst);

        if !self.initialized {
            self.run_lifecycle_hook(LifecycleHook::Initialize);
            self.run_lifecycle_hook(LifecycleHook::Start);
            self.initialized = true;
        }

        let ticks = merge_ticks(self.tick_store.all_ticks(), start, end);
        let total = ticks.len().max(1);

        for (processed, tick) in ticks.into_iter().enumerate() {
            while self.paused.load(Ordering::SeqCst) && !self.stop_requested.load(Ordering::SeqCst) {
                std::hint::spin_loop();
            }
            if self.stop_requested.load(Ordering::SeqCst) {
                debug!("stop requested; halting replay before next tick");
                break;
            }

            self.clock.advance_to(tick.timestamp)?;
            self.analytics.update_time_now(tick.timestamp);
            self.drain_order_deliveries()?;
            self.drain_timers();
            self.drain_visible_ticks();
            self.schedule_tick_visibility(tick);

            self.stats.events_processed += 1;
            self.report_progress(processed + 1, total);
        }

        while let Some(due) = self.clock.next_event_time() {
            self.clock.advance_to(due.max(end))?;
            self.analytics.update_time_now(self.clock.now());
            self.drain_order_deliveries()?;
            self.drain_timers();
            self.drain_visible_ticks();
        }

        self.run_lifecycle_hook(LifecycleHook::Stop);
        self.running.store(false, Ordering::SeqCst);
        self.stats.processing_time = started_at.elapsed();

        if self.update_callback.is_some() {
            let results = self.analytics.generate();
            if let Some(callback) = self.update_callback.as_mut() {
                callback(&results);
            }
        }

        Ok(())
    }

    fn run_lifecycle_hook(&mut self, hook: LifecycleHook) {
        let now = self.clock.now();
        let Engine {
            strategies,
            clock,
            pending_signals,
            timer_queue,
            ..
        } = self;
        for strategy in strategies.iter_mut() {
            let mut ctx = EngineContext {
                now,
                strategy_id: strategy.id().clone(),
                clock,
                signals: pending_signals,
                timer_queue: timer_queue.clone(),
            };
            match hook {
                LifecycleHook::Initialize => strategy.initialize(&mut ctx),
                LifecycleHook::Start => strategy.on_start(&mut ctx),
                LifecycleHook::Stop => strategy.on_stop(&mut ctx),
            }
        }
        self.route_pending_signals();
    }

    /// Delivers every order whose `order_latency` has elapsed as of `clock.now()`:
    /// matches it against its book, attaches commission via the cost model, feeds the
    /// summary generator and risk manager, and publishes/dispatches the resulting fills.
    fn drain_order_deliveries(&mut self) -> Result<(), EngineError> {
        let due: Vec<OrderId> = self.order_queue.lock().drain(..).collect();
        for order_id in due {
            let now = self.clock.now();
            let executed = self.execution.deliver(order_id, now)?;
            for executed_fill in executed {
                self.stats.orders_filled += 1;
                self.analytics.update_fill(&executed_fill);
                self.risk.on_fill(&executed_fill.fill);
                self.bus.publish_sync(Event::Fill(FillEvent {
                    timestamp: executed_fill.fill.timestamp,
                    fill: executed_fill.fill.clone(),
                }));
                self.dispatch_fill(&executed_fill.fill);
            }
        }
        Ok(())
    }

    /// Fires every strategy timer due as of `clock.now()`.
    fn drain_timers(&mut self) {
        let due: Vec<(StrategyId, Timestamp)> = self.timer_queue.lock().drain(..).collect();
        for (strategy_id, due_at) in due {
            self.bus.publish_sync(Event::Timer(TimerEvent { timestamp: due_at }));
            if let Some(&idx) = self.strategy_index.get(&strategy_id) {
                let Engine {
                    strategies,
                    clock,
                    pending_signals,
                    timer_queue,
                    ..
                } = self;
                let strategy = &mut strategies[idx];
                let mut ctx = EngineContext {
                    now: due_at,
                    strategy_id: strategy.id().clone(),
                    clock,
                    signals: pending_signals,
                    timer_queue: timer_queue.clone(),
                };
                strategy.on_timer(due_at, &mut ctx);
            }
        }
        self.route_pending_signals();
    }

    /// Dispatches every tick whose `market_data_latency` has elapsed as of `clock.now()`.
    fn drain_visible_ticks(&mut self) {
        let due: Vec<Tick> = self.visible_tick_queue.lock().drain(..).collect();
        for tick in due {
            self.publish_and_dispatch_market_data(&tick);
        }
    }

    /// Schedules `tick` to become visible to strategies `market_data_latency` after its
    /// own timestamp.
    fn schedule_tick_visibility(&mut self, tick: Tick) {
        let latency = self.execution.market_data_latency();
        let queue = self.visible_tick_queue.clone();
        let due_at = self.clock.now() + latency;
        self.clock.schedule(
            due_at,
            Box::new(move |_now| {
                queue.lock().push_back(tick.clone());
            }),
        );
    }

    /// Seeds ambient liquidity from the tick's bid/ask, publishes the `MarketEvent`, and
    /// lets every non-paused strategy react.
    fn publish_and_dispatch_market_data(&mut self, tick: &Tick) {
        let now = self.clock.now();
        self.execution.sync_quote_from_tick(tick);
        self.bus.publish_sync(Event::Market(MarketEvent {
            timestamp: tick.timestamp,
            tick: tick.clone(),
        }));

        let Engine {
            strategies,
            clock,
            pending_signals,
            timer_queue,
            ..
        } = self;
        for strategy in strategies.iter_mut() {
            if strategy.is_paused() {
                continue;
            }
            let mut ctx = EngineContext {
                now,
                strategy_id: strategy.id().clone(),
                clock,
                signals: pending_signals,
                timer_queue: timer_queue.clone(),
            };
            strategy.on_market_data(tick, &mut ctx);
        }

        self.route_pending_signals();
    }

    fn dispatch_fill(&mut self, fill: &Fill) {
        let now = self.clock.now();
        if let Some(&idx) = self.strategy_index.get(&fill.strategy) {
            let Engine {
                strategies,
                clock,
                pending_signals,
                timer_queue,
                ..
            } = self;
            let strategy = &mut strategies[idx];
            let mut ctx = EngineContext {
                now,
                strategy_id: strategy.id().clone(),
                clock,
                signals: pending_signals,
                timer_queue: timer_queue.clone(),
            };
            strategy.on_fill(fill, &mut ctx);
        }
        self.route_pending_signals();
    }

    fn dispatch_risk_event(&mut self, event: &RiskEvent) {
        let Some(violation) = event.violation.as_ref() else {
            return;
        };
        if let Some(&idx) = self.strategy_index.get(&event.strategy) {
            let Engine {
                strategies,
                clock,
                pending_signals,
                timer_queue,
                ..
            } = self;
            let strategy = &mut strategies[idx];
            let mut ctx = EngineContext {
                now: event.timestamp,
                strategy_id: strategy.id().clone(),
                clock,
                signals: pending_signals,
                timer_queue: timer_queue.clone(),
            };
            strategy.on_risk_event(violation, &mut ctx);
        }
    }

    fn route_pending_signals(&mut self) {
        let signals: Vec<Signal> = std::mem::take(&mut self.pending_signals);
        for signal in signals {
            self.route_signal(signal);
        }
    }

    /// Signal -> order -> risk check -> (reject | submit + schedule delivery).
    fn route_signal(&mut self, signal: Signal) {
        let now = self.clock.now();
        self.bus.publish_sync(Event::Signal(SignalEvent {
            timestamp: now,
            strategy: signal.strategy.clone(),
            signal: signal.clone(),
        }));

        let Some(order) = self.execution.build_order(&signal, now) else {
            return;
        };

        if !self.execution.has_book(&order.instrument) {
            self.reject_order(order, RejectReason::UnknownInstrument);
            return;
        }

        if let Some(violation) = self.risk.check(&order) {
            self.reject_order(order, RejectReason::Risk(violation));
            return;
        }

        self.risk.on_order_submitted(&order);
        self.stats.orders_submitted += 1;
        self.bus.publish_sync(Event::Order(OrderEvent {
            timestamp: now,
            order: order.clone(),
        }));

        let order_id = order.id;
        self.execution.submit(order);

        let queue = self.order_queue.clone();
        let due_at = now + self.execution.order_latency();
        self.clock.schedule(
            due_at,
            Box::new(move |_now| {
                queue.lock().push_back(order_id);
            }),
        );
    }

    fn reject_order(&mut self, mut order: Order, reason: RejectReason) {
        order.reject();
        self.stats.orders_rejected += 1;
        let now = self.clock.now();

        let (violation, message) = match reason {
            RejectReason::UnknownInstrument => (
                None,
                format!(
                    "order {} references unknown instrument {}",
                    order.id, order.instrument
                ),
            ),
            RejectReason::Risk(violation) => {
                let message = violation.to_string();
                (Some(violation), message)
            }
        };

        let event = RiskEvent {
            timestamp: now,
            strategy: order.strategy.clone(),
            violation,
            message,
        };
        warn!(strategy = %event.strategy, message = %event.message, "order rejected");
        self.bus.publish_sync(Event::Risk(event.clone()));
        self.dispatch_risk_event(&event);
    }

    fn report_progress(&mut self, processed: usize, total: usize) {
        let Some(callback) = self.progress_callback.as_mut() else {
            return;
        };
        let step = (total / 100).max(1);
        if processed % step == 0 || processed == total {
            callback(processed as f64 / total as f64);
        }
    }
}

/// The earliest and latest timestamp across every instrument's series, assuming each
/// series is already sorted.
fn full_span(series_by_instrument: &FnvHashMap<InstrumentId, TickSeries>) -> Option<(Timestamp, Timestamp)> {
    let mut span: Option<(Timestamp, Timestamp)> = None;
    for series in series_by_instrument.values() {
        let (Some(first), Some(last)) = (series.at(0), series.at(series.len().saturating_sub(1))) else {
            continue;
        };
        span = Some(match span {
            None => (first.timestamp, last.timestamp),
            Some((min, max)) => (std::cmp::min(min, first.timestamp), std::cmp::max(max, last.timestamp)),
        });
    }
    span
}

/// K-way merges every instrument's (already range-filtered) tick series into a single
/// time-ordered sequence, tie-breaking equal timestamps by instrument id for a
/// deterministic total order.
fn merge_ticks(
    series_by_instrument: &FnvHashMap<InstrumentId, TickSeries>,
    start: Timestamp,
    end: Timestamp,
) -> Vec<Tick> {
    use std::cmp::Reverse;
    use std::collections::BinaryHeap;

    let mut cursors: Vec<(InstrumentId, Vec<Tick>, usize)> = series_by_instrument
        .iter()
        .map(|(instrument, series)| {
            let ticks: Vec<Tick> = series.range(start, end).into_iter().cloned().collect();
            (instrument.clone(), ticks, 0usize)
        })
        .filter(|(_, ticks, _)| !ticks.is_empty())
        .collect();

    let mut heap: BinaryHeap<Reverse<(Timestamp, InstrumentId, usize)>> = BinaryHeap::new();
    for (idx, (instrument, ticks, _)) in cursors.iter().enumerate() {
        heap.push(Reverse((ticks[0].timestamp, instrument.clone(), idx)));
    }

    let mut merged = Vec::with_capacity(cursors.iter().map(|(_, ticks, _)| ticks.len()).sum());
    while let Some(Reverse((_, _, idx))) = heap.pop() {
        let (instrument, ticks, pos) = &mut cursors[idx];
        merged.push(ticks[*pos].clone());
        *pos += 1;
        if *pos < ticks.len() {
            heap.push(Reverse((ticks[*pos].timestamp, instrument.clone(), idx)));
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use backtest_execution::Signal;
    use backtest_markets::{OrderStatus, OrderType, Side, SignalKind};
    use backtest_risk::Violation;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use std::sync::atomic::AtomicUsize;

    fn tick(instrument: &InstrumentId, ts: i64, bid: Decimal, ask: Decimal) -> Tick {
        Tick::new(
            Timestamp(ts),
            instrument.clone(),
            bid,
            100,
            ask,
            100,
            (bid + ask) / dec!(2),
            1,
            bid,
            ask,
            bid,
            ask,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        )
    }

    #[derive(Debug)]
    struct RecordingStrategy {
        id: StrategyId,
        instrument: InstrumentId,
        paused: bool,
        entered: bool,
        fills_seen: Arc<AtomicUsize>,
    }

    impl Strategy for RecordingStrategy {
        fn id(&self) -> &StrategyId {
            &self.id
        }

        fn is_paused(&self) -> bool {
            self.paused
        }

        fn set_paused(&mut self, paused: bool) {
            self.paused = paused;
        }

        fn on_market_data(&mut self, tick: &Tick, ctx: &mut dyn StrategyContext) {
            if self.entered || tick.instrument != self.instrument {
                return;
            }
            self.entered = true;
            ctx.emit_signal(Signal {
                strategy: self.id.clone(),
                instrument: self.instrument.clone(),
                kind: SignalKind::Buy,
                strength: Decimal::ONE,
            });
        }

        fn on_fill(&mut self, _fill: &Fill, _ctx: &mut dyn StrategyContext) {
            self.fills_seen.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Debug)]
    struct TimerStrategy {
        id: StrategyId,
        scheduled: bool,
        fired: Arc<AtomicBool>,
    }

    impl Strategy for TimerStrategy {
        fn id(&self) -> &StrategyId {
            &self.id
        }

        fn is_paused(&self) -> bool {
            false
        }

        fn set_paused(&mut self, _paused: bool) {}

        fn on_market_data(&mut self, _tick: &Tick, ctx: &mut dyn StrategyContext) {
            if !self.scheduled {
                self.scheduled = true;
                ctx.schedule_timer(ctx.now() + Duration::from_secs(5));
            }
        }

        fn on_timer(&mut self, _now: Timestamp, _ctx: &mut dyn StrategyContext) {
            self.fired.store(true, Ordering::SeqCst);
        }
    }

    #[derive(Debug)]
    struct UnknownInstrumentStrategy {
        id: StrategyId,
        fired: bool,
    }

    impl Strategy for UnknownInstrumentStrategy {
        fn id(&self) -> &StrategyId {
            &self.id
        }

        fn is_paused(&self) -> bool {
            false
        }

        fn set_paused(&mut self, _paused: bool) {}

        fn on_market_data(&mut self, _tick: &Tick, ctx: &mut dyn StrategyContext) {
            if self.fired {
                return;
            }
            self.fired = true;
            ctx.emit_signal(Signal {
                strategy: self.id.clone(),
                instrument: InstrumentId::new("NOBOOK"),
                kind: SignalKind::Buy,
                strength: Decimal::ONE,
            });
        }
    }

    #[test]
    fn run_matches_market_order_against_tick_liquidity() {
        let instrument = InstrumentId::new("PETR4");
        let fills_seen = Arc::new(AtomicUsize::new(0));

        let mut engine = Engine::builder()
            .add_ticks(
                instrument.clone(),
                vec![
                    tick(&instrument, 0, dec!(9.9), dec!(10.1)),
                    tick(&instrument, 1_000_000_000, dec!(9.9), dec!(10.1)),
                ],
            )
            .add_strategy(RecordingStrategy {
                id: StrategyId::new("s1"),
                instrument: instrument.clone(),
                paused: false,
                entered: false,
                fills_seen: fills_seen.clone(),
            })
            .build();

        engine.run().unwrap();

        assert_eq!(engine.stats().orders_submitted, 1);
        assert_eq!(engine.stats().orders_filled, 1);
        assert_eq!(fills_seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unknown_instrument_is_rejected_without_reaching_risk_manager() {
        let instrument = InstrumentId::new("PETR4");
        let mut engine = Engine::builder()
            .add_ticks(instrument.clone(), vec![tick(&instrument, 0, dec!(9.9), dec!(10.1))])
            .add_strategy(UnknownInstrumentStrategy {
                id: StrategyId::new("s1"),
                fired: false,
            })
            .build();

        engine.run().unwrap();

        assert_eq!(engine.stats().orders_submitted, 0);
        assert_eq!(engine.stats().orders_rejected, 1);
    }

    #[test]
    fn strategy_timer_fires_after_scheduled_delay() {
        let instrument = InstrumentId::new("PETR4");
        let fired = Arc::new(AtomicBool::new(false));

        let mut engine = Engine::builder()
            .add_ticks(
                instrument.clone(),
                vec![
                    tick(&instrument, 0, dec!(9.9), dec!(10.1)),
                    tick(&instrument, 10_000_000_000, dec!(9.9), dec!(10.1)),
                ],
            )
            .add_strategy(TimerStrategy {
                id: StrategyId::new("s1"),
                scheduled: false,
                fired: fired.clone(),
            })
            .build();

        engine.run().unwrap();
        assert!(fired.load(Ordering::SeqCst));
    }

    #[test]
    fn run_then_reset_then_run_is_deterministic() {
        let instrument = InstrumentId::new("PETR4");
        let ticks = vec![
            tick(&instrument, 0, dec!(9.9), dec!(10.1)),
            tick(&instrument, 1_000_000_000, dec!(10.9), dec!(11.1)),
        ];

        let mut engine = Engine::builder()
            .add_ticks(instrument.clone(), ticks)
            .add_strategy(RecordingStrategy {
                id: StrategyId::new("s1"),
                instrument: instrument.clone(),
                paused: false,
                entered: false,
                fills_seen: Arc::new(AtomicUsize::new(0)),
            })
            .build();

        engine.run().unwrap();
        let first = engine.results();

        engine.reset(Timestamp::ZERO);
        engine.run().unwrap();
        let second = engine.results();

        assert_eq!(first, second);
    }

    #[test]
    fn second_run_without_reset_is_a_fatal_clock_rewind() {
        let instrument = InstrumentId::new("PETR4");
        let ticks = vec![
            tick(&instrument, 0, dec!(9.9), dec!(10.1)),
            tick(&instrument, 1_000_000_000, dec!(10.9), dec!(11.1)),
        ];

        let mut engine = Engine::builder().add_ticks(instrument, ticks).build();

        engine.run().unwrap();
        let err = engine.run().unwrap_err();
        assert!(matches!(err, EngineError::ClockRewind(_)));
    }

    #[test]
    fn order_status_transitions_through_a_full_fill() {
        let mut order = Order::new(
            OrderId(1),
            Timestamp(0),
            InstrumentId::new("PETR4"),
            StrategyId::new("s1"),
            Side::Buy,
            OrderType::Market,
            10,
            None,
            None,
        );
        assert_eq!(order.status, OrderStatus::Pending);
        order.apply_fill(10);
        assert_eq!(order.status, OrderStatus::Filled);
    }

    #[test]
    fn violation_display_is_human_readable() {
        let violation = Violation::OrderSize {
            value: dec!(20),
            limit: dec!(10),
        };
        assert!(violation.to_string().contains("order size"));
    }
}
