//! Execution handler and order router.
//!
//! Owns one [`OrderBook`] per instrument and the [`CostModel`]. Pre-trade risk checking and
//! clock-driven latency scheduling are owned by `backtest-core`'s `Engine` (this crate sits
//! below `backtest-core` in the dependency graph and cannot reach back up to the clock or
//! the risk manager) — the engine calls [`ExecutionHandler::build_order`] and
//! [`ExecutionHandler::submit`] synchronously, schedules a clock callback for
//! `order_latency` later, and invokes [`ExecutionHandler::deliver`] from that callback.

use crate::book::{MatchingAlgorithm, OrderBook};
use crate::cost::CostModel;
use crate::error::{ExecResult, ExecutionError};
use backtest_markets::{
    Fill, InstrumentId, LatencyConfig, Order, OrderId, OrderType, Price, Side, SignalKind,
    StrategyId, Tick, Timestamp, Volume,
};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::warn;

/// Reserved order id for the synthetic resting bid [`ExecutionHandler::sync_quote_from_tick`]
/// maintains from tick data. Chosen from the high end of the `u64` space so it never collides
/// with a real, sequentially-allocated [`OrderId`].
pub const SYNTHETIC_BID_ID: OrderId = OrderId(u64::MAX);

/// Reserved order id for the synthetic resting ask, see [`SYNTHETIC_BID_ID`].
pub const SYNTHETIC_ASK_ID: OrderId = OrderId(u64::MAX - 1);

/// The synthetic top-of-book level last written for one instrument, so it can be removed
/// before the next tick's quote replaces it.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct SyntheticQuote {
    bid: Option<(Price, Volume)>,
    ask: Option<(Price, Volume)>,
}

/// A strategy's desired directional action on an instrument, before sizing.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub strategy: StrategyId,
    pub instrument: InstrumentId,
    pub kind: SignalKind,
    pub strength: Decimal,
}

/// Maps a [`Signal`]'s strength to an order quantity.
pub trait SizingPolicy: std::fmt::Debug {
    fn size(&self, signal: &Signal) -> Volume;
}

/// Always submits unit quantity, ignoring strength.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnitSizer;

impl SizingPolicy for UnitSizer {
    fn size(&self, _signal: &Signal) -> Volume {
        1
    }
}

/// Scales quantity with signal strength, always submitting at least one unit.
#[derive(Debug, Clone, Copy)]
pub struct StrengthScaledSizer {
    pub unit_size: Volume,
}

impl SizingPolicy for StrengthScaledSizer {
    fn size(&self, signal: &Signal) -> Volume {
        let scaled = (signal.strength.abs() * Decimal::from(self.unit_size))
            .round()
            .to_string()
            .parse::<u64>()
            .unwrap_or(self.unit_size);
        scaled.max(1)
    }
}

/// A fill together with the slippage component the cost model attributed to it.
///
/// `Fill::commission` already carries the commission leg; slippage is kept alongside
/// rather than folded into the fill price so callers can report the two separately.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedFill {
    pub fill: Fill,
    pub slippage: Decimal,
}

/// Owns the per-instrument order books and cost model; turns signals into orders and
/// orders into fills.
#[derive(Debug)]
pub struct ExecutionHandler {
    books: HashMap<InstrumentId, OrderBook>,
    cost_model: CostModel,
    sizing: Box<dyn SizingPolicy + Send + Sync>,
    latency: LatencyConfig,
    next_order_id: u64,
    pending: HashMap<OrderId, Order>,
    synthetic_quotes: HashMap<InstrumentId, SyntheticQuote>,
}

impl ExecutionHandler {
    pub fn new(cost_model: CostModel, latency: LatencyConfig) -> Self {
        Self {
            books: HashMap::new(),
            cost_model,
            sizing: Box::new(UnitSizer),
            latency,
            next_order_id: 0,
            pending: HashMap::new(),
            synthetic_quotes: HashMap::new(),
        }
    }

    pub fn with_sizing(mut self, sizing: impl SizingPolicy + Send + Sync + 'static) -> Self {
        self.sizing = Box::new(sizing);
        self
    }

    /// Same as [`Self::with_sizing`], for a policy that is already boxed (the engine builder
    /// stores sizing policies boxed so it can accept them ahead of a concrete `ExecutionHandler`).
    pub fn set_sizing(&mut self, sizing: Box<dyn SizingPolicy + Send + Sync>) {
        self.sizing = sizing;
    }

    pub fn register_book(&mut self, instrument: InstrumentId) {
        self.books
            .entry(instrument.clone())
            .or_insert_with(|| OrderBook::new(instrument, MatchingAlgorithm::PriceTime));
    }

    pub fn has_book(&self, instrument: &InstrumentId) -> bool {
        self.books.contains_key(instrument)
    }

    pub fn book(&self, instrument: &InstrumentId) -> Option<&OrderBook> {
        self.books.get(instrument)
    }

    pub fn cost_model(&self) -> &CostModel {
        &self.cost_model
    }

    pub fn cost_model_mut(&mut self) -> &mut CostModel {
        &mut self.cost_model
    }

    pub fn set_cost_model(&mut self, cost_model: CostModel) {
        self.cost_model = cost_model;
    }

    pub fn latency(&self) -> LatencyConfig {
        self.latency
    }

    pub fn set_latency(&mut self, latency: LatencyConfig) {
        self.latency = latency;
    }

    fn allocate_order_id(&mut self) -> OrderId {
        let id = OrderId(self.next_order_id);
        self.next_order_id += 1;
        id
    }

    /// Maps a non-hold signal to a new market order, sized by the configured
    /// [`SizingPolicy`]. Returns `None` for `hold` signals.
    pub fn build_order(&mut self, signal: &Signal, submitted_at: Timestamp) -> Option<Order> {
        let side = match signal.kind {
            SignalKind::Buy => backtest_markets::Side::Buy,
            SignalKind::Sell | SignalKind::Close => backtest_markets::Side::Sell,
            SignalKind::Hold => return None,
        };
        let quantity = self.sizing.size(signal);
        let id = self.allocate_order_id();
        Some(Order::new(
            id,
            submitted_at,
            signal.instrument.clone(),
            signal.strategy.clone(),
            side,
            OrderType::Market,
            quantity,
            None,
            None,
        ))
    }

    /// Refreshes the instrument's synthetic top-of-book quote from a tick's bid/ask, so a
    /// strategy's market order has ambient liquidity to trade against. The previous tick's
    /// synthetic levels are removed first; a zero size on either side leaves that side empty.
    /// No-op for an instrument with no registered book.
    pub fn sync_quote_from_tick(&mut self, tick: &Tick) {
        let Some(book) = self.books.get_mut(&tick.instrument) else {
            return;
        };
        let previous = self.synthetic_quotes.entry(tick.instrument.clone()).or_default();

        if let Some((price, qty)) = previous.bid.take() {
            let _ = book.remove(SYNTHETIC_BID_ID, Side::Buy, price, qty);
        }
        if let Some((price, qty)) = previous.ask.take() {
            let _ = book.remove(SYNTHETIC_ASK_ID, Side::Sell, price, qty);
        }

        if tick.bid_size > 0 {
            book.add(Side::Buy, tick.bid, SYNTHETIC_BID_ID, tick.bid_size);
            previous.bid = Some((tick.bid, tick.bid_size));
        }
        if tick.ask_size > 0 {
            book.add(Side::Sell, tick.ask, SYNTHETIC_ASK_ID, tick.ask_size);
            previous.ask = Some((tick.ask, tick.ask_size));
        }
    }

    /// Registers an approved order as pending delivery. The caller (the engine) is
    /// responsible for scheduling [`Self::deliver`] at `submitted_at + order_latency`.
    pub fn submit(&mut self, order: Order) {
        self.pending.insert(order.id, order);
    }

    pub fn pending_order(&self, id: OrderId) -> Option<&Order> {
        self.pending.get(&id)
    }

    /// Delivers a pending order to its book at `ts`, matching it and attaching commission.
    /// Removes the order from the pending set once it is done (filled, or resting after a
    /// partial limit match).
    pub fn deliver(&mut self, order_id: OrderId, ts: Timestamp) -> ExecResult<Vec<ExecutedFill>> {
        let mut order = self
            .pending
            .remove(&order_id)
            .ok_or(ExecutionError::UnknownOrder(order_id))?;

        let book = self
            .books
            .get_mut(&order.instrument)
            .ok_or_else(|| ExecutionError::UnknownInstrument(order.instrument.clone()))?;

        let kind = order.kind;
        let mut fills = match kind {
            OrderType::Market => book.match_market(&order, ts)?,
            OrderType::Limit => book.match_limit(&order, ts)?,
            // Triggering on the stop price crossing the tape is not implemented: no
            // component observes the book to arm the trigger, so these would otherwise
            // fall into `match_limit` and rest at a meaningless default price. Reject
            // cleanly instead, matching how an unsupported matching algorithm fails.
            OrderType::Stop | OrderType::StopLimit => {
                warn!(order = %order.id, order_type = ?kind, "stop trigger not implemented, rejecting");
                self.pending.insert(order.id, order);
                return Err(ExecutionError::NotImplemented(kind));
            }
        };

        let mut executed = Vec::with_capacity(fills.len());
        for fill in &mut fills {
            let aggressive = matches!(order.kind, OrderType::Market);
            let cost = self
                .cost_model
                .cost_of(&order.instrument, None, order.side, fill.quantity, fill.price, aggressive);
            fill.commission = cost.commission;
            order.apply_fill(fill.quantity);
            executed.push(ExecutedFill {
                fill: fill.clone(),
                slippage: cost.slippage,
            });
        }

        if !order.is_done() {
            self.pending.insert(order.id, order);
        }

        Ok(executed)
    }

    /// Clears all pending orders, empties every registered book and resets the order id
    /// counter. The cost model, sizing policy and latency configuration survive a reset —
    /// those are run configuration, not run state.
    pub fn reset(&mut self) {
        self.pending.clear();
        self.next_order_id = 0;
        self.synthetic_quotes.clear();
        for (instrument, book) in self.books.iter_mut() {
            *book = OrderBook::new(instrument.clone(), MatchingAlgorithm::PriceTime);
        }
    }

    pub fn order_latency(&self) -> backtest_markets::Duration {
        self.latency.order_latency
    }

    pub fn market_data_latency(&self) -> backtest_markets::Duration {
        self.latency.market_data_latency
    }
}
