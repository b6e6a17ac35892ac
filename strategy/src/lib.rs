#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    clippy::unused_self,
    clippy::useless_let_if_seq,
    missing_debug_implementations,
    rust_2018_idioms
)]
#![allow(clippy::type_complexity)]

//! # Strategy
//!
//! The [`Strategy`] trait: the engine's sole extension point. Strategies react
//! to market data, fills, risk events and timers, and emit signals/orders through the
//! engine-provided [`StrategyContext`] rather than by holding globals.

use backtest_markets::{StrategyId, Tick, Timestamp};
use backtest_execution::Signal;
use backtest_risk::Violation;

pub mod buy_and_hold;
pub mod moving_average;

pub use buy_and_hold::BuyAndHoldStrategy;
pub use moving_average::MovingAverageCrossoverStrategy;

/// The engine-owned handle a [`Strategy`] uses to act, rather than holding any global state.
pub trait StrategyContext {
    /// Simulated time at the moment the callback is running.
    fn now(&self) -> Timestamp;

    /// Emits a signal for the execution handler to size, risk-check and route.
    fn emit_signal(&mut self, signal: Signal);

    /// Requests an [`Strategy::on_timer`] callback for this strategy at `at`. Scheduling in
    /// the past fires on the engine's next clock advance rather than being rejected.
    fn schedule_timer(&mut self, at: Timestamp);
}

/// A strategy's identifier and optional initial state, plus the callbacks the engine
/// drives it with.
///
/// Only [`Strategy::on_market_data`] is required; every other callback has a no-op default.
/// Paused strategies (see [`Strategy::is_paused`]) do not receive market data.
pub trait Strategy: std::fmt::Debug + Send {
    fn id(&self) -> &StrategyId;

    fn is_paused(&self) -> bool;
    fn set_paused(&mut self, paused: bool);

    /// Called once before the first tick is replayed.
    fn initialize(&mut self, _ctx: &mut dyn StrategyContext) {}
    fn on_start(&mut self, _ctx: &mut dyn StrategyContext) {}
    fn on_stop(&mut self, _ctx: &mut dyn StrategyContext) {}

    fn on_pause(&mut self, _ctx: &mut dyn StrategyContext) {
        self.set_paused(true);
    }

    fn on_resume(&mut self, _ctx: &mut dyn StrategyContext) {
        self.set_paused(false);
    }

    /// Required: reacts to a tick for an instrument this strategy subscribes to.
    fn on_market_data(&mut self, tick: &Tick, ctx: &mut dyn StrategyContext);

    fn on_fill(&mut self, _fill: &backtest_markets::Fill, _ctx: &mut dyn StrategyContext) {}
    fn on_risk_event(&mut self, _violation: &Violation, _ctx: &mut dyn StrategyContext) {}
    fn on_timer(&mut self, _now: Timestamp, _ctx: &mut dyn StrategyContext) {}
}
