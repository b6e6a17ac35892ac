//! A short/long moving-average crossover reference strategy.

use crate::{Strategy, StrategyContext};
use backtest_execution::Signal;
use backtest_markets::{InstrumentId, Price, SignalKind, StrategyId, Tick};
use rust_decimal::Decimal;
use std::collections::VecDeque;
use tracing::debug;

/// Tracks rolling short- and long-window averages of `tick.last` and emits a `buy` signal
/// on a bullish crossover (short crosses above long) and a `close` signal on a bearish one.
#[derive(Debug, Clone)]
pub struct MovingAverageCrossoverStrategy {
    id: StrategyId,
    instrument: InstrumentId,
    short_window: usize,
    long_window: usize,
    prices: VecDeque<Price>,
    was_short_above_long: Option<bool>,
    paused: bool,
}

impl MovingAverageCrossoverStrategy {
    pub fn new(id: StrategyId, instrument: InstrumentId, short_window: usize, long_window: usize) -> Self {
        assert!(short_window > 0 && short_window < long_window, "short_window must be in (0, long_window)");
        Self {
            id,
            instrument,
            short_window,
            long_window,
            prices: VecDeque::with_capacity(long_window),
            was_short_above_long: None,
            paused: false,
        }
    }

    fn average(&self, window: usize) -> Option<Decimal> {
        if self.prices.len() < window {
            return None;
        }
        let sum: Decimal = self.prices.iter().rev().take(window).sum();
        Some(sum / Decimal::from(window as u64))
    }
}

impl Strategy for MovingAverageCrossoverStrategy {
    fn id(&self) -> &StrategyId {
        &self.id
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    fn on_start(&mut self, _ctx: &mut dyn StrategyContext) {
        self.prices.clear();
        self.was_short_above_long = None;
    }

    fn on_market_data(&mut self, tick: &Tick, ctx: &mut dyn StrategyContext) {
        if tick.instrument != self.instrument {
            return;
        }

        self.prices.push_back(tick.last);
        if self.prices.len() > self.long_window {
            self.prices.pop_front();
        }

        let (Some(short), Some(long)) = (self.average(self.short_window), self.average(self.long_window)) else {
            return;
        };

        let short_above_long = short > long;
        let crossed = self.was_short_above_long.is_some_and(|was| was != short_above_long);
        self.was_short_above_long = Some(short_above_long);

        if !crossed {
            return;
        }

        let kind = if short_above_long {
            SignalKind::Buy
        } else {
            SignalKind::Close
        };
        debug!(strategy = %self.id, instrument = %self.instrument, short = %short, long = %long, "crossover");
        ctx.emit_signal(Signal {
            strategy: self.id.clone(),
            instrument: self.instrument.clone(),
            kind,
            strength: Decimal::ONE,
        });
    }
}
