//! A minimal reference strategy: buys once on the first tick for its instrument, then holds.

use crate::{Strategy, StrategyContext};
use backtest_execution::Signal;
use backtest_markets::{InstrumentId, SignalKind, StrategyId, Tick};
use rust_decimal::Decimal;
use tracing::debug;

/// Emits a single `buy` signal of unit strength the first time it sees a tick for its
/// instrument, and never trades again.
#[derive(Debug, Clone)]
pub struct BuyAndHoldStrategy {
    id: StrategyId,
    instrument: InstrumentId,
    paused: bool,
    entered: bool,
}

impl BuyAndHoldStrategy {
    pub fn new(id: StrategyId, instrument: InstrumentId) -> Self {
        Self {
            id,
            instrument,
            paused: false,
            entered: false,
        }
    }
}

impl Strategy for BuyAndHoldStrategy {
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
        self.entered = false;
    }

    fn on_market_data(&mut self, tick: &Tick, ctx: &mut dyn StrategyContext) {
        if self.entered || tick.instrument != self.instrument {
            return;
        }
        self.entered = true;
        debug!(strategy = %self.id, instrument = %self.instrument, "entering position");
        ctx.emit_signal(Signal {
            strategy: self.id.clone(),
            instrument: self.instrument.clone(),
            kind: SignalKind::Buy,
            strength: Decimal::ONE,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backtest_markets::Timestamp;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    struct RecordingContext {
        now: Timestamp,
        signals: Vec<Signal>,
    }

    impl StrategyContext for RecordingContext {
        fn now(&self) -> Timestamp {
            self.now
        }

        fn emit_signal(&mut self, signal: Signal) {
            self.signals.push(signal);
        }

        fn schedule_timer(&mut self, _at: Timestamp) {}
    }

    fn tick(instrument: InstrumentId) -> Tick {
        Tick::new(
            Timestamp(0),
            instrument,
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
    fn enters_once_and_never_again() {
        let instrument = InstrumentId::new("PETR4");
        let mut strategy = BuyAndHoldStrategy::new(StrategyId::new("bh"), instrument.clone());
        let mut ctx = RecordingContext {
            now: Timestamp(0),
            signals: Vec::new(),
        };

        strategy.on_market_data(&tick(instrument.clone()), &mut ctx);
        strategy.on_market_data(&tick(instrument), &mut ctx);

        assert_eq!(ctx.signals.len(), 1);
        assert_eq!(ctx.signals[0].kind, SignalKind::Buy);
    }

    #[test]
    fn ignores_ticks_for_other_instruments() {
        let instrument = InstrumentId::new("PETR4");
        let mut strategy = BuyAndHoldStrategy::new(StrategyId::new("bh"), instrument);
        let mut ctx = RecordingContext {
            now: Timestamp(0),
            signals: Vec::new(),
        };

        strategy.on_market_data(&tick(InstrumentId::new("VALE3")), &mut ctx);
        assert!(ctx.signals.is_empty());
    }
}
