use backtest_markets::Timestamp;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A completed peak-to-trough-to-recovery move in an equity curve.
///
/// `value` is the fractional loss from `peak` to `trough`, i.e. `(peak - trough) / peak`.
#[derive(Debug, Clone, PartialEq, PartialOrd, Deserialize, Serialize)]
pub struct Drawdown {
    pub value: Decimal,
    pub start: Timestamp,
    pub end: Timestamp,
}

/// Incremental peak/trough tracker over an equity curve.
///
/// Feed it every new equity mark with [`Self::update`]. It emits a [`Drawdown`] only once
/// equity recovers back to (or above) the prior peak — a drawdown still in progress when the
/// run ends never completes, but its depth is still visible through [`Self::max_drawdown`],
/// which is updated on every call regardless of recovery.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawdownGenerator {
    peak: Decimal,
    peak_time: Timestamp,
    trough: Decimal,
    trough_time: Timestamp,
    in_drawdown: bool,
    max_drawdown_seen: Decimal,
}

impl DrawdownGenerator {
    /// Starts tracking from a known equity mark.
    pub fn init(starting_equity: Decimal, time: Timestamp) -> Self {
        Self {
            peak: starting_equity,
            peak_time: time,
            trough: starting_equity,
            trough_time: time,
            in_drawdown: false,
            max_drawdown_seen: Decimal::ZERO,
        }
    }

    /// Feeds a new equity mark, returning a completed [`Drawdown`] if equity just recovered
    /// to or above the running peak after having fallen below it.
    pub fn update(&mut self, equity: Decimal, time: Timestamp) -> Option<Drawdown> {
        if equity >= self.peak {
            let completed = self.in_drawdown.then(|| Drawdown {
                value: self.current_drawdown(),
                start: self.peak_time,
                end: time,
            });

            self.peak = equity;
            self.peak_time = time;
            self.trough = equity;
            self.trough_time = time;
            self.in_drawdown = false;

            completed
        } else {
            self.in_drawdown = true;
            if equity < self.trough {
                self.trough = equity;
                self.trough_time = time;
            }

            let depth = self.current_drawdown();
            if depth > self.max_drawdown_seen {
                self.max_drawdown_seen = depth;
            }

            None
        }
    }

    /// The deepest drawdown observed so far, whether or not it has recovered.
    pub fn max_drawdown(&self) -> Decimal {
        self.max_drawdown_seen
    }

    fn current_drawdown(&self) -> Decimal {
        if self.peak.is_zero() {
            Decimal::ZERO
        } else {
            (self.peak - self.trough) / self.peak
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn t(n: i64) -> Timestamp {
        Timestamp(n)
    }

    #[test]
    fn rising_equity_never_emits_a_drawdown() {
        let mut gen = DrawdownGenerator::init(dec!(100), t(0));
        assert_eq!(gen.update(dec!(110), t(1)), None);
        assert_eq!(gen.update(dec!(120), t(2)), None);
        assert_eq!(gen.max_drawdown(), Decimal::ZERO);
    }

    #[test]
    fn dip_and_recovery_emits_one_drawdown() {
        let mut gen = DrawdownGenerator::init(dec!(100), t(0));
        assert_eq!(gen.update(dec!(80), t(1)), None);
        let dd = gen.update(dec!(100), t(2)).expect("recovered to prior peak");
        assert_eq!(dd.value, dec!(0.2));
        assert_eq!(dd.start, t(0));
        assert_eq!(dd.end, t(2));
    }

    #[test]
    fn deeper_dip_updates_trough_before_recovery() {
        let mut gen = DrawdownGenerator::init(dec!(100), t(0));
        gen.update(dec!(90), t(1));
        gen.update(dec!(70), t(2));
        gen.update(dec!(85), t(3));
        let dd = gen.update(dec!(100), t(4)).unwrap();
        assert_eq!(dd.value, dec!(0.3));
    }

    #[test]
    fn unrecovered_drawdown_is_still_visible_via_max_drawdown() {
        let mut gen = DrawdownGenerator::init(dec!(100), t(0));
        assert_eq!(gen.update(dec!(75), t(1)), None);
        assert_eq!(gen.max_drawdown(), dec!(0.25));
    }

    #[test]
    fn new_peak_after_recovery_resets_tracking() {
        let mut gen = DrawdownGenerator::init(dec!(100), t(0));
        gen.update(dec!(80), t(1));
        gen.update(dec!(100), t(2));
        assert_eq!(gen.update(dec!(150), t(3)), None);
        assert_eq!(gen.update(dec!(120), t(4)), None);
        assert_eq!(gen.max_drawdown(), dec!(0.2));
    }
}
