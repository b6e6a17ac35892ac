//! Incremental run summary: [`TradingSummaryGenerator`] consumes every [`ExecutedFill`] the
//! engine routes during replay and produces a [`BacktestResults`] on demand.

use crate::metric::drawdown::DrawdownGenerator;
use crate::metric::profit_factor::ProfitFactor;
use crate::metric::sharpe::SharpeRatio;
use crate::metric::win_rate::WinRate;
use crate::time::Annual252;
use backtest_execution::ExecutedFill;
use backtest_markets::{InstrumentId, Position, StrategyId, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One closing or reducing fill, recorded once its realized P&L delta is known.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TradeRecord {
    pub strategy: StrategyId,
    pub instrument: InstrumentId,
    pub exit_time: Timestamp,
    pub realized_pnl: Decimal,
}

/// The final report of a completed (or in-progress) backtest run.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BacktestResults {
    pub start: Timestamp,
    pub end: Timestamp,
    pub total_pnl: Decimal,
    pub total_commission: Decimal,
    pub total_slippage: Decimal,
    pub trade_count: usize,
    pub win_count: usize,
    pub win_rate: Option<WinRate>,
    pub max_drawdown: Decimal,
    pub max_profit: Decimal,
    pub sharpe_ratio: Option<SharpeRatio<Annual252>>,
    pub profit_factor: Option<ProfitFactor>,
    pub strategy_pnl: HashMap<StrategyId, Decimal>,
    pub trades: Vec<TradeRecord>,
}

impl BacktestResults {
    pub fn duration(&self) -> backtest_markets::Duration {
        self.end - self.start
    }
}

/// Builds a [`BacktestResults`] incrementally as the engine routes fills during replay.
///
/// Tracks its own `(StrategyId, InstrumentId)` position map, separate from
/// `backtest_risk::RiskManager`'s — the two crates stay decoupled, each maintaining the
/// minimal position state it needs for its own job.
#[derive(Debug, Clone, PartialEq)]
pub struct TradingSummaryGenerator {
    risk_free_return: Decimal,
    start: Timestamp,
    now: Timestamp,
    positions: HashMap<(StrategyId, InstrumentId), Position>,
    drawdown: DrawdownGenerator,
    equity: Decimal,
    total_commission: Decimal,
    total_slippage: Decimal,
    strategy_pnl: HashMap<StrategyId, Decimal>,
    trades: Vec<TradeRecord>,
    gross_profit: Decimal,
    gross_loss: Decimal,
    trade_returns: Vec<Decimal>,
}

impl TradingSummaryGenerator {
    /// Starts a new summary with a given risk-free rate (used for the Sharpe ratio) and a
    /// starting equity mark (the drawdown curve's initial peak).
    pub fn init(risk_free_return: Decimal, start: Timestamp, starting_equity: Decimal) -> Self {
        Self {
            risk_free_return,
            start,
            now: start,
            positions: HashMap::new(),
            drawdown: DrawdownGenerator::init(starting_equity, start),
            equity: starting_equity,
            total_commission: Decimal::ZERO,
            total_slippage: Decimal::ZERO,
            strategy_pnl: HashMap::new(),
            trades: Vec::new(),
            gross_profit: Decimal::ZERO,
            gross_loss: Decimal::ZERO,
            trade_returns: Vec::new(),
        }
    }

    /// Feeds one executed fill into the running summary: updates the position for its
    /// `(strategy, instrument)` pair, accumulates commission and slippage, and — if the fill
    /// closed or reduced a position — records a [`TradeRecord`] and advances the equity curve.
    pub fn update_fill(&mut self, executed: &ExecutedFill) {
        let fill = &executed.fill;
        self.now = fill.timestamp;
        self.total_commission += fill.commission;
        self.total_slippage += executed.slippage;

        let key = (fill.strategy.clone(), fill.instrument.clone());
        let position = self
            .positions
            .entry(key)
            .or_insert_with(|| Position::flat(fill.strategy.clone(), fill.instrument.clone()));

        let realized_delta = position.apply_fill(fill.side, fill.price, fill.quantity);
        let net_delta = realized_delta - fill.commission;

        self.equity += net_delta;
        *self
            .strategy_pnl
            .entry(fill.strategy.clone())
            .or_insert(Decimal::ZERO) += net_delta;

        if realized_delta != Decimal::ZERO {
            self.trades.push(TradeRecord {
                strategy: fill.strategy.clone(),
                instrument: fill.instrument.clone(),
                exit_time: fill.timestamp,
                realized_pnl: realized_delta,
            });
            self.trade_returns.push(realized_delta);

            if realized_delta > Decimal::ZERO {
                self.gross_profit += realized_delta;
            } else {
                self.gross_loss += realized_delta.abs();
            }
        }

        self.drawdown.update(self.equity, self.now);
    }

    /// Advances the summary's clock without a fill, so the equity/drawdown curve reflects
    /// elapsed time even between trades.
    pub fn update_time_now(&mut self, time: Timestamp) {
        if time > self.now {
            self.now = time;
            self.drawdown.update(self.equity, self.now);
        }
    }

    /// Assembles the current [`BacktestResults`] snapshot. Callable mid-run; an unrecovered
    /// drawdown still contributes to `max_drawdown`, and trades recorded so far still
    /// contribute to `win_rate`/`profit_factor`.
    pub fn generate(&self) -> BacktestResults {
        let trade_count = self.trades.len();
        let win_count = self
            .trades
            .iter()
            .filter(|t| t.realized_pnl > Decimal::ZERO)
            .count();

        let win_rate = WinRate::calculate(
            Decimal::from(win_count as u64),
            Decimal::from(trade_count as u64),
        );
        let profit_factor = ProfitFactor::calculate(self.gross_profit, self.gross_loss);

        BacktestResults {
            start: self.start,
            end: self.now,
            total_pnl: self.trade_returns.iter().sum::<Decimal>() - self.total_commission,
            total_commission: self.total_commission,
            total_slippage: self.total_slippage,
            trade_count,
            win_count,
            win_rate,
            max_drawdown: self.drawdown.max_drawdown(),
            max_profit: self.max_profit(),
            sharpe_ratio: self.sharpe(),
            profit_factor,
            strategy_pnl: self.strategy_pnl.clone(),
            trades: self.trades.clone(),
        }
    }

    /// The highest cumulative realized P&L reached at any point during the run.
    fn max_profit(&self) -> Decimal {
        let mut peak = Decimal::ZERO;
        let mut cumulative = Decimal::ZERO;
        for pnl in &self.trade_returns {
            cumulative += *pnl;
            if cumulative > peak {
                peak = cumulative;
            }
        }
        peak
    }

    /// Sharpe ratio over per-trade returns, annualized by √252. `None` with fewer than two
    /// closed trades — there is no meaningful standard deviation to divide by.
    fn sharpe(&self) -> Option<SharpeRatio<Annual252>> {
        if self.trade_returns.len() < 2 {
            return None;
        }

        let n = Decimal::from(self.trade_returns.len() as u64);
        let mean = self.trade_returns.iter().sum::<Decimal>() / n;
        let variance = self
            .trade_returns
            .iter()
            .map(|r| (*r - mean) * (*r - mean))
            .sum::<Decimal>()
            / n;
        let std_dev = variance.sqrt()?;

        let daily = SharpeRatio::calculate(
            self.risk_free_return,
            mean,
            std_dev,
            crate::time::Daily,
        );
        Some(daily.scale(Annual252))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backtest_markets::{Fill, OrderId, Side};
    use rust_decimal_macros::dec;

    fn fill(ts: i64, strategy: &str, side: Side, price: Decimal, qty: u64) -> ExecutedFill {
        ExecutedFill {
            fill: Fill::new(
                OrderId(1),
                Timestamp(ts),
                InstrumentId::new("PETR4"),
                StrategyId::new(strategy),
                side,
                price,
                qty,
                Decimal::ZERO,
            ),
            slippage: Decimal::ZERO,
        }
    }

    #[test]
    fn opening_fill_does_not_record_a_trade() {
        let mut gen = TradingSummaryGenerator::init(Decimal::ZERO, Timestamp(0), dec!(10000));
        gen.update_fill(&fill(1, "s1", Side::Buy, dec!(100), 10));

        let results = gen.generate();
        assert_eq!(results.trade_count, 0);
        assert_eq!(results.total_pnl, Decimal::ZERO);
    }

    #[test]
    fn closing_fill_records_a_winning_trade() {
        let mut gen = TradingSummaryGenerator::init(Decimal::ZERO, Timestamp(0), dec!(10000));
        gen.update_fill(&fill(1, "s1", Side::Buy, dec!(100), 10));
        gen.update_fill(&fill(2, "s1", Side::Sell, dec!(110), 10));

        let results = gen.generate();
        assert_eq!(results.trade_count, 1);
        assert_eq!(results.win_count, 1);
        assert_eq!(results.trades[0].realized_pnl, dec!(100));
        assert_eq!(results.total_pnl, dec!(100));
    }

    #[test]
    fn commission_reduces_total_pnl_but_not_realized_pnl() {
        let mut gen = TradingSummaryGenerator::init(Decimal::ZERO, Timestamp(0), dec!(10000));
        let mut open = fill(1, "s1", Side::Buy, dec!(100), 10);
        open.fill.commission = dec!(1);
        gen.update_fill(&open);

        let mut close = fill(2, "s1", Side::Sell, dec!(110), 10);
        close.fill.commission = dec!(1);
        gen.update_fill(&close);

        let results = gen.generate();
        assert_eq!(results.trades[0].realized_pnl, dec!(100));
        assert_eq!(results.total_commission, dec!(2));
        assert_eq!(results.total_pnl, dec!(98));
    }

    #[test]
    fn losing_trade_feeds_gross_loss_into_profit_factor() {
        let mut gen = TradingSummaryGenerator::init(Decimal::ZERO, Timestamp(0), dec!(10000));
        gen.update_fill(&fill(1, "s1", Side::Buy, dec!(100), 10));
        gen.update_fill(&fill(2, "s1", Side::Sell, dec!(90), 10));

        let results = gen.generate();
        assert_eq!(results.win_count, 0);
        assert_eq!(results.profit_factor.unwrap().value, Decimal::MIN);
    }

    #[test]
    fn per_strategy_pnl_is_isolated() {
        let mut gen = TradingSummaryGenerator::init(Decimal::ZERO, Timestamp(0), dec!(10000));
        gen.update_fill(&fill(1, "s1", Side::Buy, dec!(100), 10));
        gen.update_fill(&fill(2, "s1", Side::Sell, dec!(110), 10));
        gen.update_fill(&fill(3, "s2", Side::Buy, dec!(50), 5));
        gen.update_fill(&fill(4, "s2", Side::Sell, dec!(40), 5));

        let results = gen.generate();
        assert_eq!(results.strategy_pnl[&StrategyId::new("s1")], dec!(100));
        assert_eq!(results.strategy_pnl[&StrategyId::new("s2")], dec!(-50));
    }

    #[test]
    fn max_drawdown_reflects_unrecovered_loss_at_run_end() {
        let mut gen = TradingSummaryGenerator::init(Decimal::ZERO, Timestamp(0), dec!(10000));
        gen.update_fill(&fill(1, "s1", Side::Buy, dec!(100), 100));
        gen.update_fill(&fill(2, "s1", Side::Sell, dec!(50), 100));

        let results = gen.generate();
        assert!(results.max_drawdown > Decimal::ZERO);
    }
}
