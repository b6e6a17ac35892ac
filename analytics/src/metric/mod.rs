//! # Metrics
//!
//! Individual performance metrics computed from a completed or in-progress run: the
//! risk-adjusted [`sharpe::SharpeRatio`], the loss/profit-weighted [`profit_factor::ProfitFactor`],
//! the [`win_rate::WinRate`], and the running peak-to-trough [`drawdown::DrawdownGenerator`].
//!
//! Each metric is a pure function (or, for drawdown, a small incremental state machine) over
//! [`rust_decimal::Decimal`] values — none of them know about fills, orders or instruments.
//! [`crate::summary::TradingSummaryGenerator`] is what feeds them from the replay loop.
//!
//! ```rust
//! use backtest_analytics::metric::sharpe::SharpeRatio;
//! use backtest_analytics::metric::drawdown::DrawdownGenerator;
//! use backtest_markets::Timestamp;
//! use rust_decimal_macros::dec;
//!
//! let risk_free = dec!(0.0015);
//! let mean_ret = dec!(0.0025);
//! let std_dev = dec!(0.02);
//! let interval = chrono::TimeDelta::hours(2);
//! let sharpe = SharpeRatio::calculate(risk_free, mean_ret, std_dev, interval);
//! assert!(sharpe.value != rust_decimal::Decimal::ZERO);
//!
//! let mut gen = DrawdownGenerator::init(dec!(100), Timestamp(0));
//! gen.update(dec!(90), Timestamp(1));
//! let dd = gen.update(dec!(120), Timestamp(2));
//! assert!(dd.is_some());
//! ```

/// Running peak-to-trough drawdown tracking.
pub mod drawdown;

/// Gross profit over gross loss.
pub mod profit_factor;

/// Risk-adjusted return.
pub mod sharpe;

/// Fraction of winning trades.
pub mod win_rate;
