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

//! # Analytics
//!
//! Performance metrics ([`metric`]) and the incremental run summary ([`summary`]) that the
//! engine feeds fills into during replay and reads back out as a [`summary::BacktestResults`]
//! once the run completes.
//!
//! ```
//! use backtest_analytics::metric::sharpe::SharpeRatio;
//! use backtest_analytics::time::Daily;
//! use rust_decimal_macros::dec;
//!
//! let risk_free = dec!(0.0015);
//! let mean_ret = dec!(0.0025);
//! let std_dev = dec!(0.0200);
//!
//! let sharpe = SharpeRatio::calculate(risk_free, mean_ret, std_dev, Daily);
//! assert_eq!(sharpe.value, dec!(0.05));
//! ```
//!
//! Dependency note: depends on [`backtest_markets`] for the `Timestamp` type that
//! [`metric::drawdown::DrawdownGenerator`] and [`summary::TradingSummaryGenerator`] key their
//! equity curve and trade records by — the same simulated-time scalar the engine advances.

/// Individual performance metrics: Sharpe ratio, profit factor, win rate, drawdown.
pub mod metric;

/// The incremental [`summary::TradingSummaryGenerator`] and its [`summary::BacktestResults`]
/// output.
pub mod summary;

/// Annualisation intervals ([`time::Daily`], [`time::Annual252`]) used to scale a
/// [`metric::sharpe::SharpeRatio`] computed over one period up to another.
pub mod time;

pub use metric::drawdown::{Drawdown, DrawdownGenerator};
pub use metric::profit_factor::ProfitFactor;
pub use metric::sharpe::SharpeRatio;
pub use metric::win_rate::WinRate;
pub use summary::{BacktestResults, TradeRecord, TradingSummaryGenerator};
