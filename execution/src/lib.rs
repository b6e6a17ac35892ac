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

//! # Execution
//!
//! Price-time priority [`book::OrderBook`], pluggable [`cost::CostModel`] and the
//! [`handler::ExecutionHandler`] that routes signals to orders to fills. The clock-driven
//! latency scheduling and pre-trade risk check are owned by `backtest-core`'s engine, one
//! layer up.

/// Price-time priority order book.
pub mod book;

/// Commission and slippage cost model.
pub mod cost;

/// [`BookError`] and [`ExecutionError`] taxonomy.
pub mod error;

/// Signal -> order -> fill routing.
pub mod handler;

pub use book::{BookFill, BookStats, LevelEntry, MatchingAlgorithm, OrderBook};
pub use cost::{CommissionTable, CostBreakdown, CostModel, LinearSlippage, Slippage, SquareRootSlippage};
pub use error::{BookError, ExecutionError};
pub use handler::{ExecutedFill, ExecutionHandler, Signal, SizingPolicy, StrengthScaledSizer, UnitSizer};
