//! # Backtest Engine
//!
//! Facade crate that re-exports the whole backtest ecosystem under one dependency, for
//! callers who would rather not pin every member crate individually.
//!
//! ```no_run
//! use backtest_engine::core::Engine;
//! use backtest_engine::markets::InstrumentId;
//!
//! let mut engine = Engine::builder()
//!     .add_ticks(InstrumentId::new("PETR4"), std::iter::empty())
//!     .build();
//! let _ = engine.run();
//! ```

pub use backtest_analytics as analytics;
pub use backtest_core as core;
pub use backtest_data as data;
pub use backtest_execution as execution;
pub use backtest_markets as markets;
pub use backtest_risk as risk;
pub use backtest_strategy as strategy;

pub use backtest_core::{BacktestResults, Engine, EngineBuilder, EngineConfig, EngineError, EngineStats};

/// Single-import convenience bundle of the most frequently used types.
pub mod prelude {
    pub use crate::core::{BacktestResults, Engine, EngineBuilder, EngineConfig, EngineError, EngineStats};
    pub use crate::execution::{CostModel, LinearSlippage, Signal, SquareRootSlippage};
    pub use crate::markets::{
        Duration, ExchangeId, Fill, InstrumentId, Order, OrderId, OrderStatus, OrderType, Price,
        Side, SignalKind, StrategyId, Tick, Timestamp, Volume,
    };
    pub use crate::risk::{RiskLimits, RiskManager, Violation};
    pub use crate::strategy::{Strategy, StrategyContext};
}
