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

//! # Markets
//!
//! Closed-set enums (`Side`, `OrderType`, `OrderStatus`, `SignalKind`) and the identifier
//! newtypes (`OrderId`, `StrategyId`, `InstrumentId`, `ExchangeId`) shared by every other
//! crate in the backtest engine.

/// Order direction.
pub mod side;

/// Order type/status and strategy signal enums.
pub mod order_kind;

/// Strongly-typed identifiers.
pub mod ids;

/// Simulated-time and monetary scalar newtypes (`Timestamp`, `Duration`, `Price`, `Volume`).
pub mod scalar;

/// Domain entities built from the scalars and ids above (`Tick`, `Order`, `Fill`, `Position`).
pub mod entity;

pub use entity::{Fill, LatencyConfig, Order, Position, Tick};
pub use ids::{ExchangeId, InstrumentId, OrderId, StrategyId};
pub use order_kind::{OrderStatus, OrderType, SignalKind};
pub use scalar::{Duration, Price, Timestamp, Volume};
pub use side::Side;
