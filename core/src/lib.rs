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

//! # Core
//!
//! The deterministic replay engine: a [`clock::SimClock`], a typed [`event::EventBus`] and
//! the [`engine::Engine`] that wires a tick store, a risk manager, an execution handler and a
//! set of strategies into a single-threaded, reproducible backtest loop.
//!
//! A run advances strictly in simulated time. Within one tick the engine fires any scheduled
//! callbacks due at or before that timestamp, publishes the tick as a market event, lets every
//! non-paused strategy react, then risk-checks and routes whatever signals they emitted —
//! in that fixed order, every run, for the same input.

/// Deterministic simulation clock: monotonic simulated time plus a heap of scheduled callbacks.
pub mod clock;

/// The replay engine: owns every component and drives the tick-by-tick loop.
pub mod engine;

/// [`error::ClockError`] and [`error::EngineError`].
pub mod error;

/// Typed publish/subscribe event bus.
pub mod event;

/// `tracing` initialisers.
pub mod logging;

/// Re-export of the scalar newtypes (`Price`, `Volume`, `Timestamp`, `Duration`).
pub mod scalar;

/// Re-export of the domain entities (`Tick`, `Order`, `Fill`, `Position`, `LatencyConfig`).
pub mod entity;

pub use clock::SimClock;
pub use engine::{BacktestResults, Engine, EngineBuilder, EngineConfig, EngineStats};
pub use error::EngineError;
pub use event::{Event, EventBus, EventKind, SubscriptionId};
pub use scalar::{Duration, Price, Timestamp, Volume};
