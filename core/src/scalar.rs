//! Re-export of the scalar newtypes (`Price`, `Volume`, `Timestamp`, `Duration`).
//!
//! These live in `backtest-markets` (the lowest crate in the dependency graph, so
//! `backtest-data`/`backtest-execution`/`backtest-risk` can use them without depending on
//! `backtest-core`) and are re-exported here so the rest of this crate can keep writing
//! `crate::scalar::X`.
pub use backtest_markets::scalar::*;
