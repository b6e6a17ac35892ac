//! Re-export of the domain entities (`Tick`, `Order`, `Fill`, `Position`, `LatencyConfig`).
//!
//! See [`crate::scalar`] for why these are defined in `backtest-markets` rather than here.
pub use backtest_markets::entity::*;
