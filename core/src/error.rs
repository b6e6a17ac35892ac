//! Error taxonomy: [`ClockError`] and [`EngineError`].
//!
//! [`EngineError`] sits at the top, aggregating lower-level errors via `#[from]` so the
//! engine loop can propagate with `?`. Conditions that should reject one order rather than
//! abort the run — unknown instrument, a risk violation, an unsupported matching algorithm —
//! never become an `EngineError` at all: the engine routes them through `RejectReason` and a
//! `RiskEvent` instead, and `run` keeps going. Strategy callback panics are caught and logged
//! at the event bus and never propagate here either. What's left is genuinely fatal: a clock
//! rewind, or an execution-layer error the handler couldn't recover from.
use backtest_execution::error::ExecutionError;

/// Failure to advance the simulation clock.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClockError {
    #[error("clock rewind rejected: now={now} requested={requested}")]
    Rewind {
        now: crate::scalar::Timestamp,
        requested: crate::scalar::Timestamp,
    },
}

/// Top-level engine failure taxonomy. Both variants abort the run; `run`'s `Result`
/// surfaces whichever one occurred.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("simulation clock rewind, aborting run: {0}")]
    ClockRewind(#[from] ClockError),

    #[error("execution error: {0}")]
    Execution(#[from] ExecutionError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_rewind_converts_into_engine_error() {
        let clock_err = ClockError::Rewind {
            now: crate::scalar::Timestamp(10),
            requested: crate::scalar::Timestamp(5),
        };
        let engine_err: EngineError = clock_err.into();
        assert!(matches!(engine_err, EngineError::ClockRewind(_)));
    }
}
