//! # Logging
//!
//! Standardised `tracing` initialisers for the backtest engine.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use backtest_core::logging::init_logging;
//!
//! fn main() {
//!     init_logging();
//!     tracing::info!("backtest starting");
//! }
//! ```
//!
//! ### Environment configuration
//! ```bash
//! export RUST_LOG=debug
//! export RUST_LOG=backtest_core=info,backtest_execution=debug,backtest_data=warn
//! ```

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialises human-readable logging, honouring `RUST_LOG` (default `info`).
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::filter::EnvFilter::builder()
                .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with(tracing_subscriber::fmt::layer())
        .init()
}

/// Initialises JSON logging for log aggregators, honouring `RUST_LOG` (default `info`).
pub fn init_json_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::filter::EnvFilter::builder()
                .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with(tracing_subscriber::fmt::layer().json().flatten_event(true))
        .init()
}
