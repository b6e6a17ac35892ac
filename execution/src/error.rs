//! Order book and execution handler error taxonomy.

use backtest_markets::{InstrumentId, OrderId, OrderType};

pub type Result<T> = std::result::Result<T, BookError>;
pub type ExecResult<T> = std::result::Result<T, ExecutionError>;

/// Failures raised directly by [`crate::book::OrderBook`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum BookError {
    #[error("cannot remove {qty} from order {order_id}: level has no such entry")]
    UnknownLevelEntry { order_id: OrderId, qty: u64 },

    #[error("matching algorithm {0:?} is not implemented")]
    NotImplemented(crate::book::MatchingAlgorithm),
}

/// Failures raised by the execution handler while routing signals/orders.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExecutionError {
    #[error("no order book registered for instrument {0}")]
    UnknownInstrument(InstrumentId),

    #[error("no pending order with id {0}")]
    UnknownOrder(OrderId),

    #[error("order book error: {0}")]
    Book(#[from] BookError),

    #[error("order type {0} has no stop-trigger implementation")]
    NotImplemented(OrderType),
}
