use serde::{Deserialize, Serialize};
use std::fmt;

/// Order type, determining how an [`Order`](crate::ids) interacts with the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OrderType {
    /// Executes immediately against the best available opposite liquidity.
    Market,
    /// Rests on the book past the marketable portion at a specified limit price.
    Limit,
    /// Becomes a market order once the stop price trades through.
    Stop,
    /// Becomes a limit order once the stop price trades through.
    StopLimit,
}

impl OrderType {
    /// Whether this order type carries a meaningful limit price.
    pub fn has_limit_price(self) -> bool {
        matches!(self, OrderType::Limit | OrderType::StopLimit)
    }

    /// Whether this order type carries a stop-trigger price.
    pub fn has_stop_price(self) -> bool {
        matches!(self, OrderType::Stop | OrderType::StopLimit)
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderType::Market => write!(f, "Market"),
            OrderType::Limit => write!(f, "Limit"),
            OrderType::Stop => write!(f, "Stop"),
            OrderType::StopLimit => write!(f, "StopLimit"),
        }
    }
}

/// Lifecycle status of an [`Order`](crate::ids).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Submitted, not yet interacted with the book.
    Pending,
    /// Some but not all of the requested quantity has been filled.
    Partial,
    /// Fully filled.
    Filled,
    /// Cancelled before being fully filled.
    Cancelled,
    /// Rejected before reaching the book (risk violation, unknown instrument, ...).
    Rejected,
}

impl OrderStatus {
    /// Whether the order is still live (eligible for further fills or cancellation).
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Cancelled | OrderStatus::Rejected
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "Pending"),
            OrderStatus::Partial => write!(f, "Partial"),
            OrderStatus::Filled => write!(f, "Filled"),
            OrderStatus::Cancelled => write!(f, "Cancelled"),
            OrderStatus::Rejected => write!(f, "Rejected"),
        }
    }
}

/// Directional intent emitted by a strategy, translated into orders by the execution handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SignalKind {
    Buy,
    Sell,
    Hold,
    Close,
}

impl SignalKind {
    /// Signals that do not result in an order being submitted.
    pub fn is_actionable(self) -> bool {
        !matches!(self, SignalKind::Hold)
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalKind::Buy => write!(f, "Buy"),
            SignalKind::Sell => write!(f, "Sell"),
            SignalKind::Hold => write!(f, "Hold"),
            SignalKind::Close => write!(f, "Close"),
        }
    }
}
