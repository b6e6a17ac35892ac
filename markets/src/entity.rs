//! Core domain entities: [`Tick`], [`Order`], [`Fill`], [`Position`].

use crate::scalar::{Duration, Price, Timestamp, Volume};
use crate::{InstrumentId, OrderId, OrderStatus, OrderType, Side, StrategyId};
use chrono::NaiveDate;
use derive_more::Constructor;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One record of market state at a single instant for one instrument.
///
/// Created on ingestion via the tick store and immutable thereafter.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Constructor)]
pub struct Tick {
    pub timestamp: Timestamp,
    pub instrument: InstrumentId,
    pub bid: Price,
    pub bid_size: Volume,
    pub ask: Price,
    pub ask_size: Volume,
    pub last: Price,
    pub volume: Volume,
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub close: Price,
    pub date: NaiveDate,
}

/// A request to buy or sell an instrument, owned by a strategy.
///
/// `id` is unique per engine run and strictly increasing.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub submitted_at: Timestamp,
    pub instrument: InstrumentId,
    pub strategy: StrategyId,
    pub side: Side,
    pub kind: OrderType,
    pub limit_price: Option<Price>,
    pub stop_price: Option<Price>,
    pub quantity: Volume,
    pub filled_quantity: Volume,
    pub status: OrderStatus,
}

impl Order {
    pub fn new(
        id: OrderId,
        submitted_at: Timestamp,
        instrument: InstrumentId,
        strategy: StrategyId,
        side: Side,
        kind: OrderType,
        quantity: Volume,
        limit_price: Option<Price>,
        stop_price: Option<Price>,
    ) -> Self {
        Self {
            id,
            submitted_at,
            instrument,
            strategy,
            side,
            kind,
            limit_price,
            stop_price,
            quantity,
            filled_quantity: 0,
            status: OrderStatus::Pending,
        }
    }

    pub fn remaining_quantity(&self) -> Volume {
        self.quantity.saturating_sub(self.filled_quantity)
    }

    pub fn is_done(&self) -> bool {
        self.status.is_terminal()
    }

    /// Records an incremental fill, advancing `filled_quantity` and `status`.
    ///
    /// Invariant: ∑fill.quantity ≤ order.quantity with equality iff status=filled.
    pub fn apply_fill(&mut self, quantity: Volume) {
        self.filled_quantity = (self.filled_quantity + quantity).min(self.quantity);
        self.status = if self.filled_quantity >= self.quantity {
            OrderStatus::Filled
        } else if self.filled_quantity > 0 {
            OrderStatus::Partial
        } else {
            self.status
        };
    }

    pub fn reject(&mut self) {
        self.status = OrderStatus::Rejected;
    }

    pub fn cancel(&mut self) {
        self.status = OrderStatus::Cancelled;
    }
}

/// Execution of all or part of an [`Order`]'s requested quantity.
///
/// One order yields one or more fills; ∑fill.quantity never exceeds order.quantity.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Constructor)]
pub struct Fill {
    pub order_id: OrderId,
    pub timestamp: Timestamp,
    pub instrument: InstrumentId,
    pub strategy: StrategyId,
    pub side: Side,
    pub price: Price,
    pub quantity: Volume,
    pub commission: Decimal,
}

impl Fill {
    /// Signed notional of this fill, positive for buys and negative for sells.
    pub fn signed_notional(&self) -> Decimal {
        let notional = self.price * Decimal::from(self.quantity);
        match self.side {
            Side::Buy => notional,
            Side::Sell => -notional,
        }
    }
}

/// Net signed holding of one instrument by one strategy.
///
/// Quantity is the signed sum of all fills for this (strategy, instrument) pair.
/// Realized P&L follows a weighted-average convention: it is updated whenever a fill
/// reduces or reverses the position, using `avg_entry_price` as the cost basis.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Constructor)]
pub struct Position {
    pub strategy: StrategyId,
    pub instrument: InstrumentId,
    pub quantity: i64,
    pub avg_entry_price: Price,
    pub realized_pnl: Decimal,
    pub unrealized_pnl: Decimal,
}

impl Position {
    pub fn flat(strategy: StrategyId, instrument: InstrumentId) -> Self {
        Self {
            strategy,
            instrument,
            quantity: 0,
            avg_entry_price: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
            unrealized_pnl: Decimal::ZERO,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.quantity == 0
    }

    /// Applies a fill to this position, updating quantity, weighted-average entry price
    /// and realized P&L. Returns the realized P&L delta contributed by this fill.
    pub fn apply_fill(&mut self, side: Side, price: Price, quantity: Volume) -> Decimal {
        let signed_qty = side.sign() as i64 * quantity as i64;
        let mut realized_delta = Decimal::ZERO;

        if self.quantity == 0 || self.quantity.signum() == signed_qty.signum() {
            // Opening or adding to a position in the same direction: roll the average.
            let old_abs = Decimal::from(self.quantity.unsigned_abs());
            let add_abs = Decimal::from(quantity);
            let total_abs = old_abs + add_abs;
            if total_abs > Decimal::ZERO {
                self.avg_entry_price =
                    (self.avg_entry_price * old_abs + price * add_abs) / total_abs;
            }
            self.quantity += signed_qty;
        } else {
            // Reducing or reversing: the closed portion realizes P&L against avg_entry_price.
            let closing_qty = quantity.min(self.quantity.unsigned_abs());
            let direction = Decimal::from(self.quantity.signum());
            realized_delta = (price - self.avg_entry_price) * Decimal::from(closing_qty) * direction;
            self.realized_pnl += realized_delta;
            self.quantity += signed_qty;

            let residual = quantity - closing_qty;
            if residual > 0 {
                // Reversed through flat: the residual opens a new position at this fill's price.
                self.avg_entry_price = price;
            } else if self.quantity == 0 {
                self.avg_entry_price = Decimal::ZERO;
            }
        }

        realized_delta
    }

    pub fn mark_to_market(&mut self, price: Price) {
        self.unrealized_pnl = (price - self.avg_entry_price) * Decimal::from(self.quantity);
    }
}

/// How much simulated time passes between a tick becoming available and order submission
/// becoming visible to the book — configured on the execution handler.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Deserialize, Serialize, Constructor)]
pub struct LatencyConfig {
    pub market_data_latency: Duration,
    pub order_latency: Duration,
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self {
            market_data_latency: Duration::from_micros(1),
            order_latency: Duration::from_micros(10),
        }
    }
}
