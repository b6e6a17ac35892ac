//! Price-time priority limit order book.
//!
//! Two sorted price-level maps: bids keyed ascending with the best bid at the high end,
//! asks keyed ascending with the best ask at the low end. Each level holds a FIFO queue of
//! `(order id, remaining qty)` plus a cached total volume so queries never need to walk the
//! queue.

use backtest_markets::{InstrumentId, Order, OrderId, OrderType, Price, Side, Timestamp, Volume};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, VecDeque};

/// Matching algorithm selected at book construction. Only [`MatchingAlgorithm::PriceTime`]
/// is implemented; the others are declared for interface completeness and fail cleanly
/// with [`crate::error::BookError::NotImplemented`] if selected.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum MatchingAlgorithm {
    PriceTime,
    ProRata,
    PriceSizeTime,
}

/// One resident FIFO entry: the order that placed it and its remaining quantity.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct LevelEntry {
    pub order_id: OrderId,
    pub qty: Volume,
}

#[derive(Debug, Clone, Default)]
struct PriceLevel {
    entries: VecDeque<LevelEntry>,
    total_volume: Volume,
}

impl PriceLevel {
    fn push(&mut self, order_id: OrderId, qty: Volume) {
        self.entries.push_back(LevelEntry { order_id, qty });
        self.total_volume += qty;
    }

    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A fill produced by crossing the book, before the cost model attaches commission/slippage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BookFill {
    pub price: Price,
    pub quantity: Volume,
}

/// Summary statistics over the current book state.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BookStats {
    pub bid_levels: usize,
    pub ask_levels: usize,
    pub bid_volume: Volume,
    pub ask_volume: Volume,
}

/// Two-sided price-time priority order book for a single instrument.
#[derive(Debug, Clone)]
pub struct OrderBook {
    instrument: InstrumentId,
    algorithm: MatchingAlgorithm,
    bids: BTreeMap<Price, PriceLevel>,
    asks: BTreeMap<Price, PriceLevel>,
}

impl OrderBook {
    pub fn new(instrument: InstrumentId, algorithm: MatchingAlgorithm) -> Self {
        Self {
            instrument,
            algorithm,
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
        }
    }

    pub fn instrument(&self) -> &InstrumentId {
        &self.instrument
    }

    fn levels_mut(&mut self, side: Side) -> &mut BTreeMap<Price, PriceLevel> {
        match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        }
    }

    fn levels(&self, side: Side) -> &BTreeMap<Price, PriceLevel> {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    /// Appends an order at the back of its price level's FIFO, creating the level if absent.
    pub fn add(&mut self, side: Side, price: Price, order_id: OrderId, qty: Volume) {
        if qty == 0 {
            return;
        }
        self.levels_mut(side).entry(price).or_default().push(order_id, qty);
    }

    /// Removes up to `qty` of `order_id` from its level, deleting the level if emptied.
    pub fn remove(&mut self, order_id: OrderId, side: Side, price: Price, qty: Volume) -> crate::error::Result<()> {
        let levels = self.levels_mut(side);
        let Some(level) = levels.get_mut(&price) else {
            return Err(crate::error::BookError::UnknownLevelEntry { order_id, qty });
        };

        let mut remaining = qty;
        let mut removed_any = false;
        level.entries.retain_mut(|entry| {
            if remaining == 0 || entry.order_id != order_id {
                return true;
            }
            removed_any = true;
            let take = remaining.min(entry.qty);
            entry.qty -= take;
            remaining -= take;
            level.total_volume -= take;
            entry.qty > 0
        });

        if level.is_empty() {
            levels.remove(&price);
        }

        if removed_any {
            Ok(())
        } else {
            Err(crate::error::BookError::UnknownLevelEntry { order_id, qty })
        }
    }

    fn best_price(&self, side: Side) -> Option<Price> {
        match side {
            Side::Buy => self.bids.keys().next_back().copied(),
            Side::Sell => self.asks.keys().next().copied(),
        }
    }

    pub fn best_bid(&self) -> Option<Price> {
        self.best_price(Side::Buy)
    }

    pub fn best_ask(&self) -> Option<Price> {
        self.best_price(Side::Sell)
    }

    pub fn spread(&self) -> Option<Price> {
        Some(self.best_ask()? - self.best_bid()?)
    }

    pub fn mid_price(&self) -> Option<Price> {
        Some((self.best_ask()? + self.best_bid()?) / Decimal::from(2))
    }

    /// Returns up to `n` best price levels on `side`, from best to worst.
    pub fn bids(&self, n: usize) -> Vec<(Price, Volume)> {
        self.bids
            .iter()
            .rev()
            .take(n)
            .map(|(p, l)| (*p, l.total_volume))
            .collect()
    }

    pub fn asks(&self, n: usize) -> Vec<(Price, Volume)> {
        self.asks
            .iter()
            .take(n)
            .map(|(p, l)| (*p, l.total_volume))
            .collect()
    }

    pub fn volume_at(&self, side: Side, price: Price) -> Volume {
        self.levels(side).get(&price).map(|l| l.total_volume).unwrap_or(0)
    }

    pub fn stats(&self) -> BookStats {
        BookStats {
            bid_levels: self.bids.len(),
            ask_levels: self.asks.len(),
            bid_volume: self.bids.values().map(|l| l.total_volume).sum(),
            ask_volume: self.asks.values().map(|l| l.total_volume).sum(),
        }
    }

    /// Consumes from the opposite side's best levels until `qty` is exhausted or the book
    /// empties, deleting fully-consumed levels. Does not enforce any price limit.
    fn take_liquidity(&mut self, opposite: Side, mut qty: Volume) -> Vec<BookFill> {
        let mut fills = Vec::new();
        let levels = self.levels_mut(opposite);

        while qty > 0 {
            let Some((&price, _)) = levels.iter().next() else {
                break;
            };
            let level = levels.get_mut(&price).expect("just peeked");
            let take = qty.min(level.total_volume);
            if take == 0 {
                break;
            }

            let mut remaining_take = take;
            level.entries.retain_mut(|entry| {
                if remaining_take == 0 {
                    return true;
                }
                let consumed = remaining_take.min(entry.qty);
                entry.qty -= consumed;
                remaining_take -= consumed;
                entry.qty > 0
            });
            level.total_volume -= take;
            qty -= take;

            fills.push(BookFill {
                price,
                quantity: take,
            });

            if level.is_empty() {
                levels.remove(&price);
            }
        }

        fills
    }

    /// Repeatedly takes from the opposite best level until `order`'s remaining quantity is
    /// exhausted or the book empties.
    pub fn match_market(&mut self, order: &Order, ts: Timestamp) -> crate::error::Result<Vec<backtest_markets::Fill>> {
        self.require_price_time()?;
        let opposite = order.side.opposite();
        let book_fills = self.take_liquidity(opposite, order.remaining_quantity());
        Ok(self.to_order_fills(order, ts, book_fills))
    }

    /// Like [`Self::match_market`], but stops crossing once the best opposite price no
    /// longer satisfies the order's limit; any residual quantity rests on the order's own
    /// side.
    pub fn match_limit(&mut self, order: &Order, ts: Timestamp) -> crate::error::Result<Vec<backtest_markets::Fill>> {
        self.require_price_time()?;
        let limit = order.limit_price.unwrap_or_default();
        let opposite = order.side.opposite();
        let mut remaining = order.remaining_quantity();
        let mut book_fills = Vec::new();

        while remaining > 0 {
            let Some(best) = self.best_price(opposite) else {
                break;
            };
            let crosses = match order.side {
                Side::Buy => best <= limit,
                Side::Sell => best >= limit,
            };
            if !crosses {
                break;
            }
            let took = self.take_liquidity(opposite, remaining);
            if took.is_empty() {
                break;
            }
            remaining -= took.iter().map(|f| f.quantity).sum::<Volume>();
            book_fills.extend(took);
        }

        if remaining > 0 {
            self.add(order.side, limit, order.id, remaining);
        }

        Ok(self.to_order_fills(order, ts, book_fills))
    }

    fn require_price_time(&self) -> crate::error::Result<()> {
        match self.algorithm {
            MatchingAlgorithm::PriceTime => Ok(()),
            other => Err(crate::error::BookError::NotImplemented(other)),
        }
    }

    fn to_order_fills(
        &self,
        order: &Order,
        ts: Timestamp,
        book_fills: Vec<BookFill>,
    ) -> Vec<backtest_markets::Fill> {
        book_fills
            .into_iter()
            .map(|bf| {
                backtest_markets::Fill::new(
                    order.id,
                    ts,
                    order.instrument.clone(),
                    order.strategy.clone(),
                    order.side,
                    bf.price,
                    bf.quantity,
                    Decimal::ZERO,
                )
            })
            .collect()
    }
}
