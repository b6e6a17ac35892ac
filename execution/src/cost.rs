//! Cost model: commission table resolution plus a pluggable slippage model.

use backtest_markets::{ExchangeId, InstrumentId, Price, Side, Volume};
use rust_decimal::{Decimal, MathematicalOps};
use rust_decimal_macros::dec;
use std::collections::HashMap;

/// Default average daily volume assumed when none is supplied to a slippage calculation.
pub const DEFAULT_AVG_DAILY_VOLUME: Volume = 1_000_000;

/// Maker/taker commission schedule for one instrument or exchange.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommissionTable {
    pub maker_rate: Decimal,
    pub taker_rate: Decimal,
    pub fixed_fee: Decimal,
    pub min_commission: Decimal,
    pub max_commission: Decimal,
}

impl Default for CommissionTable {
    fn default() -> Self {
        Self {
            maker_rate: dec!(0.0002),
            taker_rate: dec!(0.0004),
            fixed_fee: Decimal::ZERO,
            min_commission: Decimal::ZERO,
            max_commission: Decimal::MAX,
        }
    }
}

impl CommissionTable {
    pub fn commission(&self, qty: Volume, price: Price, is_maker: bool) -> Decimal {
        let rate = if is_maker { self.maker_rate } else { self.taker_rate };
        let raw = price * Decimal::from(qty) * rate + self.fixed_fee;
        raw.clamp(self.min_commission, self.max_commission)
    }
}

/// Signed, per-trade execution cost, negative by convention (a cost to the strategy).
pub trait Slippage: std::fmt::Debug {
    fn slippage(
        &self,
        instrument: &InstrumentId,
        side: Side,
        qty: Volume,
        reference_price: Price,
        avg_daily_volume: Volume,
    ) -> Price;
}

/// `rate = base + impact * (qty / adv)`; falls back to `base` alone when `adv == 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearSlippage {
    pub base: Decimal,
    pub impact: Decimal,
}

impl Slippage for LinearSlippage {
    fn slippage(
        &self,
        _instrument: &InstrumentId,
        _side: Side,
        qty: Volume,
        reference_price: Price,
        avg_daily_volume: Volume,
    ) -> Price {
        let rate = if avg_daily_volume == 0 {
            self.base
        } else {
            self.base + self.impact * (Decimal::from(qty) / Decimal::from(avg_daily_volume))
        };
        -(rate * reference_price).abs()
    }
}

/// `rate = base + coeff * sqrt(qty / adv)`; falls back to `base` alone when `adv == 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SquareRootSlippage {
    pub base: Decimal,
    pub coeff: Decimal,
}

impl Slippage for SquareRootSlippage {
    fn slippage(
        &self,
        _instrument: &InstrumentId,
        _side: Side,
        qty: Volume,
        reference_price: Price,
        avg_daily_volume: Volume,
    ) -> Price {
        let rate = if avg_daily_volume == 0 {
            self.base
        } else {
            let participation = Decimal::from(qty) / Decimal::from(avg_daily_volume);
            self.base + self.coeff * participation.sqrt().unwrap_or(Decimal::ZERO)
        };
        -(rate * reference_price).abs()
    }
}

/// Resolved cost breakdown for one fill.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostBreakdown {
    pub commission: Decimal,
    pub slippage: Decimal,
    pub total: Decimal,
}

/// Composes commission-table resolution (instrument, then exchange, then a built-in
/// default) with a pluggable [`Slippage`] model.
#[derive(Debug)]
pub struct CostModel {
    default_table: CommissionTable,
    by_instrument: HashMap<InstrumentId, CommissionTable>,
    by_exchange: HashMap<ExchangeId, CommissionTable>,
    slippage: Box<dyn Slippage + Send + Sync>,
    avg_daily_volume: HashMap<InstrumentId, Volume>,
}

impl CostModel {
    pub fn new(slippage: impl Slippage + Send + Sync + 'static) -> Self {
        Self {
            default_table: CommissionTable::default(),
            by_instrument: HashMap::new(),
            by_exchange: HashMap::new(),
            slippage: Box::new(slippage),
            avg_daily_volume: HashMap::new(),
        }
    }

    pub fn set_instrument_table(&mut self, instrument: InstrumentId, table: CommissionTable) {
        self.by_instrument.insert(instrument, table);
    }

    pub fn set_exchange_table(&mut self, exchange: ExchangeId, table: CommissionTable) {
        self.by_exchange.insert(exchange, table);
    }

    pub fn set_avg_daily_volume(&mut self, instrument: InstrumentId, adv: Volume) {
        self.avg_daily_volume.insert(instrument, adv);
    }

    fn resolve_table(&self, instrument: &InstrumentId, exchange: Option<&ExchangeId>) -> &CommissionTable {
        if let Some(table) = self.by_instrument.get(instrument) {
            return table;
        }
        if let Some(exchange) = exchange {
            if let Some(table) = self.by_exchange.get(exchange) {
                return table;
            }
        }
        &self.default_table
    }

    pub fn cost_of(
        &self,
        instrument: &InstrumentId,
        exchange: Option<&ExchangeId>,
        side: Side,
        qty: Volume,
        price: Price,
        aggressive: bool,
    ) -> CostBreakdown {
        let is_maker = !aggressive;
        let table = self.resolve_table(instrument, exchange);
        let commission = table.commission(qty, price, is_maker);

        let adv = self
            .avg_daily_volume
            .get(instrument)
            .copied()
            .unwrap_or(DEFAULT_AVG_DAILY_VOLUME);
        let slippage = self.slippage.slippage(instrument, side, qty, price, adv);

        CostBreakdown {
            commission,
            slippage,
            total: commission + slippage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commission_is_clamped_between_min_and_max() {
        let table = CommissionTable {
            maker_rate: dec!(0.01),
            taker_rate: dec!(0.01),
            fixed_fee: Decimal::ZERO,
            min_commission: dec!(5),
            max_commission: dec!(100),
        };
        assert_eq!(table.commission(1, dec!(10), false), dec!(5));
        assert_eq!(table.commission(100_000, dec!(10), false), dec!(100));
    }

    #[test]
    fn linear_slippage_falls_back_to_base_when_adv_zero() {
        let slippage = LinearSlippage {
            base: dec!(0.001),
            impact: dec!(0.01),
        };
        let result = slippage.slippage(&InstrumentId::new("PETR4"), Side::Buy, 100, dec!(10), 0);
        assert_eq!(result, dec!(-0.01));
    }

    #[test]
    fn cost_of_resolves_instrument_table_over_default() {
        let mut model = CostModel::new(LinearSlippage {
            base: Decimal::ZERO,
            impact: Decimal::ZERO,
        });
        let instrument = InstrumentId::new("PETR4");
        model.set_instrument_table(
            instrument.clone(),
            CommissionTable {
                maker_rate: dec!(0.001),
                taker_rate: dec!(0.002),
                fixed_fee: Decimal::ZERO,
                min_commission: Decimal::ZERO,
                max_commission: Decimal::MAX,
            },
        );

        let cost = model.cost_of(&instrument, None, Side::Buy, 100, dec!(10), true);
        assert_eq!(cost.commission, dec!(2));
        assert_eq!(cost.total, dec!(2));
    }
}
