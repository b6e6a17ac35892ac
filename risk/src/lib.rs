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

//! # Risk
//!
//! Per-strategy [`RiskLimits`] enforcement and fill-time accounting.
//!
//! [`RiskManager::check`] is a pure function of (order, state snapshot): it runs the
//! enabled checks in the documented order — order size, rate, position, exposure, loss,
//! cooldown — and returns the first [`Violation`], or none. [`RiskManager::on_order_submitted`]
//! and [`RiskManager::on_fill`] are the only methods that mutate state.

/// Small validation helpers shared by the checks in [`RiskManager::check`].
pub mod check;

use backtest_markets::{Duration, Fill, InstrumentId, Order, Position, StrategyId, Timestamp, Volume};
use check::{calculate_quote_notional, validate_order_size};
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};

/// Closed set of risk-check groups, each independently enabled by its `Option` being `Some`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RiskLimits {
    pub max_position_size: Option<Volume>,
    pub max_single_order_size: Option<Volume>,
    pub max_notional_per_instrument: Option<Decimal>,
    pub max_portfolio_notional: Option<Decimal>,
    pub max_daily_loss: Option<Decimal>,
    pub max_total_loss: Option<Decimal>,
    pub max_drawdown_pct: Option<Decimal>,
    pub significant_loss_threshold: Option<Decimal>,
    pub loss_cooldown: Option<Duration>,
    pub drawdown_cooldown: Option<Duration>,
    pub max_orders_per_minute: Option<u32>,
    pub max_orders_per_day: Option<u32>,
}

/// Closed set of risk-check failure kinds, each with the offending value and
/// its limit.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Violation {
    #[error("position limit exceeded: {value} > {limit}")]
    Position { value: Decimal, limit: Decimal },

    #[error("exposure limit exceeded: {value} > {limit}")]
    Exposure { value: Decimal, limit: Decimal },

    #[error("loss limit breached: {value} < {limit}")]
    Loss { value: Decimal, limit: Decimal },

    #[error("order size exceeds limit: {value} > {limit}")]
    OrderSize { value: Decimal, limit: Decimal },

    #[error("order rate exceeds limit: {value} > {limit}")]
    Rate { value: Decimal, limit: Decimal },

    #[error("strategy in cooldown until {until}")]
    Cooldown { until: Timestamp },
}

/// Accumulated per-strategy risk state: positions, P&L, order-rate window, cooldown.
#[derive(Debug, Clone, Default)]
struct RiskState {
    positions: HashMap<InstrumentId, Position>,
    daily_pnl: Decimal,
    total_pnl: Decimal,
    peak_equity: Decimal,
    order_timestamps: VecDeque<Timestamp>,
    daily_order_count: u32,
    cooldown_until: Option<Timestamp>,
}

/// Portfolio-wide snapshot returned by [`RiskManager::portfolio_stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PortfolioStats {
    pub total_pnl: Decimal,
    pub daily_pnl: Decimal,
    pub open_positions: usize,
}

/// Enforces [`RiskLimits`] and tracks per-strategy positions and P&L.
#[derive(Debug, Clone, Default)]
pub struct RiskManager {
    global: RiskLimits,
    overrides: HashMap<StrategyId, RiskLimits>,
    states: HashMap<StrategyId, RiskState>,
}

impl RiskManager {
    pub fn new(global: RiskLimits) -> Self {
        Self {
            global,
            overrides: HashMap::new(),
            states: HashMap::new(),
        }
    }

    pub fn set_global_limits(&mut self, limits: RiskLimits) {
        self.global = limits;
    }

    pub fn set_strategy_limits(&mut self, strategy: StrategyId, limits: RiskLimits) {
        self.overrides.insert(strategy, limits);
    }

    fn limits_for(&self, strategy: &StrategyId) -> &RiskLimits {
        self.overrides.get(strategy).unwrap_or(&self.global)
    }

    /// Runs the enabled checks in order: order size, rate, position, exposure, loss,
    /// cooldown. First failure short-circuits. Reads only; never mutates.
    pub fn check(&self, order: &Order) -> Option<Violation> {
        let limits = self.limits_for(&order.strategy);
        let state = self.states.get(&order.strategy);

        if let Some(max_single) = limits.max_single_order_size {
            if validate_order_size(&order.quantity, &max_single).is_err() {
                return Some(Violation::OrderSize {
                    value: Decimal::from(order.quantity),
                    limit: Decimal::from(max_single),
                });
            }
        }

        if let Some(max_per_minute) = limits.max_orders_per_minute {
            let window_start = order.submitted_at - Duration::from_secs(60);
            let count = state
                .map(|s| s.order_timestamps.iter().filter(|&&t| t > window_start).count())
                .unwrap_or(0);
            if count as u32 >= max_per_minute {
                return Some(Violation::Rate {
                    value: Decimal::from(count as u64),
                    limit: Decimal::from(max_per_minute),
                });
            }
        }
        if let Some(max_per_day) = limits.max_orders_per_day {
            let count = state.map(|s| s.daily_order_count).unwrap_or(0);
            if count >= max_per_day {
                return Some(Violation::Rate {
                    value: Decimal::from(count),
                    limit: Decimal::from(max_per_day),
                });
            }
        }

        if let Some(max_position) = limits.max_position_size {
            let current = state
                .and_then(|s| s.positions.get(&order.instrument))
                .map(|p| p.quantity)
                .unwrap_or(0);
            let signed = order.side.sign() as i64 * order.quantity as i64;
            let projected = (current + signed).unsigned_abs();
            if projected > max_position {
                return Some(Violation::Position {
                    value: Decimal::from(projected),
                    limit: Decimal::from(max_position),
                });
            }
        }

        if let (Some(max_notional), Some(price)) = (limits.max_notional_per_instrument, order.limit_price) {
            if let Ok(notional) = calculate_quote_notional(Decimal::from(order.quantity), price, Decimal::ONE) {
                if notional > max_notional {
                    return Some(Violation::Exposure {
                        value: notional,
                        limit: max_notional,
                    });
                }
            }
        }

        if let Some(state) = state {
            if let Some(max_daily_loss) = limits.max_daily_loss {
                if state.daily_pnl < -max_daily_loss.abs() {
                    return Some(Violation::Loss {
                        value: state.daily_pnl,
                        limit: -max_daily_loss.abs(),
                    });
                }
            }
            if let Some(max_total_loss) = limits.max_total_loss {
                if state.total_pnl < -max_total_loss.abs() {
                    return Some(Violation::Loss {
                        value: state.total_pnl,
                        limit: -max_total_loss.abs(),
                    });
                }
            }
            if let Some(max_drawdown_pct) = limits.max_drawdown_pct {
                if state.peak_equity > Decimal::ZERO {
                    let drawdown = (state.peak_equity - state.total_pnl) / state.peak_equity;
                    if drawdown > max_drawdown_pct {
                        return Some(Violation::Loss {
                            value: drawdown,
                            limit: max_drawdown_pct,
                        });
                    }
                }
            }

            if let Some(until) = state.cooldown_until {
                if order.submitted_at < until {
                    return Some(Violation::Cooldown { until });
                }
            }
        }

        None
    }

    /// Records the submission in the rolling 60s window and increments the daily count.
    pub fn on_order_submitted(&mut self, order: &Order) {
        let state = self.states.entry(order.strategy.clone()).or_default();
        let window_start = order.submitted_at - Duration::from_secs(60);
        state.order_timestamps.retain(|&t| t > window_start);
        state.order_timestamps.push_back(order.submitted_at);
        state.daily_order_count += 1;
    }

    /// Updates the owning position and P&L for a fill; returns the trade P&L
    /// (`realized_pnl_delta - commission`). Arms the loss cooldown when the trade P&L
    /// breaches `significant_loss_threshold`.
    pub fn on_fill(&mut self, fill: &Fill) -> Decimal {
        let limits = self.limits_for(&fill.strategy).clone();
        let state = self.states.entry(fill.strategy.clone()).or_default();
        let position = state
            .positions
            .entry(fill.instrument.clone())
            .or_insert_with(|| Position::flat(fill.strategy.clone(), fill.instrument.clone()));

        let realized = position.apply_fill(fill.side, fill.price, fill.quantity);
        let trade_pnl = realized - fill.commission;

        state.daily_pnl += trade_pnl;
        state.total_pnl += trade_pnl;
        state.peak_equity = state.peak_equity.max(state.total_pnl);

        if let Some(threshold) = limits.significant_loss_threshold {
            if trade_pnl < -threshold.abs() {
                if let Some(cooldown) = limits.loss_cooldown {
                    state.cooldown_until = Some(fill.timestamp + cooldown);
                }
            }
        }

        trade_pnl
    }

    /// Clears per-day counters and P&L; cumulative totals and any active cooldown survive.
    pub fn reset_daily(&mut self) {
        for state in self.states.values_mut() {
            state.daily_pnl = Decimal::ZERO;
            state.daily_order_count = 0;
        }
    }

    /// Drops all accumulated per-strategy state (positions, P&L, order-rate windows,
    /// cooldowns). Configured global and per-strategy limits survive — this is a reset of
    /// run state, not of run configuration.
    pub fn reset_state(&mut self) {
        self.states.clear();
    }

    pub fn positions(&self) -> Vec<&Position> {
        self.states.values().flat_map(|s| s.positions.values()).collect()
    }

    pub fn strategy_pnl(&self, id: &StrategyId) -> Option<(Decimal, Decimal)> {
        self.states.get(id).map(|s| (s.daily_pnl, s.total_pnl))
    }

    pub fn portfolio_stats(&self) -> PortfolioStats {
        PortfolioStats {
            total_pnl: self.states.values().map(|s| s.total_pnl).sum(),
            daily_pnl: self.states.values().map(|s| s.daily_pnl).sum(),
            open_positions: self
                .states
                .values()
                .flat_map(|s| s.positions.values())
                .filter(|p| !p.is_flat())
                .count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backtest_markets::{OrderId, OrderType, Side};
    use rust_decimal_macros::dec;

    fn order(qty: Volume, strategy: &str, side: Side) -> Order {
        Order::new(
            OrderId(1),
            Timestamp(0),
            InstrumentId::new("PETR4"),
            StrategyId::new(strategy),
            side,
            OrderType::Market,
            qty,
            None,
            None,
        )
    }

    #[test]
    fn check_is_side_effect_free_and_idempotent() {
        let mut limits = RiskLimits::default();
        limits.max_single_order_size = Some(10);
        let manager = RiskManager::new(limits);

        let o = order(20, "s1", Side::Buy);
        assert_eq!(manager.check(&o), manager.check(&o));
        assert!(matches!(manager.check(&o), Some(Violation::OrderSize { .. })));
    }

    #[test]
    fn rate_limit_rejects_after_threshold() {
        let mut limits = RiskLimits::default();
        limits.max_orders_per_minute = Some(2);
        let mut manager = RiskManager::new(limits);

        for i in 0..2 {
            let mut o = order(1, "s1", Side::Buy);
            o.submitted_at = Timestamp(i);
            manager.on_order_submitted(&o);
        }
        let mut next = order(1, "s1", Side::Buy);
        next.submitted_at = Timestamp(2);
        assert!(matches!(manager.check(&next), Some(Violation::Rate { .. })));
    }

    #[test]
    fn significant_loss_arms_cooldown() {
        let mut limits = RiskLimits::default();
        limits.significant_loss_threshold = Some(dec!(50));
        limits.loss_cooldown = Some(Duration::from_secs(60));
        let mut manager = RiskManager::new(limits);

        let fill = Fill::new(
            OrderId(1),
            Timestamp(0),
            InstrumentId::new("PETR4"),
            StrategyId::new("s1"),
            Side::Buy,
            dec!(100),
            10,
            dec!(0),
        );
        manager.on_fill(&fill);

        let closing_fill = Fill::new(
            OrderId(2),
            Timestamp(1),
            InstrumentId::new("PETR4"),
            StrategyId::new("s1"),
            Side::Sell,
            dec!(90),
            10,
            dec!(0),
        );
        manager.on_fill(&closing_fill);

        let mut next_order = order(1, "s1", Side::Buy);
        next_order.submitted_at = Timestamp(1);
        assert!(matches!(manager.check(&next_order), Some(Violation::Cooldown { .. })));
    }

    #[test]
    fn reset_daily_clears_daily_but_not_total() {
        let mut manager = RiskManager::new(RiskLimits::default());
        let fill = Fill::new(
            OrderId(1),
            Timestamp(0),
            InstrumentId::new("PETR4"),
            StrategyId::new("s1"),
            Side::Buy,
            dec!(100),
            10,
            dec!(1),
        );
        manager.on_fill(&fill);
        manager.reset_daily();

        let (daily, total) = manager.strategy_pnl(&StrategyId::new("s1")).unwrap();
        assert_eq!(daily, Decimal::ZERO);
        assert_eq!(total, dec!(-1));
    }
}
