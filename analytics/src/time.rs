//! Annualisation intervals.
//!
//! A [`metric::sharpe::SharpeRatio`](crate::metric::sharpe::SharpeRatio) is computed over
//! whatever period its inputs were sampled at, then scaled to a different interval with
//! [`metric::sharpe::SharpeRatio::scale`](crate::metric::sharpe::SharpeRatio::scale) — e.g.
//! a daily Sharpe scaled to [`Annual252`] by `sqrt(252)`.

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

/// A named period a return series was sampled at, or is being scaled to.
pub trait TimeInterval: Clone + std::fmt::Debug + PartialEq {
    fn interval(&self) -> TimeDelta;
}

/// One calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct Daily;

impl TimeInterval for Daily {
    fn interval(&self) -> TimeDelta {
        TimeDelta::days(1)
    }
}

/// 252 trading days, the conventional equity-market annualisation basis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct Annual252;

impl TimeInterval for Annual252 {
    fn interval(&self) -> TimeDelta {
        TimeDelta::days(252)
    }
}

/// A raw [`TimeDelta`] is itself a valid interval, for callers sampling at a period with
/// no named type of its own.
impl TimeInterval for TimeDelta {
    fn interval(&self) -> TimeDelta {
        *self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn daily_is_one_day() {
        assert_eq!(Daily.interval(), TimeDelta::days(1));
    }

    #[test]
    fn annual252_is_252_days() {
        assert_eq!(Annual252.interval(), TimeDelta::days(252));
    }
}
