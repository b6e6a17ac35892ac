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

//! # Data
//!
//! Historical tick storage for the backtest engine.
//!
//! A [`TickStore`] maps `instrument -> `[`TickSeries`]; each series keeps its ticks
//! row-wise but maintains a parallel timestamp column alongside them, so a sorted series
//! can binary-search its bounds in `range` instead of scanning every tick.

use backtest_markets::{InstrumentId, Tick, Timestamp};
use fnv::FnvHashMap;
use tracing::debug;

/// One instrument's tick history, plus a timestamp index kept in lockstep with it.
///
/// `timestamp` mirrors `tick[i].timestamp` for every `i`; once the series is sorted, `range`
/// binary-searches `timestamp` for its bounds instead of scanning every tick.
#[derive(Debug, Clone, Default)]
pub struct TickSeries {
    timestamp: Vec<Timestamp>,
    tick: Vec<Tick>,
}

impl TickSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tick.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tick.is_empty()
    }

    pub fn push(&mut self, tick: Tick) {
        self.timestamp.push(tick.timestamp);
        self.tick.push(tick);
    }

    pub fn extend(&mut self, ticks: impl IntoIterator<Item = Tick>) {
        for tick in ticks {
            self.push(tick);
        }
    }

    /// Stable-sorts the series by timestamp. Idempotent: already-sorted input is unchanged.
    pub fn sort_by_time(&mut self) {
        let mut indexed: Vec<(usize, Tick)> = self.tick.drain(..).enumerate().collect();
        indexed.sort_by(|a, b| a.1.timestamp.cmp(&b.1.timestamp).then(a.0.cmp(&b.0)));
        self.tick = indexed.into_iter().map(|(_, t)| t).collect();
        self.timestamp = self.tick.iter().map(|t| t.timestamp).collect();
    }

    pub fn at(&self, index: usize) -> Option<&Tick> {
        self.tick.get(index)
    }

    /// Returns every tick with `start <= timestamp <= end`.
    ///
    /// Assumes the series has already been sorted via [`TickSeries::sort_by_time`]; the two
    /// bounds are each found with a binary search over the `timestamp` index rather than a
    /// linear scan.
    pub fn range(&self, start: Timestamp, end: Timestamp) -> Vec<&Tick> {
        let lo = self.timestamp.partition_point(|ts| *ts < start);
        let hi = self.timestamp.partition_point(|ts| *ts <= end);
        self.tick[lo..hi].iter().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tick> {
        self.tick.iter()
    }

    pub fn as_slice(&self) -> &[Tick] {
        &self.tick
    }
}

/// A mapping `instrument -> TickSeries` plus the bulk operations the engine drives replay
/// from.
#[derive(Debug, Clone, Default)]
pub struct TickStore {
    series: FnvHashMap<InstrumentId, TickSeries>,
}

impl TickStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, instrument: InstrumentId, tick: Tick) {
        self.series.entry(instrument).or_default().push(tick);
    }

    pub fn append_batch(&mut self, instrument: InstrumentId, ticks: impl IntoIterator<Item = Tick>) {
        let series = self.series.entry(instrument.clone()).or_default();
        let before = series.len();
        series.extend(ticks);
        debug!(instrument = %instrument, appended = series.len() - before, "ticks appended");
    }

    pub fn range(&self, instrument: &InstrumentId, start: Timestamp, end: Timestamp) -> Vec<&Tick> {
        self.series
            .get(instrument)
            .map(|series| series.range(start, end))
            .unwrap_or_default()
    }

    pub fn at(&self, instrument: &InstrumentId, index: usize) -> Option<&Tick> {
        self.series.get(instrument).and_then(|series| series.at(index))
    }

    /// Stable-sorts every series by timestamp. The engine calls this once before `run`.
    pub fn sort_by_time(&mut self) {
        for series in self.series.values_mut() {
            series.sort_by_time();
        }
    }

    pub fn all_ticks(&self) -> &FnvHashMap<InstrumentId, TickSeries> {
        &self.series
    }

    pub fn instruments(&self) -> impl Iterator<Item = &InstrumentId> {
        self.series.keys()
    }

    pub fn series(&self, instrument: &InstrumentId) -> Option<&TickSeries> {
        self.series.get(instrument)
    }

    pub fn is_empty(&self) -> bool {
        self.series.values().all(TickSeries::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn tick(ts: i64) -> Tick {
        Tick::new(
            Timestamp(ts),
            InstrumentId::new("PETR4"),
            dec!(10),
            100,
            dec!(11),
            100,
            dec!(10.5),
            1,
            dec!(10),
            dec!(11),
            dec!(9.5),
            dec!(10.5),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        )
    }

    #[test]
    fn sort_by_time_is_idempotent_and_stable() {
        let mut series = TickSeries::new();
        series.push(tick(30));
        series.push(tick(10));
        series.push(tick(20));
        series.sort_by_time();
        let timestamps: Vec<i64> = series.iter().map(|t| t.timestamp.nanos()).collect();
        assert_eq!(timestamps, vec![10, 20, 30]);

        series.sort_by_time();
        let timestamps_again: Vec<i64> = series.iter().map(|t| t.timestamp.nanos()).collect();
        assert_eq!(timestamps, timestamps_again);
    }

    #[test]
    fn range_is_inclusive_on_both_ends() {
        let mut series = TickSeries::new();
        for ts in [0, 10, 20, 30, 40] {
            series.push(tick(ts));
        }
        let in_range = series.range(Timestamp(10), Timestamp(30));
        assert_eq!(in_range.len(), 3);
    }

    #[test]
    fn append_batch_groups_by_instrument() {
        let mut store = TickStore::new();
        let instrument = InstrumentId::new("PETR4");
        store.append_batch(instrument.clone(), vec![tick(0), tick(10)]);
        assert_eq!(store.series(&instrument).unwrap().len(), 2);
        assert!(store.series(&InstrumentId::new("VALE3")).is_none());
    }
}
