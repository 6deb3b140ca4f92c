//! Bounded per-symbol sliding window of recent candles (`spec.md` §4.2).
//!
//! Guarded by `parking_lot::Mutex` rather than an async lock: reads are
//! uncontended in the common case and must never await, since they can be
//! called from inside a host-API dispatch that is logically on the
//! orchestrator thread but, per `spec.md` §5, defensively treated as if a
//! sandbox worker thread could call in.

use crate::domain::errors::EngineError;
use crate::domain::types::Candle;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

pub struct CandleCache {
    capacity: usize,
    series: Mutex<HashMap<String, VecDeque<Candle>>>,
}

impl CandleCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            series: Mutex::new(HashMap::new()),
        }
    }

    /// Appends a candle, evicting from the front when the window overflows.
    /// A candle older than the window's current tail is silently dropped.
    pub fn add(&self, candle: Candle) {
        let mut series = self.series.lock();
        let window = series.entry(candle.symbol.clone()).or_default();

        if let Some(tail) = window.back() {
            if candle.timestamp < tail.timestamp {
                return;
            }
        }

        window.push_back(candle);
        while window.len() > self.capacity {
            window.pop_front();
        }
    }

    /// The <=N most-recent candles at or before `end`, ascending by time.
    pub fn last_n(&self, symbol: &str, end: DateTime<Utc>, n: usize) -> Vec<Candle> {
        let series = self.series.lock();
        let Some(window) = series.get(symbol) else {
            return Vec::new();
        };

        let eligible: Vec<&Candle> = window.iter().filter(|c| c.timestamp <= end).collect();
        let start = eligible.len().saturating_sub(n);
        eligible[start..].iter().map(|c| (*c).clone()).collect()
    }

    pub fn range(&self, symbol: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<Candle> {
        let series = self.series.lock();
        series
            .get(symbol)
            .map(|w| {
                w.iter()
                    .filter(|c| c.timestamp >= start && c.timestamp <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn last(&self, symbol: &str) -> Option<Candle> {
        let series = self.series.lock();
        series.get(symbol).and_then(|w| w.back().cloned())
    }

    pub fn total_size(&self) -> usize {
        self.series.lock().values().map(|w| w.len()).sum()
    }

    /// `spec.md` §4.2: the cache has no aggregation and no cross-symbol SQL.
    pub fn execute_sql(&self, _query: &str) -> Result<Vec<Candle>, EngineError> {
        Err(EngineError::QueryFailed {
            reason: "candle cache does not support SQL queries".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn candle(symbol: &str, minute: i64) -> Candle {
        Candle {
            symbol: symbol.to_string(),
            timestamp: DateTime::<Utc>::from_timestamp(minute * 60, 0).unwrap(),
            open: dec!(1),
            high: dec!(1),
            low: dec!(1),
            close: dec!(1),
            volume: dec!(1),
        }
    }

    #[test]
    fn never_exceeds_capacity_per_symbol() {
        let cache = CandleCache::new(3);
        for i in 0..10 {
            cache.add(candle("BTCUSDT", i));
        }
        assert_eq!(cache.total_size(), 3);
    }

    #[test]
    fn last_n_is_ascending_and_signals_shortfall_via_len() {
        let cache = CandleCache::new(10);
        for i in 0..5 {
            cache.add(candle("BTCUSDT", i));
        }
        let end = DateTime::<Utc>::from_timestamp(4 * 60, 0).unwrap();
        let got = cache.last_n("BTCUSDT", end, 10);
        assert_eq!(got.len(), 5);
        assert!(got.windows(2).all(|w| w[0].timestamp < w[1].timestamp));

        let got = cache.last_n("BTCUSDT", end, 3);
        assert_eq!(got.len(), 3);
        assert_eq!(got.last().unwrap().timestamp, end);
    }

    #[test]
    fn older_than_tail_is_dropped() {
        let cache = CandleCache::new(10);
        cache.add(candle("BTCUSDT", 5));
        cache.add(candle("BTCUSDT", 2));
        assert_eq!(cache.total_size(), 1);
    }

    #[test]
    fn per_symbol_isolation() {
        let cache = CandleCache::new(2);
        cache.add(candle("BTCUSDT", 0));
        cache.add(candle("ETHUSDT", 0));
        cache.add(candle("ETHUSDT", 1));
        assert_eq!(cache.total_size(), 3);
    }
}
