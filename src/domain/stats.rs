use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One accumulator's worth of raw counters. Two instances live in the
/// tracker at any time: `daily` (reset on date roll) and `cumulative`
/// (persists for the whole run).
#[derive(Debug, Clone, Default)]
pub struct StatsAccumulator {
    pub total_trades: u64,
    pub winning_trades: u64,
    pub losing_trades: u64,
    pub realized_pnl: Decimal,
    pub unrealized_pnl: Decimal,
    pub total_fees: Decimal,
    pub peak_pnl: Decimal,
    pub max_drawdown: Decimal,
    pub max_single_profit: Decimal,
    pub max_single_loss: Decimal,
    /// Holding duration in seconds, one entry per closed trade with both
    /// timestamps present and positive.
    pub holding_times_secs: Vec<i64>,
}

impl StatsAccumulator {
    pub fn win_rate(&self) -> f64 {
        if self.total_trades == 0 {
            0.0
        } else {
            self.winning_trades as f64 / self.total_trades as f64
        }
    }

    pub fn holding_time_stats(&self) -> (i64, i64, f64) {
        if self.holding_times_secs.is_empty() {
            return (0, 0, 0.0);
        }
        let min = *self.holding_times_secs.iter().min().unwrap();
        let max = *self.holding_times_secs.iter().max().unwrap();
        let sum: i64 = self.holding_times_secs.iter().sum();
        let mean = sum as f64 / self.holding_times_secs.len() as f64;
        (min, max, mean)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyDescriptor {
    pub id: String,
    pub version: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeResult {
    pub number_of_trades: u64,
    pub winning: u64,
    pub losing: u64,
    pub win_rate: f64,
    pub max_drawdown: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradePnl {
    pub realized: Decimal,
    pub unrealized: Decimal,
    pub total: Decimal,
    pub max_loss: Decimal,
    pub max_profit: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoldingTime {
    pub min: i64,
    pub max: i64,
    pub avg: f64,
}

/// Immutable snapshot built from a `StatsAccumulator`, ready to serialize
/// to `stats.yaml` or to hand to `OnStatsUpdate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub id: String,
    pub date: String,
    pub session_start: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub symbols: Vec<String>,
    pub trade_result: TradeResult,
    pub trade_pnl: TradePnl,
    pub holding_time: HoldingTime,
    pub total_fees: Decimal,
    pub file_paths: Vec<PathBuf>,
    pub strategy: StrategyDescriptor,
}
