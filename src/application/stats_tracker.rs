//! Incremental daily + cumulative trade statistics (`spec.md` §4.6).

use crate::domain::errors::EngineError;
use crate::domain::stats::{
    HoldingTime, StatsAccumulator, StatsSnapshot, StrategyDescriptor, TradePnl, TradeResult,
};
use crate::domain::types::Trade;
use chrono::{NaiveDate, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::path::PathBuf;

struct Inner {
    daily: StatsAccumulator,
    cumulative: StatsAccumulator,
    run_id: String,
    symbols: Vec<String>,
    session_start: chrono::DateTime<Utc>,
    current_date: NaiveDate,
    file_paths: Vec<PathBuf>,
    strategy: StrategyDescriptor,
}

pub struct StatsTracker {
    inner: Mutex<Inner>,
}

impl StatsTracker {
    pub fn new(run_id: String, symbols: Vec<String>, session_start: chrono::DateTime<Utc>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                daily: StatsAccumulator::default(),
                cumulative: StatsAccumulator::default(),
                run_id,
                symbols,
                session_start,
                current_date: session_start.date_naive(),
                file_paths: Vec::new(),
                strategy: StrategyDescriptor {
                    id: String::new(),
                    version: String::new(),
                    name: String::new(),
                },
            }),
        }
    }

    /// `spec.md` §4.1 step 3: attach strategy identity and file paths once
    /// they're known, before the stream starts.
    pub fn finalize(&self, strategy: StrategyDescriptor, file_paths: Vec<PathBuf>) {
        let mut inner = self.inner.lock();
        inner.strategy = strategy;
        inner.file_paths = file_paths;
    }

    /// Updates both accumulators: counters, fee/pnl folding, peak/drawdown,
    /// and (when both timestamps are present and positive) a holding time.
    pub fn record_trade(&self, trade: &Trade) {
        let mut inner = self.inner.lock();
        Self::fold_into(&mut inner.daily, trade);
        Self::fold_into(&mut inner.cumulative, trade);
    }

    fn fold_into(acc: &mut StatsAccumulator, trade: &Trade) {
        acc.total_trades += 1;
        if trade.realized_pnl > Decimal::ZERO {
            acc.winning_trades += 1;
        } else if trade.realized_pnl < Decimal::ZERO {
            acc.losing_trades += 1;
        }

        acc.total_fees += trade.fee;
        acc.realized_pnl += trade.realized_pnl;

        if acc.realized_pnl > acc.peak_pnl {
            acc.peak_pnl = acc.realized_pnl;
        }
        let drawdown = acc.peak_pnl - acc.realized_pnl;
        if drawdown > acc.max_drawdown {
            acc.max_drawdown = drawdown;
        }

        if trade.realized_pnl > acc.max_single_profit {
            acc.max_single_profit = trade.realized_pnl;
        }
        if trade.realized_pnl < acc.max_single_loss {
            acc.max_single_loss = trade.realized_pnl;
        }

        let created_ts = trade.order.created_at.timestamp();
        let executed_ts = trade.executed_at.timestamp();
        if created_ts > 0 && executed_ts > 0 {
            let holding = executed_ts - created_ts;
            if holding >= 0 {
                acc.holding_times_secs.push(holding);
            }
        }
    }

    /// Overwrites both accumulators' unrealized figure with the same
    /// open-position snapshot.
    pub fn set_unrealized_pnl(&self, value: Decimal) {
        let mut inner = self.inner.lock();
        inner.daily.unrealized_pnl = value;
        inner.cumulative.unrealized_pnl = value;
    }

    /// Replaces `daily` with a fresh accumulator; `cumulative` is untouched.
    pub fn handle_date_boundary(&self, new_date: NaiveDate) {
        let mut inner = self.inner.lock();
        inner.daily = StatsAccumulator::default();
        inner.current_date = new_date;
    }

    pub fn get_daily_stats(&self) -> StatsSnapshot {
        let inner = self.inner.lock();
        Self::snapshot(&inner, &inner.daily)
    }

    pub fn get_cumulative_stats(&self) -> StatsSnapshot {
        let inner = self.inner.lock();
        Self::snapshot(&inner, &inner.cumulative)
    }

    fn snapshot(inner: &Inner, acc: &StatsAccumulator) -> StatsSnapshot {
        let (min, max, avg) = acc.holding_time_stats();
        StatsSnapshot {
            id: inner.run_id.clone(),
            date: inner.current_date.format("%Y-%m-%d").to_string(),
            session_start: inner.session_start,
            last_updated: Utc::now(),
            symbols: inner.symbols.clone(),
            trade_result: TradeResult {
                number_of_trades: acc.total_trades,
                winning: acc.winning_trades,
                losing: acc.losing_trades,
                win_rate: acc.win_rate(),
                max_drawdown: acc.max_drawdown,
            },
            trade_pnl: TradePnl {
                realized: acc.realized_pnl,
                unrealized: acc.unrealized_pnl,
                total: acc.realized_pnl + acc.unrealized_pnl,
                max_loss: acc.max_single_loss,
                max_profit: acc.max_single_profit,
            },
            holding_time: HoldingTime { min, max, avg },
            total_fees: acc.total_fees,
            file_paths: inner.file_paths.clone(),
            strategy: inner.strategy.clone(),
        }
    }

    /// Atomically serializes the cumulative snapshot to `<runPath>/stats.yaml`.
    pub fn write_stats_yaml(&self, run_path: &std::path::Path) -> Result<(), EngineError> {
        let snapshot = self.get_cumulative_stats();
        let yaml = serde_yaml::to_string(&snapshot)
            .map_err(|e| EngineError::wrap("failed to serialize stats snapshot", e.into()))?;

        let final_path = run_path.join("stats.yaml");
        let tmp_path = run_path.join("stats.yaml.tmp");
        std::fs::write(&tmp_path, yaml)
            .map_err(|e| EngineError::wrap(format!("failed to write {:?}", tmp_path), e.into()))?;
        std::fs::rename(&tmp_path, &final_path)
            .map_err(|e| EngineError::wrap(format!("failed to finalize {:?}", final_path), e.into()))?;
        Ok(())
    }
}
