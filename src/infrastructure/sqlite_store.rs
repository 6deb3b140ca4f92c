//! `sqlx`/SQLite-backed implementations of `CandleStore` (C2) and the four
//! `ArtifactWriter` impls (C3). Grounded in the teacher's
//! `infrastructure/persistence/database.rs` (WAL mode, pool setup) and
//! `infrastructure/persistence/repositories/risk_state_repository.rs`
//! (Decimal-as-TEXT columns, `ON CONFLICT DO UPDATE` upserts).

use crate::application::artifact_writers::{
    ArtifactWriter, LogsWriter, MarksWriter, OrdersWriter, TradesWriter,
};
use crate::application::candle_store::{CandleStore, LastNResult};
use crate::domain::errors::EngineError;
use crate::domain::types::{
    Candle, LogEntry, LogLevel, Mark, MarkColor, MarkSeverity, MarkShape, Order, OrderReason,
    OrderSide, OrderStatus, OrderType, PositionSide, Signal, Trade,
};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row, SqlitePool};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use tokio::sync::Mutex;

/// Opens (creating if absent) the run's SQLite file in WAL mode and
/// ensures all five tables exist. One pool is shared by the candle store
/// and all four artifact writers for a given run.
pub async fn open_pool(path: &Path) -> Result<SqlitePool, EngineError> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .map_err(|e| EngineError::wrap(format!("failed to open {:?}", path), e.into()))?;

    for statement in SCHEMA_STATEMENTS {
        sqlx::query(statement)
            .execute(&pool)
            .await
            .map_err(|e| EngineError::wrap("failed to apply schema", e.into()))?;
    }

    Ok(pool)
}

const SCHEMA_STATEMENTS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS candles (
        symbol TEXT NOT NULL,
        ts INTEGER NOT NULL,
        open TEXT NOT NULL,
        high TEXT NOT NULL,
        low TEXT NOT NULL,
        close TEXT NOT NULL,
        volume TEXT NOT NULL,
        PRIMARY KEY (symbol, ts)
    )",
    "CREATE INDEX IF NOT EXISTS idx_candles_symbol_time ON candles (symbol, ts)",
    "CREATE TABLE IF NOT EXISTS orders (
        id TEXT PRIMARY KEY,
        symbol TEXT NOT NULL,
        side TEXT NOT NULL,
        order_type TEXT NOT NULL,
        quantity TEXT NOT NULL,
        price TEXT NOT NULL,
        position_side TEXT NOT NULL,
        strategy_name TEXT NOT NULL,
        reason_code TEXT NOT NULL,
        reason_message TEXT NOT NULL,
        status TEXT NOT NULL,
        fee TEXT NOT NULL,
        is_completed INTEGER NOT NULL,
        created_at INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS trades (
        order_id TEXT NOT NULL,
        symbol TEXT NOT NULL,
        side TEXT NOT NULL,
        order_type TEXT NOT NULL,
        strategy_name TEXT NOT NULL,
        executed_at INTEGER NOT NULL,
        executed_quantity TEXT NOT NULL,
        executed_price TEXT NOT NULL,
        fee TEXT NOT NULL,
        realized_pnl TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_trades_executed_at ON trades (executed_at)",
    "CREATE TABLE IF NOT EXISTS marks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        candle_id TEXT NOT NULL,
        color TEXT NOT NULL,
        shape TEXT NOT NULL,
        severity TEXT NOT NULL,
        title TEXT NOT NULL,
        message TEXT NOT NULL,
        category TEXT NOT NULL,
        signal_type TEXT,
        signal_name TEXT,
        signal_reason TEXT,
        signal_raw_value TEXT,
        signal_indicator_tag TEXT
    )",
    "CREATE TABLE IF NOT EXISTS logs (
        timestamp INTEGER NOT NULL,
        symbol TEXT NOT NULL,
        level TEXT NOT NULL,
        message TEXT NOT NULL,
        fields TEXT NOT NULL
    )",
];

fn decimal_to_text(value: Decimal) -> String {
    value.to_string()
}

fn decimal_from_text(value: &str) -> Decimal {
    Decimal::from_str(value).unwrap_or_default()
}

fn side_to_text(side: OrderSide) -> &'static str {
    match side {
        OrderSide::Buy => "buy",
        OrderSide::Sell => "sell",
        OrderSide::Unknown => "unknown",
    }
}

fn side_from_text(value: &str) -> OrderSide {
    match value {
        "buy" => OrderSide::Buy,
        "sell" => OrderSide::Sell,
        _ => OrderSide::Unknown,
    }
}

fn order_type_to_text(order_type: OrderType) -> &'static str {
    match order_type {
        OrderType::Market => "market",
        OrderType::Limit => "limit",
        OrderType::Unknown => "unknown",
    }
}

fn order_type_from_text(value: &str) -> OrderType {
    match value {
        "market" => OrderType::Market,
        "limit" => OrderType::Limit,
        _ => OrderType::Unknown,
    }
}

fn position_side_to_text(side: PositionSide) -> &'static str {
    match side {
        PositionSide::Long => "long",
        PositionSide::Short => "short",
        PositionSide::Unknown => "unknown",
    }
}

fn position_side_from_text(value: &str) -> PositionSide {
    match value {
        "long" => PositionSide::Long,
        "short" => PositionSide::Short,
        _ => PositionSide::Unknown,
    }
}

fn status_to_text(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Pending => "pending",
        OrderStatus::Filled => "filled",
        OrderStatus::Cancelled => "cancelled",
        OrderStatus::Rejected => "rejected",
        OrderStatus::Failed => "failed",
    }
}

fn status_from_text(value: &str) -> OrderStatus {
    match value {
        "filled" => OrderStatus::Filled,
        "cancelled" => OrderStatus::Cancelled,
        "rejected" => OrderStatus::Rejected,
        "failed" => OrderStatus::Failed,
        _ => OrderStatus::Pending,
    }
}

fn row_to_candle(row: &SqliteRow) -> Result<Candle, EngineError> {
    let ts: i64 = row
        .try_get("ts")
        .map_err(|e| EngineError::wrap("malformed candle row", e.into()))?;
    Ok(Candle {
        symbol: row
            .try_get("symbol")
            .map_err(|e| EngineError::wrap("malformed candle row", e.into()))?,
        timestamp: Utc
            .timestamp_opt(ts, 0)
            .single()
            .ok_or_else(|| EngineError::QueryFailed {
                reason: format!("invalid timestamp {}", ts),
            })?,
        open: decimal_from_text(&row.try_get::<String, _>("open").unwrap_or_default()),
        high: decimal_from_text(&row.try_get::<String, _>("high").unwrap_or_default()),
        low: decimal_from_text(&row.try_get::<String, _>("low").unwrap_or_default()),
        close: decimal_from_text(&row.try_get::<String, _>("close").unwrap_or_default()),
        volume: decimal_from_text(&row.try_get::<String, _>("volume").unwrap_or_default()),
    })
}

pub struct SqliteCandleStore {
    pool: SqlitePool,
    path: String,
}

impl SqliteCandleStore {
    pub fn new(pool: SqlitePool, path: impl Into<String>) -> Self {
        Self {
            pool,
            path: path.into(),
        }
    }
}

#[async_trait]
impl CandleStore for SqliteCandleStore {
    fn path(&self) -> String {
        self.path.clone()
    }

    async fn write(&self, candle: Candle) -> Result<(), EngineError> {
        sqlx::query(
            "INSERT INTO candles (symbol, ts, open, high, low, close, volume)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(symbol, ts) DO UPDATE SET
                open = excluded.open, high = excluded.high, low = excluded.low,
                close = excluded.close, volume = excluded.volume",
        )
        .bind(&candle.symbol)
        .bind(candle.timestamp.timestamp())
        .bind(decimal_to_text(candle.open))
        .bind(decimal_to_text(candle.high))
        .bind(decimal_to_text(candle.low))
        .bind(decimal_to_text(candle.close))
        .bind(decimal_to_text(candle.volume))
        .execute(&self.pool)
        .await
        .map_err(|e| EngineError::wrap("failed to write candle", e.into()))?;
        Ok(())
    }

    async fn range(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>, EngineError> {
        let rows = sqlx::query(
            "SELECT * FROM candles WHERE symbol = ? AND ts >= ? AND ts <= ? ORDER BY ts ASC",
        )
        .bind(symbol)
        .bind(start.timestamp())
        .bind(end.timestamp())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| EngineError::wrap("failed to query candle range", e.into()))?;

        rows.iter().map(row_to_candle).collect()
    }

    async fn last_n(&self, symbol: &str, end: DateTime<Utc>, n: usize) -> Result<LastNResult, EngineError> {
        let rows = sqlx::query(
            "SELECT * FROM candles WHERE symbol = ? AND ts <= ? ORDER BY ts DESC LIMIT ?",
        )
        .bind(symbol)
        .bind(end.timestamp())
        .bind(n as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| EngineError::wrap("failed to query last_n candles", e.into()))?;

        let mut candles: Vec<Candle> = rows.iter().map(row_to_candle).collect::<Result<_, _>>()?;
        candles.reverse();

        let shortfall = if candles.len() < n {
            Some(EngineError::InsufficientData {
                symbol: symbol.to_string(),
                required: n,
                actual: candles.len(),
            })
        } else {
            None
        };

        Ok(LastNResult { candles, shortfall })
    }

    async fn all_symbols(&self) -> Result<Vec<String>, EngineError> {
        let rows = sqlx::query("SELECT DISTINCT symbol FROM candles")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| EngineError::wrap("failed to list symbols", e.into()))?;
        rows.iter()
            .map(|r| {
                r.try_get::<String, _>("symbol")
                    .map_err(|e| EngineError::wrap("malformed symbol row", e.into()))
            })
            .collect()
    }

    async fn count(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<u64, EngineError> {
        let row = sqlx::query("SELECT COUNT(*) as n FROM candles WHERE ts >= ? AND ts <= ?")
            .bind(start.timestamp())
            .bind(end.timestamp())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| EngineError::wrap("failed to count candles", e.into()))?;
        let n: i64 = row
            .try_get("n")
            .map_err(|e| EngineError::wrap("malformed count row", e.into()))?;
        Ok(n as u64)
    }

    async fn execute_sql(
        &self,
        query: &str,
    ) -> Result<Vec<HashMap<String, String>>, EngineError> {
        let rows = sqlx::query(query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| EngineError::QueryFailed {
                reason: e.to_string(),
            })?;

        Ok(rows.iter().map(row_to_string_map).collect())
    }
}

/// Best-effort stringification of an arbitrary result row for `ExecuteSQL`;
/// tries the column types SQLite actually produces, in order.
fn row_to_string_map(row: &SqliteRow) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for column in row.columns() {
        let name = column.name().to_string();
        let idx = column.ordinal();
        let value = row
            .try_get::<String, _>(idx)
            .map(Some)
            .or_else(|_| row.try_get::<i64, _>(idx).map(|v| Some(v.to_string())))
            .or_else(|_| row.try_get::<f64, _>(idx).map(|v| Some(v.to_string())))
            .unwrap_or(None)
            .unwrap_or_default();
        map.insert(name, value);
    }
    map
}

pub struct SqliteOrdersWriter {
    pool: Mutex<SqlitePool>,
}

impl SqliteOrdersWriter {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool: Mutex::new(pool),
        }
    }
}

#[async_trait]
impl ArtifactWriter<Order> for SqliteOrdersWriter {
    async fn initialize(&self) -> Result<(), EngineError> {
        Ok(())
    }

    async fn write(&self, order: Order) -> Result<(), EngineError> {
        let pool = self.pool.lock().await;
        sqlx::query(
            "INSERT INTO orders (id, symbol, side, order_type, quantity, price, position_side,
                strategy_name, reason_code, reason_message, status, fee, is_completed, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                status = excluded.status, fee = excluded.fee,
                is_completed = excluded.is_completed",
        )
        .bind(&order.id)
        .bind(&order.symbol)
        .bind(side_to_text(order.side))
        .bind(order_type_to_text(order.order_type))
        .bind(decimal_to_text(order.quantity))
        .bind(decimal_to_text(order.price))
        .bind(position_side_to_text(order.position_side))
        .bind(&order.strategy_name)
        .bind(&order.reason.code)
        .bind(&order.reason.message)
        .bind(status_to_text(order.status))
        .bind(decimal_to_text(order.fee))
        .bind(order.is_completed)
        .bind(order.created_at.timestamp())
        .execute(&*pool)
        .await
        .map_err(|e| EngineError::wrap("failed to write order", e.into()))?;
        Ok(())
    }

    async fn flush(&self) -> Result<(), EngineError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), EngineError> {
        Ok(())
    }

    async fn count(&self) -> Result<u64, EngineError> {
        let pool = self.pool.lock().await;
        let row = sqlx::query("SELECT COUNT(*) as n FROM orders")
            .fetch_one(&*pool)
            .await
            .map_err(|e| EngineError::wrap("failed to count orders", e.into()))?;
        let n: i64 = row
            .try_get("n")
            .map_err(|e| EngineError::wrap("malformed count row", e.into()))?;
        Ok(n as u64)
    }
}

impl OrdersWriter for SqliteOrdersWriter {}

pub struct SqliteTradesWriter {
    pool: Mutex<SqlitePool>,
}

impl SqliteTradesWriter {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool: Mutex::new(pool),
        }
    }
}

#[async_trait]
impl ArtifactWriter<Trade> for SqliteTradesWriter {
    async fn initialize(&self) -> Result<(), EngineError> {
        Ok(())
    }

    async fn write(&self, trade: Trade) -> Result<(), EngineError> {
        let pool = self.pool.lock().await;
        sqlx::query(
            "INSERT INTO trades (order_id, symbol, side, order_type, strategy_name, executed_at,
                executed_quantity, executed_price, fee, realized_pnl)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&trade.order.id)
        .bind(&trade.order.symbol)
        .bind(side_to_text(trade.order.side))
        .bind(order_type_to_text(trade.order.order_type))
        .bind(&trade.order.strategy_name)
        .bind(trade.executed_at.timestamp())
        .bind(decimal_to_text(trade.executed_quantity))
        .bind(decimal_to_text(trade.executed_price))
        .bind(decimal_to_text(trade.fee))
        .bind(decimal_to_text(trade.realized_pnl))
        .execute(&*pool)
        .await
        .map_err(|e| EngineError::wrap("failed to write trade", e.into()))?;
        Ok(())
    }

    async fn flush(&self) -> Result<(), EngineError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), EngineError> {
        Ok(())
    }

    async fn count(&self) -> Result<u64, EngineError> {
        let pool = self.pool.lock().await;
        let row = sqlx::query("SELECT COUNT(*) as n FROM trades")
            .fetch_one(&*pool)
            .await
            .map_err(|e| EngineError::wrap("failed to count trades", e.into()))?;
        let n: i64 = row
            .try_get("n")
            .map_err(|e| EngineError::wrap("malformed count row", e.into()))?;
        Ok(n as u64)
    }
}

#[async_trait]
impl TradesWriter for SqliteTradesWriter {
    async fn total_pnl(&self) -> Result<Decimal, EngineError> {
        let pool = self.pool.lock().await;
        let rows = sqlx::query("SELECT realized_pnl FROM trades")
            .fetch_all(&*pool)
            .await
            .map_err(|e| EngineError::wrap("failed to sum realized pnl", e.into()))?;
        Ok(rows.iter().fold(Decimal::ZERO, |acc, row| {
            acc + decimal_from_text(&row.try_get::<String, _>("realized_pnl").unwrap_or_default())
        }))
    }

    async fn total_fees(&self) -> Result<Decimal, EngineError> {
        let pool = self.pool.lock().await;
        let rows = sqlx::query("SELECT fee FROM trades")
            .fetch_all(&*pool)
            .await
            .map_err(|e| EngineError::wrap("failed to sum fees", e.into()))?;
        Ok(rows.iter().fold(Decimal::ZERO, |acc, row| {
            acc + decimal_from_text(&row.try_get::<String, _>("fee").unwrap_or_default())
        }))
    }
}

pub struct SqliteMarksWriter {
    pool: Mutex<SqlitePool>,
}

impl SqliteMarksWriter {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool: Mutex::new(pool),
        }
    }
}

fn color_to_text(color: MarkColor) -> &'static str {
    match color {
        MarkColor::Green => "green",
        MarkColor::Red => "red",
        MarkColor::Blue => "blue",
        MarkColor::Other => "other",
    }
}

fn shape_to_text(shape: MarkShape) -> &'static str {
    match shape {
        MarkShape::Circle => "circle",
        MarkShape::Square => "square",
        MarkShape::Triangle => "triangle",
        MarkShape::Unknown => "unknown",
    }
}

fn severity_to_text(severity: MarkSeverity) -> &'static str {
    match severity {
        MarkSeverity::Info => "info",
        MarkSeverity::Warn => "warn",
        MarkSeverity::Error => "error",
    }
}

#[async_trait]
impl ArtifactWriter<Mark> for SqliteMarksWriter {
    async fn initialize(&self) -> Result<(), EngineError> {
        Ok(())
    }

    async fn write(&self, mark: Mark) -> Result<(), EngineError> {
        let pool = self.pool.lock().await;
        sqlx::query(
            "INSERT INTO marks (candle_id, color, shape, severity, title, message, category,
                signal_type, signal_name, signal_reason, signal_raw_value, signal_indicator_tag)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&mark.candle_id)
        .bind(color_to_text(mark.color))
        .bind(shape_to_text(mark.shape))
        .bind(severity_to_text(mark.severity))
        .bind(&mark.title)
        .bind(&mark.message)
        .bind(&mark.category)
        .bind(mark.signal.as_ref().map(|s| s.signal_type.clone()))
        .bind(mark.signal.as_ref().map(|s| s.name.clone()))
        .bind(mark.signal.as_ref().map(|s| s.reason.clone()))
        .bind(mark.signal.as_ref().map(|s| s.raw_value.clone()))
        .bind(mark.signal.as_ref().map(|s| s.indicator_tag.clone()))
        .execute(&*pool)
        .await
        .map_err(|e| EngineError::wrap("failed to write mark", e.into()))?;
        Ok(())
    }

    async fn flush(&self) -> Result<(), EngineError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), EngineError> {
        Ok(())
    }

    async fn count(&self) -> Result<u64, EngineError> {
        let pool = self.pool.lock().await;
        let row = sqlx::query("SELECT COUNT(*) as n FROM marks")
            .fetch_one(&*pool)
            .await
            .map_err(|e| EngineError::wrap("failed to count marks", e.into()))?;
        let n: i64 = row
            .try_get("n")
            .map_err(|e| EngineError::wrap("malformed count row", e.into()))?;
        Ok(n as u64)
    }
}

impl MarksWriter for SqliteMarksWriter {}

pub struct SqliteLogsWriter {
    pool: Mutex<SqlitePool>,
}

impl SqliteLogsWriter {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool: Mutex::new(pool),
        }
    }
}

#[async_trait]
impl ArtifactWriter<LogEntry> for SqliteLogsWriter {
    async fn initialize(&self) -> Result<(), EngineError> {
        Ok(())
    }

    async fn write(&self, entry: LogEntry) -> Result<(), EngineError> {
        let level = match entry.level {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        let fields = serde_json::to_string(&entry.fields)
            .map_err(|e| EngineError::wrap("failed to serialize log fields", e.into()))?;

        let pool = self.pool.lock().await;
        sqlx::query(
            "INSERT INTO logs (timestamp, symbol, level, message, fields) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(entry.timestamp.timestamp())
        .bind(&entry.symbol)
        .bind(level)
        .bind(&entry.message)
        .bind(fields)
        .execute(&*pool)
        .await
        .map_err(|e| EngineError::wrap("failed to write log entry", e.into()))?;
        Ok(())
    }

    async fn flush(&self) -> Result<(), EngineError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), EngineError> {
        Ok(())
    }

    async fn count(&self) -> Result<u64, EngineError> {
        let pool = self.pool.lock().await;
        let row = sqlx::query("SELECT COUNT(*) as n FROM logs")
            .fetch_one(&*pool)
            .await
            .map_err(|e| EngineError::wrap("failed to count log entries", e.into()))?;
        let n: i64 = row
            .try_get("n")
            .map_err(|e| EngineError::wrap("malformed count row", e.into()))?;
        Ok(n as u64)
    }
}

impl LogsWriter for SqliteLogsWriter {}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    fn candle(symbol: &str, minute: i64) -> Candle {
        Candle {
            symbol: symbol.to_string(),
            timestamp: Utc.timestamp_opt(minute * 60, 0).single().unwrap(),
            open: dec!(1),
            high: dec!(2),
            low: dec!(1),
            close: dec!(1.5),
            volume: dec!(10),
        }
    }

    #[tokio::test]
    async fn write_and_range_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("candles.sqlite");
        let pool = open_pool(&path).await.unwrap();
        let store = SqliteCandleStore::new(pool, path.to_string_lossy().into_owned());

        for i in 0..5 {
            store.write(candle("BTCUSDT", i)).await.unwrap();
        }

        let start = Utc.timestamp_opt(0, 0).single().unwrap();
        let end = Utc.timestamp_opt(4 * 60, 0).single().unwrap();
        let got = store.range("BTCUSDT", start, end).await.unwrap();
        assert_eq!(got.len(), 5);
        assert!(got.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[tokio::test]
    async fn last_n_reports_shortfall() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("candles.sqlite");
        let pool = open_pool(&path).await.unwrap();
        let store = SqliteCandleStore::new(pool, path.to_string_lossy().into_owned());

        store.write(candle("BTCUSDT", 0)).await.unwrap();
        let end = Utc.timestamp_opt(600, 0).single().unwrap();
        let result = store.last_n("BTCUSDT", end, 5).await.unwrap();
        assert_eq!(result.candles.len(), 1);
        assert!(result.shortfall.is_some());
    }

    #[tokio::test]
    async fn orders_upsert_replaces_status() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("orders.sqlite");
        let pool = open_pool(&path).await.unwrap();
        let writer = SqliteOrdersWriter::new(pool);

        let mut order = Order {
            id: "o1".to_string(),
            symbol: "BTCUSDT".to_string(),
            side: OrderSide::Buy,
            order_type: OrderType::Market,
            quantity: dec!(1),
            price: dec!(100),
            position_side: PositionSide::Long,
            strategy_name: "s".to_string(),
            reason: OrderReason::default(),
            status: OrderStatus::Pending,
            fee: dec!(0),
            is_completed: false,
            created_at: Utc::now(),
        };
        writer.write(order.clone()).await.unwrap();
        assert_eq!(writer.count().await.unwrap(), 1);

        order.status = OrderStatus::Filled;
        order.is_completed = true;
        writer.write(order).await.unwrap();
        assert_eq!(writer.count().await.unwrap(), 1);
    }
}
