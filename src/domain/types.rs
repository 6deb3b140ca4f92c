//! Wire-level data model shared between the engine, the persistence layer,
//! and the sandboxed strategy runtime.
//!
//! Every type here crosses the host <-> strategy boundary at some point, so
//! each enum carries a `#[serde(other)]` fallback to the default named in the
//! spec (buy, market, circle, RSI, no-action) instead of failing to
//! deserialize on an unknown wire value.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
    #[serde(other)]
    Unknown,
}

impl Default for OrderSide {
    fn default() -> Self {
        OrderSide::Buy
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit,
    #[serde(other)]
    Unknown,
}

impl Default for OrderType {
    fn default() -> Self {
        OrderType::Market
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionSide {
    Long,
    Short,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Filled,
    Cancelled,
    Rejected,
    Failed,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Cancelled | OrderStatus::Rejected | OrderStatus::Failed
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarkColor {
    Green,
    Red,
    Blue,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarkShape {
    Circle,
    Square,
    Triangle,
    #[serde(other)]
    Unknown,
}

impl Default for MarkShape {
    fn default() -> Self {
        MarkShape::Circle
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarkSeverity {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// A fully resolved bar. Immutable once accepted; uniqueness key is
/// `(symbol, timestamp)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

/// Strategy-facing reason attached to an order, free-form by design.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderReason {
    pub code: String,
    pub message: String,
}

/// What a strategy asks the venue to do. Not persisted directly; becomes an
/// `Order` once the venue accepts it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSpec {
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub quantity: Decimal,
    pub price: Decimal,
    pub position_side: PositionSide,
    pub reason: OrderReason,
    pub take_profit: Option<Decimal>,
    pub stop_loss: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub quantity: Decimal,
    pub price: Decimal,
    pub position_side: PositionSide,
    pub strategy_name: String,
    pub reason: OrderReason,
    pub status: OrderStatus,
    pub fee: Decimal,
    pub is_completed: bool,
    pub created_at: DateTime<Utc>,
}

/// An order embedded plus execution detail. Append-only, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub order: Order,
    pub executed_at: DateTime<Utc>,
    pub executed_quantity: Decimal,
    pub executed_price: Decimal,
    pub fee: Decimal,
    pub realized_pnl: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub signal_type: String,
    pub name: String,
    pub reason: String,
    /// Indicator-specific payload, carried as a JSON string across the
    /// sandbox boundary.
    pub raw_value: String,
    pub indicator_tag: String,
}

/// Strategy-authored annotation attached to a specific candle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mark {
    pub candle_id: String,
    pub color: MarkColor,
    pub shape: MarkShape,
    pub severity: MarkSeverity,
    pub title: String,
    pub message: String,
    pub category: String,
    pub signal: Option<Signal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub level: LogLevel,
    pub message: String,
    pub fields: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TradeFilter {
    pub symbol: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub side: Option<PositionSide>,
    pub quantity: Decimal,
    pub average_price: Decimal,
    pub unrealized_pnl: Decimal,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountInfo {
    pub balance: Decimal,
    pub equity: Decimal,
    pub unrealized_pnl: Decimal,
    pub total_fees: Decimal,
    pub margin_used: Decimal,
}

/// Engine run/session status, emitted via `OnStatusUpdate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineStatus {
    Idle,
    Prefetching,
    Running,
    Stopped,
}

pub fn new_order_id() -> String {
    Uuid::new_v4().to_string()
}
