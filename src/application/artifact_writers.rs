//! Four append-oriented writers with the same shape (`spec.md` §4.4):
//! orders, trades, marks, logs. Concrete implementations live in
//! `infrastructure::sqlite_store`, one table each in the run's SQLite file.

use crate::domain::errors::EngineError;
use crate::domain::types::{LogEntry, Mark, Order, Trade};
use async_trait::async_trait;
use rust_decimal::Decimal;

#[async_trait]
pub trait ArtifactWriter<Row>: Send + Sync {
    async fn initialize(&self) -> Result<(), EngineError>;
    async fn write(&self, row: Row) -> Result<(), EngineError>;
    async fn flush(&self) -> Result<(), EngineError>;
    async fn close(&self) -> Result<(), EngineError>;
    async fn count(&self) -> Result<u64, EngineError>;
}

/// Orders upsert on `order_id`: a status-change event replaces the
/// original row rather than appending a duplicate.
#[async_trait]
pub trait OrdersWriter: ArtifactWriter<Order> {}

/// Trades are strictly append-only; export ordering is `executed_at ASC`.
#[async_trait]
pub trait TradesWriter: ArtifactWriter<Trade> {
    async fn total_pnl(&self) -> Result<Decimal, EngineError>;
    async fn total_fees(&self) -> Result<Decimal, EngineError>;
}

#[async_trait]
pub trait MarksWriter: ArtifactWriter<Mark> {}

#[async_trait]
pub trait LogsWriter: ArtifactWriter<LogEntry> {}
