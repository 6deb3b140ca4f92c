//! Durable, append-only candle table (`spec.md` §4.3). The trait is the
//! contract the orchestrator depends on; `infrastructure::sqlite_store`
//! provides the on-disk implementation backed by `sqlx`.

use crate::domain::errors::EngineError;
use crate::domain::types::Candle;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Returned by `last_n` alongside the (possibly partial) result whenever
/// fewer than the requested number of rows exist.
#[derive(Debug, Clone)]
pub struct LastNResult {
    pub candles: Vec<Candle>,
    pub shortfall: Option<EngineError>,
}

#[async_trait]
pub trait CandleStore: Send + Sync {
    /// Path to the backing file, used as `previousDataPath` by the
    /// orchestrator's `OnEngineStart` callback.
    fn path(&self) -> String;

    async fn write(&self, candle: Candle) -> Result<(), EngineError>;

    async fn range(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>, EngineError>;

    async fn last_n(&self, symbol: &str, end: DateTime<Utc>, n: usize) -> Result<LastNResult, EngineError>;

    async fn all_symbols(&self) -> Result<Vec<String>, EngineError>;

    async fn count(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<u64, EngineError>;

    /// Arbitrary read-only SQL against the backing file. Rows come back as
    /// name -> value string maps, matching the host API's `ExecuteSQL`.
    async fn execute_sql(
        &self,
        query: &str,
    ) -> Result<Vec<std::collections::HashMap<String, String>>, EngineError>;
}
