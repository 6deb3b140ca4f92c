//! External collaborator contracts (`spec.md` §6). These are treated only
//! as unreliable black boxes by the orchestrator; concrete implementations
//! (a specific exchange, a specific sandbox VM) are out of scope.

use crate::domain::errors::EngineError;
use crate::domain::types::{
    AccountInfo, Candle, EngineStatus, Order, OrderSpec, Position, Trade, TradeFilter,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

pub type CandleStream = BoxStream<'static, (Option<Candle>, Option<EngineError>)>;

/// Connection-transition notifications from a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderStatus {
    Connected,
    Disconnected,
    Reconnecting,
}

/// `spec.md` §6: market-data provider contract.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    fn symbols(&self) -> Vec<String>;
    fn interval(&self) -> String;
    async fn stream(&self, cancel: CancellationToken) -> CandleStream;
    async fn historical(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>, EngineError>;
    fn set_on_status_change(&self, callback: Box<dyn Fn(ProviderStatus) + Send + Sync>);
}

/// `spec.md` §6: trading-venue provider contract (also the backing of
/// most of the host API's order/position/account operations).
#[async_trait]
pub trait TradingProvider: Send + Sync {
    async fn check_connection(&self, cancel: CancellationToken) -> Result<(), EngineError>;
    async fn place_order(
        &self,
        spec: OrderSpec,
        cancel: CancellationToken,
    ) -> Result<Order, EngineError>;
    async fn place_multiple_orders(
        &self,
        specs: Vec<OrderSpec>,
        cancel: CancellationToken,
    ) -> Vec<Result<Order, EngineError>>;
    async fn cancel_order(&self, order_id: &str, cancel: CancellationToken) -> Result<(), EngineError>;
    async fn cancel_all_orders(&self, cancel: CancellationToken) -> Result<(), EngineError>;
    async fn get_order_status(
        &self,
        order_id: &str,
        cancel: CancellationToken,
    ) -> Result<Order, EngineError>;
    async fn get_position(
        &self,
        symbol: &str,
        cancel: CancellationToken,
    ) -> Result<Option<Position>, EngineError>;
    async fn get_positions(&self, cancel: CancellationToken) -> Result<Vec<Position>, EngineError>;
    async fn get_open_orders(&self, cancel: CancellationToken) -> Result<Vec<Order>, EngineError>;
    async fn get_trades(
        &self,
        filter: TradeFilter,
        cancel: CancellationToken,
    ) -> Result<Vec<Trade>, EngineError>;
    async fn get_account_info(&self, cancel: CancellationToken) -> Result<AccountInfo, EngineError>;

    /// Registers a callback the venue invokes as it confirms fills. Orders
    /// are written to C3 synchronously by `PlaceOrder`'s caller; trades are
    /// append-only and only ever arrive this way, since a single `PlaceOrder`
    /// call does not carry execution detail (`spec.md` §3's `Trade` shape).
    /// Default no-op for providers that confirm fills out of band (e.g. via
    /// `GetTrades` polling) instead of pushing them.
    fn set_on_trade(&self, _callback: Box<dyn Fn(Trade) + Send + Sync>) {}
}

/// Minimum strategy-runtime entry points (`spec.md` §6). Only the host <->
/// strategy contract is specified; the sandbox VM that hosts an actual
/// strategy implementation is out of scope.
#[async_trait]
pub trait StrategyRuntime: Send + Sync {
    async fn initialize_api(&mut self, api: crate::application::host_api::HostApi) -> Result<(), EngineError>;
    fn get_runtime_engine_version(&self) -> String;
    async fn initialize(&mut self, raw_config: String) -> Result<(), EngineError>;
    async fn process_data(&mut self, candle: Candle) -> Result<(), EngineError>;
    fn name(&self) -> String;
    fn get_config_schema(&self) -> Option<String> {
        None
    }
    fn get_description(&self) -> Option<String> {
        None
    }
    fn get_identifier(&self) -> Option<String> {
        None
    }
}

/// All optional callbacks from `spec.md` §6, gathered into one struct so
/// `Run` takes a single argument instead of nine.
#[derive(Default)]
pub struct EngineCallbacks {
    pub on_engine_start: Option<
        Box<dyn Fn(&[String], &str, &str) -> Result<(), EngineError> + Send + Sync>,
    >,
    pub on_engine_stop: Option<Box<dyn Fn(Option<&EngineError>) + Send + Sync>>,
    pub on_market_data: Option<Box<dyn Fn(&Candle) -> Result<(), EngineError> + Send + Sync>>,
    pub on_strategy_error: Option<Box<dyn Fn(&Candle, &EngineError) + Send + Sync>>,
    pub on_error: Option<Box<dyn Fn(&EngineError) + Send + Sync>>,
    pub on_order_placed:
        Option<Box<dyn Fn(&Order) -> Result<(), EngineError> + Send + Sync>>,
    pub on_status_update:
        Option<Box<dyn Fn(EngineStatus) -> Result<(), EngineError> + Send + Sync>>,
    pub on_stats_update: Option<
        Box<dyn Fn(&crate::domain::stats::StatsSnapshot) -> Result<(), EngineError> + Send + Sync>,
    >,
    pub on_provider_status_change:
        Option<Box<dyn Fn(ProviderStatus) -> Result<(), EngineError> + Send + Sync>>,
}

impl EngineCallbacks {
    /// Invoke a fatal callback; propagate failure as `CallbackFailed`.
    pub(crate) fn fire_fatal<T>(
        cb: &Option<Box<dyn Fn(T) -> Result<(), EngineError> + Send + Sync>>,
        arg: T,
    ) -> Result<(), EngineError> {
        if let Some(f) = cb {
            f(arg).map_err(|e| EngineError::CallbackFailed {
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }

    /// Invoke a non-fatal callback; log-and-swallow any error.
    pub(crate) fn fire_soft<T>(
        cb: &Option<Box<dyn Fn(T) -> Result<(), EngineError> + Send + Sync>>,
        arg: T,
    ) {
        if let Some(f) = cb {
            if let Err(e) = f(arg) {
                tracing::warn!("callback failed (non-fatal): {}", e);
            }
        }
    }
}

pub type CacheMap = HashMap<String, String>;
