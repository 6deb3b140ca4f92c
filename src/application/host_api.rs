//! The surface the sandboxed strategy calls into (`spec.md` §4.8).
//!
//! `RuntimeContext` is built once, by `RuntimeContextBuilder`, before
//! `HostApi` is handed to the strategy's `InitializeApi`. Per the
//! cyclic-reference note in `spec.md` §9, the context never retains a
//! back-reference to the `HostApi` built on top of it.

use crate::application::artifact_writers::{ArtifactWriter, OrdersWriter};
use crate::application::candle_cache::CandleCache;
use crate::application::candle_store::CandleStore;
use crate::domain::errors::EngineError;
use crate::domain::ports::{CacheMap, EngineCallbacks, TradingProvider};
use crate::domain::types::{
    AccountInfo, Candle, LogEntry, Mark, Order, OrderSpec, Position, Signal, Trade, TradeFilter,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Indicator output for a single candle, returned by `GetSignal`.
#[derive(Debug, Clone)]
pub struct IndicatorOutput {
    pub value: f64,
    pub reason: String,
    pub indicator_type: String,
}

/// Indicator math itself is out of scope (`spec.md` §1); this trait is the
/// seam a concrete indicator library would plug into.
pub trait Indicator: Send + Sync {
    fn configure(&mut self, raw_config: &str) -> Result<(), EngineError>;
    fn compute(&self, candle: &Candle) -> Result<IndicatorOutput, EngineError>;
}

#[derive(Default)]
pub struct IndicatorRegistry {
    indicators: Mutex<HashMap<String, Box<dyn Indicator>>>,
}

impl IndicatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, tag: impl Into<String>, indicator: Box<dyn Indicator>) {
        self.indicators.lock().insert(tag.into(), indicator);
    }

    pub fn configure(&self, tag: &str, raw_config: &str) -> Result<(), EngineError> {
        let mut indicators = self.indicators.lock();
        let indicator = indicators
            .get_mut(tag)
            .ok_or_else(|| EngineError::IndicatorNotFound { tag: tag.to_string() })?;
        indicator.configure(raw_config)
    }

    pub fn signal(&self, tag: &str, candle: &Candle) -> Result<IndicatorOutput, EngineError> {
        let indicators = self.indicators.lock();
        let indicator = indicators
            .get(tag)
            .ok_or_else(|| EngineError::IndicatorNotFound { tag: tag.to_string() })?;
        indicator.compute(candle)
    }
}

/// Either the durable candle store (preferred, when `DataOutputPath` is
/// set) or the in-memory cache — whichever the orchestrator bound at
/// strategy-init time.
pub enum DataAccess {
    Store(Arc<dyn CandleStore>),
    Cache(Arc<CandleCache>),
}

impl DataAccess {
    pub async fn last(&self, symbol: &str) -> Result<Candle, EngineError> {
        match self {
            DataAccess::Store(store) => {
                let now = Utc::now();
                let result = store.last_n(symbol, now, 1).await?;
                result
                    .candles
                    .into_iter()
                    .next_back()
                    .ok_or_else(|| EngineError::DataNotFound {
                        symbol: symbol.to_string(),
                    })
            }
            DataAccess::Cache(cache) => {
                cache.last(symbol).ok_or_else(|| EngineError::DataNotFound {
                    symbol: symbol.to_string(),
                })
            }
        }
    }

    pub async fn range(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>, EngineError> {
        match self {
            DataAccess::Store(store) => store.range(symbol, start, end).await,
            DataAccess::Cache(cache) => Ok(cache.range(symbol, start, end)),
        }
    }

    pub async fn count(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<u64, EngineError> {
        match self {
            DataAccess::Store(store) => store.count(start, end).await,
            DataAccess::Cache(_) => Err(EngineError::QueryFailed {
                reason: "Count requires a durable candle store".to_string(),
            }),
        }
    }

    pub async fn execute_sql(
        &self,
        query: &str,
    ) -> Result<Vec<HashMap<String, String>>, EngineError> {
        match self {
            DataAccess::Store(store) => store.execute_sql(query).await,
            DataAccess::Cache(_) => Err(EngineError::QueryFailed {
                reason: "the candle cache does not support SQL queries".to_string(),
            }),
        }
    }
}

pub struct RuntimeContext {
    pub data_access: DataAccess,
    pub indicators: IndicatorRegistry,
    marker_sink: Option<Mutex<Vec<Mark>>>,
    trading_provider: Arc<dyn TradingProvider>,
    orders_writer: Option<Arc<dyn OrdersWriter>>,
    callbacks: Option<Arc<EngineCallbacks>>,
    cache: Mutex<CacheMap>,
    log_store: Option<Mutex<Vec<LogEntry>>>,
    current_candle: Mutex<Option<Candle>>,
}

impl RuntimeContext {
    pub fn set_current_candle(&self, candle: Candle) {
        *self.current_candle.lock() = Some(candle);
    }

    pub fn current_candle(&self) -> Option<Candle> {
        self.current_candle.lock().clone()
    }

    /// Marks newly appended since the last drain (used by the orchestrator
    /// to flush the marker sink into C3 after every candle).
    pub fn drain_marks(&self) -> Vec<Mark> {
        self.marker_sink
            .as_ref()
            .map(|s| std::mem::take(&mut *s.lock()))
            .unwrap_or_default()
    }

    pub fn drain_logs(&self) -> Vec<LogEntry> {
        self.log_store
            .as_ref()
            .map(|s| std::mem::take(&mut *s.lock()))
            .unwrap_or_default()
    }

    /// Upserts a just-placed or just-mutated order into C3 and fires
    /// `OnOrderPlaced` (`spec.md` §3: "upserted into C3 by id"). Writer
    /// failures are logged and swallowed, matching the other three writers.
    async fn record_order(&self, order: &Order) {
        if let Some(writer) = &self.orders_writer {
            if let Err(e) = writer.write(order.clone()).await {
                warn!("failed to persist order {}: {}", order.id, e);
            }
        }
        if let Some(callbacks) = &self.callbacks {
            EngineCallbacks::fire_soft(&callbacks.on_order_placed, order);
        }
    }
}

/// Builds a `RuntimeContext` without handing the context a back-reference
/// to the `HostApi` constructed on top of it.
pub struct RuntimeContextBuilder {
    data_access: Option<DataAccess>,
    trading_provider: Option<Arc<dyn TradingProvider>>,
    orders_writer: Option<Arc<dyn OrdersWriter>>,
    callbacks: Option<Arc<EngineCallbacks>>,
    enable_logging: bool,
}

impl RuntimeContextBuilder {
    pub fn new() -> Self {
        Self {
            data_access: None,
            trading_provider: None,
            orders_writer: None,
            callbacks: None,
            enable_logging: false,
        }
    }

    pub fn data_access(mut self, data_access: DataAccess) -> Self {
        self.data_access = Some(data_access);
        self
    }

    pub fn trading_provider(mut self, provider: Arc<dyn TradingProvider>) -> Self {
        self.trading_provider = Some(provider);
        self
    }

    /// Set when `SetDataOutputPath` has wired a durable orders writer.
    /// `PlaceOrder`/`PlaceMultipleOrders` upsert into it when present.
    pub fn orders_writer(mut self, writer: Option<Arc<dyn OrdersWriter>>) -> Self {
        self.orders_writer = writer;
        self
    }

    /// Gives the host API a path to fire `OnOrderPlaced` without handing it
    /// the whole orchestrator.
    pub fn callbacks(mut self, callbacks: Arc<EngineCallbacks>) -> Self {
        self.callbacks = Some(callbacks);
        self
    }

    pub fn enable_logging(mut self, enable: bool) -> Self {
        self.enable_logging = enable;
        self
    }

    pub fn build(self) -> RuntimeContext {
        RuntimeContext {
            data_access: self.data_access.expect("data_access is required"),
            indicators: IndicatorRegistry::new(),
            marker_sink: self.enable_logging.then(|| Mutex::new(Vec::new())),
            trading_provider: self.trading_provider.expect("trading_provider is required"),
            orders_writer: self.orders_writer,
            callbacks: self.callbacks,
            cache: Mutex::new(HashMap::new()),
            log_store: self.enable_logging.then(|| Mutex::new(Vec::new())),
            current_candle: Mutex::new(None),
        }
    }
}

impl Default for RuntimeContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The host API surface handed to the sandboxed strategy.
#[derive(Clone)]
pub struct HostApi {
    context: Arc<RuntimeContext>,
}

impl HostApi {
    pub fn new(context: Arc<RuntimeContext>) -> Self {
        Self { context }
    }

    pub async fn place_order(
        &self,
        spec: OrderSpec,
        cancel: CancellationToken,
    ) -> Result<Order, EngineError> {
        let order = self.context.trading_provider.place_order(spec, cancel).await?;
        self.context.record_order(&order).await;
        Ok(order)
    }

    pub async fn place_multiple_orders(
        &self,
        specs: Vec<OrderSpec>,
        cancel: CancellationToken,
    ) -> Vec<Result<Order, EngineError>> {
        let results = self
            .context
            .trading_provider
            .place_multiple_orders(specs, cancel)
            .await;
        for result in &results {
            if let Ok(order) = result {
                self.context.record_order(order).await;
            }
        }
        results
    }

    pub async fn cancel_order(
        &self,
        order_id: &str,
        cancel: CancellationToken,
    ) -> Result<(), EngineError> {
        self.context.trading_provider.cancel_order(order_id, cancel).await
    }

    pub async fn cancel_all_orders(&self, cancel: CancellationToken) -> Result<(), EngineError> {
        self.context.trading_provider.cancel_all_orders(cancel).await
    }

    pub async fn get_order_status(
        &self,
        order_id: &str,
        cancel: CancellationToken,
    ) -> Result<Order, EngineError> {
        self.context
            .trading_provider
            .get_order_status(order_id, cancel)
            .await
    }

    pub async fn get_position(
        &self,
        symbol: &str,
        cancel: CancellationToken,
    ) -> Result<Option<Position>, EngineError> {
        self.context.trading_provider.get_position(symbol, cancel).await
    }

    pub async fn get_positions(&self, cancel: CancellationToken) -> Result<Vec<Position>, EngineError> {
        self.context.trading_provider.get_positions(cancel).await
    }

    pub async fn get_open_orders(&self, cancel: CancellationToken) -> Result<Vec<Order>, EngineError> {
        self.context.trading_provider.get_open_orders(cancel).await
    }

    pub async fn get_trades(
        &self,
        filter: TradeFilter,
        cancel: CancellationToken,
    ) -> Result<Vec<Trade>, EngineError> {
        self.context.trading_provider.get_trades(filter, cancel).await
    }

    pub async fn get_account_info(&self, cancel: CancellationToken) -> Result<AccountInfo, EngineError> {
        self.context.trading_provider.get_account_info(cancel).await
    }

    pub async fn read_last_data(&self, symbol: &str) -> Result<Candle, EngineError> {
        self.context.data_access.last(symbol).await
    }

    pub async fn get_range(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        interval: Option<&str>,
    ) -> Result<Vec<Candle>, EngineError> {
        if interval.is_some() {
            return Err(EngineError::Other {
                reason: "interval aggregation is not supported".to_string(),
                source: None,
            });
        }
        self.context.data_access.range(symbol, start, end).await
    }

    pub async fn count(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<u64, EngineError> {
        self.context.data_access.count(start, end).await
    }

    pub async fn execute_sql(
        &self,
        query: &str,
    ) -> Result<Vec<HashMap<String, String>>, EngineError> {
        self.context.data_access.execute_sql(query).await
    }

    pub fn get_signal(&self, indicator_tag: &str, candle: &Candle) -> Result<Signal, EngineError> {
        let output = self.context.indicators.signal(indicator_tag, candle)?;
        Ok(Signal {
            symbol: candle.symbol.clone(),
            timestamp: candle.timestamp,
            signal_type: output.indicator_type.clone(),
            name: indicator_tag.to_string(),
            reason: output.reason,
            raw_value: output.value.to_string(),
            indicator_tag: indicator_tag.to_string(),
        })
    }

    pub fn configure_indicator(&self, tag: &str, raw_config: &str) -> Result<(), EngineError> {
        self.context.indicators.configure(tag, raw_config)
    }

    pub fn get_cache(&self, key: &str) -> Option<String> {
        self.context.cache.lock().get(key).cloned()
    }

    pub fn set_cache(&self, key: impl Into<String>, value: impl Into<String>) {
        self.context.cache.lock().insert(key.into(), value.into());
    }

    pub fn mark(&self, candle: Option<&Candle>, mut mark: Mark) -> Result<(), EngineError> {
        let Some(sink) = &self.context.marker_sink else {
            return Err(EngineError::MarkerNotAvailable);
        };
        let candle = candle.ok_or(EngineError::MarketDataRequired)?;
        mark.candle_id = format!("{}:{}", candle.symbol, candle.timestamp.timestamp());
        sink.lock().push(mark);
        Ok(())
    }

    pub fn get_markers(&self) -> Vec<Mark> {
        self.context
            .marker_sink
            .as_ref()
            .map(|s| s.lock().clone())
            .unwrap_or_default()
    }

    pub fn log(&self, entry: LogEntry) {
        match entry.level {
            crate::domain::types::LogLevel::Debug => debug!(symbol = %entry.symbol, "{}", entry.message),
            crate::domain::types::LogLevel::Info => info!(symbol = %entry.symbol, "{}", entry.message),
            crate::domain::types::LogLevel::Warn => warn!(symbol = %entry.symbol, "{}", entry.message),
            crate::domain::types::LogLevel::Error => error!(symbol = %entry.symbol, "{}", entry.message),
        }
        if let Some(store) = &self.context.log_store {
            store.lock().push(entry);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{MarkColor, MarkSeverity, MarkShape};
    use rust_decimal_macros::dec;

    fn sample_candle() -> Candle {
        Candle {
            symbol: "BTCUSDT".to_string(),
            timestamp: Utc::now(),
            open: dec!(1),
            high: dec!(1),
            low: dec!(1),
            close: dec!(1),
            volume: dec!(1),
        }
    }

    struct NoopProvider;
    #[async_trait::async_trait]
    impl TradingProvider for NoopProvider {
        async fn check_connection(&self, _c: CancellationToken) -> Result<(), EngineError> {
            Ok(())
        }
        async fn place_order(&self, _s: OrderSpec, _c: CancellationToken) -> Result<Order, EngineError> {
            unimplemented!()
        }
        async fn place_multiple_orders(
            &self,
            _s: Vec<OrderSpec>,
            _c: CancellationToken,
        ) -> Vec<Result<Order, EngineError>> {
            Vec::new()
        }
        async fn cancel_order(&self, _id: &str, _c: CancellationToken) -> Result<(), EngineError> {
            Ok(())
        }
        async fn cancel_all_orders(&self, _c: CancellationToken) -> Result<(), EngineError> {
            Ok(())
        }
        async fn get_order_status(&self, id: &str, _c: CancellationToken) -> Result<Order, EngineError> {
            Err(EngineError::OrderNotFound { order_id: id.to_string() })
        }
        async fn get_position(&self, _s: &str, _c: CancellationToken) -> Result<Option<Position>, EngineError> {
            Ok(None)
        }
        async fn get_positions(&self, _c: CancellationToken) -> Result<Vec<Position>, EngineError> {
            Ok(Vec::new())
        }
        async fn get_open_orders(&self, _c: CancellationToken) -> Result<Vec<Order>, EngineError> {
            Ok(Vec::new())
        }
        async fn get_trades(&self, _f: TradeFilter, _c: CancellationToken) -> Result<Vec<Trade>, EngineError> {
            Ok(Vec::new())
        }
        async fn get_account_info(&self, _c: CancellationToken) -> Result<AccountInfo, EngineError> {
            Ok(AccountInfo::default())
        }
    }

    fn host_api(enable_logging: bool) -> HostApi {
        let cache = Arc::new(CandleCache::new(10));
        let ctx = RuntimeContextBuilder::new()
            .data_access(DataAccess::Cache(cache))
            .trading_provider(Arc::new(NoopProvider))
            .enable_logging(enable_logging)
            .build();
        HostApi::new(Arc::new(ctx))
    }

    #[test]
    fn mark_requires_candle() {
        let api = host_api(true);
        let mark = Mark {
            candle_id: String::new(),
            color: MarkColor::Green,
            shape: MarkShape::Circle,
            severity: MarkSeverity::Info,
            title: "t".to_string(),
            message: "m".to_string(),
            category: "c".to_string(),
            signal: None,
        };
        let err = api.mark(None, mark).unwrap_err();
        assert!(matches!(err, EngineError::MarketDataRequired));
    }

    #[test]
    fn mark_unavailable_without_logging() {
        let api = host_api(false);
        let candle = sample_candle();
        let mark = Mark {
            candle_id: String::new(),
            color: MarkColor::Green,
            shape: MarkShape::Circle,
            severity: MarkSeverity::Info,
            title: "t".to_string(),
            message: "m".to_string(),
            category: "c".to_string(),
            signal: None,
        };
        let err = api.mark(Some(&candle), mark).unwrap_err();
        assert!(matches!(err, EngineError::MarkerNotAvailable));
    }

    #[test]
    fn cache_roundtrips() {
        let api = host_api(true);
        assert_eq!(api.get_cache("k"), None);
        api.set_cache("k", "v");
        assert_eq!(api.get_cache("k"), Some("v".to_string()));
    }

    #[test]
    fn marks_drain_in_insertion_order() {
        let cache = Arc::new(CandleCache::new(10));
        let ctx = Arc::new(
            RuntimeContextBuilder::new()
                .data_access(DataAccess::Cache(cache))
                .trading_provider(Arc::new(NoopProvider))
                .enable_logging(true)
                .build(),
        );
        let api = HostApi::new(ctx.clone());
        let candle = sample_candle();

        for i in 0..3 {
            let mark = Mark {
                candle_id: String::new(),
                color: MarkColor::Green,
                shape: MarkShape::Circle,
                severity: MarkSeverity::Info,
                title: format!("t{}", i),
                message: "m".to_string(),
                category: "c".to_string(),
                signal: None,
            };
            api.mark(Some(&candle), mark).unwrap();
        }

        assert_eq!(api.get_markers().len(), 3);
        let drained = ctx.drain_marks();
        assert_eq!(drained.len(), 3);
        assert_eq!(drained[0].title, "t0");
        assert_eq!(ctx.drain_marks().len(), 0);
    }
}
