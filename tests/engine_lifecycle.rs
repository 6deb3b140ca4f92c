//! End-to-end orchestrator behavior against mock providers and a mock
//! strategy runtime, covering Scenarios S1-S3 and S6 from `spec.md` §8.
//! Mirrors the teacher's top-level `tests/` integration style.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use futures::stream::{self, StreamExt};
use livetrade::{
    AccountInfo, Candle, CandleStream, EngineCallbacks, EngineConfig, EngineError, LiveTradingEngine,
    MarketDataProvider, Order, OrderSpec, Position, ProviderStatus, StrategyRuntime, StrategySource,
    Trade, TradeFilter, TradingProvider,
};
use livetrade::application::host_api::HostApi;
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

fn candle(minute: i64, close: i64) -> Candle {
    Candle {
        symbol: "BTCUSDT".to_string(),
        timestamp: Utc.timestamp_opt(minute * 60, 0).single().unwrap(),
        open: dec!(50000),
        high: dec!(50000),
        low: dec!(50000),
        close: rust_decimal::Decimal::from(close),
        volume: dec!(1),
    }
}

struct MockMarketDataProvider {
    events: Mutex<Vec<(Option<Candle>, Option<EngineError>)>>,
}

#[async_trait]
impl MarketDataProvider for MockMarketDataProvider {
    fn symbols(&self) -> Vec<String> {
        vec!["BTCUSDT".to_string()]
    }

    fn interval(&self) -> String {
        "1m".to_string()
    }

    async fn stream(&self, _cancel: CancellationToken) -> CandleStream {
        let events = std::mem::take(&mut *self.events.lock().unwrap());
        stream::iter(events).boxed()
    }

    async fn historical(
        &self,
        _symbol: &str,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<Vec<Candle>, EngineError> {
        Ok(Vec::new())
    }

    fn set_on_status_change(&self, _callback: Box<dyn Fn(ProviderStatus) + Send + Sync>) {}
}

struct MockTradingProvider;

#[async_trait]
impl TradingProvider for MockTradingProvider {
    async fn check_connection(&self, _cancel: CancellationToken) -> Result<(), EngineError> {
        Ok(())
    }
    async fn place_order(&self, _spec: OrderSpec, _cancel: CancellationToken) -> Result<Order, EngineError> {
        unimplemented!()
    }
    async fn place_multiple_orders(
        &self,
        _specs: Vec<OrderSpec>,
        _cancel: CancellationToken,
    ) -> Vec<Result<Order, EngineError>> {
        Vec::new()
    }
    async fn cancel_order(&self, _order_id: &str, _cancel: CancellationToken) -> Result<(), EngineError> {
        Ok(())
    }
    async fn cancel_all_orders(&self, _cancel: CancellationToken) -> Result<(), EngineError> {
        Ok(())
    }
    async fn get_order_status(&self, order_id: &str, _cancel: CancellationToken) -> Result<Order, EngineError> {
        Err(EngineError::OrderNotFound {
            order_id: order_id.to_string(),
        })
    }
    async fn get_position(&self, _symbol: &str, _cancel: CancellationToken) -> Result<Option<Position>, EngineError> {
        Ok(None)
    }
    async fn get_positions(&self, _cancel: CancellationToken) -> Result<Vec<Position>, EngineError> {
        Ok(Vec::new())
    }
    async fn get_open_orders(&self, _cancel: CancellationToken) -> Result<Vec<Order>, EngineError> {
        Ok(Vec::new())
    }
    async fn get_trades(&self, _filter: TradeFilter, _cancel: CancellationToken) -> Result<Vec<Trade>, EngineError> {
        Ok(Vec::new())
    }
    async fn get_account_info(&self, _cancel: CancellationToken) -> Result<AccountInfo, EngineError> {
        Ok(AccountInfo::default())
    }
}

struct MockStrategy {
    runtime_version: String,
    process_calls: Arc<AtomicUsize>,
}

#[async_trait]
impl StrategyRuntime for MockStrategy {
    async fn initialize_api(&mut self, _api: HostApi) -> Result<(), EngineError> {
        Ok(())
    }
    fn get_runtime_engine_version(&self) -> String {
        self.runtime_version.clone()
    }
    async fn initialize(&mut self, _raw_config: String) -> Result<(), EngineError> {
        Ok(())
    }
    async fn process_data(&mut self, _candle: Candle) -> Result<(), EngineError> {
        self.process_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
    fn name(&self) -> String {
        "mock-strategy".to_string()
    }
}

async fn engine_with_strategy(runtime_version: &str, process_calls: Arc<AtomicUsize>) -> LiveTradingEngine {
    let dir = tempdir().unwrap();
    let engine = LiveTradingEngine::initialize(EngineConfig::new(dir.path())).unwrap();
    engine
        .load_strategy(StrategySource::Runtime(Box::new(MockStrategy {
            runtime_version: runtime_version.to_string(),
            process_calls,
        })))
        .await
        .unwrap();
    engine
}

#[tokio::test]
async fn s1_happy_path_no_persistence() {
    let process_calls = Arc::new(AtomicUsize::new(0));
    let engine = engine_with_strategy("1.0.0", process_calls.clone()).await;

    let provider = Arc::new(MockMarketDataProvider {
        events: Mutex::new(vec![
            (Some(candle(0, 50000)), None),
            (Some(candle(1, 50100)), None),
            (Some(candle(2, 50200)), None),
        ]),
    });
    engine.set_market_data_provider(provider).await;
    engine.set_trading_provider(Arc::new(MockTradingProvider)).await;

    let start_calls = Arc::new(AtomicUsize::new(0));
    let start_calls_cb = start_calls.clone();
    let market_data_calls = Arc::new(AtomicUsize::new(0));
    let market_data_calls_cb = market_data_calls.clone();
    let stop_result = Arc::new(Mutex::new(None));
    let stop_result_cb = stop_result.clone();

    let callbacks = EngineCallbacks {
        on_engine_start: Some(Box::new(move |symbols, interval, previous_path| {
            start_calls_cb.fetch_add(1, Ordering::SeqCst);
            assert_eq!(symbols, ["BTCUSDT".to_string()]);
            assert_eq!(interval, "1m");
            assert_eq!(previous_path, "");
            Ok(())
        })),
        on_market_data: Some(Box::new(move |_candle| {
            market_data_calls_cb.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })),
        on_engine_stop: Some(Box::new(move |err| {
            *stop_result_cb.lock().unwrap() = Some(err.is_none());
        })),
        ..Default::default()
    };

    let result = engine.run(CancellationToken::new(), callbacks).await;

    assert!(result.is_ok());
    assert_eq!(start_calls.load(Ordering::SeqCst), 1);
    assert_eq!(market_data_calls.load(Ordering::SeqCst), 3);
    assert_eq!(process_calls.load(Ordering::SeqCst), 3);
    assert_eq!(*stop_result.lock().unwrap(), Some(true));
}

#[tokio::test]
async fn s2_stream_error_is_non_fatal() {
    let process_calls = Arc::new(AtomicUsize::new(0));
    let engine = engine_with_strategy("1.0.0", process_calls.clone()).await;

    let provider = Arc::new(MockMarketDataProvider {
        events: Mutex::new(vec![
            (Some(candle(0, 50000)), None),
            (
                None,
                Some(EngineError::Other {
                    reason: "provider hiccup".to_string(),
                    source: None,
                }),
            ),
            (Some(candle(2, 50200)), None),
        ]),
    });
    engine.set_market_data_provider(provider).await;
    engine.set_trading_provider(Arc::new(MockTradingProvider)).await;

    let error_calls = Arc::new(AtomicUsize::new(0));
    let error_calls_cb = error_calls.clone();

    let callbacks = EngineCallbacks {
        on_error: Some(Box::new(move |_err| {
            error_calls_cb.fetch_add(1, Ordering::SeqCst);
        })),
        ..Default::default()
    };

    let result = engine.run(CancellationToken::new(), callbacks).await;

    assert!(result.is_ok());
    assert_eq!(error_calls.load(Ordering::SeqCst), 1);
    assert_eq!(process_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn s3_cancellation_stops_the_run() {
    let process_calls = Arc::new(AtomicUsize::new(0));
    let engine = engine_with_strategy("1.0.0", process_calls.clone()).await;

    let provider = Arc::new(MockMarketDataProvider {
        events: Mutex::new(vec![
            (Some(candle(0, 50000)), None),
            (Some(candle(1, 50100)), None),
            (Some(candle(2, 50200)), None),
            (Some(candle(3, 50300)), None),
        ]),
    });
    engine.set_market_data_provider(provider).await;
    engine.set_trading_provider(Arc::new(MockTradingProvider)).await;

    let cancel = CancellationToken::new();
    let cancel_for_callback = cancel.clone();
    let market_data_calls = Arc::new(AtomicUsize::new(0));
    let market_data_calls_cb = market_data_calls.clone();
    let stop_was_cancelled = Arc::new(Mutex::new(false));
    let stop_was_cancelled_cb = stop_was_cancelled.clone();

    let callbacks = EngineCallbacks {
        on_market_data: Some(Box::new(move |_candle| {
            let n = market_data_calls_cb.fetch_add(1, Ordering::SeqCst) + 1;
            if n == 3 {
                cancel_for_callback.cancel();
            }
            Ok(())
        })),
        on_engine_stop: Some(Box::new(move |err| {
            *stop_was_cancelled_cb.lock().unwrap() =
                matches!(err, Some(EngineError::Cancelled) | Some(EngineError::CallbackFailed { .. }));
        })),
        ..Default::default()
    };

    let result = engine.run(cancel, callbacks).await;

    assert!(result.is_err());
    assert!(market_data_calls.load(Ordering::SeqCst) <= 4);
}

#[tokio::test]
async fn s6_version_mismatch_aborts_before_any_candle() {
    let process_calls = Arc::new(AtomicUsize::new(0));
    let engine = engine_with_strategy("0.9.0", process_calls.clone()).await;

    let provider = Arc::new(MockMarketDataProvider {
        events: Mutex::new(vec![(Some(candle(0, 50000)), None)]),
    });
    engine.set_market_data_provider(provider).await;
    engine.set_trading_provider(Arc::new(MockTradingProvider)).await;

    let stop_err = Arc::new(Mutex::new(false));
    let stop_err_cb = stop_err.clone();
    let callbacks = EngineCallbacks {
        on_engine_stop: Some(Box::new(move |err| {
            *stop_err_cb.lock().unwrap() = matches!(err, Some(EngineError::VersionMismatch { .. }));
        })),
        ..Default::default()
    };

    let result = engine.run(CancellationToken::new(), callbacks).await;

    assert!(matches!(result, Err(EngineError::VersionMismatch { .. })));
    assert_eq!(process_calls.load(Ordering::SeqCst), 0);
    assert!(*stop_err.lock().unwrap());
}
