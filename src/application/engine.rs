//! `LiveTradingEngine`, the C8 orchestrator (`spec.md` §4.1): owns the
//! run loop, strategy lifecycle, and the status state machine
//! (`Idle -> Prefetching? -> Running -> Stopped`). Grounded in the
//! teacher's top-level driver in `application/system/mod.rs` (sequenced
//! startup, deferred shutdown on every exit path, status broadcast).

use crate::application::artifact_writers::{ArtifactWriter, OrdersWriter, TradesWriter};
use crate::application::candle_cache::CandleCache;
use crate::application::candle_store::CandleStore;
use crate::application::host_api::{DataAccess, HostApi, RuntimeContextBuilder};
use crate::application::prefetch_manager::PrefetchManager;
use crate::application::session_manager::SessionManager;
use crate::application::stats_tracker::StatsTracker;
use crate::config::EngineConfig;
use crate::domain::errors::EngineError;
use crate::domain::ports::{EngineCallbacks, MarketDataProvider, StrategyRuntime, TradingProvider};
use crate::domain::stats::StrategyDescriptor;
use crate::domain::types::EngineStatus;
use futures_util::StreamExt;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

/// How a strategy implementation is handed to `LoadStrategy`. Only
/// `Runtime` is implemented; the other two are reserved hooks for an
/// out-of-scope sandbox VM loader (`spec.md` §1).
pub enum StrategySource {
    Runtime(Box<dyn StrategyRuntime>),
    Bytes(Vec<u8>),
    File(std::path::PathBuf),
}

const ENGINE_VERSION: &str = "1.0.0";

struct Providers {
    market_data: Option<Arc<dyn MarketDataProvider>>,
    trading: Option<Arc<dyn TradingProvider>>,
}

struct Writers {
    orders: Arc<dyn OrdersWriter>,
    trades: Arc<dyn TradesWriter>,
    marks: Arc<dyn crate::application::artifact_writers::MarksWriter>,
    logs: Arc<dyn crate::application::artifact_writers::LogsWriter>,
}

/// The engine orchestrator. One instance drives exactly one strategy for
/// exactly one `Run` call; `spec.md` explicitly excludes multi-strategy
/// multiplexing.
pub struct LiveTradingEngine {
    config: EngineConfig,
    candle_cache: Arc<CandleCache>,
    candle_store: Option<Arc<dyn CandleStore>>,
    session: Arc<SessionManager>,
    stats: Arc<StatsTracker>,
    providers: AsyncMutex<Providers>,
    strategy: AsyncMutex<Option<Box<dyn StrategyRuntime>>>,
    strategy_config: AsyncMutex<Option<String>>,
    writers: Option<Writers>,
    /// Trades the trading provider has pushed via `set_on_trade` since the
    /// last drain. `Trade` carries no direct host-API write path (`spec.md`
    /// §3: a `Trade` needs execution detail a bare `PlaceOrder` return
    /// doesn't have), so the venue integration reports fills here instead.
    pending_trades: Arc<parking_lot::Mutex<Vec<crate::domain::types::Trade>>>,
}

impl LiveTradingEngine {
    /// `spec.md` §4.1 `Initialize`: allocates the run directory, builds the
    /// cache with a normalized size, and prepares (but does not open) the
    /// stats tracker.
    pub fn initialize(config: EngineConfig) -> Result<Self, EngineError> {
        let session = SessionManager::initialize(&config.data_output_path)?;
        let stats = StatsTracker::new(
            session.run_id().to_string(),
            Vec::new(),
            session.session_start(),
        );

        Ok(Self {
            candle_cache: Arc::new(CandleCache::new(config.market_data_cache_size)),
            candle_store: None,
            session: Arc::new(session),
            stats: Arc::new(stats),
            providers: AsyncMutex::new(Providers {
                market_data: None,
                trading: None,
            }),
            strategy: AsyncMutex::new(None),
            strategy_config: AsyncMutex::new(None),
            writers: None,
            pending_trades: Arc::new(parking_lot::Mutex::new(Vec::new())),
            config,
        })
    }

    pub async fn set_market_data_provider(&self, provider: Arc<dyn MarketDataProvider>) {
        self.providers.lock().await.market_data = Some(provider);
    }

    pub async fn set_trading_provider(&self, provider: Arc<dyn TradingProvider>) {
        self.providers.lock().await.trading = Some(provider);
    }

    pub async fn load_strategy(&self, source: StrategySource) -> Result<(), EngineError> {
        match source {
            StrategySource::Runtime(runtime) => {
                *self.strategy.lock().await = Some(runtime);
                Ok(())
            }
            StrategySource::Bytes(_) | StrategySource::File(_) => Err(EngineError::StrategyNotLoaded {
                reason: "loading a strategy from bytes or a file is not supported in this build"
                    .to_string(),
            }),
        }
    }

    pub async fn set_strategy_config(&self, raw_config: impl Into<String>) {
        *self.strategy_config.lock().await = Some(raw_config.into());
    }

    /// Opens the run's SQLite file and wires the candle store and all four
    /// artifact writers against it. Called once, before `Run`.
    pub async fn set_data_output_path(&mut self, path: &std::path::Path) -> Result<(), EngineError> {
        let pool = crate::infrastructure::sqlite_store::open_pool(path).await?;

        let candle_store = Arc::new(crate::infrastructure::sqlite_store::SqliteCandleStore::new(
            pool.clone(),
            path.to_string_lossy().into_owned(),
        ));
        let orders = Arc::new(crate::infrastructure::sqlite_store::SqliteOrdersWriter::new(pool.clone()));
        let trades = Arc::new(crate::infrastructure::sqlite_store::SqliteTradesWriter::new(pool.clone()));
        let marks = Arc::new(crate::infrastructure::sqlite_store::SqliteMarksWriter::new(pool.clone()));
        let logs = Arc::new(crate::infrastructure::sqlite_store::SqliteLogsWriter::new(pool));

        orders.initialize().await?;
        trades.initialize().await?;
        marks.initialize().await?;
        logs.initialize().await?;

        self.candle_store = Some(candle_store);
        self.writers = Some(Writers {
            orders,
            trades,
            marks,
            logs,
        });
        Ok(())
    }

    /// `spec.md` §4.1 pre-run check: strategy, both providers, and (when
    /// `DataOutputPath` was configured) the writers must all be present.
    fn pre_run_check(&self, providers: &Providers) -> Result<(), EngineError> {
        if providers.market_data.is_none() {
            return Err(EngineError::EngineNotInitialized {
                reason: "no market data provider configured".to_string(),
            });
        }
        if providers.trading.is_none() {
            return Err(EngineError::EngineNotInitialized {
                reason: "no trading provider configured".to_string(),
            });
        }
        Ok(())
    }

    /// `spec.md` §4.1 `Run`: the five-step strategy init, the main candle
    /// loop, and deferred cleanup on every exit path (normal completion,
    /// cancellation, or a fatal callback/strategy error).
    pub async fn run(&self, cancel: CancellationToken, callbacks: EngineCallbacks) -> Result<(), EngineError> {
        let callbacks = Arc::new(callbacks);

        let providers = self.providers.lock().await;
        self.pre_run_check(&providers)?;
        let market_data = providers.market_data.clone().unwrap();
        let trading = providers.trading.clone().unwrap();
        drop(providers);

        let status_callbacks = callbacks.clone();
        market_data.set_on_status_change(Box::new(move |status| {
            if let Some(cb) = &status_callbacks.on_provider_status_change {
                if let Err(e) = cb(status) {
                    warn!("on_provider_status_change callback failed (non-fatal): {}", e);
                }
            }
        }));

        let pending_trades = self.pending_trades.clone();
        trading.set_on_trade(Box::new(move |trade| {
            pending_trades.lock().push(trade);
        }));

        // `spec.md` §6: invoked once at startup; failure is reported via
        // `OnError` and never aborts the run.
        if let Err(e) = trading.check_connection(cancel.clone()).await {
            warn!("trading provider check_connection failed (non-fatal): {}", e);
            if let Some(cb) = &callbacks.on_error {
                cb(&e);
            }
        }

        // Everything that can fail between here and the end of the run loop
        // funnels into one `Result` so the deferred cleanup below always
        // runs and `OnEngineStop` always fires, on every exit path.
        let run_result: Result<(), EngineError> = async {
            let mut strategy_guard = self.strategy.lock().await;
            let strategy = strategy_guard
                .as_mut()
                .ok_or_else(|| EngineError::StrategyNotLoaded {
                    reason: "no strategy loaded".to_string(),
                })?;

            let symbols = market_data.symbols();

            let data_access = match &self.candle_store {
                Some(store) => DataAccess::Store(store.clone()),
                None => DataAccess::Cache(self.candle_cache.clone()),
            };
            let context = Arc::new(
                RuntimeContextBuilder::new()
                    .data_access(data_access)
                    .trading_provider(trading.clone())
                    .orders_writer(self.writers.as_ref().map(|w| w.orders.clone()))
                    .callbacks(callbacks.clone())
                    .enable_logging(self.config.enable_logging)
                    .build(),
            );
            let host_api = HostApi::new(context.clone());

            // Strategy init sequence, step 1-4.
            strategy.initialize_api(host_api.clone()).await?;

            let strategy_version = strategy.get_runtime_engine_version();
            if !is_version_compatible(ENGINE_VERSION, &strategy_version) {
                return Err(EngineError::VersionMismatch {
                    engine_version: ENGINE_VERSION.to_string(),
                    strategy_version,
                });
            }

            let raw_config = self.strategy_config.lock().await.clone().unwrap_or_default();
            strategy.initialize(raw_config).await?;

            self.stats.finalize(
                StrategyDescriptor {
                    id: strategy.get_identifier().unwrap_or_default(),
                    version: strategy_version,
                    name: strategy.name(),
                },
                vec![self.session.join_path("orders.sqlite")],
            );

            let interval = market_data.interval();
            if let Some(cb) = &callbacks.on_engine_start {
                let previous_data_path = self
                    .candle_store
                    .as_ref()
                    .map(|s| s.path())
                    .unwrap_or_default();
                if let Err(e) = cb(&symbols, &interval, &previous_data_path) {
                    return Err(EngineError::CallbackFailed {
                        reason: e.to_string(),
                    });
                }
            }

            let prefetch = PrefetchManager::new(
                self.config.prefetch.clone(),
                market_data.clone(),
                self.candle_store.clone(),
                self.candle_cache.clone(),
            );
            prefetch
                .execute_prefetch(&symbols, |status| Self::emit_status(&callbacks, status))
                .await;

            self.run_loop(
                &cancel,
                &callbacks,
                &mut **strategy,
                &host_api,
                &market_data,
                &prefetch,
                &symbols,
                &context,
            )
            .await
        }
        .await;

        // Deferred cleanup: runs on every exit path.
        Self::emit_status(&callbacks, EngineStatus::Stopped);
        if let Err(e) = self.stats.write_stats_yaml(&self.session.current_run_path()) {
            warn!("failed to write final stats.yaml: {}", e);
        }
        if let Some(writers) = &self.writers {
            for flush in [
                writers.orders.flush().await,
                writers.trades.flush().await,
                writers.marks.flush().await,
                writers.logs.flush().await,
            ] {
                if let Err(e) = flush {
                    warn!("failed to flush writer during shutdown: {}", e);
                }
            }
            for close in [
                writers.orders.close().await,
                writers.trades.close().await,
                writers.marks.close().await,
                writers.logs.close().await,
            ] {
                if let Err(e) = close {
                    warn!("failed to close writer during shutdown: {}", e);
                }
            }
        }

        if let Some(cb) = &callbacks.on_engine_stop {
            cb(run_result.as_ref().err());
        }

        run_result
    }

    async fn run_loop(
        &self,
        cancel: &CancellationToken,
        callbacks: &EngineCallbacks,
        strategy: &mut (dyn StrategyRuntime + '_),
        host_api: &HostApi,
        market_data: &Arc<dyn MarketDataProvider>,
        prefetch: &PrefetchManager,
        symbols: &[String],
        context: &Arc<crate::application::host_api::RuntimeContext>,
    ) -> Result<(), EngineError> {
        let mut stream = market_data.stream(cancel.clone()).await;
        let mut first_candle = true;

        loop {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }

            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(EngineError::Cancelled),
                item = stream.next() => item,
            };

            let Some((candle, err)) = next else {
                break;
            };

            if let Some(e) = err {
                warn!("market data provider reported an error: {}", e);
                if let Some(cb) = &callbacks.on_error {
                    cb(&e);
                }
                continue;
            }

            let Some(candle) = candle else { continue };

            if first_candle {
                first_candle = false;
                prefetch
                    .handle_stream_start(candle.timestamp, symbols, |status| {
                        Self::emit_status(callbacks, status)
                    })
                    .await;
            }

            if self.session.handle_date_boundary(candle.timestamp)? {
                self.stats.handle_date_boundary(candle.timestamp.date_naive());
            }

            self.candle_cache.add(candle.clone());
            if let Some(store) = &self.candle_store {
                if let Err(e) = store.write(candle.clone()).await {
                    warn!("failed to persist candle: {}", e);
                }
            }

            context.set_current_candle(candle.clone());

            if let Some(cb) = &callbacks.on_market_data {
                if let Err(e) = cb(&candle) {
                    return Err(EngineError::CallbackFailed {
                        reason: e.to_string(),
                    });
                }
            }

            if let Err(e) = strategy.process_data(candle.clone()).await {
                error!("strategy.process_data failed: {}", e);
                if let Some(cb) = &callbacks.on_strategy_error {
                    cb(&candle, &e);
                }
                continue;
            }

            self.drain_marks_into_writer(host_api, context).await;
            self.drain_logs_into_writer(host_api, context).await;
            self.drain_trades().await;

            if let Some(cb) = &callbacks.on_stats_update {
                let snapshot = self.stats.get_cumulative_stats();
                if let Err(e) = cb(&snapshot) {
                    warn!("on_stats_update callback failed (non-fatal): {}", e);
                }
            }
        }

        Ok(())
    }

    async fn drain_marks_into_writer(
        &self,
        _host_api: &HostApi,
        context: &Arc<crate::application::host_api::RuntimeContext>,
    ) {
        let Some(writers) = &self.writers else { return };
        for mark in context.drain_marks() {
            if let Err(e) = writers.marks.write(mark).await {
                warn!("failed to persist mark: {}", e);
            }
        }
    }

    async fn drain_logs_into_writer(
        &self,
        _host_api: &HostApi,
        context: &Arc<crate::application::host_api::RuntimeContext>,
    ) {
        let Some(writers) = &self.writers else { return };
        for entry in context.drain_logs() {
            if let Err(e) = writers.logs.write(entry).await {
                warn!("failed to persist log entry: {}", e);
            }
        }
    }

    /// Folds every trade the venue has pushed since the last drain into C5
    /// and, when persistence is configured, appends it to C3.trades.
    /// `spec.md` §8 invariant 3: the trades-artifact row count tracks the
    /// number of successful `RecordTrade` calls, so both happen together.
    async fn drain_trades(&self) {
        let trades = std::mem::take(&mut *self.pending_trades.lock());
        for trade in trades {
            self.stats.record_trade(&trade);
            if let Some(writers) = &self.writers {
                if let Err(e) = writers.trades.write(trade).await {
                    warn!("failed to persist trade: {}", e);
                }
            }
        }
    }

    fn emit_status(callbacks: &EngineCallbacks, status: EngineStatus) {
        if let Some(cb) = &callbacks.on_status_update {
            if let Err(e) = cb(status) {
                warn!("on_status_update callback failed (non-fatal): {}", e);
            }
        }
    }
}

/// `spec.md` §4.1 step 3: compatible when the major components match and
/// the strategy's minor does not exceed the engine's — a strategy may rely
/// on host-API surface the engine hasn't grown yet otherwise.
fn is_version_compatible(engine_version: &str, strategy_version: &str) -> bool {
    let major_minor = |v: &str| {
        let mut parts = v.split('.');
        let major = parts.next().unwrap_or("0").parse::<u64>().unwrap_or(0);
        let minor = parts.next().unwrap_or("0").parse::<u64>().unwrap_or(0);
        (major, minor)
    };
    let (engine_major, engine_minor) = major_minor(engine_version);
    let (strategy_major, strategy_minor) = major_minor(strategy_version);
    engine_major == strategy_major && strategy_minor <= engine_minor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_compatibility_requires_minor_at_most_engine() {
        assert!(is_version_compatible("1.4.0", "1.2.3"));
        assert!(is_version_compatible("1.4.0", "1.4.0"));
        assert!(!is_version_compatible("1.0.0", "1.9.3"));
        assert!(!is_version_compatible("1.0.0", "2.0.0"));
    }
}
