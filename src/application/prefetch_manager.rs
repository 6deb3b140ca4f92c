//! Optional warm-up of historical candles before (and at) stream start
//! (`spec.md` §4.7). Grounded in the teacher's `WarmupService`
//! (`application/agents/warmup_service.rs`): fetch historical bars for a
//! set of symbols, non-fatal on failure, log and continue.

use crate::application::candle_cache::CandleCache;
use crate::application::candle_store::CandleStore;
use crate::domain::ports::MarketDataProvider;
use crate::domain::types::EngineStatus;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct PrefetchOptions {
    /// Number of warm-up candles to request per symbol.
    pub count: usize,
    /// Whether to backfill the gap between the last persisted candle and
    /// the first live candle once the stream starts.
    pub fill_gaps: bool,
}

impl Default for PrefetchOptions {
    fn default() -> Self {
        Self {
            count: 200,
            fill_gaps: true,
        }
    }
}

pub struct PrefetchManager {
    options: PrefetchOptions,
    market_provider: Arc<dyn MarketDataProvider>,
    candle_store: Option<Arc<dyn CandleStore>>,
    candle_cache: Arc<CandleCache>,
}

impl PrefetchManager {
    pub fn new(
        options: PrefetchOptions,
        market_provider: Arc<dyn MarketDataProvider>,
        candle_store: Option<Arc<dyn CandleStore>>,
        candle_cache: Arc<CandleCache>,
    ) -> Self {
        Self {
            options,
            market_provider,
            candle_store,
            candle_cache,
        }
    }

    /// Called once before the stream starts. Errors are logged and
    /// swallowed; warm-up failure must never abort the run.
    pub async fn execute_prefetch(
        &self,
        symbols: &[String],
        on_status: impl Fn(EngineStatus),
    ) {
        on_status(EngineStatus::Prefetching);

        let end = Utc::now();
        let lookback_minutes = (self.options.count as i64).max(1) * 5;
        let start = end - chrono::Duration::minutes(lookback_minutes);

        for symbol in symbols {
            match self.market_provider.historical(symbol, start, end).await {
                Ok(candles) => {
                    info!("prefetch: loaded {} candles for {}", candles.len(), symbol);
                    for candle in candles {
                        self.candle_cache.add(candle.clone());
                        if let Some(store) = &self.candle_store {
                            if let Err(e) = store.write(candle).await {
                                warn!("prefetch: failed to persist candle for {}: {}", symbol, e);
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!("prefetch: failed to fetch history for {}: {}", symbol, e);
                }
            }
        }
    }

    /// Called after the first live candle arrives. May backfill the gap
    /// between the last persisted candle and `first_candle_time`. Owns the
    /// `Prefetching -> Running` transition.
    pub async fn handle_stream_start(
        &self,
        first_candle_time: DateTime<Utc>,
        symbols: &[String],
        on_status: impl Fn(EngineStatus),
    ) {
        if self.options.fill_gaps {
            if let Some(store) = &self.candle_store {
                for symbol in symbols {
                    let last = store
                        .last_n(symbol, first_candle_time, 1)
                        .await
                        .ok()
                        .and_then(|r| r.candles.into_iter().next_back());

                    if let Some(last) = last {
                        if last.timestamp < first_candle_time {
                            match self
                                .market_provider
                                .historical(symbol, last.timestamp, first_candle_time)
                                .await
                            {
                                Ok(gap_candles) => {
                                    for candle in gap_candles {
                                        self.candle_cache.add(candle.clone());
                                        if let Err(e) = store.write(candle).await {
                                            warn!(
                                                "prefetch: failed to persist gap candle for {}: {}",
                                                symbol, e
                                            );
                                        }
                                    }
                                }
                                Err(e) => {
                                    warn!("prefetch: failed to backfill gap for {}: {}", symbol, e);
                                }
                            }
                        }
                    }
                }
            }
        }

        on_status(EngineStatus::Running);
    }
}
