//! Engine configuration (`spec.md` §4.1 `Initialize`). Mirrors the
//! teacher's `env::var(...).unwrap_or(...)` coalescing style in
//! `src/config.rs`, generalized to the `EngineConfig` the orchestrator's
//! `Initialize` operation consumes.

use crate::application::prefetch_manager::PrefetchOptions;
use std::path::PathBuf;

const DEFAULT_MARKET_DATA_CACHE_SIZE: usize = 1000;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Candles retained per symbol in `CandleCache`. `<=0` is normalized to
    /// `DEFAULT_MARKET_DATA_CACHE_SIZE` rather than rejected.
    pub market_data_cache_size: usize,
    /// Gates the marker sink and log store in `RuntimeContext`; `Mark`/`Log`
    /// return `MarkerNotAvailable` when this is `false`.
    pub enable_logging: bool,
    pub data_output_path: PathBuf,
    pub prefetch: PrefetchOptions,
}

impl EngineConfig {
    pub fn new(data_output_path: impl Into<PathBuf>) -> Self {
        Self {
            market_data_cache_size: DEFAULT_MARKET_DATA_CACHE_SIZE,
            enable_logging: true,
            data_output_path: data_output_path.into(),
            prefetch: PrefetchOptions::default(),
        }
    }

    /// Normalizes a non-positive cache size to the default, logging the
    /// substitution. Called once by `Initialize` before the cache is built.
    pub fn with_market_data_cache_size(mut self, size: i64) -> Self {
        self.market_data_cache_size = if size <= 0 {
            tracing::warn!(
                requested = size,
                default = DEFAULT_MARKET_DATA_CACHE_SIZE,
                "MarketDataCacheSize <= 0, using default"
            );
            DEFAULT_MARKET_DATA_CACHE_SIZE
        } else {
            size as usize
        };
        self
    }

    pub fn with_enable_logging(mut self, enable: bool) -> Self {
        self.enable_logging = enable;
        self
    }

    pub fn with_prefetch(mut self, prefetch: PrefetchOptions) -> Self {
        self.prefetch = prefetch;
        self
    }

    /// Reads overrides from the environment, falling back to the defaults
    /// above for anything unset or unparsable.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let data_output_path = std::env::var("LIVETRADE_DATA_OUTPUT_PATH")
            .unwrap_or_else(|_| "./data".to_string());

        let market_data_cache_size = std::env::var("LIVETRADE_MARKET_DATA_CACHE_SIZE")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(DEFAULT_MARKET_DATA_CACHE_SIZE as i64);

        let enable_logging = std::env::var("LIVETRADE_ENABLE_LOGGING")
            .ok()
            .map(|v| v != "0" && v.to_lowercase() != "false")
            .unwrap_or(true);

        let prefetch_count = std::env::var("LIVETRADE_PREFETCH_COUNT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or_else(|| PrefetchOptions::default().count);

        let fill_gaps = std::env::var("LIVETRADE_PREFETCH_FILL_GAPS")
            .ok()
            .map(|v| v != "0" && v.to_lowercase() != "false")
            .unwrap_or_else(|| PrefetchOptions::default().fill_gaps);

        Self::new(data_output_path)
            .with_market_data_cache_size(market_data_cache_size)
            .with_enable_logging(enable_logging)
            .with_prefetch(PrefetchOptions {
                count: prefetch_count,
                fill_gaps,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_positive_cache_size_falls_back_to_default() {
        let cfg = EngineConfig::new("./data").with_market_data_cache_size(0);
        assert_eq!(cfg.market_data_cache_size, DEFAULT_MARKET_DATA_CACHE_SIZE);

        let cfg = EngineConfig::new("./data").with_market_data_cache_size(-5);
        assert_eq!(cfg.market_data_cache_size, DEFAULT_MARKET_DATA_CACHE_SIZE);
    }

    #[test]
    fn positive_cache_size_is_kept() {
        let cfg = EngineConfig::new("./data").with_market_data_cache_size(50);
        assert_eq!(cfg.market_data_cache_size, 50);
    }
}
