//! A library implementing a live algorithmic trading engine: candle
//! caching and storage, run-scoped artifact writers, session and stats
//! tracking, warm-up prefetching, a sandboxed-strategy host API, and the
//! orchestrator tying them together.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use application::engine::{LiveTradingEngine, StrategySource};
pub use application::host_api::{HostApi, Indicator, IndicatorOutput, RuntimeContext, RuntimeContextBuilder};
pub use config::EngineConfig;
pub use domain::errors::EngineError;
pub use domain::ports::{
    CandleStream, EngineCallbacks, MarketDataProvider, ProviderStatus, StrategyRuntime, TradingProvider,
};
pub use domain::types::*;
