use thiserror::Error;

/// Every error the engine and its collaborators can raise, grouped by
/// concern the way `spec.md` §7 groups them. Kept as one enum (rather than
/// split per-concern the way the teacher splits `TradingError`/
/// `RiskViolation`/`MarketDataError`) because the engine's propagation
/// policy treats the whole taxonomy uniformly.
#[derive(Debug, Error)]
pub enum EngineError {
    // Validation
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },

    #[error("missing parameter: {name}")]
    MissingParameter { name: String },

    #[error("invalid version string: {value}")]
    InvalidVersion { value: String },

    #[error("market data required but none is current")]
    MarketDataRequired,

    // Data
    #[error("data not found for {symbol}")]
    DataNotFound { symbol: String },

    #[error("no data available")]
    NoData,

    #[error("query failed: {reason}")]
    QueryFailed { reason: String },

    #[error("insufficient data for {symbol}: required {required}, got {actual}")]
    InsufficientData {
        symbol: String,
        required: usize,
        actual: usize,
    },

    // Strategy
    #[error("strategy not loaded: {reason}")]
    StrategyNotLoaded { reason: String },

    #[error("strategy runtime error: {reason}")]
    StrategyRuntimeError { reason: String },

    #[error("strategy engine version mismatch: engine {engine_version}, strategy {strategy_version}")]
    VersionMismatch {
        engine_version: String,
        strategy_version: String,
    },

    // Venue
    #[error("order failed: {reason}")]
    OrderFailed { reason: String },

    #[error("order not found: {order_id}")]
    OrderNotFound { order_id: String },

    #[error("position not found: {symbol}")]
    PositionNotFound { symbol: String },

    // Engine
    #[error("engine not initialized: {reason}")]
    EngineNotInitialized { reason: String },

    #[error("callback failed: {reason}")]
    CallbackFailed { reason: String },

    #[error("run was cancelled")]
    Cancelled,

    // Indicator / marker
    #[error("indicator not found: {tag}")]
    IndicatorNotFound { tag: String },

    #[error("marker sink not available (EnableLogging is false)")]
    MarkerNotAvailable,

    /// Escape hatch for venue/provider errors that don't map to a named
    /// kind above; keeps the cause chain via `#[source]`.
    #[error("{reason}")]
    Other {
        reason: String,
        #[source]
        source: Option<anyhow::Error>,
    },
}

impl EngineError {
    pub fn other(reason: impl Into<String>) -> Self {
        EngineError::Other {
            reason: reason.into(),
            source: None,
        }
    }

    pub fn wrap(reason: impl Into<String>, source: anyhow::Error) -> Self {
        EngineError::Other {
            reason: reason.into(),
            source: Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_data_formats_fields() {
        let err = EngineError::InsufficientData {
            symbol: "BTCUSDT".to_string(),
            required: 50,
            actual: 12,
        };
        let msg = err.to_string();
        assert!(msg.contains("BTCUSDT"));
        assert!(msg.contains("50"));
        assert!(msg.contains("12"));
    }

    #[test]
    fn version_mismatch_formats_both_versions() {
        let err = EngineError::VersionMismatch {
            engine_version: "1.3.0".to_string(),
            strategy_version: "0.9.0".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("1.3.0"));
        assert!(msg.contains("0.9.0"));
    }
}
