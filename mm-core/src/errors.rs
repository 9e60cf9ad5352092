//! Error types for the two boundaries that are allowed to fail in a typed
//! way: configuration loading (fatal) and event ingestion (dropped and
//! logged, never propagated). Everything past ingestion, including
//! constraint violations on submit, state divergence, and emergency
//! conditions, is an ordinary return value, not an error.

use thiserror::Error;

/// Configuration problems that must refuse to start the engine.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("tick size must be positive, got {0}")]
    NonPositiveTick(rust_decimal::Decimal),

    #[error("base increment must be positive, got {0}")]
    NonPositiveIncrement(rust_decimal::Decimal),

    #[error("risk limit {name} must be positive, got {value}")]
    NonPositiveRiskLimit { name: &'static str, value: rust_decimal::Decimal },

    #[error("fee tier table must be non-empty and sorted by ascending threshold")]
    MalformedFeeTiers,

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Invalid inbound events: dropped and logged, never raised further.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum IngestError {
    #[error("book has an empty bid or ask side")]
    EmptyBookSide,

    #[error("book contains a non-finite or negative value")]
    NonFiniteValue,

    #[error("trade timestamp is more than 5s stale")]
    StaleTrade,

    #[error("trade timestamp is more than 1s in the future")]
    FutureTrade,
}
