//! Typed error enums for each fallible boundary. Library code returns these so
//! callers can match on kind instead of string-matching messages; binaries and
//! the backfill driver still wrap them in `anyhow::Result` with `.context(..)`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("upstream request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("upstream returned no usable data for {ticker}")]
    NoData { ticker: String },
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("symbol {0} is not in the instrument registry")]
    UnknownSymbol(String),
    #[error("invalid registry override file: {0}")]
    InvalidOverride(String),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Database(#[from] rusqlite::Error),
}
