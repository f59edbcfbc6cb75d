use thiserror::Error;

/// Failures that leave a refresh cycle with no markets.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to fetch markets: {0:#}")]
    Transport(anyhow::Error),
    #[error("invalid market list response: {0}")]
    Malformed(String),
    #[error("no active markets returned from the API")]
    NoMarkets,
}

/// Failures scoped to the chart of one market.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("unknown market: {0}")]
    UnknownMarket(String),
    #[error("market {0} has no address")]
    MissingAddress(String),
    #[error("no historical data available for this market: {0:#}")]
    Unavailable(anyhow::Error),
    #[error("no valid historical data points found")]
    NoPoints,
}
