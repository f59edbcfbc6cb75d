//! A library for tracking Pendle yield markets.
//!
//! Fetches active markets for a chain, normalizes the inconsistently-shaped API
//! responses into one [`Market`] record, and derives the aggregates and APY trend
//! a dashboard displays.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use yield_tracker::client::PendleClient;
//! use yield_tracker::config::{ClientConfig, DashboardConfig};
//! use yield_tracker::dashboard::Dashboard;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = PendleClient::new(ClientConfig::default())?;
//!     let dashboard = Dashboard::new(Arc::new(client), DashboardConfig::default());
//!
//!     dashboard.refresh().await;
//!
//!     let snapshot = dashboard.snapshot().await;
//!     println!(
//!         "{} markets, avg APY {:.2}%",
//!         snapshot.metrics.total_markets, snapshot.metrics.avg_apy
//!     );
//!     Ok(())
//! }
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub mod chain;
pub mod client;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod history;
pub mod metrics;
pub mod normalize;
pub mod resolve;

/// A yield market after normalization.
///
/// `implied_apy` is a fraction (0.052 is 5.2%); use [`Market::apy_percent`] at
/// display and aggregation boundaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Market {
    pub id: String,
    pub address: Option<String>,
    pub name: String,
    pub symbol: Option<String>,
    pub chain_id: u64,
    pub implied_apy: f64,
    /// USD value locked in the market. The API calls this liquidity or TVL
    /// depending on the endpoint; both map here.
    pub liquidity: f64,
    pub maturity: Option<NaiveDate>,
    #[serde(default)]
    pub historical_data: Vec<HistoricalPoint>,
}

impl Market {
    pub fn apy_percent(&self) -> f64 {
        self.implied_apy * 100.0
    }
}

/// One point of a market's APY history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalPoint {
    /// Milliseconds since the epoch.
    pub timestamp: i64,
    /// Short display date, e.g. "Oct 16".
    pub date: String,
    /// Implied APY in percent.
    pub apy: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_apy: Option<f64>,
}

/// Portfolio-level figures over the current market collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateMetrics {
    pub total_markets: usize,
    /// Mean implied APY in percent.
    pub avg_apy: f64,
    /// Summed liquidity in USD.
    pub total_liquidity: f64,
}

/// Direction and size of the latest APY move.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendIndicator {
    /// Absolute percent change between the last two points.
    pub magnitude: f64,
    pub is_positive: bool,
}

impl Default for TrendIndicator {
    fn default() -> Self {
        Self {
            magnitude: 0.0,
            is_positive: true,
        }
    }
}
