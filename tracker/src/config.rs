use std::time::Duration;

use anyhow::{Context, Result};
use url::Url;

use crate::chain::DEFAULT_CHAIN_ID;
use crate::history::TimeFrame;

/// Root of the Pendle core API.
pub const DEFAULT_BASE_URL: &str = "https://api-v2.pendle.finance/core/v1/";
/// How long a single API request may take.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
/// Value of the `time_frame` query parameter for history requests.
pub const DEFAULT_HISTORY_TIME_FRAME: &str = "week";
/// Detail requests in flight at once during a refresh.
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 10;

/// Settings for the HTTP client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: Url,
    pub timeout: Duration,
    pub history_time_frame: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base url is valid"),
            timeout: DEFAULT_TIMEOUT,
            history_time_frame: DEFAULT_HISTORY_TIME_FRAME.to_string(),
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by `PENDLE_API_URL`, `PENDLE_API_TIMEOUT_SECS`, and
    /// `PENDLE_HISTORY_TIME_FRAME` when set.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("PENDLE_API_URL") {
            let url = Url::parse(&url).with_context(|| format!("invalid PENDLE_API_URL: {}", url))?;
            config = config.with_base_url(url);
        }
        if let Ok(secs) = std::env::var("PENDLE_API_TIMEOUT_SECS") {
            let secs = secs
                .parse::<u64>()
                .with_context(|| format!("invalid PENDLE_API_TIMEOUT_SECS: {}", secs))?;
            config = config.with_timeout(Duration::from_secs(secs));
        }
        if let Ok(time_frame) = std::env::var("PENDLE_HISTORY_TIME_FRAME") {
            config = config.with_history_time_frame(time_frame);
        }
        Ok(config)
    }

    /// Sets the API root. A trailing slash is added so endpoint paths join
    /// beneath it rather than replacing its last segment.
    pub fn with_base_url(mut self, mut url: Url) -> Self {
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        self.base_url = url;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_history_time_frame(mut self, time_frame: impl Into<String>) -> Self {
        self.history_time_frame = time_frame.into();
        self
    }
}

/// Settings for one dashboard instance.
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub chain_id: u64,
    pub max_concurrent_requests: usize,
    /// Only the first `max_markets` summaries of a list response are enriched.
    pub max_markets: Option<usize>,
    pub time_frame: TimeFrame,
    /// Show the built-in fallback markets when the market list can't be loaded.
    pub fallback_on_error: bool,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            chain_id: DEFAULT_CHAIN_ID,
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            max_markets: None,
            time_frame: TimeFrame::default(),
            fallback_on_error: false,
        }
    }
}

impl DashboardConfig {
    /// Defaults overridden by `PENDLE_CHAIN_ID` and `PENDLE_MAX_MARKETS` when set.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(id) = std::env::var("PENDLE_CHAIN_ID") {
            let id = id
                .parse::<u64>()
                .with_context(|| format!("invalid PENDLE_CHAIN_ID: {}", id))?;
            config = config.with_chain_id(id);
        }
        if let Ok(max) = std::env::var("PENDLE_MAX_MARKETS") {
            let max = max
                .parse::<usize>()
                .with_context(|| format!("invalid PENDLE_MAX_MARKETS: {}", max))?;
            config = config.with_max_markets(max);
        }
        Ok(config)
    }

    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = chain_id;
        self
    }

    pub fn with_max_concurrent_requests(mut self, n: usize) -> Self {
        self.max_concurrent_requests = n.max(1);
        self
    }

    pub fn with_max_markets(mut self, n: usize) -> Self {
        self.max_markets = Some(n);
        self
    }

    pub fn with_time_frame(mut self, time_frame: TimeFrame) -> Self {
        self.time_frame = time_frame;
        self
    }

    pub fn with_fallback_on_error(mut self, fallback: bool) -> Self {
        self.fallback_on_error = fallback;
        self
    }
}
