//! Refresh cycle and selection state for the market dashboard.
//!
//! A refresh lists the active markets, enriches each with its detail record,
//! and publishes the normalized collection in one step. The first market is
//! then selected and its APY history loaded. History failures stay scoped to
//! the chart; only a failed or empty market list fails the refresh.
//!
//! Each refresh and each history load is stamped with a sequence number. A
//! result whose stamp is no longer the latest is dropped, so overlapping
//! refreshes resolve to whichever started last.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::client::MarketSource;
use crate::config::DashboardConfig;
use crate::error::{HistoryError, LoadError};
use crate::history::{parse_series, TimeFrame};
use crate::metrics::{aggregate, trend};
use crate::normalize::{fallback_markets, market_address, market_list, normalize};
use crate::{AggregateMetrics, HistoricalPoint, Market, TrendIndicator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Idle,
    Loading,
    Success,
    Failed,
}

/// What happened to the result of one [`Dashboard::refresh`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The market collection was replaced with this many markets.
    Published(usize),
    /// The market list couldn't be loaded; carries the user-facing message.
    Failed(String),
    /// A newer refresh started before this one finished, so its result was dropped.
    Stale,
}

/// Everything a presentation layer needs to draw the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    pub status: Status,
    pub chain_id: u64,
    pub error: Option<String>,
    pub history_error: Option<String>,
    pub markets: Vec<Market>,
    pub selected_market: Option<String>,
    pub time_frame: TimeFrame,
    pub chart_data: Vec<HistoricalPoint>,
    pub metrics: AggregateMetrics,
    pub trend: TrendIndicator,
    pub refreshed_at: Option<DateTime<Utc>>,
}

impl DashboardSnapshot {
    pub fn selected(&self) -> Option<&Market> {
        let id = self.selected_market.as_ref()?;
        self.markets.iter().find(|m| &m.id == id)
    }
}

struct DashboardState {
    chain_id: u64,
    status: Status,
    error: Option<String>,
    history_error: Option<String>,
    markets: Vec<Market>,
    selected: Option<String>,
    time_frame: TimeFrame,
    metrics: AggregateMetrics,
    refreshed_at: Option<DateTime<Utc>>,
}

impl DashboardState {
    fn market(&self, id: &str) -> Option<&Market> {
        self.markets.iter().find(|m| m.id == id)
    }

    /// Replaces the collection, recomputes the aggregates, and selects the
    /// first market.
    fn set_markets(&mut self, markets: Vec<Market>) -> Option<String> {
        self.metrics = aggregate(&markets);
        self.selected = markets.first().map(|m| m.id.clone());
        self.markets = markets;
        self.history_error = None;
        self.refreshed_at = Some(Utc::now());
        self.selected.clone()
    }

    fn attach_history(&mut self, id: &str, points: Vec<HistoricalPoint>) {
        if let Some(market) = self.markets.iter_mut().find(|m| m.id == id) {
            market.historical_data = points;
        }
    }
}

/// Owns the market collection for one chain and sequences its refreshes.
pub struct Dashboard<S> {
    source: Arc<S>,
    config: DashboardConfig,
    generation: AtomicU64,
    selection: AtomicU64,
    state: Mutex<DashboardState>,
}

impl<S: MarketSource> Dashboard<S> {
    pub fn new(source: Arc<S>, config: DashboardConfig) -> Self {
        let state = DashboardState {
            chain_id: config.chain_id,
            status: Status::Idle,
            error: None,
            history_error: None,
            markets: Vec::new(),
            selected: None,
            time_frame: config.time_frame,
            metrics: AggregateMetrics::default(),
            refreshed_at: None,
        };
        Self {
            source,
            config,
            generation: AtomicU64::new(0),
            selection: AtomicU64::new(0),
            state: Mutex::new(state),
        }
    }

    /// Reloads the market list and the default market's history.
    pub async fn refresh(&self) -> RefreshOutcome {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let chain_id = {
            let mut state = self.state.lock().await;
            state.status = Status::Loading;
            state.error = None;
            state.chain_id
        };
        tracing::info!(chain_id, generation, "refreshing markets");

        let markets = match self.load_markets(chain_id).await {
            Ok(markets) => markets,
            Err(e) => return self.publish_failure(generation, chain_id, e).await,
        };
        let count = markets.len();

        let selected = {
            let mut state = self.state.lock().await;
            if !self.is_current(generation) {
                tracing::debug!(generation, "discarding stale refresh");
                return RefreshOutcome::Stale;
            }
            state.status = Status::Success;
            self.publish(&mut state, markets)
        };
        tracing::info!(chain_id, market_count = count, "published markets");

        if let Some(id) = selected {
            // history failures are recorded in the state and don't fail the refresh
            let _ = self.load_history(&id).await;
        }

        RefreshOutcome::Published(count)
    }

    /// Switches to another chain and refreshes.
    pub async fn set_chain(&self, chain_id: u64) -> RefreshOutcome {
        self.state.lock().await.chain_id = chain_id;
        self.refresh().await
    }

    /// Selects a market and loads its history. The market list is not refetched.
    pub async fn select_market(&self, market_id: &str) -> Result<usize, HistoryError> {
        {
            let mut state = self.state.lock().await;
            if state.market(market_id).is_none() {
                return Err(HistoryError::UnknownMarket(market_id.to_string()));
            }
            state.selected = Some(market_id.to_string());
            state.history_error = None;
        }
        self.load_history(market_id).await
    }

    /// Changes the chart window. The already-loaded history is re-filtered.
    pub async fn set_time_frame(&self, time_frame: TimeFrame) {
        self.state.lock().await.time_frame = time_frame;
    }

    pub async fn snapshot(&self) -> DashboardSnapshot {
        let state = self.state.lock().await;
        let chart_data = state
            .selected
            .as_deref()
            .and_then(|id| state.market(id))
            .map(|m| state.time_frame.apply(&m.historical_data, Utc::now()))
            .unwrap_or_default();

        DashboardSnapshot {
            status: state.status,
            chain_id: state.chain_id,
            error: state.error.clone(),
            history_error: state.history_error.clone(),
            markets: state.markets.clone(),
            selected_market: state.selected.clone(),
            time_frame: state.time_frame,
            trend: trend(&chart_data),
            chart_data,
            metrics: state.metrics,
            refreshed_at: state.refreshed_at,
        }
    }

    /// Installs a new collection. History loads still in flight belong to the
    /// previous collection, so their results are dropped.
    fn publish(&self, state: &mut DashboardState, markets: Vec<Market>) -> Option<String> {
        self.selection.fetch_add(1, Ordering::SeqCst);
        state.set_markets(markets)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    async fn load_markets(&self, chain_id: u64) -> Result<Vec<Market>, LoadError> {
        let response = self
            .source
            .active_markets(chain_id)
            .await
            .map_err(LoadError::Transport)?;
        let mut summaries = market_list(response)?;
        if let Some(max) = self.config.max_markets {
            summaries.truncate(max.max(1));
        }
        Ok(self.enrich(chain_id, &summaries).await)
    }

    /// Fetches details for every summary, at most `max_concurrent_requests` at
    /// a time, and normalizes each. Markets whose id was already seen in this
    /// batch are dropped.
    async fn enrich(&self, chain_id: u64, summaries: &[Value]) -> Vec<Market> {
        let chunk_size = self.config.max_concurrent_requests.max(1);
        let mut markets = Vec::with_capacity(summaries.len());
        let mut seen = HashSet::new();

        for (n, chunk) in summaries.chunks(chunk_size).enumerate() {
            let handles = chunk
                .iter()
                .enumerate()
                .map(|(i, summary)| self.enrich_one(chain_id, summary, n * chunk_size + i));

            for market in join_all(handles).await {
                if !seen.insert(market.id.clone()) {
                    tracing::warn!(market_id = %market.id, "dropping duplicate market");
                    continue;
                }
                markets.push(market);
            }
        }

        markets
    }

    async fn enrich_one(&self, chain_id: u64, summary: &Value, index: usize) -> Market {
        let detail = match market_address(summary) {
            Some(address) => match self.source.market_detail(chain_id, &address).await {
                Ok(detail) if detail.is_object() => Some(detail),
                Ok(_) => {
                    tracing::warn!(market_id = %address, "market detail is not an object, using summary");
                    None
                }
                Err(e) => {
                    tracing::warn!(market_id = %address, error = %e, "market detail unavailable, using summary");
                    None
                }
            },
            None => None,
        };
        normalize(summary, detail.as_ref(), chain_id, index)
    }

    async fn publish_failure(
        &self,
        generation: u64,
        chain_id: u64,
        error: LoadError,
    ) -> RefreshOutcome {
        tracing::error!(chain_id, error = %error, "failed to load markets");
        let message = error.to_string();

        let mut state = self.state.lock().await;
        if !self.is_current(generation) {
            tracing::debug!(generation, "discarding stale refresh failure");
            return RefreshOutcome::Stale;
        }
        state.status = Status::Failed;
        state.error = Some(message.clone());
        let markets = if self.config.fallback_on_error {
            tracing::info!(chain_id, "showing fallback markets");
            fallback_markets(chain_id)
        } else {
            Vec::new()
        };
        self.publish(&mut state, markets);

        RefreshOutcome::Failed(message)
    }

    /// Fetches, parses, and attaches the history of one market. The outcome is
    /// also recorded in the dashboard state unless a newer load superseded it.
    async fn load_history(&self, market_id: &str) -> Result<usize, HistoryError> {
        let ticket = self.selection.fetch_add(1, Ordering::SeqCst) + 1;
        let target = {
            let state = self.state.lock().await;
            state
                .market(market_id)
                .map(|m| (m.chain_id, m.address.clone()))
        };

        let result = match target {
            None => Err(HistoryError::UnknownMarket(market_id.to_string())),
            Some((_, None)) => Err(HistoryError::MissingAddress(market_id.to_string())),
            Some((chain_id, Some(address))) => {
                match self.source.historical_data(chain_id, &address).await {
                    Ok(raw) => {
                        let points = parse_series(Some(&raw));
                        if points.is_empty() {
                            Err(HistoryError::NoPoints)
                        } else {
                            Ok(points)
                        }
                    }
                    Err(e) => Err(HistoryError::Unavailable(e)),
                }
            }
        };

        let mut state = self.state.lock().await;
        if self.selection.load(Ordering::SeqCst) != ticket {
            tracing::debug!(market_id, "discarding superseded history");
            return result.map(|points| points.len());
        }

        match result {
            Ok(points) => {
                let count = points.len();
                tracing::info!(market_id, points = count, "loaded history");
                state.attach_history(market_id, points);
                state.history_error = None;
                Ok(count)
            }
            Err(e) => {
                tracing::warn!(market_id, error = %e, "history unavailable");
                state.attach_history(market_id, Vec::new());
                state.history_error = Some(e.to_string());
                Err(e)
            }
        }
    }
}
