use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use std::{io::Write, sync::Arc, time::Duration};
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use yield_tracker::{
    chain::chain_name,
    client::PendleClient,
    config::{ClientConfig, DashboardConfig},
    dashboard::{Dashboard, DashboardSnapshot, RefreshOutcome},
};

/// Default seconds between refreshes, overridable with `TRACKER_REFRESH_SECS`.
const DEFAULT_REFRESH_SECS: u64 = 60;

/// A framed stdout line with timestamp and type information
#[derive(Debug, Serialize)]
struct LoggedMessage {
    timestamp: String,
    message_type: String,
    content: serde_json::Value,
}

impl LoggedMessage {
    fn new_snapshot(snapshot: &DashboardSnapshot) -> Result<Self> {
        Ok(Self {
            timestamp: Utc::now().to_rfc3339(),
            message_type: "snapshot".to_string(),
            content: serde_json::to_value(snapshot)?,
        })
    }

    fn new_shutdown_initiated(signal: &str) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            message_type: "shutdown_initiated".to_string(),
            content: serde_json::json!({
                "signal": signal
            }),
        }
    }

    fn emit(&self) -> Result<()> {
        let mut out = std::io::stdout().lock();
        serde_json::to_writer(&mut out, self)?;
        out.write_all(b"\n")?;
        out.flush()?;
        Ok(())
    }
}

/// Refreshes the dashboard every `interval` and emits a snapshot line after
/// each refresh, until cancelled.
async fn run(
    dashboard: Dashboard<PendleClient>,
    interval: Duration,
    cancel: CancellationToken,
) -> Result<()> {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = cancel.cancelled() => break,
        }

        let outcome = tokio::select! {
            outcome = dashboard.refresh() => outcome,
            _ = cancel.cancelled() => break,
        };

        let snapshot = dashboard.snapshot().await;
        match &outcome {
            RefreshOutcome::Published(n) => tracing::info!(
                market_count = n,
                avg_apy = snapshot.metrics.avg_apy,
                total_liquidity = snapshot.metrics.total_liquidity,
                "dashboard metrics"
            ),
            RefreshOutcome::Failed(message) => {
                tracing::warn!(error = %message, "refresh failed, will retry next interval")
            }
            RefreshOutcome::Stale => continue,
        }
        if let Some(error) = &snapshot.history_error {
            tracing::warn!(error = %error, "chart data unavailable");
        }

        LoggedMessage::new_snapshot(&snapshot)?.emit()?;
    }

    tracing::info!("refresh loop shut down");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Set up logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "tracker=info,yield_tracker=info".to_string()),
        )
        .init();

    let client_config = ClientConfig::from_env()?;
    let dashboard_config = DashboardConfig::from_env()?;
    let interval = match std::env::var("TRACKER_REFRESH_SECS") {
        Ok(secs) => Duration::from_secs(
            secs.parse::<u64>()
                .with_context(|| format!("invalid TRACKER_REFRESH_SECS: {}", secs))?
                .max(1),
        ),
        Err(_) => Duration::from_secs(DEFAULT_REFRESH_SECS),
    };

    tracing::info!(
        base_url = %client_config.base_url,
        chain_id = dashboard_config.chain_id,
        chain = chain_name(dashboard_config.chain_id),
        interval_secs = interval.as_secs(),
        "yield tracker starting up"
    );

    let client = PendleClient::new(client_config)?;
    let dashboard = Dashboard::new(Arc::new(client), dashboard_config);

    let cancel = CancellationToken::new();
    let mut handle = tokio::spawn(run(dashboard, interval, cancel.clone()));

    // Set up signal handlers for SIGINT, SIGTERM, and SIGHUP
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;

    let signal_name = tokio::select! {
        _ = sigint.recv() => "SIGINT",
        _ = sigterm.recv() => "SIGTERM",
        _ = sighup.recv() => "SIGHUP",
        // the refresh loop only ends on its own if emitting a snapshot failed
        res = &mut handle => return res?,
    };
    tracing::info!("received {}, shutting down gracefully...", signal_name);
    LoggedMessage::new_shutdown_initiated(signal_name).emit()?;
    cancel.cancel();

    handle.await??;
    tracing::info!("shutdown complete");

    Ok(())
}
