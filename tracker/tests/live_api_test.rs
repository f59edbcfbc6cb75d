use anyhow::Result;
use std::{sync::Arc, time::Duration};
use tokio::time::timeout;
use yield_tracker::{
    chain::Chain,
    client::{MarketSource, PendleClient},
    config::{ClientConfig, DashboardConfig},
    dashboard::{Dashboard, RefreshOutcome, Status},
    normalize::market_list,
};

const REFRESH_TIMEOUT: Duration = Duration::from_secs(60);

#[tokio::test]
#[ignore]
async fn test_live_refresh() -> Result<()> {
    // Set up logging
    tracing_subscriber::fmt()
        .with_env_filter("yield_tracker=debug")
        .init();

    let client = PendleClient::new(ClientConfig::default())?;
    let config = DashboardConfig::default()
        .with_chain_id(Chain::Base.id())
        .with_max_markets(5);
    let dashboard = Dashboard::new(Arc::new(client), config);

    let outcome = timeout(REFRESH_TIMEOUT, dashboard.refresh()).await?;
    let RefreshOutcome::Published(n) = outcome else {
        panic!("refresh did not publish: {:?}", outcome);
    };
    tracing::info!(market_count = n, "refreshed against live API");

    let snapshot = dashboard.snapshot().await;
    assert_eq!(snapshot.status, Status::Success);
    assert!(n > 0 && n <= 5);
    assert_eq!(snapshot.metrics.total_markets, n);
    assert!(snapshot.markets.iter().all(|m| m.implied_apy >= 0.0));
    assert!(snapshot.markets.iter().all(|m| m.liquidity >= 0.0));
    assert!(snapshot.trend.magnitude.is_finite());

    Ok(())
}

#[tokio::test]
#[ignore]
async fn test_live_market_list_shape() -> Result<()> {
    let client = PendleClient::new(ClientConfig::default())?;
    let response = timeout(REFRESH_TIMEOUT, client.active_markets(Chain::Ethereum.id())).await??;
    let markets = market_list(response)?;
    assert!(!markets.is_empty());
    Ok(())
}
