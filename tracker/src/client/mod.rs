//! Client for the Pendle market API.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use crate::config::ClientConfig;

/// Where the dashboard gets its raw market data.
///
/// Every call yields either the decoded JSON body or an error; timeouts and
/// transport failures are both just errors to the caller.
#[async_trait]
pub trait MarketSource: Send + Sync {
    /// Summaries of the active markets on `chain_id`.
    async fn active_markets(&self, chain_id: u64) -> Result<Value>;

    /// The detail record for one market.
    async fn market_detail(&self, chain_id: u64, address: &str) -> Result<Value>;

    /// The columnar APY history for one market.
    async fn historical_data(&self, chain_id: u64, address: &str) -> Result<Value>;
}

/// HTTP implementation of [`MarketSource`] for the Pendle core API.
#[derive(Debug, Clone)]
pub struct PendleClient {
    config: ClientConfig,
    http_client: reqwest::Client,
}

impl PendleClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            config,
            http_client,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.config
            .base_url
            .join(path)
            .with_context(|| format!("invalid endpoint path: {}", path))
    }

    /// GETs `url` and decodes the body as JSON.
    async fn get_json(&self, url: Url, query: &[(&str, &str)]) -> Result<Value> {
        tracing::debug!(url = %url, "requesting");
        let res = self.http_client.get(url).query(query).send().await?;

        // Handle rate limit errors without stack trace
        if res.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(anyhow::anyhow!("HTTP 429: rate limit exceeded"));
        }

        let res = res.error_for_status()?;
        let result = res.json::<Value>().await.context("response body is not JSON")?;
        Ok(result)
    }
}

#[async_trait]
impl MarketSource for PendleClient {
    async fn active_markets(&self, chain_id: u64) -> Result<Value> {
        let url = self.endpoint(&format!("{}/markets/active", chain_id))?;
        self.get_json(url, &[]).await
    }

    async fn market_detail(&self, chain_id: u64, address: &str) -> Result<Value> {
        let url = self.endpoint(&format!("{}/markets/{}", chain_id, address))?;
        self.get_json(url, &[])
            .await
            .with_context(|| format!("failed to fetch market {}", address))
    }

    async fn historical_data(&self, chain_id: u64, address: &str) -> Result<Value> {
        let url = self.endpoint(&format!("{}/markets/{}/historical-data", chain_id, address))?;
        let time_frame = self.config.history_time_frame.as_str();
        self.get_json(url, &[("time_frame", time_frame)])
            .await
            .with_context(|| format!("failed to fetch history for market {}", address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answers a single request with `status` and `body`, returning the base url.
    async fn serve_once(status: &'static str, body: &'static str) -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        });
        Url::parse(&format!("http://{}/core/v1/", addr)).unwrap()
    }

    fn client_for(base_url: Url) -> PendleClient {
        PendleClient::new(ClientConfig::default().with_base_url(base_url)).unwrap()
    }

    #[tokio::test]
    async fn test_decodes_untyped_json_body() {
        let client = client_for(serve_once("200 OK", r#"{"results":[{"address":"0xa"}]}"#).await);
        let body = client.active_markets(8453).await.unwrap();
        assert_eq!(body["results"][0]["address"], "0xa");
    }

    #[tokio::test]
    async fn test_non_json_body_is_an_error() {
        let client = client_for(serve_once("200 OK", "<html>oops</html>").await);
        let err = client.active_markets(8453).await.unwrap_err();
        assert!(format!("{:#}", err).contains("response body is not JSON"));
    }

    #[tokio::test]
    async fn test_rate_limit_is_reported() {
        let client = client_for(serve_once("429 Too Many Requests", "{}").await);
        let err = client.market_detail(1, "0xabc").await.unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.contains("failed to fetch market 0xabc"));
        assert!(message.contains("HTTP 429"));
    }

    #[test]
    fn test_endpoints_join_under_base_url() {
        let config = ClientConfig::default()
            .with_base_url(Url::parse("https://example.com/core/v1").unwrap());
        let client = PendleClient::new(config).unwrap();

        assert_eq!(
            client.endpoint("8453/markets/active").unwrap().as_str(),
            "https://example.com/core/v1/8453/markets/active"
        );
        assert_eq!(
            client
                .endpoint("1/markets/0xabc/historical-data")
                .unwrap()
                .as_str(),
            "https://example.com/core/v1/1/markets/0xabc/historical-data"
        );
    }

    #[test]
    fn test_default_client_config() {
        let client = PendleClient::new(ClientConfig::default()).unwrap();
        assert_eq!(
            client.config().base_url.as_str(),
            "https://api-v2.pendle.finance/core/v1/"
        );
        assert_eq!(client.config().history_time_frame, "week");
    }
}
