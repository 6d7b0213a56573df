use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;

use crate::{
    config::Settings,
    error::FetchError,
    models::{Asset, PriceSnapshot},
    services::price_source::{normalize_simple_price, PriceSource},
};

#[derive(Clone)]
pub struct CoinGeckoClient {
    http: Client,
    base_url: String,
    assets: Vec<Asset>,
    currency: String,
}

impl CoinGeckoClient {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        proxy_url: Option<&str>,
        assets: Vec<Asset>,
        currency: &str,
    ) -> Result<Self, FetchError> {
        let mut builder = Client::builder().timeout(timeout);
        if let Some(proxy) = proxy_url {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| FetchError::Transport(format!("invalid proxy: {e}")))?;
            builder = builder.proxy(proxy);
        }

        let http = builder
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            assets,
            currency: currency.to_lowercase(),
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, FetchError> {
        Self::new(
            &settings.coingecko_base_url,
            settings.api_timeout,
            settings.proxy_url.as_deref(),
            settings.tracked_assets.clone(),
            &settings.quote_currency,
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Raw `/simple/price` call for the configured assets.
    pub async fn simple_price(&self) -> Result<Value, FetchError> {
        let ids = self
            .assets
            .iter()
            .map(|a| a.coingecko_id())
            .collect::<Vec<_>>()
            .join(",");

        let url = format!("{}/simple/price", self.base_url);
        let res = self
            .http
            .get(&url)
            .query(&[
                ("ids", ids.as_str()),
                ("vs_currencies", self.currency.as_str()),
                ("include_market_cap", "false"),
                ("include_24hr_vol", "false"),
                ("include_24hr_change", "false"),
                ("include_last_updated_at", "true"),
            ])
            .send()
            .await?;

        let status = res.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = res
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok());
            return Err(FetchError::RateLimited { retry_after_secs });
        }

        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(FetchError::Transport(format!(
                "CoinGecko simple/price failed: {status} {body}"
            )));
        }

        res.json::<Value>().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(e.to_string())
            } else {
                FetchError::Malformed(e.to_string())
            }
        })
    }

    /// Checks API availability.
    pub async fn ping(&self) -> Result<(), FetchError> {
        let res = self
            .http
            .get(format!("{}/ping", self.base_url))
            .send()
            .await?;

        if res.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited { retry_after_secs: None });
        }
        if !res.status().is_success() {
            return Err(FetchError::Transport(format!(
                "CoinGecko ping failed: {}",
                res.status()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl PriceSource for CoinGeckoClient {
    async fn fetch(&self) -> Result<PriceSnapshot, FetchError> {
        let body = self.simple_price().await?;
        normalize_simple_price(&body, &self.assets, &self.currency)
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client(uri: &str) -> CoinGeckoClient {
        CoinGeckoClient::new(uri, Duration::from_secs(5), None, Asset::ALL.to_vec(), "USD").unwrap()
    }

    #[test]
    fn trims_trailing_slash() {
        let c = client("http://localhost:8080/api/v3/");
        assert_eq!(c.base_url(), "http://localhost:8080/api/v3");
    }

    #[tokio::test]
    async fn fetch_builds_snapshot() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/simple/price"))
            .and(query_param("ids", "bitcoin,ethereum,tether"))
            .and(query_param("vs_currencies", "usd"))
            .and(query_param("include_last_updated_at", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "bitcoin": { "usd": 100000.0, "last_updated_at": 1_700_000_000 },
                "ethereum": { "usd": 4000.0, "last_updated_at": 1_700_000_000 },
                "tether": { "usd": 1.0, "last_updated_at": 1_700_000_000 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let snap = client(&server.uri()).fetch().await.unwrap();
        assert_eq!(snap.price(Asset::Btc), Some(100000.0));
        assert_eq!(snap.price(Asset::Usdt), Some(1.0));
        assert_eq!(snap.captured_at(), Some(1_700_000_000));
    }

    #[tokio::test]
    async fn too_many_requests_is_rate_limited() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/simple/price"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "30"))
            .mount(&server)
            .await;

        let err = client(&server.uri()).fetch().await.unwrap_err();
        assert!(matches!(
            err,
            FetchError::RateLimited {
                retry_after_secs: Some(30)
            }
        ));
    }

    #[tokio::test]
    async fn server_errors_are_transport_failures() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/simple/price"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let err = client(&server.uri()).fetch().await.unwrap_err();
        match err {
            FetchError::Transport(msg) => assert!(msg.contains("maintenance")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn invalid_json_is_malformed() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/simple/price"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = client(&server.uri()).fetch().await.unwrap_err();
        assert!(matches!(err, FetchError::Malformed(_)));
    }

    #[tokio::test]
    async fn slow_upstream_times_out() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/simple/price"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let c = CoinGeckoClient::new(
            &server.uri(),
            Duration::from_millis(50),
            None,
            Asset::ALL.to_vec(),
            "usd",
        )
        .unwrap();

        let err = c.fetch().await.unwrap_err();
        assert!(matches!(err, FetchError::Timeout(_)));
    }

    #[tokio::test]
    async fn ping_ok() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "gecko_says": "(V3) To the Moon!"
            })))
            .mount(&server)
            .await;

        assert!(client(&server.uri()).ping().await.is_ok());
    }
}
