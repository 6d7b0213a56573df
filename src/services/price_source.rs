use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    error::FetchError,
    models::{Asset, PriceSnapshot},
};

/// One attempt at fetching a snapshot. Retrying is the caller's job.
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch(&self) -> Result<PriceSnapshot, FetchError>;
}

/// Turns a `/simple/price` body into a snapshot for `assets`.
///
/// The body must be a JSON object keyed by coin id. Any requested asset that
/// is missing, or whose price is not a non-negative number, is reported as
/// `0.0` instead of failing the whole fetch.
pub fn normalize_simple_price(
    body: &Value,
    assets: &[Asset],
    currency: &str,
) -> Result<PriceSnapshot, FetchError> {
    let coins = body
        .as_object()
        .ok_or_else(|| FetchError::Malformed("expected a JSON object".to_string()))?;

    let mut prices = BTreeMap::new();
    let mut captured_at: Option<i64> = None;

    for &asset in assets {
        let entry = coins.get(asset.coingecko_id());

        let price = entry
            .and_then(|e| e.get(currency))
            .and_then(Value::as_f64)
            .filter(|p| p.is_finite() && *p >= 0.0);

        let price = match price {
            Some(p) => p,
            None => {
                tracing::warn!(
                    "no {} price for {} in response, defaulting to 0.0",
                    currency,
                    asset.coingecko_id()
                );
                0.0
            }
        };
        prices.insert(asset, price);

        if let Some(ts) = entry
            .and_then(|e| e.get("last_updated_at"))
            .and_then(Value::as_i64)
        {
            captured_at = Some(captured_at.map_or(ts, |c| c.max(ts)));
        }
    }

    Ok(PriceSnapshot::new(prices, currency, captured_at))
}
