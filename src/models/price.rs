use std::collections::BTreeMap;

use serde::Serialize;

use super::{Alert, Asset};

/// Prices for the tracked assets, captured once per cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSnapshot {
    prices: BTreeMap<Asset, f64>,
    currency: String,
    captured_at: Option<i64>,
}

impl PriceSnapshot {
    pub fn new(
        prices: BTreeMap<Asset, f64>,
        currency: impl Into<String>,
        captured_at: Option<i64>,
    ) -> Self {
        Self {
            prices,
            currency: currency.into(),
            captured_at,
        }
    }

    pub fn price(&self, asset: Asset) -> Option<f64> {
        self.prices.get(&asset).copied()
    }

    pub fn prices(&self) -> &BTreeMap<Asset, f64> {
        &self.prices
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn captured_at(&self) -> Option<i64> {
        self.captured_at
    }
}

/// An alert whose condition held against the cycle's snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggeredMatch {
    pub alert: Alert,
    pub current_price: f64,
}
