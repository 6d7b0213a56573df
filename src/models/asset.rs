use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Assets the service knows how to price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Asset {
    Btc,
    Eth,
    Usdt,
}

impl Asset {
    pub const ALL: [Asset; 3] = [Asset::Btc, Asset::Eth, Asset::Usdt];

    /// Ticker used in alerts and messages, e.g. `btc`.
    pub fn symbol(self) -> &'static str {
        match self {
            Asset::Btc => "btc",
            Asset::Eth => "eth",
            Asset::Usdt => "usdt",
        }
    }

    /// Coin id on the CoinGecko API.
    pub fn coingecko_id(self) -> &'static str {
        match self {
            Asset::Btc => "bitcoin",
            Asset::Eth => "ethereum",
            Asset::Usdt => "tether",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Asset::Btc => "Bitcoin",
            Asset::Eth => "Ethereum",
            Asset::Usdt => "Tether",
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported asset: {0}")]
pub struct UnsupportedAsset(pub String);

impl FromStr for Asset {
    type Err = UnsupportedAsset;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "btc" | "bitcoin" => Ok(Asset::Btc),
            "eth" | "ethereum" => Ok(Asset::Eth),
            "usdt" | "tether" => Ok(Asset::Usdt),
            _ => Err(UnsupportedAsset(s.trim().to_string())),
        }
    }
}
