use std::{env, time::Duration};

use crate::models::Asset;

#[derive(Debug, Clone)]
pub struct Settings {
    pub mongodb_uri: String,
    pub mongodb_db: String,
    pub host: String,
    pub port: u16,

    pub coingecko_base_url: String,
    pub api_timeout: Duration,
    pub api_max_retries: u32,
    pub api_retry_delay: Duration,

    pub notify_max_retries: u32,
    pub notify_retry_delay: Duration,

    pub alert_check_interval: Duration,
    pub tracked_assets: Vec<Asset>,
    pub quote_currency: String,

    pub telegram_bot_token: String,
    pub telegram_api_url: String,
    pub proxy_url: Option<String>,

    pub default_language: String,
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mongodb_uri: "mongodb://localhost:27017".to_string(),
            mongodb_db: "pricewatch".to_string(),
            host: "127.0.0.1".to_string(),
            port: 3000,
            coingecko_base_url: "https://api.coingecko.com/api/v3".to_string(),
            api_timeout: Duration::from_secs(30),
            api_max_retries: 3,
            api_retry_delay: Duration::from_secs(1),
            notify_max_retries: 3,
            notify_retry_delay: Duration::from_secs(1),
            alert_check_interval: Duration::from_secs(300),
            tracked_assets: Asset::ALL.to_vec(),
            quote_currency: "usd".to_string(),
            telegram_bot_token: String::new(),
            telegram_api_url: "https://api.telegram.org".to_string(),
            proxy_url: None,
            default_language: "en".to_string(),
            log_level: "info".to_string(),
        }
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse::<T>().ok())
        .unwrap_or(default)
}

/// Seconds as written in env files, e.g. `1.5`. Negative, non-finite and
/// out-of-range values are rejected.
fn parse_secs(raw: &str) -> Option<Duration> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .and_then(|s| Duration::try_from_secs_f64(s).ok())
}

fn secs_or(key: &str, default: Duration) -> Duration {
    env::var(key)
        .ok()
        .and_then(|s| parse_secs(&s))
        .unwrap_or(default)
}

/// Parses a comma separated asset list such as `btc,eth`.
///
/// Unknown entries are skipped with a warning; if nothing usable is left the
/// full supported set is returned.
pub fn parse_assets(raw: &str) -> Vec<Asset> {
    let mut assets: Vec<Asset> = Vec::new();

    for part in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        match part.parse::<Asset>() {
            Ok(a) if !assets.contains(&a) => assets.push(a),
            Ok(_) => {}
            Err(e) => tracing::warn!("ignoring tracked asset: {}", e),
        }
    }

    if assets.is_empty() {
        return Asset::ALL.to_vec();
    }
    assets
}

pub fn load() -> Settings {
    // Loads .env if present (no crash if missing)
    dotenvy::dotenv().ok();

    let d = Settings::default();

    let proxy_url = env::var("PROXY_URL")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    let tracked_assets = env::var("TRACKED_ASSETS")
        .map(|s| parse_assets(&s))
        .unwrap_or(d.tracked_assets);

    Settings {
        mongodb_uri: var_or("MONGODB_URI", &d.mongodb_uri),
        mongodb_db: var_or("MONGODB_DB", &d.mongodb_db),
        host: var_or("HOST", &d.host),
        port: parse_or("PORT", d.port),

        coingecko_base_url: var_or("COINGECKO_BASE_URL", &d.coingecko_base_url),
        api_timeout: secs_or("API_TIMEOUT", d.api_timeout),
        api_max_retries: parse_or("API_MAX_RETRIES", d.api_max_retries),
        api_retry_delay: secs_or("API_RETRY_DELAY", d.api_retry_delay),

        notify_max_retries: parse_or("NOTIFY_MAX_RETRIES", d.notify_max_retries),
        notify_retry_delay: secs_or("NOTIFY_RETRY_DELAY", d.notify_retry_delay),

        alert_check_interval: secs_or("ALERT_CHECK_INTERVAL", d.alert_check_interval),
        tracked_assets,
        quote_currency: var_or("QUOTE_CURRENCY", &d.quote_currency).to_lowercase(),

        telegram_bot_token: var_or("TELEGRAM_BOT_TOKEN", ""),
        telegram_api_url: var_or("TELEGRAM_API_URL", &d.telegram_api_url),
        proxy_url,

        default_language: var_or("DEFAULT_LANGUAGE", &d.default_language),
        log_level: var_or("LOG_LEVEL", &d.log_level),
    }
}
