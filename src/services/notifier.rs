use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;

use crate::{config::Settings, error::NotifyError};

/// Telegram's hard cap on message length.
pub const MAX_MESSAGE_LENGTH: usize = 4096;

/// A single best-effort delivery attempt to one recipient.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, recipient_id: i64, text: &str) -> Result<(), NotifyError>;
}

/// Cuts `text` to at most `max_chars` characters, ending in `...` when cut.
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    const SUFFIX: &str = "...";

    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(SUFFIX.len());
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(SUFFIX);
    out
}

#[derive(Clone)]
pub struct TelegramSink {
    http: Client,
    api_url: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct TelegramResponse {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

impl TelegramSink {
    pub fn new(
        api_url: &str,
        token: String,
        timeout: Duration,
        proxy_url: Option<&str>,
    ) -> Result<Self, NotifyError> {
        let mut builder = Client::builder().timeout(timeout);
        if let Some(proxy) = proxy_url {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| NotifyError::NotConfigured(format!("invalid proxy: {e}")))?;
            builder = builder.proxy(proxy);
        }

        let http = builder
            .build()
            .map_err(|e| NotifyError::NotConfigured(e.to_string()))?;

        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, NotifyError> {
        Self::new(
            &settings.telegram_api_url,
            settings.telegram_bot_token.clone(),
            settings.api_timeout,
            settings.proxy_url.as_deref(),
        )
    }

    fn has_token(&self) -> bool {
        !self.token.trim().is_empty()
    }
}

#[async_trait]
impl NotificationSink for TelegramSink {
    async fn send(&self, recipient_id: i64, text: &str) -> Result<(), NotifyError> {
        if !self.has_token() {
            return Err(NotifyError::NotConfigured(
                "TELEGRAM_BOT_TOKEN is missing in .env".to_string(),
            ));
        }

        let url = format!("{}/bot{}/sendMessage", self.api_url, self.token);
        let body = json!({
            "chat_id": recipient_id,
            "text": truncate_text(text, MAX_MESSAGE_LENGTH),
            "parse_mode": "HTML",
        });

        let res = self.http.post(&url).json(&body).send().await?;
        let status = res.status();
        if status.is_success() {
            tracing::debug!("message delivered to chat {}", recipient_id);
            return Ok(());
        }

        let detail = res.json::<TelegramResponse>().await.ok();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = detail
                .as_ref()
                .and_then(|d| d.parameters.as_ref())
                .and_then(|p| p.retry_after);
            return Err(NotifyError::RateLimited { retry_after_secs });
        }

        let description = detail
            .and_then(|d| d.description)
            .unwrap_or_else(|| status.to_string());

        if status.is_server_error() {
            return Err(NotifyError::Transport(format!("{status}: {description}")));
        }

        Err(NotifyError::Rejected {
            status: status.as_u16(),
            description,
        })
    }
}
