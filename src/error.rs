//! Error types for the alert pipeline.
//!
//! Fetch and notify errors carry an explicit [`RetryClass`] so the retry
//! executor can pick a backoff without matching on concrete variants.

use std::time::Duration;

use thiserror::Error;

use crate::models::Asset;

/// How a failed attempt should be treated by [`crate::services::retry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// Worth another attempt with the normal backoff.
    Transient,
    /// Upstream asked us to slow down; retry with a larger multiplier.
    RateLimited,
    /// Retrying cannot help.
    Permanent,
}

pub trait Retryable {
    fn retry_class(&self) -> RetryClass;

    /// Wait requested by the upstream (`Retry-After`, Telegram's
    /// `parameters.retry_after`), if any.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// Failure fetching or decoding a price snapshot.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("price request timed out: {0}")]
    Timeout(String),

    #[error("price API rate limit exceeded")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("price request failed: {0}")]
    Transport(String),

    #[error("malformed price response: {0}")]
    Malformed(String),
}

impl Retryable for FetchError {
    fn retry_class(&self) -> RetryClass {
        match self {
            FetchError::Timeout(_) | FetchError::Transport(_) => RetryClass::Transient,
            FetchError::RateLimited { .. } => RetryClass::RateLimited,
            FetchError::Malformed(_) => RetryClass::Permanent,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            FetchError::RateLimited {
                retry_after_secs: Some(secs),
            } => Some(Duration::from_secs(*secs)),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_decode() {
            Self::Malformed(err.to_string())
        } else if err.is_connect() {
            Self::Transport(format!("connection failed: {err}"))
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Failure delivering a notification.
#[derive(Debug, Clone, Error)]
pub enum NotifyError {
    #[error("notification transport failed: {0}")]
    Transport(String),

    #[error("notification rate limited")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("notification rejected ({status}): {description}")]
    Rejected { status: u16, description: String },

    #[error("notification sink is not configured: {0}")]
    NotConfigured(String),
}

impl Retryable for NotifyError {
    fn retry_class(&self) -> RetryClass {
        match self {
            NotifyError::Transport(_) => RetryClass::Transient,
            NotifyError::RateLimited { .. } => RetryClass::RateLimited,
            NotifyError::Rejected { .. } | NotifyError::NotConfigured(_) => RetryClass::Permanent,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            NotifyError::RateLimited {
                retry_after_secs: Some(secs),
            } => Some(Duration::from_secs(*secs)),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for NotifyError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Transport(format!("timeout: {err}"))
        } else {
            Self::Transport(err.to_string())
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),

    #[error("invalid alert document: {0}")]
    Decode(String),
}

impl From<mongodb::error::Error> for StoreError {
    fn from(err: mongodb::error::Error) -> Self {
        Self::Database(err.to_string())
    }
}

#[derive(Debug, Clone, Error)]
#[error("failed to render {template}: {message}")]
pub struct RenderError {
    pub template: String,
    pub message: String,
}

/// Something odd about a single alert that is skipped rather than failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AlertProcessingAnomaly {
    #[error("no price for {asset} in snapshot (alert {alert_id})")]
    MissingPriceForAsset { alert_id: String, asset: Asset },
}

/// Why one triggered alert could not be completed in a cycle.
#[derive(Debug, Clone, Error)]
pub enum AlertError {
    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Notify(#[from] NotifyError),

    #[error("status update failed: {0}")]
    Store(#[from] StoreError),
}

/// Failure sending an on-demand price update.
#[derive(Debug, Clone, Error)]
pub enum PriceUpdateError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Notify(#[from] NotifyError),
}

/// Rejected input when creating an alert.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error(transparent)]
    Asset(#[from] crate::models::UnsupportedAsset),

    #[error("threshold must be a positive number, got {0}")]
    Threshold(f64),

    #[error("unknown direction: {0}")]
    Direction(String),
}
