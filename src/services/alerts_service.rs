use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::{StoreError, ValidationError},
    models::{Alert, AlertDirection, AlertStatus, Asset},
    services::alert_store::AlertStore,
};

/// Input for a new alert, as received from a client.
#[derive(Debug, Clone, Deserialize)]
pub struct NewAlert {
    pub user_id: i64,
    pub asset: String,
    pub threshold: f64,
    pub direction: String,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum AlertServiceError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

fn parse_direction(raw: &str) -> Result<AlertDirection, ValidationError> {
    match raw.trim().to_lowercase().as_str() {
        "above" | ">" | ">=" => Ok(AlertDirection::Above),
        "below" | "<" | "<=" => Ok(AlertDirection::Below),
        other => Err(ValidationError::Direction(other.to_string())),
    }
}

/// Checks `input` and turns it into a fresh `active` alert with a new id.
pub fn build_alert(input: &NewAlert, default_language: &str) -> Result<Alert, ValidationError> {
    let asset: Asset = input.asset.parse()?;
    let direction = parse_direction(&input.direction)?;

    if !input.threshold.is_finite() || input.threshold <= 0.0 {
        return Err(ValidationError::Threshold(input.threshold));
    }

    let language = input
        .language
        .as_deref()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .unwrap_or(default_language)
        .to_lowercase();

    let now = Utc::now().timestamp();

    Ok(Alert {
        alert_id: Uuid::new_v4().to_string(),
        user_id: input.user_id,
        asset,
        threshold: input.threshold,
        direction,
        status: AlertStatus::Active,
        language_preference: language,
        created_at: now,
        updated_at: now,
    })
}

pub async fn create_alert(
    store: &dyn AlertStore,
    input: &NewAlert,
    default_language: &str,
) -> Result<Alert, AlertServiceError> {
    let alert = build_alert(input, default_language)?;
    store.create(&alert).await?;
    Ok(alert)
}

/// One page of a user's alerts: `alerts` honours the status filter,
/// `total` counts every alert the user owns.
#[derive(Debug, Clone, Serialize)]
pub struct UserAlerts {
    pub total: u64,
    pub alerts: Vec<Alert>,
}

pub async fn list_user_alerts(
    store: &dyn AlertStore,
    user_id: i64,
    status: Option<AlertStatus>,
) -> Result<UserAlerts, StoreError> {
    let alerts = store.list_by_user(user_id, status).await?;
    let total = store.count_by_user(user_id).await?;
    Ok(UserAlerts { total, alerts })
}

/// Active alerts on `asset`, given as a symbol or CoinGecko id.
pub async fn list_asset_alerts(
    store: &dyn AlertStore,
    asset: &str,
) -> Result<Vec<Alert>, AlertServiceError> {
    let asset: Asset = asset.parse().map_err(ValidationError::from)?;
    Ok(store.list_active_by_asset(asset).await?)
}

/// Returns false when no such alert existed.
pub async fn delete_alert(store: &dyn AlertStore, alert_id: &str) -> Result<bool, StoreError> {
    store.delete(alert_id).await
}

pub async fn delete_user_alerts(store: &dyn AlertStore, user_id: i64) -> Result<u64, StoreError> {
    let deleted = store.delete_by_user(user_id).await?;
    if deleted == 0 {
        tracing::debug!("user {} had no alerts to delete", user_id);
    }
    Ok(deleted)
}
