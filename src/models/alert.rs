use serde::{Deserialize, Serialize};

use super::Asset;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertDirection {
    Above,
    Below,
}

impl AlertDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertDirection::Above => "above",
            AlertDirection::Below => "below",
        }
    }
}

/// Lifecycle of an alert. The evaluation cycle only ever moves
/// `Active -> Triggered`; everything else belongs to the store's owners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Active,
    Triggered,
    Paused,
    Deleted,
}

impl AlertStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertStatus::Active => "active",
            AlertStatus::Triggered => "triggered",
            AlertStatus::Paused => "paused",
            AlertStatus::Deleted => "deleted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub alert_id: String,

    // chat id of the owner
    pub user_id: i64,
    pub asset: Asset,
    pub threshold: f64,
    pub direction: AlertDirection,
    pub status: AlertStatus,
    pub language_preference: String,

    pub created_at: i64,
    pub updated_at: i64,
}

impl Alert {
    /// True when `price` satisfies the alert's condition. Both directions
    /// include the threshold itself.
    pub fn is_hit(&self, price: f64) -> bool {
        match self.direction {
            AlertDirection::Above => price >= self.threshold,
            AlertDirection::Below => price <= self.threshold,
        }
    }
}
