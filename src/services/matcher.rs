use crate::{
    error::AlertProcessingAnomaly,
    models::{Alert, PriceSnapshot, TriggeredMatch},
};

/// Checks one alert against the snapshot.
///
/// `Ok(None)` means the condition does not hold yet.
pub fn check(
    snapshot: &PriceSnapshot,
    alert: &Alert,
) -> Result<Option<TriggeredMatch>, AlertProcessingAnomaly> {
    let price = snapshot.price(alert.asset).ok_or_else(|| {
        AlertProcessingAnomaly::MissingPriceForAsset {
            alert_id: alert.alert_id.clone(),
            asset: alert.asset,
        }
    })?;

    if !alert.is_hit(price) {
        return Ok(None);
    }

    Ok(Some(TriggeredMatch {
        alert: alert.clone(),
        current_price: price,
    }))
}

/// Returns the alerts whose condition holds, in input order. Alerts that
/// cannot be evaluated are logged and skipped.
pub fn evaluate(snapshot: &PriceSnapshot, alerts: &[Alert]) -> Vec<TriggeredMatch> {
    alerts
        .iter()
        .filter_map(|alert| match check(snapshot, alert) {
            Ok(m) => m,
            Err(anomaly) => {
                tracing::warn!(alert_id = %alert.alert_id, "skipping alert: {}", anomaly);
                None
            }
        })
        .collect()
}
