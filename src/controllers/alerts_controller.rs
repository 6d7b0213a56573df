use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    error::StoreError,
    models::AlertStatus,
    services::alerts_service::{self, AlertServiceError, NewAlert},
    AppState,
};

fn store_error(e: StoreError) -> Response {
    tracing::error!("alert store error: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": e.to_string() })),
    )
        .into_response()
}

fn not_found(alert_id: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": format!("alert {alert_id} not found") })),
    )
        .into_response()
}

// POST /alerts
pub async fn post_create_alert(
    State(state): State<AppState>,
    Json(input): Json<NewAlert>,
) -> Response {
    let res =
        alerts_service::create_alert(state.store.as_ref(), &input, &state.settings.default_language)
            .await;

    match res {
        Ok(alert) => (StatusCode::CREATED, Json(alert)).into_response(),
        Err(AlertServiceError::Invalid(e)) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
        Err(AlertServiceError::Store(e)) => store_error(e),
    }
}

// GET /alerts/:alert_id
pub async fn get_alert(State(state): State<AppState>, Path(alert_id): Path<String>) -> Response {
    match state.store.get(&alert_id).await {
        Ok(Some(alert)) => (StatusCode::OK, Json(alert)).into_response(),
        Ok(None) => not_found(&alert_id),
        Err(e) => store_error(e),
    }
}

// DELETE /alerts/:alert_id
pub async fn delete_alert(State(state): State<AppState>, Path(alert_id): Path<String>) -> Response {
    match alerts_service::delete_alert(state.store.as_ref(), &alert_id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => not_found(&alert_id),
        Err(e) => store_error(e),
    }
}

#[derive(Deserialize)]
pub struct UserAlertsQuery {
    pub status: Option<AlertStatus>,
}

// GET /users/:user_id/alerts?status=active
pub async fn get_user_alerts(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Query(q): Query<UserAlertsQuery>,
) -> Response {
    match alerts_service::list_user_alerts(state.store.as_ref(), user_id, q.status).await {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(e) => store_error(e),
    }
}

// DELETE /users/:user_id/alerts
pub async fn delete_user_alerts(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Response {
    match alerts_service::delete_user_alerts(state.store.as_ref(), user_id).await {
        Ok(n) => (StatusCode::OK, Json(json!({ "deleted": n }))).into_response(),
        Err(e) => store_error(e),
    }
}

// GET /assets/:asset/alerts
pub async fn get_asset_alerts(State(state): State<AppState>, Path(asset): Path<String>) -> Response {
    match alerts_service::list_asset_alerts(state.store.as_ref(), &asset).await {
        Ok(alerts) => (StatusCode::OK, Json(alerts)).into_response(),
        Err(AlertServiceError::Invalid(e)) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
        Err(AlertServiceError::Store(e)) => store_error(e),
    }
}
