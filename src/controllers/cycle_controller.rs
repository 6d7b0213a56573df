use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::{error::PriceUpdateError, AppState};

// GET /status
pub async fn get_status(State(state): State<AppState>) -> Response {
    (StatusCode::OK, Json(state.coordinator.status())).into_response()
}

// POST /cycle/run
pub async fn post_run_cycle(State(state): State<AppState>) -> Response {
    let report = state.coordinator.run_cycle().await;
    (StatusCode::OK, Json(report)).into_response()
}

// GET /prices
pub async fn get_prices(State(state): State<AppState>) -> Response {
    match state.coordinator.fetch_snapshot().await {
        Ok(snapshot) => (StatusCode::OK, Json(snapshot)).into_response(),
        Err(e) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

#[derive(Deserialize)]
pub struct PriceUpdateQuery {
    pub lang: Option<String>,
}

// POST /prices/notify/:chat_id?lang=ru
pub async fn post_price_update(
    State(state): State<AppState>,
    Path(chat_id): Path<i64>,
    Query(q): Query<PriceUpdateQuery>,
) -> Response {
    let lang = q
        .lang
        .unwrap_or_else(|| state.settings.default_language.clone());

    match state.coordinator.send_price_update(chat_id, &lang).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "sent": true }))).into_response(),
        Err(e) => {
            let status = match e {
                PriceUpdateError::Render(_) => StatusCode::INTERNAL_SERVER_ERROR,
                PriceUpdateError::Fetch(_) | PriceUpdateError::Notify(_) => StatusCode::BAD_GATEWAY,
            };
            (status, Json(json!({ "sent": false, "error": e.to_string() }))).into_response()
        }
    }
}
