use axum::{Router, routing::{get, post}};
use crate::{AppState, controllers::alerts_controller};

pub fn add_routes(router: Router<AppState>) -> Router<AppState> {
    router
        .route("/alerts", post(alerts_controller::post_create_alert))
        .route(
            "/alerts/:alert_id",
            get(alerts_controller::get_alert).delete(alerts_controller::delete_alert),
        )
        .route(
            "/users/:user_id/alerts",
            get(alerts_controller::get_user_alerts).delete(alerts_controller::delete_user_alerts),
        )
        .route("/assets/:asset/alerts", get(alerts_controller::get_asset_alerts))
}
