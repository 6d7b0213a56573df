use axum::{Router, routing::{get, post}};
use crate::{AppState, controllers::cycle_controller};

pub fn add_routes(router: Router<AppState>) -> Router<AppState> {
    router
        .route("/status", get(cycle_controller::get_status))
        .route("/cycle/run", post(cycle_controller::post_run_cycle))
        .route("/prices", get(cycle_controller::get_prices))
        .route("/prices/notify/:chat_id", post(cycle_controller::post_price_update))
}
