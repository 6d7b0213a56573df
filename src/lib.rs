//! Library entrypoint for pricewatch.
//!
//! The binary only wires things together; integration tests under `tests/`
//! import the coordinator, services, and routers from here.

use std::sync::Arc;

pub mod config;
pub mod error;
pub mod models;

pub mod services;

#[path = "views/render.rs"]
pub mod render;
#[path = "views/templates.rs"]
pub mod templates;

pub mod controllers;
pub mod routes;

#[derive(Clone)]
pub struct AppState {
    pub settings: config::Settings,
    pub store: Arc<dyn services::alert_store::AlertStore>,
    pub coordinator: Arc<services::alert_cycle::AlertCycleCoordinator>,
    pub events_tx: tokio::sync::broadcast::Sender<String>,
}
