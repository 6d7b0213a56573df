pub mod alert_cycle;
pub mod alert_store;
pub mod alerts_service;
pub mod coingecko;
pub mod matcher;
pub mod notifier;
pub mod price_source;
pub mod retry;
