//! The periodic alert cycle: fetch prices, match active alerts, notify, and
//! mark delivered alerts as triggered.
//!
//! One [`AlertCycleCoordinator`] owns the cycle lock. Cycle bodies never
//! overlap; a caller that arrives while a cycle runs waits for it to finish.

use std::{
    panic::AssertUnwindSafe,
    sync::{Arc, Mutex},
    time::Duration,
};

use chrono::Utc;
use futures_util::FutureExt;
use serde::Serialize;
use tokio::{
    sync::{broadcast, Mutex as AsyncMutex},
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};

use crate::{
    config::Settings,
    error::{AlertError, FetchError, PriceUpdateError},
    models::{AlertStatus, PriceSnapshot, TriggeredMatch},
    render::Localizer,
    services::{
        alert_store::AlertStore,
        matcher,
        notifier::NotificationSink,
        price_source::PriceSource,
        retry::{self, RetryPolicy},
    },
};

/// Event published on the events channel when a cycle triggered alerts.
pub const ALERTS_UPDATED: &str = "alertsUpdated";

/// Collaborators a cycle runs against.
#[derive(Clone)]
pub struct CycleContext {
    pub source: Arc<dyn PriceSource>,
    pub store: Arc<dyn AlertStore>,
    pub sink: Arc<dyn NotificationSink>,
    pub localizer: Localizer,
    pub events_tx: broadcast::Sender<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CyclePolicies {
    pub fetch: RetryPolicy,
    pub notify: RetryPolicy,
}

impl CyclePolicies {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            fetch: RetryPolicy::new(settings.api_max_retries, settings.api_retry_delay),
            notify: RetryPolicy::new(settings.notify_max_retries, settings.notify_retry_delay),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CycleOutcome {
    /// Prices could not be fetched within the retry budget.
    FetchFailed { error: String },
    /// Active alerts could not be loaded.
    StoreFailed { error: String },
    NoActiveAlerts,
    Completed {
        evaluated: usize,
        matched: usize,
        delivered: usize,
        failed: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleReport {
    pub started_at: i64,
    pub finished_at: i64,
    pub outcome: CycleOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleStatus {
    pub running: bool,
    pub cycles_run: u64,
    pub last_report: Option<CycleReport>,
}

#[derive(Debug, Default)]
struct CycleHistory {
    cycles_run: u64,
    last_report: Option<CycleReport>,
}

pub struct AlertCycleCoordinator {
    ctx: CycleContext,
    policies: CyclePolicies,
    cycle_lock: AsyncMutex<()>,
    history: Mutex<CycleHistory>,
}

impl AlertCycleCoordinator {
    pub fn new(ctx: CycleContext, policies: CyclePolicies) -> Self {
        Self {
            ctx,
            policies,
            cycle_lock: AsyncMutex::new(()),
            history: Mutex::new(CycleHistory::default()),
        }
    }

    pub fn policies(&self) -> CyclePolicies {
        self.policies
    }

    /// Runs one full cycle under the cycle lock and returns its report.
    pub async fn run_cycle(&self) -> CycleReport {
        let _guard = match self.cycle_lock.try_lock() {
            Ok(g) => g,
            Err(_) => {
                tracing::info!("previous alert cycle still running, waiting for it");
                self.cycle_lock.lock().await
            }
        };

        let started_at = Utc::now().timestamp();
        tracing::info!("alert cycle started");

        let outcome = self.cycle_body().await;

        let report = CycleReport {
            started_at,
            finished_at: Utc::now().timestamp(),
            outcome,
        };
        tracing::info!(outcome = ?report.outcome, "alert cycle finished");

        let mut history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        history.cycles_run += 1;
        history.last_report = Some(report.clone());

        report
    }

    pub fn status(&self) -> CycleStatus {
        let running = self.cycle_lock.try_lock().is_err();
        let history = self.history.lock().unwrap_or_else(|e| e.into_inner());

        CycleStatus {
            running,
            cycles_run: history.cycles_run,
            last_report: history.last_report.clone(),
        }
    }

    /// Fetches a snapshot, retrying per the fetch policy.
    pub async fn fetch_snapshot(&self) -> Result<PriceSnapshot, FetchError> {
        retry::run(&self.policies.fetch, "price fetch", || self.ctx.source.fetch()).await
    }

    /// Sends the current prices to `chat_id`. Does not take the cycle lock.
    pub async fn send_price_update(
        &self,
        chat_id: i64,
        language: &str,
    ) -> Result<(), PriceUpdateError> {
        let snapshot = self.fetch_snapshot().await?;
        let text = self.ctx.localizer.price_update(&snapshot, language)?;

        retry::run(&self.policies.notify, "price update", || {
            self.ctx.sink.send(chat_id, &text)
        })
        .await?;

        tracing::info!("price update sent to chat {}", chat_id);
        Ok(())
    }

    async fn cycle_body(&self) -> CycleOutcome {
        // Prices are fetched before the alert list is read, even when it
        // turns out to be empty.
        let snapshot = match self.fetch_snapshot().await {
            Ok(s) => s,
            Err(e) => {
                tracing::error!("skipping alert cycle, price fetch failed: {}", e);
                return CycleOutcome::FetchFailed {
                    error: e.to_string(),
                };
            }
        };

        let alerts = match self.ctx.store.list_active().await {
            Ok(a) => a,
            Err(e) => {
                tracing::error!("skipping alert cycle, could not load alerts: {}", e);
                return CycleOutcome::StoreFailed {
                    error: e.to_string(),
                };
            }
        };

        if alerts.is_empty() {
            tracing::debug!("no active alerts");
            return CycleOutcome::NoActiveAlerts;
        }

        let matches = matcher::evaluate(&snapshot, &alerts);
        tracing::info!(
            "{} of {} active alerts matched",
            matches.len(),
            alerts.len()
        );

        let mut delivered = 0;
        let mut failed = 0;

        for m in &matches {
            let alert_id = m.alert.alert_id.as_str();
            let res = AssertUnwindSafe(self.process_match(m, snapshot.currency()))
                .catch_unwind()
                .await;

            match res {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => {
                    failed += 1;
                    tracing::error!(alert_id, "alert left active: {}", e);
                }
                Err(_) => {
                    failed += 1;
                    tracing::error!(alert_id, "alert processing panicked, alert left active");
                }
            }
        }

        if delivered > 0 {
            // no subscribers is fine
            let _ = self.ctx.events_tx.send(ALERTS_UPDATED.to_string());
        }

        CycleOutcome::Completed {
            evaluated: alerts.len(),
            matched: matches.len(),
            delivered,
            failed,
        }
    }

    /// Notify, then mark triggered. The status only changes after the
    /// notification was confirmed delivered.
    async fn process_match(&self, m: &TriggeredMatch, currency: &str) -> Result<(), AlertError> {
        let alert = &m.alert;
        let text = self.ctx.localizer.alert_triggered(m, currency)?;

        retry::run(&self.policies.notify, "alert notification", || {
            self.ctx.sink.send(alert.user_id, &text)
        })
        .await?;

        let updated = self
            .ctx
            .store
            .update_status(&alert.alert_id, AlertStatus::Triggered)
            .await?;

        if updated {
            tracing::info!(
                alert_id = %alert.alert_id,
                "alert triggered for user {}: {} {} {} (price {})",
                alert.user_id,
                alert.asset,
                alert.direction.as_str(),
                alert.threshold,
                m.current_price
            );
        } else {
            tracing::warn!(
                alert_id = %alert.alert_id,
                "notification sent but alert no longer exists"
            );
        }

        Ok(())
    }
}

/// Runs a cycle every `every`, starting immediately. Ticks that fall due
/// while a cycle is still running are delayed, not bunched up.
pub fn spawn_alert_cycle(coordinator: Arc<AlertCycleCoordinator>, every: Duration) -> JoinHandle<()> {
    let every = every.max(Duration::from_secs(1));

    tokio::spawn(async move {
        let mut interval = time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            coordinator.run_cycle().await;
        }
    })
}
