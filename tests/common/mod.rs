#![allow(dead_code)]

use std::{
    collections::{BTreeMap, HashMap, HashSet, VecDeque},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use pricewatch::{
    config::Settings,
    error::{FetchError, NotifyError, StoreError},
    models::{Alert, AlertDirection, AlertStatus, Asset, PriceSnapshot},
    render::Localizer,
    services::{
        alert_cycle::{AlertCycleCoordinator, CycleContext, CyclePolicies},
        alert_store::AlertStore,
        notifier::NotificationSink,
        price_source::PriceSource,
        retry::RetryPolicy,
    },
    AppState,
};
use tokio::sync::broadcast;

pub fn snapshot(btc: f64, eth: f64, usdt: f64) -> PriceSnapshot {
    let mut prices = BTreeMap::new();
    prices.insert(Asset::Btc, btc);
    prices.insert(Asset::Eth, eth);
    prices.insert(Asset::Usdt, usdt);
    PriceSnapshot::new(prices, "usd", Some(1_700_000_000))
}

pub fn alert(id: &str, user_id: i64, asset: Asset, threshold: f64, direction: AlertDirection) -> Alert {
    Alert {
        alert_id: id.to_string(),
        user_id,
        asset,
        threshold,
        direction,
        status: AlertStatus::Active,
        language_preference: "en".to_string(),
        created_at: 0,
        updated_at: 0,
    }
}

/// Replays queued results; once the queue is empty the fallback is used.
pub struct FakePriceSource {
    queued: Mutex<VecDeque<Result<PriceSnapshot, FetchError>>>,
    fallback: Result<PriceSnapshot, FetchError>,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakePriceSource {
    pub fn ok(snapshot: PriceSnapshot) -> Self {
        Self::with_fallback(Ok(snapshot))
    }

    pub fn failing(err: FetchError) -> Self {
        Self::with_fallback(Err(err))
    }

    fn with_fallback(fallback: Result<PriceSnapshot, FetchError>) -> Self {
        Self {
            queued: Mutex::new(VecDeque::new()),
            fallback,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn then(self, result: Result<PriceSnapshot, FetchError>) -> Self {
        self.queued.lock().unwrap().push_back(result);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceSource for FakePriceSource {
    async fn fetch(&self) -> Result<PriceSnapshot, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let res = self
            .queued
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        res
    }
}

#[derive(Default)]
pub struct MemoryAlertStore {
    alerts: Mutex<Vec<Alert>>,
    status_updates: Mutex<Vec<(String, AlertStatus)>>,
    list_active_calls: AtomicUsize,
    fail_list_active: bool,
    fail_updates_for: HashSet<String>,
}

impl MemoryAlertStore {
    pub fn with_alerts(alerts: Vec<Alert>) -> Self {
        Self {
            alerts: Mutex::new(alerts),
            ..Default::default()
        }
    }

    pub fn failing_list() -> Self {
        Self {
            fail_list_active: true,
            ..Default::default()
        }
    }

    pub fn fail_updates_for(mut self, alert_id: &str) -> Self {
        self.fail_updates_for.insert(alert_id.to_string());
        self
    }

    pub fn status_of(&self, alert_id: &str) -> Option<AlertStatus> {
        self.alerts
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.alert_id == alert_id)
            .map(|a| a.status)
    }

    pub fn status_updates(&self) -> Vec<(String, AlertStatus)> {
        self.status_updates.lock().unwrap().clone()
    }

    pub fn list_active_calls(&self) -> usize {
        self.list_active_calls.load(Ordering::SeqCst)
    }

    pub fn set_status(&self, alert_id: &str, status: AlertStatus) {
        if let Some(a) = self
            .alerts
            .lock()
            .unwrap()
            .iter_mut()
            .find(|a| a.alert_id == alert_id)
        {
            a.status = status;
        }
    }
}

#[async_trait]
impl AlertStore for MemoryAlertStore {
    async fn create(&self, alert: &Alert) -> Result<(), StoreError> {
        self.alerts.lock().unwrap().push(alert.clone());
        Ok(())
    }

    async fn get(&self, alert_id: &str) -> Result<Option<Alert>, StoreError> {
        Ok(self
            .alerts
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.alert_id == alert_id)
            .cloned())
    }

    async fn list_by_user(
        &self,
        user_id: i64,
        status: Option<AlertStatus>,
    ) -> Result<Vec<Alert>, StoreError> {
        Ok(self
            .alerts
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.user_id == user_id && status.is_none_or(|s| a.status == s))
            .cloned()
            .collect())
    }

    async fn list_active(&self) -> Result<Vec<Alert>, StoreError> {
        self.list_active_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_list_active {
            return Err(StoreError::Database("connection refused".into()));
        }
        Ok(self
            .alerts
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.status == AlertStatus::Active)
            .cloned()
            .collect())
    }

    async fn list_active_by_asset(&self, asset: Asset) -> Result<Vec<Alert>, StoreError> {
        Ok(self
            .list_active()
            .await?
            .into_iter()
            .filter(|a| a.asset == asset)
            .collect())
    }

    async fn update_status(&self, alert_id: &str, status: AlertStatus) -> Result<bool, StoreError> {
        if self.fail_updates_for.contains(alert_id) {
            return Err(StoreError::Database("write conflict".into()));
        }
        self.status_updates
            .lock()
            .unwrap()
            .push((alert_id.to_string(), status));

        let mut alerts = self.alerts.lock().unwrap();
        match alerts.iter_mut().find(|a| a.alert_id == alert_id) {
            Some(a) => {
                a.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, alert_id: &str) -> Result<bool, StoreError> {
        let mut alerts = self.alerts.lock().unwrap();
        let before = alerts.len();
        alerts.retain(|a| a.alert_id != alert_id);
        Ok(alerts.len() < before)
    }

    async fn delete_by_user(&self, user_id: i64) -> Result<u64, StoreError> {
        let mut alerts = self.alerts.lock().unwrap();
        let before = alerts.len();
        alerts.retain(|a| a.user_id != user_id);
        Ok((before - alerts.len()) as u64)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Records delivered messages. Recipients can be set up to fail, be
/// rejected, panic, or be throttled once.
#[derive(Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<(i64, String)>>,
    attempts: Mutex<Vec<i64>>,
    failing: HashSet<i64>,
    rejecting: HashSet<i64>,
    panicking: HashSet<i64>,
    // recipient -> retry_after secs, answered once with a 429
    throttle_once: Mutex<HashMap<i64, u64>>,
}

impl RecordingSink {
    pub fn failing_for(mut self, recipient_id: i64) -> Self {
        self.failing.insert(recipient_id);
        self
    }

    pub fn rejecting(mut self, recipient_id: i64) -> Self {
        self.rejecting.insert(recipient_id);
        self
    }

    pub fn panicking_for(mut self, recipient_id: i64) -> Self {
        self.panicking.insert(recipient_id);
        self
    }

    pub fn throttling_once(self, recipient_id: i64, retry_after_secs: u64) -> Self {
        self.throttle_once
            .lock()
            .unwrap()
            .insert(recipient_id, retry_after_secs);
        self
    }

    pub fn sent(&self) -> Vec<(i64, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn attempts_for(&self, recipient_id: i64) -> usize {
        self.attempts
            .lock()
            .unwrap()
            .iter()
            .filter(|r| **r == recipient_id)
            .count()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn send(&self, recipient_id: i64, text: &str) -> Result<(), NotifyError> {
        self.attempts.lock().unwrap().push(recipient_id);

        if self.failing.contains(&recipient_id) {
            return Err(NotifyError::Transport("connection reset".into()));
        }
        if let Some(secs) = self.throttle_once.lock().unwrap().remove(&recipient_id) {
            return Err(NotifyError::RateLimited {
                retry_after_secs: Some(secs),
            });
        }
        if self.panicking.contains(&recipient_id) {
            panic!("sink blew up for {recipient_id}");
        }
        if self.rejecting.contains(&recipient_id) {
            return Err(NotifyError::Rejected {
                status: 403,
                description: "Forbidden: bot was blocked by the user".into(),
            });
        }

        self.sent.lock().unwrap().push((recipient_id, text.to_string()));
        Ok(())
    }
}

pub fn policies() -> CyclePolicies {
    CyclePolicies {
        fetch: RetryPolicy::new(3, Duration::from_millis(100)),
        notify: RetryPolicy::new(2, Duration::from_millis(100)),
    }
}

pub struct Harness {
    pub source: Arc<FakePriceSource>,
    pub store: Arc<MemoryAlertStore>,
    pub sink: Arc<RecordingSink>,
    pub events_tx: broadcast::Sender<String>,
    pub coordinator: Arc<AlertCycleCoordinator>,
}

impl Harness {
    pub fn new(source: FakePriceSource, store: MemoryAlertStore, sink: RecordingSink) -> Self {
        let source = Arc::new(source);
        let store = Arc::new(store);
        let sink = Arc::new(sink);
        let (events_tx, _) = broadcast::channel(16);

        let ctx = CycleContext {
            source: source.clone(),
            store: store.clone(),
            sink: sink.clone(),
            localizer: Localizer::new("en").unwrap(),
            events_tx: events_tx.clone(),
        };
        let coordinator = Arc::new(AlertCycleCoordinator::new(ctx, policies()));

        Self {
            source,
            store,
            sink,
            events_tx,
            coordinator,
        }
    }

    pub fn app_state(&self) -> AppState {
        AppState {
            settings: Settings::default(),
            store: self.store.clone(),
            coordinator: self.coordinator.clone(),
            events_tx: self.events_tx.clone(),
        }
    }
}
