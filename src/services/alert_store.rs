use async_trait::async_trait;
use chrono::Utc;
use futures_util::StreamExt;
use mongodb::{
    bson::{self, doc, Document},
    options::{FindOptions, IndexOptions},
    Collection, Database, IndexModel,
};

use crate::{
    error::StoreError,
    models::{Alert, AlertStatus, Asset},
};

const COLLECTION: &str = "alerts";

/// Durable storage for alerts.
#[async_trait]
pub trait AlertStore: Send + Sync {
    async fn create(&self, alert: &Alert) -> Result<(), StoreError>;

    async fn get(&self, alert_id: &str) -> Result<Option<Alert>, StoreError>;

    async fn list_by_user(
        &self,
        user_id: i64,
        status: Option<AlertStatus>,
    ) -> Result<Vec<Alert>, StoreError>;

    /// All alerts with status `active`, in a stable order for one call.
    async fn list_active(&self) -> Result<Vec<Alert>, StoreError>;

    async fn list_active_by_asset(&self, asset: Asset) -> Result<Vec<Alert>, StoreError>;

    /// Returns whether a record existed and was updated.
    async fn update_status(&self, alert_id: &str, status: AlertStatus) -> Result<bool, StoreError>;

    async fn delete(&self, alert_id: &str) -> Result<bool, StoreError>;

    async fn delete_by_user(&self, user_id: i64) -> Result<u64, StoreError>;

    async fn count_by_user(&self, user_id: i64) -> Result<u64, StoreError> {
        Ok(self.list_by_user(user_id, None).await?.len() as u64)
    }

    async fn ping(&self) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct MongoAlertStore {
    db: Database,
}

impl MongoAlertStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn docs(&self) -> Collection<Document> {
        self.db.collection::<Document>(COLLECTION)
    }

    fn alerts(&self) -> Collection<Alert> {
        self.db.collection::<Alert>(COLLECTION)
    }

    pub async fn ensure_indexes(&self) -> Result<(), StoreError> {
        // unique public id
        let model = IndexModel::builder()
            .keys(doc! { "alert_id": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        self.docs().create_index(model, None).await?;

        // monitor scan: status + asset
        let model = IndexModel::builder()
            .keys(doc! { "status": 1, "asset": 1 })
            .build();
        self.docs().create_index(model, None).await?;

        // per-user listings
        let model = IndexModel::builder().keys(doc! { "user_id": 1 }).build();
        self.docs().create_index(model, None).await?;

        Ok(())
    }

    /// Decodes documents one by one so a single bad record is skipped
    /// instead of failing the whole listing.
    async fn find_alerts(&self, filter: Document) -> Result<Vec<Alert>, StoreError> {
        let opts = FindOptions::builder()
            .sort(doc! { "created_at": 1, "alert_id": 1 })
            .build();

        let mut cursor = self.docs().find(filter, opts).await?;

        let mut items: Vec<Alert> = Vec::new();
        while let Some(res) = cursor.next().await {
            let raw = res?;
            match bson::from_document::<Alert>(raw) {
                Ok(a) => items.push(a),
                Err(e) => tracing::warn!("skipping undecodable alert document: {}", e),
            }
        }

        Ok(items)
    }
}

#[async_trait]
impl AlertStore for MongoAlertStore {
    async fn create(&self, alert: &Alert) -> Result<(), StoreError> {
        self.alerts().insert_one(alert, None).await?;
        tracing::info!(
            "created alert {} for user {}: {} {} {}",
            alert.alert_id,
            alert.user_id,
            alert.asset,
            alert.direction.as_str(),
            alert.threshold
        );
        Ok(())
    }

    async fn get(&self, alert_id: &str) -> Result<Option<Alert>, StoreError> {
        let found = self
            .docs()
            .find_one(doc! { "alert_id": alert_id }, None)
            .await?;

        found
            .map(|d| bson::from_document::<Alert>(d).map_err(|e| StoreError::Decode(e.to_string())))
            .transpose()
    }

    async fn list_by_user(
        &self,
        user_id: i64,
        status: Option<AlertStatus>,
    ) -> Result<Vec<Alert>, StoreError> {
        let mut filter = doc! { "user_id": user_id };
        if let Some(s) = status {
            filter.insert("status", s.as_str());
        }
        self.find_alerts(filter).await
    }

    async fn list_active(&self) -> Result<Vec<Alert>, StoreError> {
        self.find_alerts(doc! { "status": AlertStatus::Active.as_str() })
            .await
    }

    async fn list_active_by_asset(&self, asset: Asset) -> Result<Vec<Alert>, StoreError> {
        self.find_alerts(doc! {
            "status": AlertStatus::Active.as_str(),
            "asset": asset.symbol(),
        })
        .await
    }

    async fn update_status(&self, alert_id: &str, status: AlertStatus) -> Result<bool, StoreError> {
        let now = Utc::now().timestamp();
        let res = self
            .docs()
            .update_one(
                doc! { "alert_id": alert_id },
                doc! { "$set": { "status": status.as_str(), "updated_at": now } },
                None,
            )
            .await?;

        let updated = res.matched_count > 0;
        if updated {
            tracing::info!("updated alert {} status to {}", alert_id, status.as_str());
        } else {
            tracing::warn!("alert {} not found for status update", alert_id);
        }
        Ok(updated)
    }

    async fn delete(&self, alert_id: &str) -> Result<bool, StoreError> {
        let res = self
            .docs()
            .delete_one(doc! { "alert_id": alert_id }, None)
            .await?;

        let deleted = res.deleted_count > 0;
        if deleted {
            tracing::info!("deleted alert {}", alert_id);
        } else {
            tracing::warn!("alert {} not found for deletion", alert_id);
        }
        Ok(deleted)
    }

    async fn delete_by_user(&self, user_id: i64) -> Result<u64, StoreError> {
        let res = self
            .docs()
            .delete_many(doc! { "user_id": user_id }, None)
            .await?;
        tracing::info!("deleted {} alerts for user {}", res.deleted_count, user_id);
        Ok(res.deleted_count)
    }

    async fn count_by_user(&self, user_id: i64) -> Result<u64, StoreError> {
        Ok(self
            .docs()
            .count_documents(doc! { "user_id": user_id }, None)
            .await?)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.db.run_command(doc! { "ping": 1 }, None).await?;
        Ok(())
    }
}
