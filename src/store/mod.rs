pub mod local;
pub mod remote;

use crate::db::Database;
use crate::errors::{AppError, AppResult};
use crate::models::{AppSettings, Lead, LeadStatus, NewLead, StorageBackend};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

#[async_trait]
pub trait LeadStore: Send + Sync {
    fn backend(&self) -> StorageBackend;

    async fn list_all(&self) -> AppResult<Vec<Lead>>;

    async fn create(&self, lead: NewLead) -> AppResult<Lead>;

    async fn update_status(&self, id: &str, status: LeadStatus) -> AppResult<()>;

    async fn delete(&self, id: &str) -> AppResult<()>;

    async fn reset(&self) -> AppResult<bool> {
        Err(AppError::Unsupported(format!(
            "{} backend cannot be reset",
            self.backend().as_str()
        )))
    }
}

pub fn open_store(
    settings: &AppSettings,
    db: Arc<Database>,
    remote_api_key: Option<String>,
) -> AppResult<Arc<dyn LeadStore>> {
    match settings.backend {
        StorageBackend::Local => Ok(Arc::new(local::LocalLeadStore::new(
            db,
            Duration::from_millis(settings.local_latency_ms),
        ))),
        StorageBackend::Remote => Ok(Arc::new(remote::RemoteLeadStore::new(
            settings.remote.clone(),
            remote_api_key,
        )?)),
    }
}

pub(crate) fn sort_newest_first(leads: &mut [Lead]) {
    leads.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}
