use crate::credentials;
use crate::db::Database;
use crate::errors::{AppError, AppResult};
use crate::insights::{self, RECENT_LEADS_LIMIT};
use crate::models::{
    AppSettings, BooleanResponse, DashboardView, Lead, LeadStatus, NewLead, SessionInfo, StorageBackend,
};
use crate::session::SessionGate;
use crate::store::{open_store, LeadStore};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

pub struct DeskCore {
    db: Arc<Database>,
    store: Arc<dyn LeadStore>,
    session: SessionGate,
    leads: RwLock<Vec<Lead>>,
    keyring_lock: Mutex<()>,
}

impl DeskCore {
    pub fn new(app_data_dir: PathBuf) -> AppResult<Arc<Self>> {
        let db_path = app_data_dir.join("state.sqlite");
        let db = Arc::new(Database::new(&db_path)?);
        let settings = db.get_settings()?;

        let api_key = match settings.backend {
            StorageBackend::Remote => credentials::load_remote_api_key(),
            StorageBackend::Local => None,
        };
        let store = open_store(&settings, db.clone(), api_key)?;
        let session = SessionGate::signed_in(&settings.session_email)?;

        tracing::info!(
            backend = settings.backend.as_str(),
            db_path = %db.path().display(),
            "lead desk initialized"
        );

        Ok(Arc::new(Self::with_store(db, store, session)))
    }

    pub fn with_store(db: Arc<Database>, store: Arc<dyn LeadStore>, session: SessionGate) -> Self {
        Self {
            db,
            store,
            session,
            leads: RwLock::new(Vec::new()),
            keyring_lock: Mutex::new(()),
        }
    }

    pub fn backend(&self) -> StorageBackend {
        self.store.backend()
    }

    pub async fn session(&self) -> Option<SessionInfo> {
        self.session.current().await
    }

    pub async fn sign_in(&self, email: &str) -> AppResult<SessionInfo> {
        self.session.sign_in(email).await
    }

    pub async fn sign_out(&self) {
        self.session.sign_out().await;
        self.leads.write().await.clear();
    }

    pub async fn refresh(&self) -> AppResult<Vec<Lead>> {
        self.session.require().await?;
        let leads = self.store.list_all().await?;
        *self.leads.write().await = leads.clone();
        Ok(leads)
    }

    pub async fn leads(&self) -> Vec<Lead> {
        self.leads.read().await.clone()
    }

    pub async fn search(&self, term: &str) -> Vec<Lead> {
        let leads = self.leads.read().await;
        insights::search(&leads, term).into_iter().cloned().collect()
    }

    pub async fn create_lead(&self, payload: NewLead) -> AppResult<Lead> {
        self.session.require().await?;
        let payload = normalize_new_lead(payload)?;
        let lead = self.store.create(payload).await?;
        self.leads.write().await.insert(0, lead.clone());
        Ok(lead)
    }

    pub async fn update_status(&self, id: &str, status: LeadStatus) -> AppResult<()> {
        self.session.require().await?;
        self.store.update_status(id, status).await?;
        let mut leads = self.leads.write().await;
        if let Some(lead) = leads.iter_mut().find(|lead| lead.id == id) {
            lead.status = status;
        }
        Ok(())
    }

    pub async fn delete_lead(&self, id: &str) -> AppResult<()> {
        self.session.require().await?;
        self.store.delete(id).await?;
        self.leads.write().await.retain(|lead| lead.id != id);
        Ok(())
    }

    pub async fn dashboard(&self, now: i64) -> DashboardView {
        let leads = self.leads.read().await;
        DashboardView {
            kpis: insights::compute_kpis(&leads, now),
            distribution: insights::distribution_buckets(&leads),
            recent: insights::recent_leads(&leads, RECENT_LEADS_LIMIT).to_vec(),
        }
    }

    pub async fn reset_demo_data(&self) -> AppResult<Vec<Lead>> {
        self.session.require().await?;
        self.store.reset().await?;
        self.refresh().await
    }

    pub fn settings(&self) -> AppResult<AppSettings> {
        self.db.get_settings()
    }

    pub fn update_settings(&self, update: serde_json::Value) -> AppResult<AppSettings> {
        let settings = self.db.update_settings(update)?;
        if settings.backend != self.backend() {
            tracing::info!(
                configured = settings.backend.as_str(),
                active = self.backend().as_str(),
                "storage backend change takes effect after restart"
            );
        }
        Ok(settings)
    }

    pub async fn save_remote_token(&self, token: String) -> AppResult<BooleanResponse> {
        let _guard = self.keyring_lock.lock().await;
        credentials::save_remote_api_key(&token)?;
        Ok(BooleanResponse { success: true })
    }

    pub async fn clear_remote_token(&self) -> AppResult<BooleanResponse> {
        let _guard = self.keyring_lock.lock().await;
        credentials::clear_remote_api_key()?;
        Ok(BooleanResponse { success: true })
    }

    pub async fn has_remote_token(&self) -> AppResult<BooleanResponse> {
        let _guard = self.keyring_lock.lock().await;
        Ok(BooleanResponse {
            success: credentials::has_remote_api_key()?,
        })
    }
}

fn normalize_new_lead(mut payload: NewLead) -> AppResult<NewLead> {
    for (field, value) in [("name", &payload.name), ("email", &payload.email), ("phone", &payload.phone)] {
        if value.trim().is_empty() {
            return Err(AppError::Validation(format!("{} is required", field)));
        }
    }
    payload.company = payload
        .company
        .take()
        .filter(|company| !company.trim().is_empty());
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::KpiSnapshot;
    use crate::store::local::LocalLeadStore;
    use async_trait::async_trait;
    use std::time::Duration;

    struct FailingStore;

    #[async_trait]
    impl LeadStore for FailingStore {
        fn backend(&self) -> StorageBackend {
            StorageBackend::Remote
        }

        async fn list_all(&self) -> AppResult<Vec<Lead>> {
            Err(AppError::StorageUnavailable("offline".to_string()))
        }

        async fn create(&self, _lead: NewLead) -> AppResult<Lead> {
            Err(AppError::StorageWriteFailed("offline".to_string()))
        }

        async fn update_status(&self, _id: &str, _status: LeadStatus) -> AppResult<()> {
            Err(AppError::StorageWriteFailed("offline".to_string()))
        }

        async fn delete(&self, _id: &str) -> AppResult<()> {
            Err(AppError::StorageWriteFailed("offline".to_string()))
        }
    }

    fn local_desk() -> (tempfile::TempDir, DeskCore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Arc::new(Database::new(&dir.path().join("test.db")).expect("db"));
        let store = Arc::new(LocalLeadStore::new(db.clone(), Duration::ZERO));
        let session = SessionGate::signed_in("admin@demo.com").expect("session");
        (dir, DeskCore::with_store(db, store, session))
    }

    fn payload(name: &str) -> NewLead {
        NewLead {
            name: name.to_string(),
            email: "a@b.com".to_string(),
            phone: "123".to_string(),
            company: Some("  ".to_string()),
            ..NewLead::default()
        }
    }

    #[tokio::test]
    async fn cached_snapshot_tracks_store_mutations() {
        let (_dir, desk) = local_desk();
        assert_eq!(desk.refresh().await.expect("refresh").len(), 4);

        let created = desk.create_lead(payload("Ana")).await.expect("create");
        assert!(created.company.is_none());
        desk.update_status("1", LeadStatus::Won).await.expect("update");
        desk.delete_lead("4").await.expect("delete");
        desk.update_status("missing", LeadStatus::Lost).await.expect("no-op update");

        let cached = desk.leads().await;
        let stored = desk.refresh().await.expect("refresh");
        assert_eq!(cached, stored);
        assert_eq!(stored[0].id, created.id);
        assert_eq!(stored.len(), 4);
    }

    #[tokio::test]
    async fn missing_required_fields_never_reach_the_store() {
        let (_dir, desk) = local_desk();
        desk.refresh().await.expect("refresh");

        let mut invalid = payload("Ana");
        invalid.phone = " ".to_string();
        let result = desk.create_lead(invalid).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(desk.refresh().await.expect("refresh").len(), 4);
    }

    #[tokio::test]
    async fn failures_leave_snapshot_untouched() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Arc::new(Database::new(&dir.path().join("test.db")).expect("db"));
        let session = SessionGate::signed_in("admin@demo.com").expect("session");
        let desk = DeskCore::with_store(db, Arc::new(FailingStore), session);
        let seeded = crate::store::local::demo_leads(0);
        *desk.leads.write().await = seeded.clone();

        assert!(matches!(desk.refresh().await, Err(AppError::StorageUnavailable(_))));
        assert!(matches!(
            desk.create_lead(payload("Ana")).await,
            Err(AppError::StorageWriteFailed(_))
        ));
        assert!(desk.update_status("1", LeadStatus::Lost).await.is_err());
        assert!(desk.delete_lead("1").await.is_err());
        assert_eq!(desk.leads().await, seeded);

        assert!(matches!(desk.reset_demo_data().await, Err(AppError::Unsupported(_))));
    }

    #[tokio::test]
    async fn signed_out_desk_refuses_store_calls() {
        let (_dir, desk) = local_desk();
        desk.refresh().await.expect("refresh");
        desk.sign_out().await;

        assert!(desk.leads().await.is_empty());
        assert!(matches!(desk.refresh().await, Err(AppError::Unauthenticated(_))));
        assert!(matches!(
            desk.create_lead(payload("Ana")).await,
            Err(AppError::Unauthenticated(_))
        ));

        desk.sign_in("admin@demo.com").await.expect("sign in");
        assert_eq!(desk.refresh().await.expect("refresh").len(), 4);
    }

    #[tokio::test]
    async fn dashboard_and_search_read_the_snapshot() {
        let (_dir, desk) = local_desk();
        let leads = desk.refresh().await.expect("refresh");
        let now = leads[0].created_at + 2 * 60 * 60 * 1000;

        let view = desk.dashboard(now).await;
        assert_eq!(
            view.kpis,
            KpiSnapshot {
                total: 4,
                new_leads: 3,
                negotiation: 2,
                closed: 1,
            }
        );
        assert_eq!(view.distribution.len(), 4);
        assert_eq!(view.recent.len(), 4);

        let found = desk.search("INOVA").await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "2");
        assert_eq!(desk.search("").await, leads);
    }

    #[tokio::test]
    async fn reset_restores_demo_data() {
        let (_dir, desk) = local_desk();
        desk.refresh().await.expect("refresh");
        desk.delete_lead("1").await.expect("delete");
        desk.create_lead(payload("Ana")).await.expect("create");

        let leads = desk.reset_demo_data().await.expect("reset");
        let ids = leads.iter().map(|lead| lead.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["1", "2", "3", "4"]);
        assert_eq!(desk.leads().await, leads);
    }

    #[test]
    fn settings_round_trip_through_desk() {
        let (_dir, desk) = local_desk();
        let updated = desk
            .update_settings(serde_json::json!({ "localLatencyMs": 0 }))
            .expect("update");
        assert_eq!(updated.local_latency_ms, 0);
        assert_eq!(desk.settings().expect("settings"), updated);
    }

    #[tokio::test]
    async fn new_opens_local_backend_with_demo_session() {
        let dir = tempfile::tempdir().expect("tempdir");
        let desk = DeskCore::new(dir.path().to_path_buf()).expect("desk");
        assert_eq!(desk.backend(), StorageBackend::Local);
        let session = desk.session().await.expect("session");
        assert_eq!(session.display_name, "admin");
        assert!(dir.path().join("state.sqlite").exists());
    }

    #[tokio::test]
    async fn rejected_backend_switch_keeps_desk_startable() {
        let dir = tempfile::tempdir().expect("tempdir");
        let desk = DeskCore::new(dir.path().to_path_buf()).expect("desk");

        let result = desk.update_settings(serde_json::json!({ "backend": "remote" }));
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(desk.settings().expect("settings").backend, StorageBackend::Local);
        drop(desk);

        let reopened = DeskCore::new(dir.path().to_path_buf()).expect("reopen");
        assert_eq!(reopened.backend(), StorageBackend::Local);
    }
}
