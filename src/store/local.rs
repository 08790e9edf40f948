use super::{sort_newest_first, LeadStore};
use crate::db::Database;
use crate::errors::{AppError, AppResult};
use crate::models::{Lead, LeadStatus, NewLead, StorageBackend};
use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

pub const LEADS_ENTRY_KEY: &str = "nexus_leads";

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_LEN: usize = 9;
const HOUR_MS: i64 = 60 * 60 * 1000;
const DAY_MS: i64 = 24 * HOUR_MS;

pub struct LocalLeadStore {
    db: Arc<Database>,
    latency: Duration,
}

impl LocalLeadStore {
    pub fn new(db: Arc<Database>, latency: Duration) -> Self {
        Self { db, latency }
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    fn load_or_seed(&self) -> AppResult<Vec<Lead>> {
        let raw = self
            .db
            .get_entry(LEADS_ENTRY_KEY)
            .map_err(|error| AppError::StorageUnavailable(error.to_string()))?;

        match raw {
            Some(raw) => serde_json::from_str::<Vec<Lead>>(&raw).map_err(|error| {
                AppError::StorageUnavailable(format!("corrupted local lead entry: {}", error))
            }),
            None => {
                let seed = demo_leads(now_millis());
                self.persist(&seed)
                    .map_err(|error| AppError::StorageUnavailable(error.to_string()))?;
                tracing::info!(count = seed.len(), "seeded local lead store with demo data");
                Ok(seed)
            }
        }
    }

    fn persist(&self, leads: &[Lead]) -> AppResult<()> {
        let raw = serde_json::to_string(leads).map_err(|error| AppError::StorageWriteFailed(error.to_string()))?;
        self.db
            .put_entry(LEADS_ENTRY_KEY, &raw)
            .map_err(|error| AppError::StorageWriteFailed(error.to_string()))
    }
}

#[async_trait]
impl LeadStore for LocalLeadStore {
    fn backend(&self) -> StorageBackend {
        StorageBackend::Local
    }

    async fn list_all(&self) -> AppResult<Vec<Lead>> {
        self.simulate_latency().await;
        let mut leads = self.load_or_seed().inspect_err(|error| {
            tracing::warn!(error = %error, "failed to read local leads");
        })?;
        sort_newest_first(&mut leads);
        tracing::debug!(count = leads.len(), "listed local leads");
        Ok(leads)
    }

    async fn create(&self, lead: NewLead) -> AppResult<Lead> {
        self.simulate_latency().await;
        let mut leads = self.load_or_seed().map_err(AppError::into_write_failure)?;

        let newest = leads.iter().map(|existing| existing.created_at).max().unwrap_or(i64::MIN);
        let created_at = now_millis().max(newest);
        let id = unique_id(&leads);
        let lead = lead.into_lead(id, created_at);

        leads.insert(0, lead.clone());
        self.persist(&leads).inspect_err(|error| {
            tracing::warn!(error = %error, "failed to add local lead");
        })?;
        tracing::debug!(lead_id = %lead.id, "created local lead");
        Ok(lead)
    }

    async fn update_status(&self, id: &str, status: LeadStatus) -> AppResult<()> {
        self.simulate_latency().await;
        let mut leads = self.load_or_seed().map_err(AppError::into_write_failure)?;

        let Some(lead) = leads.iter_mut().find(|lead| lead.id == id) else {
            tracing::debug!(lead_id = %id, "status update for unknown lead ignored");
            return Ok(());
        };
        lead.status = status;

        self.persist(&leads).inspect_err(|error| {
            tracing::warn!(error = %error, lead_id = %id, "failed to update local lead status");
        })?;
        tracing::debug!(lead_id = %id, status = status.as_str(), "updated local lead status");
        Ok(())
    }

    async fn delete(&self, id: &str) -> AppResult<()> {
        self.simulate_latency().await;
        let mut leads = self.load_or_seed().map_err(AppError::into_write_failure)?;

        let before = leads.len();
        leads.retain(|lead| lead.id != id);
        if leads.len() == before {
            tracing::debug!(lead_id = %id, "delete for unknown lead ignored");
            return Ok(());
        }

        self.persist(&leads).inspect_err(|error| {
            tracing::warn!(error = %error, lead_id = %id, "failed to delete local lead");
        })?;
        tracing::debug!(lead_id = %id, "deleted local lead");
        Ok(())
    }

    async fn reset(&self) -> AppResult<bool> {
        self.simulate_latency().await;
        let removed = self
            .db
            .delete_entry(LEADS_ENTRY_KEY)
            .map_err(|error| AppError::StorageWriteFailed(error.to_string()))?;
        tracing::info!(removed, "reset local lead store");
        Ok(removed)
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn random_id() -> String {
    let mut rng = rand::rng();
    (0..ID_LEN)
        .map(|_| ID_ALPHABET[rng.random_range(0..ID_ALPHABET.len())] as char)
        .collect()
}

fn unique_id(existing: &[Lead]) -> String {
    loop {
        let id = random_id();
        if !existing.iter().any(|lead| lead.id == id) {
            return id;
        }
    }
}

pub fn demo_leads(now: i64) -> Vec<Lead> {
    vec![
        Lead {
            id: "1".to_string(),
            name: "Carlos Mendes".to_string(),
            email: "carlos@techsolutions.com.br".to_string(),
            phone: "(11) 98765-4321".to_string(),
            company: Some("Tech Solutions".to_string()),
            status: LeadStatus::New,
            created_at: now - 2 * HOUR_MS,
            value: Some(15_000.0),
        },
        Lead {
            id: "2".to_string(),
            name: "Fernanda Lima".to_string(),
            email: "fernanda.lima@inovacorp.com".to_string(),
            phone: "(21) 99876-5432".to_string(),
            company: Some("InovaCorp".to_string()),
            status: LeadStatus::Contacted,
            created_at: now - DAY_MS,
            value: Some(8_500.0),
        },
        Lead {
            id: "3".to_string(),
            name: "Ricardo Souza".to_string(),
            email: "ricardo@souzalogistica.com".to_string(),
            phone: "(31) 97654-3210".to_string(),
            company: Some("Souza Logística".to_string()),
            status: LeadStatus::Proposal,
            created_at: now - 3 * DAY_MS,
            value: Some(42_000.0),
        },
        Lead {
            id: "4".to_string(),
            name: "Juliana Costa".to_string(),
            email: "juliana.costa@gmail.com".to_string(),
            phone: "(41) 96543-2109".to_string(),
            company: None,
            status: LeadStatus::Won,
            created_at: now - 10 * DAY_MS,
            value: Some(3_200.0),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, Arc<Database>, LocalLeadStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Arc::new(Database::new(&dir.path().join("test.db")).expect("db"));
        let store = LocalLeadStore::new(db.clone(), Duration::ZERO);
        (dir, db, store)
    }

    fn new_lead(name: &str) -> NewLead {
        NewLead {
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            phone: "123".to_string(),
            ..NewLead::default()
        }
    }

    #[tokio::test]
    async fn first_list_seeds_demo_data_once() {
        let (_dir, _db, store) = store();

        let first = store.list_all().await.expect("first list");
        let ids = first.iter().map(|lead| lead.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["1", "2", "3", "4"]);
        let statuses = first.iter().map(|lead| lead.status).collect::<Vec<_>>();
        assert_eq!(
            statuses,
            vec![LeadStatus::New, LeadStatus::Contacted, LeadStatus::Proposal, LeadStatus::Won]
        );

        let second = store.list_all().await.expect("second list");
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn empty_collection_is_not_reseeded() {
        let (_dir, db, store) = store();
        db.put_entry(LEADS_ENTRY_KEY, "[]").expect("put");
        assert!(store.list_all().await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn created_leads_come_back_newest_first() {
        let (_dir, _db, store) = store();
        let mut created_ids = Vec::new();
        for name in ["Ana", "Bruno", "Clara"] {
            let lead = store.create(new_lead(name)).await.expect("create");
            assert_eq!(lead.id.len(), ID_LEN);
            assert_eq!(lead.status, LeadStatus::New);
            created_ids.push(lead.id);
        }

        let leads = store.list_all().await.expect("list");
        assert_eq!(leads.len(), 7);
        assert!(leads.windows(2).all(|pair| pair[0].created_at >= pair[1].created_at));
        let head = leads.iter().take(3).map(|lead| lead.id.clone()).collect::<Vec<_>>();
        created_ids.reverse();
        assert_eq!(head, created_ids);
    }

    #[tokio::test]
    async fn create_keeps_caller_status_and_fresh_id() {
        let (_dir, _db, store) = store();
        let before = store.list_all().await.expect("list");

        let mut payload = new_lead("Ana");
        payload.email = "a@b.com".to_string();
        payload.status = LeadStatus::Proposal;
        let created = store.create(payload).await.expect("create");

        let leads = store.list_all().await.expect("list");
        assert_eq!(leads[0], created);
        assert_eq!(leads[0].email, "a@b.com");
        assert_eq!(leads[0].status, LeadStatus::Proposal);
        assert!(before.iter().all(|lead| lead.id != created.id));
    }

    #[tokio::test]
    async fn update_status_touches_only_the_target() {
        let (_dir, db, store) = store();
        let before = store.list_all().await.expect("list");

        store.update_status("2", LeadStatus::Lost).await.expect("update");
        let after = store.list_all().await.expect("list");
        for (old, new) in before.iter().zip(after.iter()) {
            if new.id == "2" {
                assert_eq!(new.status, LeadStatus::Lost);
                assert_eq!(new.name, old.name);
            } else {
                assert_eq!(old, new);
            }
        }

        let raw_before = db.get_entry(LEADS_ENTRY_KEY).expect("entry");
        store.update_status("missing", LeadStatus::Won).await.expect("no-op");
        assert_eq!(db.get_entry(LEADS_ENTRY_KEY).expect("entry"), raw_before);
    }

    #[tokio::test]
    async fn delete_removes_exactly_one() {
        let (_dir, _db, store) = store();
        assert_eq!(store.list_all().await.expect("list").len(), 4);

        store.delete("3").await.expect("delete");
        let leads = store.list_all().await.expect("list");
        assert_eq!(leads.len(), 3);
        assert!(leads.iter().all(|lead| lead.id != "3"));

        store.delete("3").await.expect("delete missing");
        assert_eq!(store.list_all().await.expect("list").len(), 3);
    }

    #[tokio::test]
    async fn corrupted_entry_fails_reads_and_writes() {
        let (_dir, db, store) = store();
        db.put_entry(LEADS_ENTRY_KEY, "{not json").expect("put");

        let read = store.list_all().await;
        assert!(matches!(read, Err(AppError::StorageUnavailable(_))));

        let write = store.create(new_lead("Ana")).await;
        assert!(matches!(write, Err(AppError::StorageWriteFailed(_))));
        assert_eq!(db.get_entry(LEADS_ENTRY_KEY).expect("entry").as_deref(), Some("{not json"));
    }

    #[tokio::test]
    async fn rejected_write_keeps_previous_collection() {
        let (_dir, db, store) = store();
        let before = store.list_all().await.expect("list");
        db.execute_batch(
            "CREATE TRIGGER block_entry_insert BEFORE INSERT ON kv_entries
             BEGIN SELECT RAISE(ABORT, 'writes blocked'); END;
             CREATE TRIGGER block_entry_update BEFORE UPDATE ON kv_entries
             BEGIN SELECT RAISE(ABORT, 'writes blocked'); END;",
        )
        .expect("install triggers");

        let created = store.create(new_lead("Ana")).await;
        assert!(matches!(created, Err(AppError::StorageWriteFailed(_))));
        let updated = store.update_status("2", LeadStatus::Lost).await;
        assert!(matches!(updated, Err(AppError::StorageWriteFailed(_))));
        let deleted = store.delete("3").await;
        assert!(matches!(deleted, Err(AppError::StorageWriteFailed(_))));

        assert_eq!(store.list_all().await.expect("list"), before);
    }

    #[tokio::test]
    async fn reset_reseeds_on_next_read() {
        let (_dir, _db, store) = store();
        store.delete("1").await.expect("delete");
        assert!(store.reset().await.expect("reset"));

        let leads = store.list_all().await.expect("list");
        assert_eq!(leads.len(), 4);
        assert_eq!(leads[0].id, "1");
    }

    #[test]
    fn demo_leads_span_two_hours_to_ten_days() {
        let now = 1_700_000_000_000;
        let seed = demo_leads(now);
        assert_eq!(seed.first().map(|lead| now - lead.created_at), Some(2 * HOUR_MS));
        assert_eq!(seed.last().map(|lead| now - lead.created_at), Some(10 * DAY_MS));
        assert!(seed.iter().all(|lead| lead.status != LeadStatus::Lost));
    }

    #[test]
    fn random_ids_are_base36() {
        let id = random_id();
        assert_eq!(id.len(), ID_LEN);
        assert!(id.bytes().all(|byte| ID_ALPHABET.contains(&byte)));
    }
}
