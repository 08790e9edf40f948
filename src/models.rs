use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub enum LeadStatus {
    #[default]
    #[serde(rename = "Novo")]
    New,
    #[serde(rename = "Contatado")]
    Contacted,
    #[serde(rename = "Proposta")]
    Proposal,
    #[serde(rename = "Ganho")]
    Won,
    #[serde(rename = "Perdido")]
    Lost,
}

impl LeadStatus {
    pub const ALL: [LeadStatus; 5] = [
        Self::New,
        Self::Contacted,
        Self::Proposal,
        Self::Won,
        Self::Lost,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "Novo",
            Self::Contacted => "Contatado",
            Self::Proposal => "Proposta",
            Self::Won => "Ganho",
            Self::Lost => "Perdido",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == label)
    }

    pub fn is_negotiation(self) -> bool {
        matches!(self, Self::Contacted | Self::Proposal)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    pub status: LeadStatus,
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct NewLead {
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub status: LeadStatus,
    #[serde(default)]
    pub value: Option<f64>,
}

impl NewLead {
    pub fn into_lead(self, id: String, created_at: i64) -> Lead {
        Lead {
            id,
            name: self.name,
            email: self.email,
            phone: self.phone,
            company: self.company,
            status: self.status,
            created_at,
            value: self.value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct KpiSnapshot {
    pub total: usize,
    pub new_leads: usize,
    pub negotiation: usize,
    pub closed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusBucket {
    pub status: LeadStatus,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    pub kpis: KpiSnapshot,
    pub distribution: Vec<StatusBucket>,
    pub recent: Vec<Lead>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub email: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BooleanResponse {
    pub success: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum StorageBackend {
    #[default]
    Local,
    Remote,
}

impl StorageBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RemoteStoreSettings {
    pub base_url: String,
    pub project_id: String,
    pub database_id: String,
    pub collection: String,
}

impl Default for RemoteStoreSettings {
    fn default() -> Self {
        Self {
            base_url: "https://firestore.googleapis.com/v1".to_string(),
            project_id: String::new(),
            database_id: "(default)".to_string(),
            collection: "leads".to_string(),
        }
    }
}

impl RemoteStoreSettings {
    pub fn validate(&self) -> AppResult<()> {
        if self.project_id.trim().is_empty() {
            return Err(AppError::Validation(
                "remote backend requires remote.projectId".to_string(),
            ));
        }
        if self.collection.trim().is_empty() || self.collection.contains('/') {
            return Err(AppError::Validation(format!(
                "invalid remote.collection: {:?}",
                self.collection
            )));
        }
        let base = reqwest::Url::parse(&self.base_url)
            .map_err(|error| AppError::Validation(format!("invalid remote.baseUrl: {}", error)))?;
        if base.cannot_be_a_base() {
            return Err(AppError::Validation(format!(
                "invalid remote.baseUrl: {}",
                self.base_url
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    pub backend: StorageBackend,
    pub local_latency_ms: u64,
    pub remote: RemoteStoreSettings,
    pub session_email: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            local_latency_ms: 250,
            remote: RemoteStoreSettings::default(),
            session_email: "admin@demo.com".to_string(),
        }
    }
}

impl AppSettings {
    pub fn validate(&self) -> AppResult<()> {
        match self.backend {
            StorageBackend::Local => Ok(()),
            StorageBackend::Remote => self.remote.validate(),
        }
    }
}
