use super::LeadStore;
use crate::errors::{AppError, AppResult};
use crate::models::{Lead, LeadStatus, NewLead, RemoteStoreSettings, StorageBackend};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicI64, Ordering};

pub struct RemoteLeadStore {
    client: reqwest::Client,
    settings: RemoteStoreSettings,
    api_key: Option<String>,
    last_created_at: AtomicI64,
}

impl RemoteLeadStore {
    pub fn new(settings: RemoteStoreSettings, api_key: Option<String>) -> AppResult<Self> {
        settings.validate()?;
        Ok(Self {
            client: reqwest::Client::new(),
            settings,
            api_key: api_key.filter(|key| !key.is_empty()),
            last_created_at: AtomicI64::new(i64::MIN),
        })
    }

    fn documents_url(&self) -> String {
        format!(
            "{}/projects/{}/databases/{}/documents",
            self.settings.base_url.trim_end_matches('/'),
            self.settings.project_id,
            self.settings.database_id
        )
    }

    fn collection_url(&self) -> String {
        format!("{}/{}", self.documents_url(), self.settings.collection)
    }

    fn document_url(&self, id: &str) -> AppResult<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.collection_url())
            .map_err(|error| AppError::Validation(format!("invalid remote base URL: {}", error)))?;
        url.path_segments_mut()
            .map_err(|_| AppError::Validation("remote base URL cannot hold a path".to_string()))?
            .push(id);
        Ok(url)
    }

    // Non-decreasing for this process only; other writers and restarts are not covered.
    fn next_created_at(&self, now: i64) -> i64 {
        self.last_created_at.fetch_max(now, Ordering::SeqCst).max(now)
    }

    fn with_key(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.query(&[("key", key.as_str())]),
            None => request,
        }
    }
}

#[async_trait]
impl LeadStore for RemoteLeadStore {
    fn backend(&self) -> StorageBackend {
        StorageBackend::Remote
    }

    async fn list_all(&self) -> AppResult<Vec<Lead>> {
        let body = json!({
            "structuredQuery": {
                "from": [{ "collectionId": self.settings.collection }],
                "orderBy": [{
                    "field": { "fieldPath": "createdAt" },
                    "direction": "DESCENDING"
                }]
            }
        });
        let request = self
            .client
            .post(format!("{}:runQuery", self.documents_url()))
            .json(&body);

        let result: AppResult<Vec<Lead>> = async {
            let resp = self
                .with_key(request)
                .send()
                .await
                .map_err(|error| AppError::StorageUnavailable(format!("lead query failed: {}", error)))?;
            if !resp.status().is_success() {
                let status = resp.status();
                let text = resp.text().await.unwrap_or_default();
                return Err(AppError::StorageUnavailable(format!(
                    "lead query returned {}: {}",
                    status, text
                )));
            }
            let rows: Vec<Value> = resp
                .json()
                .await
                .map_err(|error| AppError::StorageUnavailable(format!("unreadable lead query response: {}", error)))?;
            rows.iter()
                .filter_map(|row| row.get("document"))
                .map(decode_document)
                .collect::<AppResult<Vec<_>>>()
        }
        .await;

        match &result {
            Ok(leads) => tracing::debug!(count = leads.len(), "listed remote leads"),
            Err(error) => tracing::warn!(error = %error, "failed to fetch remote leads"),
        }
        result
    }

    async fn create(&self, lead: NewLead) -> AppResult<Lead> {
        let created_at = self.next_created_at(Utc::now().timestamp_millis());
        let body = json!({ "fields": encode_fields(&lead, created_at) });
        let request = self.client.post(self.collection_url()).json(&body);

        let result: AppResult<Lead> = async {
            let resp = self
                .with_key(request)
                .send()
                .await
                .map_err(|error| AppError::StorageWriteFailed(format!("lead create failed: {}", error)))?;
            if !resp.status().is_success() {
                let status = resp.status();
                let text = resp.text().await.unwrap_or_default();
                return Err(AppError::StorageWriteFailed(format!(
                    "lead create returned {}: {}",
                    status, text
                )));
            }
            let document: Value = resp
                .json()
                .await
                .map_err(|error| AppError::StorageWriteFailed(format!("unreadable create response: {}", error)))?;
            let id = document
                .get("name")
                .and_then(Value::as_str)
                .and_then(document_id)
                .ok_or_else(|| AppError::StorageWriteFailed("create response has no document name".to_string()))?;
            Ok(lead.into_lead(id.to_string(), created_at))
        }
        .await;

        match &result {
            Ok(lead) => tracing::debug!(lead_id = %lead.id, "created remote lead"),
            Err(error) => tracing::warn!(error = %error, "failed to add remote lead"),
        }
        result
    }

    async fn update_status(&self, id: &str, status: LeadStatus) -> AppResult<()> {
        if !is_document_id(id) {
            tracing::debug!(lead_id = %id, "status update for unaddressable id ignored");
            return Ok(());
        }
        let url = self.document_url(id)?;
        let body = json!({ "fields": { "status": { "stringValue": status.as_str() } } });
        let request = self
            .client
            .patch(url)
            .query(&[
                ("updateMask.fieldPaths", "status"),
                ("currentDocument.exists", "true"),
            ])
            .json(&body);

        let result: AppResult<()> = async {
            let resp = self
                .with_key(request)
                .send()
                .await
                .map_err(|error| AppError::StorageWriteFailed(format!("status update failed: {}", error)))?;
            if resp.status() == reqwest::StatusCode::NOT_FOUND {
                tracing::debug!(lead_id = %id, "status update for unknown lead ignored");
                return Ok(());
            }
            if !resp.status().is_success() {
                let code = resp.status();
                let text = resp.text().await.unwrap_or_default();
                return Err(AppError::StorageWriteFailed(format!(
                    "status update returned {}: {}",
                    code, text
                )));
            }
            Ok(())
        }
        .await;

        if let Err(error) = &result {
            tracing::warn!(error = %error, lead_id = %id, "failed to update remote lead status");
        }
        result
    }

    async fn delete(&self, id: &str) -> AppResult<()> {
        if !is_document_id(id) {
            tracing::debug!(lead_id = %id, "delete for unaddressable id ignored");
            return Ok(());
        }
        let url = self.document_url(id)?;
        let request = self.client.delete(url);

        let result: AppResult<()> = async {
            let resp = self
                .with_key(request)
                .send()
                .await
                .map_err(|error| AppError::StorageWriteFailed(format!("lead delete failed: {}", error)))?;
            if !resp.status().is_success() && resp.status() != reqwest::StatusCode::NOT_FOUND {
                let code = resp.status();
                let text = resp.text().await.unwrap_or_default();
                return Err(AppError::StorageWriteFailed(format!(
                    "lead delete returned {}: {}",
                    code, text
                )));
            }
            Ok(())
        }
        .await;

        if let Err(error) = &result {
            tracing::warn!(error = %error, lead_id = %id, "failed to delete remote lead");
        }
        result
    }
}

fn is_document_id(id: &str) -> bool {
    !id.is_empty() && id != "." && id != ".." && !id.contains('/')
}

fn document_id(name: &str) -> Option<&str> {
    name.rsplit('/').next().filter(|id| !id.is_empty())
}

pub fn encode_fields(lead: &NewLead, created_at: i64) -> Value {
    let mut fields = Map::new();
    fields.insert("name".to_string(), json!({ "stringValue": lead.name }));
    fields.insert("email".to_string(), json!({ "stringValue": lead.email }));
    fields.insert("phone".to_string(), json!({ "stringValue": lead.phone }));
    if let Some(company) = &lead.company {
        fields.insert("company".to_string(), json!({ "stringValue": company }));
    }
    fields.insert("status".to_string(), json!({ "stringValue": lead.status.as_str() }));
    fields.insert(
        "createdAt".to_string(),
        json!({ "integerValue": created_at.to_string() }),
    );
    if let Some(value) = lead.value {
        fields.insert("value".to_string(), json!({ "doubleValue": value }));
    }
    Value::Object(fields)
}

pub fn decode_document(document: &Value) -> AppResult<Lead> {
    let id = document
        .get("name")
        .and_then(Value::as_str)
        .and_then(document_id)
        .ok_or_else(|| AppError::StorageUnavailable("lead document has no name".to_string()))?;
    let fields = document
        .get("fields")
        .and_then(Value::as_object)
        .ok_or_else(|| AppError::StorageUnavailable(format!("lead {} has no fields", id)))?;

    let required = |key: &str| {
        string_field(fields, key)
            .ok_or_else(|| AppError::StorageUnavailable(format!("lead {} is missing {}", id, key)))
    };

    let status_label = required("status")?;
    let status = LeadStatus::parse(&status_label).ok_or_else(|| {
        AppError::StorageUnavailable(format!("lead {} has unknown status {}", id, status_label))
    })?;
    let created_at = fields
        .get("createdAt")
        .and_then(integer_value)
        .ok_or_else(|| AppError::StorageUnavailable(format!("lead {} is missing createdAt", id)))?;

    Ok(Lead {
        id: id.to_string(),
        name: required("name")?,
        email: required("email")?,
        phone: required("phone")?,
        company: string_field(fields, "company"),
        status,
        created_at,
        value: fields.get("value").and_then(number_value),
    })
}

fn string_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    fields
        .get(key)
        .and_then(|value| value.get("stringValue"))
        .and_then(Value::as_str)
        .map(ToString::to_string)
}

fn integer_value(value: &Value) -> Option<i64> {
    if let Some(raw) = value.get("integerValue") {
        return match raw {
            Value::String(text) => text.parse().ok(),
            other => other.as_i64(),
        };
    }
    value.get("doubleValue").and_then(Value::as_f64).map(|number| number as i64)
}

fn number_value(value: &Value) -> Option<f64> {
    if let Some(number) = value.get("doubleValue").and_then(Value::as_f64) {
        return Some(number);
    }
    integer_value(value).map(|number| number as f64)
}
