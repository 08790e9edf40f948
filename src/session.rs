use crate::errors::{AppError, AppResult};
use crate::models::SessionInfo;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone, Default)]
pub struct SessionGate {
    current: Arc<RwLock<Option<SessionInfo>>>,
}

impl SessionGate {
    pub fn signed_out() -> Self {
        Self::default()
    }

    pub fn signed_in(email: &str) -> AppResult<Self> {
        Ok(Self {
            current: Arc::new(RwLock::new(Some(session_info(email)?))),
        })
    }

    pub async fn current(&self) -> Option<SessionInfo> {
        self.current.read().await.clone()
    }

    pub async fn is_active(&self) -> bool {
        self.current.read().await.is_some()
    }

    pub async fn require(&self) -> AppResult<SessionInfo> {
        self.current()
            .await
            .ok_or_else(|| AppError::Unauthenticated("no active session".to_string()))
    }

    pub async fn sign_in(&self, email: &str) -> AppResult<SessionInfo> {
        let info = session_info(email)?;
        *self.current.write().await = Some(info.clone());
        Ok(info)
    }

    pub async fn sign_out(&self) {
        self.current.write().await.take();
    }
}

fn session_info(email: &str) -> AppResult<SessionInfo> {
    let email = email.trim();
    if email.is_empty() {
        return Err(AppError::Validation("email is required to sign in".to_string()));
    }
    let display_name = email.split('@').next().unwrap_or(email).to_string();
    Ok(SessionInfo {
        email: email.to_string(),
        display_name,
    })
}
