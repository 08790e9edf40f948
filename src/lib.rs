pub mod credentials;
pub mod db;
pub mod desk;
pub mod errors;
pub mod insights;
pub mod models;
pub mod session;
pub mod store;

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;

static LOG_GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();

pub fn init_tracing(app_data_dir: &Path) -> Result<(), String> {
    let log_dir = app_data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).map_err(|error| error.to_string())?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "leads.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .json()
        .with_writer(non_blocking)
        .try_init()
        .map_err(|error| error.to_string())
}

#[cfg(feature = "desktop")]
mod commands {
    use crate::desk::DeskCore;
    use crate::models::{
        AppSettings, BooleanResponse, DashboardView, Lead, LeadStatus, NewLead, SessionInfo,
    };
    use std::sync::Arc;

    #[derive(Clone)]
    pub struct AppState {
        pub desk: Arc<DeskCore>,
    }

    #[tauri::command]
    pub async fn leads_list(state: tauri::State<'_, AppState>) -> Result<Vec<Lead>, String> {
        Ok(state.desk.leads().await)
    }

    #[tauri::command]
    pub async fn leads_refresh(state: tauri::State<'_, AppState>) -> Result<Vec<Lead>, String> {
        state.desk.refresh().await.map_err(to_client_error)
    }

    #[tauri::command]
    pub async fn leads_search(state: tauri::State<'_, AppState>, term: String) -> Result<Vec<Lead>, String> {
        Ok(state.desk.search(&term).await)
    }

    #[tauri::command]
    pub async fn lead_create(state: tauri::State<'_, AppState>, payload: NewLead) -> Result<Lead, String> {
        state.desk.create_lead(payload).await.map_err(to_client_error)
    }

    #[tauri::command]
    pub async fn lead_update_status(
        state: tauri::State<'_, AppState>,
        id: String,
        status: LeadStatus,
    ) -> Result<(), String> {
        state.desk.update_status(&id, status).await.map_err(to_client_error)
    }

    #[tauri::command]
    pub async fn lead_delete(state: tauri::State<'_, AppState>, id: String) -> Result<(), String> {
        state.desk.delete_lead(&id).await.map_err(to_client_error)
    }

    #[tauri::command]
    pub async fn dashboard_get(state: tauri::State<'_, AppState>) -> Result<DashboardView, String> {
        Ok(state.desk.dashboard(chrono::Utc::now().timestamp_millis()).await)
    }

    #[tauri::command]
    pub async fn session_get(state: tauri::State<'_, AppState>) -> Result<Option<SessionInfo>, String> {
        Ok(state.desk.session().await)
    }

    #[tauri::command]
    pub async fn session_sign_in(state: tauri::State<'_, AppState>, email: String) -> Result<SessionInfo, String> {
        state.desk.sign_in(&email).await.map_err(to_client_error)
    }

    #[tauri::command]
    pub async fn session_sign_out(state: tauri::State<'_, AppState>) -> Result<(), String> {
        state.desk.sign_out().await;
        Ok(())
    }

    #[tauri::command]
    pub fn settings_get(state: tauri::State<'_, AppState>) -> Result<AppSettings, String> {
        state.desk.settings().map_err(to_client_error)
    }

    #[tauri::command]
    pub fn settings_update(
        state: tauri::State<'_, AppState>,
        update: serde_json::Value,
    ) -> Result<AppSettings, String> {
        state.desk.update_settings(update).map_err(to_client_error)
    }

    #[tauri::command]
    pub async fn remote_token_save(
        state: tauri::State<'_, AppState>,
        token: String,
    ) -> Result<BooleanResponse, String> {
        state.desk.save_remote_token(token).await.map_err(to_client_error)
    }

    #[tauri::command]
    pub async fn remote_token_clear(state: tauri::State<'_, AppState>) -> Result<BooleanResponse, String> {
        state.desk.clear_remote_token().await.map_err(to_client_error)
    }

    #[tauri::command]
    pub async fn remote_token_has(state: tauri::State<'_, AppState>) -> Result<BooleanResponse, String> {
        state.desk.has_remote_token().await.map_err(to_client_error)
    }

    #[tauri::command]
    pub async fn demo_data_reset(state: tauri::State<'_, AppState>) -> Result<Vec<Lead>, String> {
        state.desk.reset_demo_data().await.map_err(to_client_error)
    }

    fn to_client_error(error: impl std::fmt::Display) -> String {
        error.to_string()
    }
}

#[cfg(feature = "desktop")]
pub fn run() {
    use commands::*;
    use tauri::Manager;

    tauri::Builder::default()
        .setup(|app| {
            let app_data_dir = app.path().app_data_dir().map_err(|error| error.to_string())?;
            std::fs::create_dir_all(&app_data_dir).map_err(|error| error.to_string())?;
            init_tracing(&app_data_dir).map_err(|error| error.to_string())?;

            let desk = desk::DeskCore::new(app_data_dir).map_err(|error| error.to_string())?;

            tauri::async_runtime::spawn({
                let desk = desk.clone();
                async move {
                    if let Err(error) = desk.refresh().await {
                        tracing::warn!(error = %error, "initial lead load failed");
                    }
                }
            });

            app.manage(AppState { desk });
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            leads_list,
            leads_refresh,
            leads_search,
            lead_create,
            lead_update_status,
            lead_delete,
            dashboard_get,
            session_get,
            session_sign_in,
            session_sign_out,
            settings_get,
            settings_update,
            remote_token_save,
            remote_token_clear,
            remote_token_has,
            demo_data_reset
        ])
        .run(tauri::generate_context!())
        .expect("failed to run tauri app");
}
