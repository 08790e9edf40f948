use crate::errors::{AppError, AppResult};

pub const REMOTE_API_KEY_ENV: &str = "NEXUS_LEADS_REMOTE_API_KEY";
const KEYRING_SERVICE: &str = "nexus-leads";
const KEYRING_ACCOUNT: &str = "remote-api-key";

fn entry() -> AppResult<keyring::Entry> {
    keyring::Entry::new(KEYRING_SERVICE, KEYRING_ACCOUNT).map_err(|error| AppError::Io(error.to_string()))
}

pub fn save_remote_api_key(key: &str) -> AppResult<()> {
    if key.trim().is_empty() {
        return Err(AppError::Validation("API key cannot be empty".to_string()));
    }
    entry()?
        .set_password(key.trim())
        .map_err(|error| AppError::Io(error.to_string()))
}

pub fn clear_remote_api_key() -> AppResult<()> {
    match entry()?.delete_credential() {
        Ok(_) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(error) => Err(AppError::Io(error.to_string())),
    }
}

pub fn has_remote_api_key() -> AppResult<bool> {
    match entry()?.get_password() {
        Ok(value) => Ok(!value.is_empty()),
        Err(keyring::Error::NoEntry) => Ok(false),
        Err(error) => Err(AppError::Io(error.to_string())),
    }
}

pub fn load_remote_api_key() -> Option<String> {
    if let Some(key) = std::env::var(REMOTE_API_KEY_ENV).ok().filter(|key| !key.is_empty()) {
        return Some(key);
    }
    match entry().and_then(|entry| entry.get_password().map_err(|error| AppError::Io(error.to_string()))) {
        Ok(key) if !key.is_empty() => Some(key),
        Ok(_) => None,
        Err(error) => {
            tracing::debug!(error = %error, "no remote API key in keychain");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_key_is_rejected_before_touching_keychain() {
        assert!(matches!(save_remote_api_key("   "), Err(AppError::Validation(_))));
    }
}
