/// Provider prefix every valid key starts with. Checked locally before any
/// network call so obviously malformed keys never leave the client.
pub const KEY_PREFIX: &str = "AIza";

/// Name of the single persistent storage entry holding the credential.
pub const STORAGE_KEY: &str = "gemini_api_key";

/// The user-supplied chat credential and whether the proxy has accepted it.
///
/// The key is sent only to the chat-proxy endpoints and never logged in
/// full — use [`key_preview`] when a log line needs to identify it.
#[derive(Debug, Clone, Default)]
pub struct CredentialState {
    key: Option<String>,
    validated: bool,
}

impl CredentialState {
    /// A key restored from persistent storage. It passed validation when it
    /// was saved, so it is trusted without a fresh round-trip.
    pub fn restored(key: String) -> Self {
        Self {
            key: Some(key),
            validated: true,
        }
    }

    /// A key the proxy just accepted.
    pub fn validated(key: String) -> Self {
        Self {
            key: Some(key),
            validated: true,
        }
    }

    pub fn clear(&mut self) {
        self.key = None;
        self.validated = false;
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn is_validated(&self) -> bool {
        self.validated && self.key.is_some()
    }
}

/// Check a candidate key against the provider format without touching the
/// network.
pub fn check_format(key: &str) -> Result<(), crate::error::AssistantError> {
    let key = key.trim();
    if key.is_empty() || !key.starts_with(KEY_PREFIX) {
        return Err(crate::error::AssistantError::CredentialFormat);
    }
    Ok(())
}

/// First 8 characters after the provider prefix, for display and logging.
pub fn key_preview(key: &str) -> String {
    let tail: String = key
        .strip_prefix(KEY_PREFIX)
        .unwrap_or(key)
        .chars()
        .take(8)
        .collect();
    format!("{KEY_PREFIX}{tail}...")
}
