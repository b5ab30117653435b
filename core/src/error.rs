use thiserror::Error;

use crate::credential::KEY_PREFIX;

/// Errors the assistant surfaces to the embedding UI. None of these are
/// fatal — every variant leaves the state machine in an interactive phase.
#[derive(Debug, Error)]
pub enum AssistantError {
    /// The candidate key failed the local prefix check. No network call
    /// was made and nothing was persisted.
    #[error("invalid API key format: keys start with \"{KEY_PREFIX}\"")]
    CredentialFormat,
    /// The chat proxy rejected the key. Displays the upstream message
    /// verbatim — the UI shows exactly what the provider said.
    #[error("{reason}")]
    CredentialRejected { reason: String },
    /// The explanation request failed or returned a malformed envelope.
    #[error("explanation request failed: {0}")]
    Explanation(ChatGatewayError),
    /// A chat exchange failed or returned a malformed envelope.
    #[error("chat exchange failed: {0}")]
    Exchange(ChatGatewayError),
    /// A chat action was attempted with no active prediction. Prevented at
    /// the controller boundary; never reaches the remote.
    #[error("no active prediction to discuss")]
    MissingContext,
}

/// Failure modes of the chat-proxy boundary. `Upstream` carries the error
/// text from a `{success: false, error}` envelope; `Transport` covers
/// network failures and non-JSON responses.
#[derive(Debug, Clone, Error)]
pub enum ChatGatewayError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("{0}")]
    Upstream(String),
}
