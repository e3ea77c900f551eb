//! Client error types.

use mihari_gmail::{ErrorAudience, GmailError};
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Error from the Gmail core.
    #[error(transparent)]
    Gmail(#[from] GmailError),

    /// Local vault error (key material, token file).
    #[error("vault error: {0}")]
    Vault(String),

    /// The browser authorization step failed.
    #[error("authorization failed: {0}")]
    Authorization(String),

    /// Output could not be encoded.
    #[error("failed to encode output: {0}")]
    Output(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Returns the line printed to the terminal for this error.
    ///
    /// Core errors that the user can act on get the short user-facing text
    /// with the technical detail appended; everything else prints as-is.
    pub fn report(&self) -> String {
        match self {
            Self::Gmail(err) if err.requires_relink() => format!(
                "{} Run `mihari link --force`. ({})",
                err.user_message(),
                err
            ),
            Self::Gmail(err) if err.audience() == ErrorAudience::Operator => {
                format!("{} ({})", err.user_message(), err)
            }
            other => other.to_string(),
        }
    }
}
