//! Error types for the Gmail credential and search pipeline.
//!
//! Every failure surfaces to the immediate caller as a [`GmailError`]. The
//! [`GmailErrorCode`] tells apart "the user must re-consent", "transient
//! provider failure" and "local configuration defect".

use std::fmt;
use thiserror::Error;

/// The category of a Gmail core error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GmailErrorCode {
    /// Required configuration is missing or invalid. Fatal at startup.
    ConfigurationError,
    /// The token endpoint issued no refresh token during code exchange.
    RefreshTokenMissing,
    /// A stored refresh token blob could not be decrypted.
    DecryptionFailed,
    /// The provider rejected the refresh token or returned no access token.
    TokenRefreshFailed,
    /// Fetching metadata for a listed message failed mid-search.
    SearchFetchFailed,
    /// The provider rejected the credentials (401, rejected grant).
    AuthenticationFailed,
    /// The credentials lack permission for the resource (403).
    AuthorizationFailed,
    /// Connection failed, timed out, or the body could not be read.
    NetworkError,
    /// Too many requests (429).
    RateLimited,
    /// Provider-side failure (5xx).
    ServerError,
    /// The provider answered with something we could not decode.
    InvalidResponse,
    /// The requested resource does not exist (404).
    NotFound,
    /// The request was rejected as malformed (other 4xx).
    BadRequest,
    /// No credential is stored for the user.
    NotLinked,
    /// The credential store failed to read or write.
    StorageError,
    /// Unexpected internal state.
    InternalError,
}

impl GmailErrorCode {
    /// Returns true if this error is transient and the operation may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NetworkError | Self::RateLimited | Self::ServerError
        )
    }

    /// Returns true if the user has to go through the consent flow again.
    pub fn requires_relink(&self) -> bool {
        matches!(
            self,
            Self::RefreshTokenMissing | Self::TokenRefreshFailed | Self::NotLinked
        )
    }

    /// Returns who can act on this error.
    pub fn audience(&self) -> ErrorAudience {
        match self {
            Self::ConfigurationError | Self::StorageError | Self::InternalError => {
                ErrorAudience::Operator
            }
            _ => ErrorAudience::EndUser,
        }
    }

    /// Returns a stable machine-readable name for this error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfigurationError => "configuration_error",
            Self::RefreshTokenMissing => "refresh_token_missing",
            Self::DecryptionFailed => "decryption_failed",
            Self::TokenRefreshFailed => "token_refresh_failed",
            Self::SearchFetchFailed => "search_fetch_failed",
            Self::AuthenticationFailed => "authentication_failed",
            Self::AuthorizationFailed => "authorization_failed",
            Self::NetworkError => "network_error",
            Self::RateLimited => "rate_limited",
            Self::ServerError => "server_error",
            Self::InvalidResponse => "invalid_response",
            Self::NotFound => "not_found",
            Self::BadRequest => "bad_request",
            Self::NotLinked => "not_linked",
            Self::StorageError => "storage_error",
            Self::InternalError => "internal_error",
        }
    }
}

impl fmt::Display for GmailErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Who an error should be reported to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorAudience {
    /// Shown to the person using the app.
    EndUser,
    /// Logged for whoever runs the deployment; not shown to end users.
    Operator,
}

/// An error raised by the Gmail credential or search pipeline.
#[derive(Debug, Error)]
pub struct GmailError {
    code: GmailErrorCode,
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl GmailError {
    /// Creates a new error with the given code and message.
    pub fn new(code: GmailErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(GmailErrorCode::ConfigurationError, message)
    }

    /// Creates a missing-refresh-token error.
    pub fn refresh_token_missing(message: impl Into<String>) -> Self {
        Self::new(GmailErrorCode::RefreshTokenMissing, message)
    }

    /// Creates a decryption error.
    pub fn decryption(message: impl Into<String>) -> Self {
        Self::new(GmailErrorCode::DecryptionFailed, message)
    }

    /// Creates a token refresh error.
    pub fn token_refresh(message: impl Into<String>) -> Self {
        Self::new(GmailErrorCode::TokenRefreshFailed, message)
    }

    /// Creates a search fetch error wrapping the failure that aborted the search.
    pub fn search_fetch(message_id: &str, cause: GmailError) -> Self {
        Self::new(
            GmailErrorCode::SearchFetchFailed,
            format!("failed to fetch metadata for message {}: {}", message_id, cause),
        )
        .with_source(cause)
    }

    /// Creates an authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(GmailErrorCode::AuthenticationFailed, message)
    }

    /// Creates an authorization error.
    pub fn authorization(message: impl Into<String>) -> Self {
        Self::new(GmailErrorCode::AuthorizationFailed, message)
    }

    /// Creates a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(GmailErrorCode::NetworkError, message)
    }

    /// Creates a rate limit error.
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(GmailErrorCode::RateLimited, message)
    }

    /// Creates a server error.
    pub fn server(message: impl Into<String>) -> Self {
        Self::new(GmailErrorCode::ServerError, message)
    }

    /// Creates an invalid response error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(GmailErrorCode::InvalidResponse, message)
    }

    /// Creates a not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(GmailErrorCode::NotFound, message)
    }

    /// Creates a bad request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(GmailErrorCode::BadRequest, message)
    }

    /// Creates a not-linked error.
    pub fn not_linked(user_id: &str) -> Self {
        Self::new(
            GmailErrorCode::NotLinked,
            format!("no Gmail account linked for user {}", user_id),
        )
    }

    /// Creates a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(GmailErrorCode::StorageError, message)
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(GmailErrorCode::InternalError, message)
    }

    /// Sets the source error for this error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Returns the error code.
    pub fn code(&self) -> GmailErrorCode {
        self.code
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the wrapped cause when it is itself a [`GmailError`].
    pub fn cause(&self) -> Option<&GmailError> {
        self.source
            .as_ref()
            .and_then(|source| source.downcast_ref::<GmailError>())
    }

    /// Returns true if this error is transient and may be retried.
    ///
    /// A search fetch failure is retryable when the fetch that aborted it was.
    pub fn is_retryable(&self) -> bool {
        if self.code == GmailErrorCode::SearchFetchFailed {
            return self.cause().is_some_and(GmailError::is_retryable);
        }
        self.code.is_retryable()
    }

    /// Returns true if the user has to link their account again.
    pub fn requires_relink(&self) -> bool {
        self.code.requires_relink()
    }

    /// Returns who can act on this error.
    pub fn audience(&self) -> ErrorAudience {
        self.code.audience()
    }

    /// Returns the text a client app should show for this error.
    pub fn user_message(&self) -> &'static str {
        if self.requires_relink() {
            return "Please re-link your Gmail account.";
        }
        match self.audience() {
            ErrorAudience::Operator => "The service is misconfigured. Please contact support.",
            ErrorAudience::EndUser => "Search failed, please try again.",
        }
    }
}

impl fmt::Display for GmailError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// A specialized Result type for Gmail core operations.
pub type GmailResult<T> = Result<T, GmailError>;
