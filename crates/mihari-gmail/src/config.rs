//! OAuth client configuration.
//!
//! [`OAuthClientConfig`] is built once per process and passed explicitly to
//! every component that talks to Google. Construction fails fast when the
//! client identifier is missing: there is no usable default.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::error::{GmailError, GmailResult};

/// Google's OAuth 2.0 authorization endpoint.
pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// Google's OAuth 2.0 token endpoint.
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Environment variable holding the OAuth client identifier.
pub const CLIENT_ID_ENV: &str = "GOOGLE_CLIENT_ID";

/// Environment variable holding the (optional) OAuth client secret.
pub const CLIENT_SECRET_ENV: &str = "GOOGLE_CLIENT_SECRET";

/// Structure of Google's OAuth credentials JSON file.
///
/// Supports the Google Cloud Console format with an "installed" or "web"
/// section, and a flat format with the fields at root level.
#[derive(Debug, Deserialize)]
struct GoogleCredentialsFile {
    installed: Option<NestedCredentials>,
    web: Option<NestedCredentials>,
    client_id: Option<String>,
    client_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NestedCredentials {
    client_id: String,
    #[serde(default)]
    client_secret: Option<String>,
}

/// Immutable OAuth client configuration.
#[derive(Debug, Clone)]
pub struct OAuthClientConfig {
    client_id: String,
    client_secret: Option<String>,
    auth_url: Url,
    token_url: Url,
    scopes: Vec<String>,
    timeout: Duration,
    user_agent: String,
}

impl OAuthClientConfig {
    /// Default timeout for each HTTP round trip, in seconds.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// Read-only Gmail access.
    pub const GMAIL_READONLY_SCOPE: &'static str =
        "https://www.googleapis.com/auth/gmail.readonly";

    /// Creates a configuration for the given client identifier.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `client_id` is empty or blank.
    pub fn new(client_id: impl Into<String>) -> GmailResult<Self> {
        let client_id = client_id.into().trim().to_string();
        if client_id.is_empty() {
            return Err(GmailError::configuration("OAuth client_id is required"));
        }

        Ok(Self {
            client_id,
            client_secret: None,
            auth_url: parse_endpoint(GOOGLE_AUTH_URL)?,
            token_url: parse_endpoint(GOOGLE_TOKEN_URL)?,
            scopes: vec![Self::GMAIL_READONLY_SCOPE.to_string()],
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            user_agent: format!("mihari/{}", env!("CARGO_PKG_VERSION")),
        })
    }

    /// Builds the configuration from `GOOGLE_CLIENT_ID` and the optional
    /// `GOOGLE_CLIENT_SECRET`.
    pub fn from_env() -> GmailResult<Self> {
        let client_id = std::env::var(CLIENT_ID_ENV)
            .map_err(|_| GmailError::configuration(format!("{} is not set", CLIENT_ID_ENV)))?;
        let config = Self::new(client_id)?;

        match std::env::var(CLIENT_SECRET_ENV) {
            Ok(secret) if !secret.is_empty() => Ok(config.with_client_secret(secret)),
            _ => Ok(config),
        }
    }

    /// Loads the configuration from a Google Cloud Console JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> GmailResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            GmailError::configuration(format!(
                "failed to read credentials file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&content)
    }

    /// Parses a Google credentials JSON document.
    ///
    /// Accepts `{"installed": {...}}`, `{"web": {...}}` and the flat
    /// `{"client_id": ..., "client_secret": ...}` layout.
    pub fn from_json(json: &str) -> GmailResult<Self> {
        let file: GoogleCredentialsFile = serde_json::from_str(json).map_err(|e| {
            GmailError::configuration(format!("failed to parse credentials JSON: {}", e))
        })?;

        let (client_id, client_secret) = match file.installed.or(file.web) {
            Some(nested) => (nested.client_id, nested.client_secret),
            None => match file.client_id {
                Some(id) => (id, file.client_secret),
                None => {
                    return Err(GmailError::configuration(
                        "credentials file must contain an 'installed'/'web' section or a root-level 'client_id'",
                    ));
                }
            },
        };

        let config = Self::new(client_id)?;
        Ok(match client_secret {
            Some(secret) if !secret.is_empty() => config.with_client_secret(secret),
            _ => config,
        })
    }

    /// Sets the client secret (confidential clients only).
    #[must_use]
    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    /// Overrides the authorization and token endpoints.
    pub fn with_endpoints(mut self, auth_url: &str, token_url: &str) -> GmailResult<Self> {
        self.auth_url = parse_endpoint(auth_url)?;
        self.token_url = parse_endpoint(token_url)?;
        Ok(self)
    }

    /// Sets the OAuth scopes.
    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the user agent string.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Returns the OAuth client identifier.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Returns the client secret, if one is configured.
    pub fn client_secret(&self) -> Option<&str> {
        self.client_secret.as_deref()
    }

    /// Returns the authorization endpoint.
    pub fn auth_url(&self) -> &Url {
        &self.auth_url
    }

    /// Returns the token endpoint.
    pub fn token_url(&self) -> &Url {
        &self.token_url
    }

    /// Returns the requested scopes.
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// Returns the per-request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the user agent string.
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Validates the configuration.
    pub fn validate(&self) -> GmailResult<()> {
        if self.client_id.is_empty() {
            return Err(GmailError::configuration("OAuth client_id is required"));
        }
        if self.scopes.is_empty() {
            return Err(GmailError::configuration(
                "at least one OAuth scope is required",
            ));
        }
        if self.timeout.is_zero() {
            return Err(GmailError::configuration("timeout must be non-zero"));
        }
        Ok(())
    }

    /// Builds the shared HTTP client used for token and Gmail requests.
    pub fn http_client(&self) -> GmailResult<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(self.user_agent.clone())
            .build()
            .map_err(|e| {
                GmailError::configuration(format!("failed to create HTTP client: {}", e))
                    .with_source(e)
            })
    }
}

fn parse_endpoint(raw: &str) -> GmailResult<Url> {
    let url = Url::parse(raw)
        .map_err(|e| GmailError::configuration(format!("invalid endpoint URL {}: {}", raw, e)))?;
    match url.scheme() {
        "https" | "http" => Ok(url),
        other => Err(GmailError::configuration(format!(
            "unsupported endpoint scheme {} in {}",
            other, raw
        ))),
    }
}
