//! OAuth 2.0 protocol plumbing for Google.
//!
//! - [`PkceFlow`] builds the consent URL for the Authorization Code flow with
//!   PKCE (RFC 7636), always asking for offline access and an explicit consent
//!   prompt so that Google issues a refresh token.
//! - [`TokenEndpoint`] is the seam between the token lifecycle and the
//!   network; [`GoogleTokenEndpoint`] posts form-encoded grants to Google.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng as _;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::config::OAuthClientConfig;
use crate::error::{GmailError, GmailResult};
use crate::mailbox::BoxFuture;

/// The PKCE code verifier length (in bytes, before base64 encoding).
const CODE_VERIFIER_LENGTH: usize = 32;

/// PKCE flow state and utilities.
#[derive(Debug)]
pub struct PkceFlow {
    /// The code verifier (high-entropy random string).
    pub verifier: String,
    /// The code challenge (SHA-256 hash of verifier, base64url encoded).
    pub challenge: String,
    /// Random state for CSRF protection.
    pub state: String,
}

impl PkceFlow {
    /// Creates a new PKCE flow with random verifier and state.
    pub fn new() -> Self {
        let verifier = Self::generate_verifier();
        let challenge = Self::compute_challenge(&verifier);
        let state = Self::generate_state();

        Self {
            verifier,
            challenge,
            state,
        }
    }

    fn generate_verifier() -> String {
        let mut rng = rand::rng();
        let bytes: Vec<u8> = (0..CODE_VERIFIER_LENGTH).map(|_| rng.random()).collect();
        URL_SAFE_NO_PAD.encode(&bytes)
    }

    /// Computes the S256 challenge for a code verifier.
    pub fn compute_challenge(verifier: &str) -> String {
        let digest = Sha256::digest(verifier.as_bytes());
        URL_SAFE_NO_PAD.encode(digest)
    }

    fn generate_state() -> String {
        let mut rng = rand::rng();
        let bytes: Vec<u8> = (0..16).map(|_| rng.random()).collect();
        URL_SAFE_NO_PAD.encode(&bytes)
    }

    /// Builds the authorization URL the user is sent to.
    ///
    /// `access_type=offline` and `prompt=consent` are always set: without
    /// them Google omits the refresh token on repeat consent.
    pub fn build_auth_url(&self, config: &OAuthClientConfig, redirect_uri: &str) -> String {
        let mut url = config.auth_url().clone();
        url.query_pairs_mut()
            .append_pair("client_id", config.client_id())
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", &config.scopes().join(" "))
            .append_pair("code_challenge", &self.challenge)
            .append_pair("code_challenge_method", "S256")
            .append_pair("state", &self.state)
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent");
        url.into()
    }
}

impl Default for PkceFlow {
    fn default() -> Self {
        Self::new()
    }
}

/// A grant presented to the token endpoint.
#[derive(Clone, PartialEq, Eq)]
pub enum TokenGrant {
    /// Exchange a one-time authorization code.
    AuthorizationCode {
        /// The code returned on the redirect.
        code: String,
        /// Must match the redirect URI of the authorization request.
        redirect_uri: String,
        /// PKCE verifier, when the authorization request carried a challenge.
        code_verifier: Option<String>,
    },
    /// Mint a new access token from a refresh token.
    RefreshToken {
        /// Plaintext refresh token.
        refresh_token: String,
    },
}

impl TokenGrant {
    /// Returns the `grant_type` form value.
    pub fn grant_type(&self) -> &'static str {
        match self {
            Self::AuthorizationCode { .. } => "authorization_code",
            Self::RefreshToken { .. } => "refresh_token",
        }
    }

    /// Builds the form body for this grant.
    pub fn form_params(&self, config: &OAuthClientConfig) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("grant_type", self.grant_type().to_string()),
            ("client_id", config.client_id().to_string()),
        ];
        if let Some(secret) = config.client_secret() {
            params.push(("client_secret", secret.to_string()));
        }

        match self {
            Self::AuthorizationCode {
                code,
                redirect_uri,
                code_verifier,
            } => {
                params.push(("code", code.clone()));
                params.push(("redirect_uri", redirect_uri.clone()));
                if let Some(verifier) = code_verifier {
                    params.push(("code_verifier", verifier.clone()));
                }
            }
            Self::RefreshToken { refresh_token } => {
                params.push(("refresh_token", refresh_token.clone()));
            }
        }
        params
    }
}

impl std::fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AuthorizationCode { redirect_uri, code_verifier, .. } => f
                .debug_struct("AuthorizationCode")
                .field("redirect_uri", redirect_uri)
                .field("pkce", &code_verifier.is_some())
                .finish_non_exhaustive(),
            Self::RefreshToken { .. } => f.debug_struct("RefreshToken").finish_non_exhaustive(),
        }
    }
}

/// Successful response from the token endpoint.
///
/// Every field is optional on the wire; the token lifecycle decides which
/// omissions are fatal.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenResponse {
    /// Short-lived access token.
    #[serde(default)]
    pub access_token: Option<String>,
    /// Long-lived refresh token (only on code exchange with offline access).
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Access token lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// Token type, normally `Bearer`.
    #[serde(default)]
    pub token_type: Option<String>,
    /// Space-separated granted scopes.
    #[serde(default)]
    pub scope: Option<String>,
}

/// Error body returned by the token endpoint.
#[derive(Debug, Deserialize)]
struct TokenErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// OAuth error codes that point at the client credentials rather than the
/// user's grant.
const CLIENT_CREDENTIAL_ERRORS: &[&str] = &["invalid_client", "unauthorized_client"];

/// Returns true if a token endpoint error body blames the OAuth client.
pub(crate) fn is_client_credential_error(body: &str) -> bool {
    serde_json::from_str::<TokenErrorBody>(body)
        .is_ok_and(|parsed| CLIENT_CREDENTIAL_ERRORS.contains(&parsed.error.as_str()))
}

/// Formats a token endpoint error body, falling back to the raw text.
pub(crate) fn describe_token_error(body: &str) -> String {
    match serde_json::from_str::<TokenErrorBody>(body) {
        Ok(parsed) => match parsed.error_description {
            Some(description) => format!("{}: {}", parsed.error, description),
            None => parsed.error,
        },
        Err(_) => body.trim().to_string(),
    }
}

/// Posts grants to an OAuth token endpoint.
///
/// Implementations return [`GmailError::authentication`] when the endpoint
/// rejects the grant and [`GmailError::configuration`] when it rejects the
/// client itself; network and decoding failures keep their own codes.
pub trait TokenEndpoint: Send + Sync {
    /// Presents a grant and returns the decoded token response.
    fn request_token(&self, grant: TokenGrant) -> BoxFuture<'_, GmailResult<TokenResponse>>;
}

/// [`TokenEndpoint`] backed by Google's token URL.
#[derive(Debug, Clone)]
pub struct GoogleTokenEndpoint {
    config: OAuthClientConfig,
    http_client: reqwest::Client,
}

impl GoogleTokenEndpoint {
    /// Creates an endpoint client for the given configuration.
    pub fn new(config: OAuthClientConfig) -> GmailResult<Self> {
        config.validate()?;
        let http_client = config.http_client()?;
        Ok(Self {
            config,
            http_client,
        })
    }

    /// Creates an endpoint client that shares an existing HTTP client.
    pub fn with_http_client(config: OAuthClientConfig, http_client: reqwest::Client) -> Self {
        Self {
            config,
            http_client,
        }
    }

    async fn post_grant(&self, grant: TokenGrant) -> GmailResult<TokenResponse> {
        let params = grant.form_params(&self.config);
        debug!(grant = grant.grant_type(), "posting token grant");

        let response = self
            .http_client
            .post(self.config.token_url().clone())
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GmailError::network("token request timeout")
                } else {
                    GmailError::network(format!("token request failed: {}", e))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GmailError::network(format!("failed to read response: {}", e)))?;

        if status.is_server_error() {
            return Err(GmailError::server(format!(
                "token endpoint error ({}): {}",
                status,
                describe_token_error(&body)
            )));
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(GmailError::rate_limited("token endpoint rate limit exceeded"));
        }

        if !status.is_success() {
            let reason = describe_token_error(&body);
            if is_client_credential_error(&body) {
                warn!(%status, "token endpoint rejected the OAuth client");
                return Err(GmailError::configuration(format!(
                    "OAuth client rejected by token endpoint ({}): {}",
                    status, reason
                )));
            }
            warn!(%status, grant = grant.grant_type(), "token endpoint rejected grant");
            return Err(GmailError::authentication(format!(
                "token endpoint rejected {} grant ({}): {}",
                grant.grant_type(),
                status,
                reason
            )));
        }

        serde_json::from_str(&body)
            .map_err(|e| GmailError::invalid_response(format!("invalid token response: {}", e)))
    }
}

impl TokenEndpoint for GoogleTokenEndpoint {
    fn request_token(&self, grant: TokenGrant) -> BoxFuture<'_, GmailResult<TokenResponse>> {
        Box::pin(self.post_grant(grant))
    }
}
