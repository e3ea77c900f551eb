//! Credential lifecycle: authorization-code exchange and access-token renewal.
//!
//! [`TokenExchanger`] runs once per linking event and yields the refresh token
//! that the caller persists (encrypted). [`TokenRefresher`] runs on every
//! request that needs mailbox access and turns the stored blob back into a
//! short-lived access token. Neither keeps any state between calls.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::error::{GmailError, GmailErrorCode, GmailResult};
use crate::oauth::{TokenEndpoint, TokenGrant};
use crate::vault::{EncryptedToken, TokenCipher};

/// Lifetime assumed for an access token when the provider omits `expires_in`.
pub const DEFAULT_ACCESS_TOKEN_LIFETIME_SECS: i64 = 3600;

/// Tokens issued by an authorization-code exchange.
///
/// `refresh_token` is never empty. Only the refresh token is meant to be
/// persisted; the access token and expiry are for immediate use.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenBundle {
    /// Long-lived refresh token.
    pub refresh_token: String,
    /// Short-lived access token. Empty if the provider did not send one.
    pub access_token: String,
    /// Expiry of `access_token`.
    pub expires_at: DateTime<Utc>,
}

impl TokenBundle {
    /// Returns the access token as an [`AccessToken`], or `None` if the
    /// exchange did not yield one.
    pub fn access(&self) -> Option<AccessToken> {
        if self.access_token.is_empty() {
            return None;
        }
        Some(AccessToken::new(self.access_token.clone(), Some(self.expires_at)))
    }
}

impl fmt::Debug for TokenBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenBundle")
            .field("refresh_token", &"[redacted]")
            .field("has_access_token", &!self.access_token.is_empty())
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// A short-lived bearer credential for the Gmail API.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    secret: String,
    expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    /// Creates an access token with an optional expiry.
    pub fn new(secret: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            secret: secret.into(),
            expires_at,
        }
    }

    /// Returns the bearer value.
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Returns the expiry, if the provider reported one.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Returns true if the token expires within `margin` from now.
    ///
    /// A token without a known expiry never reports as expiring.
    pub fn expires_within(&self, margin: Duration) -> bool {
        self.expires_at
            .is_some_and(|expires_at| expires_at <= Utc::now() + margin)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("secret", &"[redacted]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Expiry for a token issued now with the given `expires_in`.
///
/// Non-positive or out-of-range values fall back to the default lifetime.
fn expiry_from(expires_in: Option<i64>) -> DateTime<Utc> {
    let now = Utc::now();
    let default = now + Duration::seconds(DEFAULT_ACCESS_TOKEN_LIFETIME_SECS);
    let Some(secs) = expires_in else {
        return default;
    };

    let expires_at = Some(secs)
        .filter(|secs| *secs > 0)
        .and_then(Duration::try_seconds)
        .and_then(|lifetime| now.checked_add_signed(lifetime));
    expires_at.unwrap_or_else(|| {
        warn!(expires_in = secs, "ignoring unusable expires_in, assuming default lifetime");
        default
    })
}

/// Exchanges one-time authorization codes for tokens.
#[derive(Clone)]
pub struct TokenExchanger {
    endpoint: Arc<dyn TokenEndpoint>,
}

impl fmt::Debug for TokenExchanger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenExchanger").finish_non_exhaustive()
    }
}

impl TokenExchanger {
    /// Creates an exchanger that posts grants to `endpoint`.
    pub fn new(endpoint: Arc<dyn TokenEndpoint>) -> Self {
        Self { endpoint }
    }

    /// Exchanges an authorization code obtained without PKCE.
    pub async fn exchange(&self, auth_code: &str, redirect_uri: &str) -> GmailResult<TokenBundle> {
        self.exchange_grant(auth_code, redirect_uri, None).await
    }

    /// Exchanges an authorization code obtained with a PKCE challenge.
    pub async fn exchange_with_verifier(
        &self,
        auth_code: &str,
        redirect_uri: &str,
        code_verifier: &str,
    ) -> GmailResult<TokenBundle> {
        self.exchange_grant(auth_code, redirect_uri, Some(code_verifier.to_string()))
            .await
    }

    async fn exchange_grant(
        &self,
        auth_code: &str,
        redirect_uri: &str,
        code_verifier: Option<String>,
    ) -> GmailResult<TokenBundle> {
        debug!(redirect_uri, pkce = code_verifier.is_some(), "exchanging authorization code");

        let response = self
            .endpoint
            .request_token(TokenGrant::AuthorizationCode {
                code: auth_code.to_string(),
                redirect_uri: redirect_uri.to_string(),
                code_verifier,
            })
            .await?;

        let refresh_token = response
            .refresh_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                warn!("token endpoint returned no refresh token");
                GmailError::refresh_token_missing(
                    "no refresh token returned; consent must be granted with offline access",
                )
            })?;

        if response.expires_in.is_none() {
            debug!(
                default_secs = DEFAULT_ACCESS_TOKEN_LIFETIME_SECS,
                "no expires_in in exchange response, assuming default lifetime"
            );
        }

        let bundle = TokenBundle {
            refresh_token,
            access_token: response.access_token.unwrap_or_default(),
            expires_at: expiry_from(response.expires_in),
        };
        info!(expires_at = %bundle.expires_at, "authorization code exchanged");
        Ok(bundle)
    }
}

/// Turns stored encrypted refresh tokens into fresh access tokens.
#[derive(Clone)]
pub struct TokenRefresher {
    cipher: Arc<dyn TokenCipher>,
    endpoint: Arc<dyn TokenEndpoint>,
}

impl fmt::Debug for TokenRefresher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRefresher").finish_non_exhaustive()
    }
}

impl TokenRefresher {
    /// Creates a refresher that decrypts with `cipher` and renews at `endpoint`.
    pub fn new(cipher: Arc<dyn TokenCipher>, endpoint: Arc<dyn TokenEndpoint>) -> Self {
        Self { cipher, endpoint }
    }

    /// Decrypts `blob` and presents the refresh token to the token endpoint.
    ///
    /// A decryption failure is reported before any network call. A rejected
    /// refresh token, or a response without an access token, is a
    /// [`GmailErrorCode::TokenRefreshFailed`] error. Transport failures keep
    /// their own codes.
    pub async fn get_access_token(&self, blob: &EncryptedToken) -> GmailResult<AccessToken> {
        let refresh_token = self.cipher.decrypt(blob).map_err(|e| {
            warn!(error = %e, "failed to decrypt refresh token");
            GmailError::decryption("stored refresh token could not be decrypted").with_source(e)
        })?;

        let response = self
            .endpoint
            .request_token(TokenGrant::RefreshToken { refresh_token })
            .await
            .map_err(|e| {
                if e.code() == GmailErrorCode::AuthenticationFailed {
                    warn!(error = %e, "refresh token rejected");
                    GmailError::token_refresh("refresh token was rejected by the provider")
                        .with_source(e)
                } else {
                    e
                }
            })?;

        let secret = response
            .access_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| GmailError::token_refresh("refresh response carried no access token"))?;

        let expires_at = expiry_from(response.expires_in);
        debug!(%expires_at, "access token refreshed");
        Ok(AccessToken::new(secret, Some(expires_at)))
    }
}
