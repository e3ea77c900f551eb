//! Per-user facade over the credential lifecycle and search.
//!
//! [`GmailService`] owns the pieces a request handler needs: the vault
//! interfaces, the exchanger/refresher pair, a searcher, and a short-lived
//! access-token cache keyed by user id. The cache is the only state shared
//! across requests.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::Duration;
use mihari_core::{MessageSummary, SearchQuery};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::client::GmailClient;
use crate::config::OAuthClientConfig;
use crate::error::{GmailError, GmailErrorCode, GmailResult};
use crate::mailbox::MailboxApi;
use crate::oauth::{GoogleTokenEndpoint, TokenEndpoint};
use crate::search::{FetchFailurePolicy, MessageSearcher};
use crate::tokens::{AccessToken, TokenBundle, TokenExchanger, TokenRefresher};
use crate::vault::{BlobStore, TokenCipher};

/// Cached access tokens are renewed this long before they expire.
pub const CACHE_SAFETY_MARGIN_SECS: i64 = 60;

/// Links Gmail accounts and searches them on behalf of users.
pub struct GmailService {
    cipher: Arc<dyn TokenCipher>,
    store: Arc<dyn BlobStore>,
    exchanger: TokenExchanger,
    refresher: TokenRefresher,
    searcher: MessageSearcher,
    cache: RwLock<HashMap<String, AccessToken>>,
}

impl fmt::Debug for GmailService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GmailService")
            .field("searcher", &self.searcher)
            .finish_non_exhaustive()
    }
}

impl GmailService {
    /// Assembles a service from its collaborators.
    pub fn new(
        cipher: Arc<dyn TokenCipher>,
        store: Arc<dyn BlobStore>,
        endpoint: Arc<dyn TokenEndpoint>,
        mailbox: Arc<dyn MailboxApi>,
    ) -> Self {
        Self {
            exchanger: TokenExchanger::new(endpoint.clone()),
            refresher: TokenRefresher::new(cipher.clone(), endpoint),
            searcher: MessageSearcher::new(mailbox),
            cipher,
            store,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Builds a service talking to Google, sharing one HTTP client between
    /// the token endpoint and the Gmail API.
    pub fn from_config(
        config: OAuthClientConfig,
        cipher: Arc<dyn TokenCipher>,
        store: Arc<dyn BlobStore>,
    ) -> GmailResult<Self> {
        config.validate()?;
        let http_client = config.http_client()?;
        let mailbox = GmailClient::with_http_client(http_client.clone());
        let endpoint = GoogleTokenEndpoint::with_http_client(config, http_client);
        Ok(Self::new(cipher, store, Arc::new(endpoint), Arc::new(mailbox)))
    }

    /// Sets the metadata fetch concurrency of searches.
    #[must_use]
    pub fn with_concurrency(mut self, limit: usize) -> Self {
        self.searcher = self.searcher.with_concurrency(limit);
        self
    }

    /// Sets how searches react to a failed metadata fetch.
    #[must_use]
    pub fn with_failure_policy(mut self, policy: FetchFailurePolicy) -> Self {
        self.searcher = self.searcher.with_failure_policy(policy);
        self
    }

    /// Completes account linking for `user_id`.
    ///
    /// The refresh token is encrypted and stored, replacing any previous
    /// link; the access token from the exchange seeds the cache.
    pub async fn link_account(
        &self,
        user_id: &str,
        auth_code: &str,
        redirect_uri: &str,
        code_verifier: Option<&str>,
    ) -> GmailResult<TokenBundle> {
        let bundle = match code_verifier {
            Some(verifier) => {
                self.exchanger
                    .exchange_with_verifier(auth_code, redirect_uri, verifier)
                    .await?
            }
            None => self.exchanger.exchange(auth_code, redirect_uri).await?,
        };

        let blob = self.cipher.encrypt(&bundle.refresh_token)?;
        self.store.put(user_id, blob)?;

        let mut cache = self.cache.write().await;
        match bundle.access() {
            Some(token) => {
                cache.insert(user_id.to_string(), token);
            }
            None => {
                cache.remove(user_id);
            }
        }
        drop(cache);

        info!(user_id, "gmail account linked");
        Ok(bundle)
    }

    /// Returns a usable access token for `user_id`, refreshing when the cached
    /// one is missing or about to expire.
    pub async fn access_token(&self, user_id: &str) -> GmailResult<AccessToken> {
        let margin = Duration::seconds(CACHE_SAFETY_MARGIN_SECS);

        if let Some(token) = self.cache.read().await.get(user_id) {
            if !token.expires_within(margin) {
                debug!(user_id, "using cached access token");
                return Ok(token.clone());
            }
        }

        let blob = self
            .store
            .get(user_id)?
            .ok_or_else(|| GmailError::not_linked(user_id))?;

        let token = self.refresher.get_access_token(&blob).await?;
        self.cache
            .write()
            .await
            .insert(user_id.to_string(), token.clone());
        debug!(user_id, expires_at = ?token.expires_at(), "cached fresh access token");
        Ok(token)
    }

    /// Searches the linked mailbox of `user_id`.
    pub async fn search(
        &self,
        user_id: &str,
        query: &SearchQuery,
    ) -> GmailResult<Vec<MessageSummary>> {
        let token = self.access_token(user_id).await?;
        let result = self.searcher.search(token.secret(), query).await;

        // A token revoked before its expiry must not stay cached.
        if let Err(err) = &result {
            let rejected = err.code() == GmailErrorCode::AuthenticationFailed
                || err
                    .cause()
                    .is_some_and(|cause| cause.code() == GmailErrorCode::AuthenticationFailed);
            if rejected {
                self.cache.write().await.remove(user_id);
                debug!(user_id, "dropped rejected access token from cache");
            }
        }
        result
    }

    /// Removes the stored credential and cached token of `user_id`.
    ///
    /// Returns true if a credential was stored.
    pub async fn unlink(&self, user_id: &str) -> GmailResult<bool> {
        self.cache.write().await.remove(user_id);
        let removed = self.store.remove(user_id)?;
        info!(user_id, removed, "gmail account unlinked");
        Ok(removed)
    }

    /// Returns true if a credential is stored for `user_id`.
    pub fn is_linked(&self, user_id: &str) -> GmailResult<bool> {
        Ok(self.store.get(user_id)?.is_some())
    }
}
