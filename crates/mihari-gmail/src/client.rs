//! Gmail API client.
//!
//! Low-level HTTP client for the two `users.messages` calls used by search.
//! The access token is supplied per call; the client holds no credentials.

use serde::de::DeserializeOwned;
use tracing::{debug, trace};

use crate::config::OAuthClientConfig;
use crate::error::{GmailError, GmailResult};
use crate::mailbox::{BoxFuture, MailboxApi, MessageList, MessageMetadata, MessageRef};

/// Base URL for Gmail API v1.
pub const GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1";

/// Gmail API client.
#[derive(Debug, Clone)]
pub struct GmailClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl GmailClient {
    /// Creates a client using the timeout and user agent of `config`.
    pub fn new(config: &OAuthClientConfig) -> GmailResult<Self> {
        Ok(Self::with_http_client(config.http_client()?))
    }

    /// Creates a client that shares an existing HTTP client.
    pub fn with_http_client(http_client: reqwest::Client) -> Self {
        Self {
            http_client,
            base_url: GMAIL_API_BASE.to_string(),
        }
    }

    /// Points the client at another API host (proxies, local fakes).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Returns the API base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Lists messages matching `query`.
    pub async fn list_messages(
        &self,
        access_token: &str,
        query: &str,
        max_results: u32,
    ) -> GmailResult<Vec<MessageRef>> {
        let url = format!("{}/users/me/messages", self.base_url);
        let request = self
            .http_client
            .get(&url)
            .bearer_auth(access_token)
            .query(&[("q", query.to_string()), ("maxResults", max_results.to_string())]);

        let list: MessageList = self.send_json(request, "message list").await?;
        debug!(
            count = list.messages.len(),
            estimate = ?list.result_size_estimate,
            "listed messages"
        );
        Ok(list.messages)
    }

    /// Fetches the snippet and the named headers of one message.
    pub async fn get_message_metadata(
        &self,
        access_token: &str,
        message_id: &str,
        headers: &[&str],
    ) -> GmailResult<MessageMetadata> {
        let url = format!(
            "{}/users/me/messages/{}",
            self.base_url,
            urlencoding::encode(message_id)
        );

        let mut params = vec![("format", "metadata".to_string())];
        params.extend(
            headers
                .iter()
                .map(|header| ("metadataHeaders", header.to_string())),
        );

        let request = self
            .http_client
            .get(&url)
            .bearer_auth(access_token)
            .query(&params);

        let metadata: MessageMetadata = self.send_json(request, "message metadata").await?;
        trace!(message_id, "fetched message metadata");
        Ok(metadata)
    }

    /// Sends a request and decodes a JSON body, mapping HTTP failures to
    /// error codes.
    async fn send_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        what: &str,
    ) -> GmailResult<T> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                GmailError::network("request timeout")
            } else if e.is_connect() {
                GmailError::network(format!("connection failed: {}", e))
            } else {
                GmailError::network(format!("request failed: {}", e))
            }
        })?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok());
            return Err(GmailError::rate_limited(format!(
                "rate limit exceeded{}",
                retry_after
                    .map(|s| format!(", retry after {} seconds", s))
                    .unwrap_or_default()
            )));
        }

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(GmailError::authentication("access token expired or invalid"));
        }

        if status == reqwest::StatusCode::FORBIDDEN {
            return Err(GmailError::authorization("access denied to mailbox"));
        }

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(GmailError::not_found(format!("{} not found", what)));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(if status.is_server_error() {
                GmailError::server(format!("API error ({}): {}", status, body))
            } else {
                GmailError::bad_request(format!("API error ({}): {}", status, body))
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| GmailError::network(format!("failed to read response: {}", e)))?;

        serde_json::from_str(&body).map_err(|e| {
            GmailError::invalid_response(format!("failed to parse {}: {}", what, e))
        })
    }
}

impl MailboxApi for GmailClient {
    fn list_messages<'a>(
        &'a self,
        access_token: &'a str,
        query: &'a str,
        max_results: u32,
    ) -> BoxFuture<'a, GmailResult<Vec<MessageRef>>> {
        Box::pin(GmailClient::list_messages(
            self,
            access_token,
            query,
            max_results,
        ))
    }

    fn get_message_metadata<'a>(
        &'a self,
        access_token: &'a str,
        message_id: &'a str,
        headers: &'a [&'a str],
    ) -> BoxFuture<'a, GmailResult<MessageMetadata>> {
        Box::pin(GmailClient::get_message_metadata(
            self,
            access_token,
            message_id,
            headers,
        ))
    }
}
