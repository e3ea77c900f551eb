//! Mailbox API abstraction.
//!
//! The search pipeline depends on exactly two call shapes of the remote
//! mailbox: "list message identifiers matching a query, bounded by a cap" and
//! "fetch selected headers plus the snippet for one message". [`MailboxApi`]
//! captures those two shapes so the pipeline can run against Gmail
//! ([`GmailClient`](crate::client::GmailClient)) or an in-process fake.

use std::future::Future;
use std::pin::Pin;

use serde::Deserialize;

use crate::error::GmailResult;

/// A boxed future for async trait methods.
///
/// Boxed futures keep the traits object-safe so components can hold
/// `Arc<dyn MailboxApi>` / `Arc<dyn TokenEndpoint>`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One entry of a `messages.list` response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRef {
    /// Message identifier. Gmail always sends it, but the pipeline does not
    /// rely on that.
    #[serde(default)]
    pub id: Option<String>,
    /// Thread identifier.
    #[serde(default)]
    pub thread_id: Option<String>,
}

impl MessageRef {
    /// Creates a reference with both identifiers.
    pub fn new(id: impl Into<String>, thread_id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            thread_id: Some(thread_id.into()),
        }
    }
}

/// Response body of `users.messages.list`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageList {
    /// Matching messages; absent when nothing matched.
    #[serde(default)]
    pub messages: Vec<MessageRef>,
    /// Provider estimate of the total number of matches.
    #[serde(default)]
    pub result_size_estimate: Option<u64>,
}

/// A single message header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MessageHeader {
    /// Header name as sent by the provider (case varies).
    #[serde(default)]
    pub name: Option<String>,
    /// Header value.
    #[serde(default)]
    pub value: Option<String>,
}

impl MessageHeader {
    /// Creates a header with the given name and value.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            value: Some(value.into()),
        }
    }
}

/// Top-level MIME part of a `format=metadata` message.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessagePayload {
    /// Headers restricted to the requested `metadataHeaders`.
    #[serde(default)]
    pub headers: Vec<MessageHeader>,
}

/// Response body of `users.messages.get` with `format=metadata`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageMetadata {
    /// Message identifier.
    #[serde(default)]
    pub id: Option<String>,
    /// Thread identifier.
    #[serde(default)]
    pub thread_id: Option<String>,
    /// Provider-computed excerpt.
    #[serde(default)]
    pub snippet: Option<String>,
    /// Header container; absent for some malformed messages.
    #[serde(default)]
    pub payload: Option<MessagePayload>,
}

impl MessageMetadata {
    /// Creates metadata from a snippet and a header list.
    pub fn new(snippet: impl Into<String>, headers: Vec<MessageHeader>) -> Self {
        Self {
            snippet: Some(snippet.into()),
            payload: Some(MessagePayload { headers }),
            ..Default::default()
        }
    }

    /// Returns the headers, or an empty slice when the payload is absent.
    pub fn headers(&self) -> &[MessageHeader] {
        self.payload
            .as_ref()
            .map(|payload| payload.headers.as_slice())
            .unwrap_or_default()
    }
}

/// The two read-only mailbox calls the search pipeline needs.
pub trait MailboxApi: Send + Sync {
    /// Lists up to `max_results` messages matching `query`, in provider order.
    fn list_messages<'a>(
        &'a self,
        access_token: &'a str,
        query: &'a str,
        max_results: u32,
    ) -> BoxFuture<'a, GmailResult<Vec<MessageRef>>>;

    /// Fetches the snippet and the named headers of one message.
    fn get_message_metadata<'a>(
        &'a self,
        access_token: &'a str,
        message_id: &'a str,
        headers: &'a [&'a str],
    ) -> BoxFuture<'a, GmailResult<MessageMetadata>>;
}
