//! Search request and result types.
//!
//! [`SearchQuery`] describes a bounded keyword search against a mailbox and
//! [`MessageSummary`] is the lightweight projection returned for each match.
//! Both are request-scoped values: nothing here is persisted.

use serde::{Deserialize, Serialize};

/// A bounded free-text mailbox search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    /// Free-text query, passed verbatim to the provider (Gmail search syntax).
    pub text: String,
    /// Maximum number of message identifiers to list.
    #[serde(default = "default_max_results")]
    pub max_results: u32,
}

fn default_max_results() -> u32 {
    SearchQuery::DEFAULT_MAX_RESULTS
}

impl SearchQuery {
    /// Number of results requested when the caller does not say otherwise.
    pub const DEFAULT_MAX_RESULTS: u32 = 10;

    /// Upper bound accepted by the Gmail `messages.list` endpoint.
    pub const PROVIDER_MAX_RESULTS: u32 = 500;

    /// Creates a query with the default result cap.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            max_results: Self::DEFAULT_MAX_RESULTS,
        }
    }

    /// Sets the result cap, clamped to `1..=PROVIDER_MAX_RESULTS`.
    #[must_use]
    pub fn with_max_results(mut self, max_results: u32) -> Self {
        self.max_results = max_results.clamp(1, Self::PROVIDER_MAX_RESULTS);
        self
    }

    /// Returns the result cap actually sent to the provider.
    ///
    /// Values deserialized from untrusted input bypass the builder, so the
    /// clamp is applied again here.
    pub fn effective_max_results(&self) -> u32 {
        self.max_results.clamp(1, Self::PROVIDER_MAX_RESULTS)
    }
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self::new(String::new())
    }
}

/// Lightweight summary of one matching message.
///
/// Header-derived fields are empty strings when the header is absent from the
/// provider's metadata; they are never omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSummary {
    /// Provider message identifier, unique per mailbox.
    pub message_id: String,
    /// Conversation identifier; empty when the listing did not carry one.
    pub thread_id: String,
    /// `Subject` header.
    pub subject: String,
    /// `From` header.
    pub from: String,
    /// `Date` header, exactly as the provider formatted it.
    pub date: String,
    /// Provider-computed plain-text excerpt.
    pub snippet: String,
}

impl MessageSummary {
    /// Creates a summary with only the identifiers set.
    pub fn new(message_id: impl Into<String>, thread_id: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            thread_id: thread_id.into(),
            ..Default::default()
        }
    }

    /// Returns true if the message has a non-empty subject.
    pub fn has_subject(&self) -> bool {
        !self.subject.is_empty()
    }
}
