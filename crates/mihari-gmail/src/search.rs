//! Message search pipeline.
//!
//! A search is one listing round trip followed by one metadata round trip per
//! listed message. The listing order is authoritative: summaries come back in
//! exactly that order, whatever the fetch concurrency.

use std::sync::Arc;

use futures_util::StreamExt as _;
use futures_util::stream;
use mihari_core::{MessageSummary, SearchQuery};
use tracing::{debug, warn};

use crate::error::{GmailError, GmailResult};
use crate::mailbox::{MailboxApi, MessageRef};
use crate::normalize::{SUMMARY_HEADERS, summarize};

/// What to do when a metadata fetch fails part-way through a search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FetchFailurePolicy {
    /// Fail the whole search with a search fetch error and discard the
    /// summaries gathered so far.
    #[default]
    Abort,
    /// Stop fetching and return the summaries gathered before the failure.
    KeepPartial,
}

/// Runs bounded keyword searches against a mailbox.
#[derive(Clone)]
pub struct MessageSearcher {
    api: Arc<dyn MailboxApi>,
    concurrency: usize,
    failure_policy: FetchFailurePolicy,
}

impl std::fmt::Debug for MessageSearcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageSearcher")
            .field("concurrency", &self.concurrency)
            .field("failure_policy", &self.failure_policy)
            .finish_non_exhaustive()
    }
}

impl MessageSearcher {
    /// Creates a sequential searcher that aborts on the first fetch failure.
    pub fn new(api: Arc<dyn MailboxApi>) -> Self {
        Self {
            api,
            concurrency: 1,
            failure_policy: FetchFailurePolicy::Abort,
        }
    }

    /// Allows up to `limit` metadata fetches in flight at once.
    ///
    /// `1` (the default) fetches strictly one message at a time. Zero is
    /// treated as one.
    #[must_use]
    pub fn with_concurrency(mut self, limit: usize) -> Self {
        self.concurrency = limit.max(1);
        self
    }

    /// Sets the behaviour on a mid-search fetch failure.
    #[must_use]
    pub fn with_failure_policy(mut self, policy: FetchFailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Returns the fetch concurrency limit.
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Returns the fetch failure policy.
    pub fn failure_policy(&self) -> FetchFailurePolicy {
        self.failure_policy
    }

    /// Searches the mailbox and returns one summary per listed message.
    ///
    /// Listing entries without an identifier are skipped. A listing failure
    /// is returned unchanged; a metadata failure is handled according to the
    /// [`FetchFailurePolicy`].
    pub async fn search(
        &self,
        access_token: &str,
        query: &SearchQuery,
    ) -> GmailResult<Vec<MessageSummary>> {
        let max_results = query.effective_max_results();
        let listed = self
            .api
            .list_messages(access_token, &query.text, max_results)
            .await?;

        if listed.is_empty() {
            debug!("search matched no messages");
            return Ok(Vec::new());
        }

        let entries: Vec<(String, MessageRef)> = listed
            .into_iter()
            .filter_map(|entry| match entry.id.clone() {
                Some(id) if !id.is_empty() => Some((id, entry)),
                _ => {
                    debug!("skipping listing entry without message id");
                    None
                }
            })
            .collect();

        debug!(
            count = entries.len(),
            concurrency = self.concurrency,
            "fetching message metadata"
        );

        // `buffered` yields results in input order regardless of completion
        // order, and dropping the stream cancels fetches still in flight.
        let mut fetches = stream::iter(entries.iter())
            .map(|(id, listed)| async move {
                let result = self
                    .api
                    .get_message_metadata(access_token, id, &SUMMARY_HEADERS)
                    .await;
                (id.as_str(), listed, result)
            })
            .buffered(self.concurrency);

        let mut summaries = Vec::with_capacity(entries.len());
        while let Some((id, listed, result)) = fetches.next().await {
            match result {
                Ok(metadata) => summaries.push(summarize(id, listed, &metadata)),
                Err(err) => match self.failure_policy {
                    FetchFailurePolicy::Abort => {
                        warn!(
                            message_id = id,
                            fetched = summaries.len(),
                            error = %err,
                            "metadata fetch failed, aborting search"
                        );
                        return Err(GmailError::search_fetch(id, err));
                    }
                    FetchFailurePolicy::KeepPartial => {
                        warn!(
                            message_id = id,
                            fetched = summaries.len(),
                            error = %err,
                            "metadata fetch failed, returning partial results"
                        );
                        return Ok(summaries);
                    }
                },
            }
        }

        debug!(count = summaries.len(), "search complete");
        Ok(summaries)
    }
}
