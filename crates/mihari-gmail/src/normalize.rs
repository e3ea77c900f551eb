//! Projection of Gmail metadata into [`MessageSummary`] values.

use mihari_core::MessageSummary;

use crate::mailbox::{MessageHeader, MessageMetadata, MessageRef};

/// Headers requested with every metadata fetch.
pub const SUMMARY_HEADERS: [&str; 3] = ["Subject", "From", "Date"];

/// Returns the value of the first header named `name`, ignoring ASCII case.
///
/// A missing header, or one without a value, yields an empty string.
pub fn header_value(headers: &[MessageHeader], name: &str) -> String {
    headers
        .iter()
        .find(|header| {
            header
                .name
                .as_deref()
                .is_some_and(|n| n.eq_ignore_ascii_case(name))
        })
        .and_then(|header| header.value.clone())
        .unwrap_or_default()
}

/// Builds the summary for one listed message.
///
/// Identifiers come from the listing entry, which is authoritative for
/// ordering and threading; everything else comes from the metadata.
pub fn summarize(
    message_id: &str,
    listed: &MessageRef,
    metadata: &MessageMetadata,
) -> MessageSummary {
    let headers = metadata.headers();
    MessageSummary {
        message_id: message_id.to_string(),
        thread_id: listed.thread_id.clone().unwrap_or_default(),
        subject: header_value(headers, "Subject"),
        from: header_value(headers, "From"),
        date: header_value(headers, "Date"),
        snippet: metadata.snippet.clone().unwrap_or_default(),
    }
}
