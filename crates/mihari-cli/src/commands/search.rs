//! `mihari search`: run a Gmail query and print the summaries.

use std::fmt::Write as _;

use mihari_core::{MessageSummary, SearchQuery};
use tracing::debug;

use crate::config::{ClientConfig, CredentialOverrides};
use crate::error::ClientResult;

/// Longest snippet shown in table output, in characters.
const SNIPPET_WIDTH: usize = 100;

/// Searches the mailbox of the selected user.
pub async fn run(
    config: &ClientConfig,
    user: Option<String>,
    max: Option<u32>,
    json: bool,
    words: Vec<String>,
    overrides: &CredentialOverrides,
) -> ClientResult<()> {
    let user_id = super::resolve_user(user, config)?;
    let service = super::open_service(config, overrides)?;

    let query = SearchQuery::new(words.join(" "))
        .with_max_results(max.unwrap_or(config.search.max_results));
    debug!(user_id, max = query.max_results, "running search");

    let results = service.search(&user_id, &query).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        print!("{}", render_table(&results));
    }
    Ok(())
}

/// Renders summaries as a plain-text listing, one block per message.
pub fn render_table(results: &[MessageSummary]) -> String {
    if results.is_empty() {
        return "No messages found.\n".to_string();
    }

    let mut out = String::new();
    for (index, summary) in results.iter().enumerate() {
        let subject = if summary.has_subject() {
            summary.subject.as_str()
        } else {
            "(no subject)"
        };
        let _ = writeln!(out, "{:>3}. {}", index + 1, subject);
        let _ = writeln!(out, "     From: {}", summary.from);
        let _ = writeln!(out, "     Date: {}", summary.date);
        if !summary.snippet.is_empty() {
            let _ = writeln!(out, "     {}", truncate(&summary.snippet, SNIPPET_WIDTH));
        }
        let _ = writeln!(out, "     id: {}", summary.message_id);
    }
    out
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(width.saturating_sub(1)).collect();
    cut.push('…');
    cut
}
