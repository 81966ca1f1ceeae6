//! Renderer: normalised records plus enrichment to the final message body.
//!
//! Output uses only the target channel's inline syntax: `*bold*`, `•`
//! bullets, and `<url|label>` links. Rendering is deterministic; dates are
//! shown in UTC.

use crate::{EnrichmentResult, GroupedRecords, RegistryEntry, RepositoryId};

/// Longest message excerpt shown per line in a channel digest.
const MAX_EXCERPT_CHARS: usize = 200;

/// The fixed message for an empty commit window.
pub fn no_commits_message(lookback_hours: i64) -> String {
    format!("No commits were made in the last {lookback_hours} hours.")
}

/// The fixed message for an empty channel window.
pub const NO_MESSAGES_THIS_WEEK: &str = "No messages to summarize this week.";

/// Reply for a lookup that matched nothing.
pub fn no_match_message(query: &str) -> String {
    format!("No match found for *{}*.", escape(query.trim()))
}

/// Renders the daily commit digest.
pub fn render_commit_digest(
    repository: &RepositoryId,
    lookback_hours: i64,
    grouped: &GroupedRecords,
    enrichment: &EnrichmentResult,
) -> String {
    if grouped.is_empty() {
        return no_commits_message(lookback_hours);
    }

    let mut out = format!(":rocket: *Daily Commit Summary for {repository}* :rocket:\n\n");
    out.push_str(&format!(
        "*Total commits in the last {lookback_hours} hours:* {}\n\n",
        grouped.total()
    ));

    if let Some(summary) = enrichment.text() {
        out.push_str("*AI-Generated Summary:*\n");
        out.push_str(summary);
        out.push_str("\n\n*Detailed Commits:*\n");
    }

    for group in grouped.groups() {
        out.push_str(&format!("*{}* ({} commits):\n", escape(group.actor()), group.len()));
        for record in group.records() {
            let title = escape(record.headline()).replace('|', "¦");
            let date = format_date(record);
            match record.origin_url() {
                Some(url) => out.push_str(&format!("• <{url}|{title}> ({date})\n")),
                None => out.push_str(&format!("• {title} ({date})\n")),
            }
        }
        out.push('\n');
    }
    out
}

/// Renders the weekly channel digest.
pub fn render_channel_digest(
    lookback_days: i64,
    grouped: &GroupedRecords,
    enrichment: &EnrichmentResult,
) -> String {
    if grouped.is_empty() {
        return NO_MESSAGES_THIS_WEEK.to_string();
    }

    let mut out = String::from("*Weekly Channel Summary*\n\n");
    out.push_str(&format!(
        "*Total messages in the last {lookback_days} days:* {}\n\n",
        grouped.total()
    ));

    if let Some(summary) = enrichment.text() {
        out.push_str("*AI-Generated Summary:*\n");
        out.push_str(summary);
        out.push_str("\n\n*Messages by author:*\n");
    }

    for group in grouped.groups() {
        out.push_str(&format!("*{}* ({} messages):\n", escape(group.actor()), group.len()));
        for record in group.records() {
            out.push_str(&format!(
                "• {} ({})\n",
                excerpt(record.headline()),
                format_date(record)
            ));
        }
        out.push('\n');
    }
    out
}

/// Renders one registry entry of a lookup fan-out.
pub fn render_entry(entry: &RegistryEntry, enrichment: &EnrichmentResult) -> String {
    let field = |key: &str, fallback: &'static str| {
        entry.field(key).map(escape).unwrap_or_else(|| fallback.to_string())
    };

    let mut out = format!(
        "*{}* ({})\n• Ranking: {}\n• Last contacted: {}\n• Notes: {}",
        field(RegistryEntry::COMPANY, "Unknown Company"),
        field(RegistryEntry::PERSON, "Unknown Person"),
        field(RegistryEntry::RANKING, "Unknown"),
        field(RegistryEntry::LAST_CONTACTED, "Unknown"),
        field(RegistryEntry::NOTES, "No notes"),
    );
    if let Some(insight) = enrichment.text() {
        out.push_str("\n\n🧠 *AI Insight:*\n");
        out.push_str(insight);
    }
    out
}

fn format_date(record: &crate::ActivityRecord) -> String {
    record
        .occurred_at()
        .as_datetime()
        .format("%Y-%m-%d %H:%M UTC")
        .to_string()
}

fn excerpt(text: &str) -> String {
    let escaped = escape(text);
    if escaped.chars().count() <= MAX_EXCERPT_CHARS {
        return escaped;
    }
    let cut: String = escaped.chars().take(MAX_EXCERPT_CHARS).collect();
    format!("{cut}…")
}

/// Escapes the three characters the channel treats as control syntax.
fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
