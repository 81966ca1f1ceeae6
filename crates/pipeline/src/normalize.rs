//! Normalizer: raw source records to [`GroupedRecords`].
//!
//! Pure and total. Missing fields degrade to the documented placeholders
//! below; nothing here can fail. Chat messages that are not top-level human
//! posts (bot posts, join/leave and other subtyped events, thread replies)
//! are dropped here, deterministically.

use crate::{ActivityRecord, GroupedRecords, RawCommit, RawMessage, RawRecords, Timestamp};

/// Actor used for commits whose author name is missing.
pub const UNKNOWN_AUTHOR: &str = "Unknown";

/// Actor used for messages whose sender could not be resolved.
pub const UNKNOWN_USER: &str = "Unknown User";

/// Normalises any raw record batch.
pub fn normalize(raw: RawRecords) -> GroupedRecords {
    match raw {
        RawRecords::Commits(commits) => normalize_commits(commits),
        RawRecords::Messages(messages) => normalize_messages(messages),
    }
}

/// Groups commits by author name.
pub fn normalize_commits(commits: Vec<RawCommit>) -> GroupedRecords {
    GroupedRecords::from_records(commits.into_iter().map(commit_record).collect())
}

/// Groups top-level human messages by resolved display name.
pub fn normalize_messages(messages: Vec<RawMessage>) -> GroupedRecords {
    GroupedRecords::from_records(
        messages
            .into_iter()
            .filter(is_top_level)
            .map(message_record)
            .collect(),
    )
}

/// `true` for messages that represent a top-level event posted by a person.
///
/// Thread replies carry a `thread_ts` different from their own `ts`; the
/// thread parent carries `thread_ts == ts` and is kept.
pub fn is_top_level(message: &RawMessage) -> bool {
    if message.bot_id.is_some() || message.subtype.is_some() {
        return false;
    }
    match &message.thread_ts {
        Some(thread_ts) => thread_ts == &message.ts,
        None => true,
    }
}

fn commit_record(commit: RawCommit) -> ActivityRecord {
    let actor = non_blank(commit.author_name).unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());
    let mut record = ActivityRecord::new(
        actor,
        commit.message.unwrap_or_default(),
        commit.authored_at.unwrap_or_else(Timestamp::epoch),
    );
    if let Some(url) = non_blank(commit.url) {
        record = record.with_origin_url(url);
    }
    if !commit.sha.is_empty() {
        record = record.with_meta("sha", commit.sha);
    }
    record
}

fn message_record(message: RawMessage) -> ActivityRecord {
    let actor = non_blank(message.display_name)
        .or_else(|| message.user.as_ref().map(|u| u.to_string()))
        .unwrap_or_else(|| UNKNOWN_USER.to_string());
    let occurred_at = Timestamp::from_unix_str(&message.ts).unwrap_or_else(Timestamp::epoch);
    let mut record = ActivityRecord::new(actor, message.text.unwrap_or_default(), occurred_at)
        .with_meta("ts", message.ts);
    if let Some(user) = message.user {
        record = record.with_meta("user", user.to_string());
    }
    record
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ActorId;
    use chrono::{TimeZone, Utc};

    fn commit(author: Option<&str>, message: &str, hour: u32) -> RawCommit {
        RawCommit {
            sha: format!("sha-{hour}"),
            author_name: author.map(str::to_string),
            message: Some(message.to_string()),
            authored_at: Some(Timestamp::from_utc(
                Utc.with_ymd_and_hms(2025, 5, 2, hour, 0, 0).unwrap(),
            )),
            url: Some(format!("https://github.com/o/r/commit/sha-{hour}")),
        }
    }

    fn message(ts: &str, user: &str, name: Option<&str>) -> RawMessage {
        RawMessage {
            ts: ts.to_string(),
            user: ActorId::new(user),
            text: Some(format!("hello from {user}")),
            display_name: name.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_commits_missing_fields_fall_back_to_placeholders() {
        let grouped = normalize_commits(vec![RawCommit {
            sha: "abc".to_string(),
            ..Default::default()
        }]);

        let record = grouped.records().next().expect("one record");
        assert_eq!(record.actor(), UNKNOWN_AUTHOR);
        assert_eq!(record.body(), "");
        assert_eq!(record.occurred_at(), Timestamp::epoch());
        assert_eq!(record.origin_url(), None);
        assert_eq!(record.source_meta().get("sha").map(String::as_str), Some("abc"));
    }

    #[test]
    fn test_commits_grouped_by_author() {
        let grouped = normalize_commits(vec![
            commit(Some("Alice"), "second", 10),
            commit(Some("Bob"), "bob", 9),
            commit(Some("Alice"), "first", 8),
        ]);
        assert_eq!(grouped.total(), 3);
        assert_eq!(grouped.group("Alice").map(|g| g.len()), Some(2));
        assert_eq!(grouped.group("Bob").map(|g| g.len()), Some(1));
    }

    #[test]
    fn test_messages_drop_bots_subtypes_and_thread_replies() {
        let parent = RawMessage {
            thread_ts: Some("100.000001".to_string()),
            ..message("100.000001", "U1", Some("Ann"))
        };
        let reply = RawMessage {
            thread_ts: Some("100.000001".to_string()),
            ..message("101.000001", "U2", Some("Ben"))
        };
        let bot = RawMessage {
            bot_id: Some("B1".to_string()),
            ..message("102.000001", "U3", None)
        };
        let join = RawMessage {
            subtype: Some("channel_join".to_string()),
            ..message("103.000001", "U4", None)
        };

        let grouped = normalize_messages(vec![parent, reply, bot, join]);
        assert_eq!(grouped.total(), 1);
        assert_eq!(grouped.groups()[0].actor(), "Ann");
    }

    #[test]
    fn test_message_actor_fallbacks() {
        let grouped = normalize_messages(vec![
            message("1.0", "U1", None),
            RawMessage {
                ts: "not-a-ts".to_string(),
                ..Default::default()
            },
        ]);
        let actors: Vec<&str> = grouped.groups().iter().map(|g| g.actor()).collect();
        assert!(actors.contains(&"U1"));
        assert!(actors.contains(&UNKNOWN_USER));
    }

    #[test]
    fn test_normalize_is_deterministic() {
        let raw = RawRecords::Messages(vec![
            message("5.0", "U1", Some("Ann")),
            message("5.0", "U2", Some("Ben")),
            message("4.0", "U1", Some("Ann")),
        ]);
        assert_eq!(normalize(raw.clone()), normalize(raw));
    }
}
