//! Slack Web API payloads.
//!
//! Every method answers HTTP 200 with an `ok` flag; failures carry an
//! `error` code instead of the method's own fields.

use pipeline::{ActorId, Cursor, HistoryPage, RawMessage};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub(crate) struct PostMessage<'a> {
    pub channel: &'a str,
    pub text: &'a str,
    pub mrkdwn: bool,
}

/// Fields shared by every response.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope {
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
}

impl Envelope {
    pub fn error_code(&self) -> String {
        self.error.clone().unwrap_or_else(|| "unknown_error".to_string())
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct HistoryResponse {
    #[serde(flatten)]
    pub envelope: Envelope,
    #[serde(default)]
    pub messages: Vec<MessageItem>,
    #[serde(default)]
    pub response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResponseMetadata {
    #[serde(default)]
    pub next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MessageItem {
    #[serde(default)]
    pub ts: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub bot_id: Option<String>,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub thread_ts: Option<String>,
}

impl From<MessageItem> for RawMessage {
    fn from(item: MessageItem) -> Self {
        RawMessage {
            ts: item.ts,
            user: item.user.and_then(ActorId::new),
            text: item.text,
            bot_id: item.bot_id,
            subtype: item.subtype,
            thread_ts: item.thread_ts,
            display_name: None,
        }
    }
}

impl HistoryResponse {
    pub fn into_page(self) -> HistoryPage {
        let next_cursor = self
            .response_metadata
            .and_then(|m| m.next_cursor)
            .and_then(Cursor::new);
        HistoryPage {
            messages: self.messages.into_iter().map(RawMessage::from).collect(),
            next_cursor,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserInfoResponse {
    #[serde(flatten)]
    pub envelope: Envelope,
    #[serde(default)]
    pub user: Option<UserItem>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserItem {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub real_name: Option<String>,
    #[serde(default)]
    pub profile: Option<Profile>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Profile {
    #[serde(default)]
    pub real_name: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl UserItem {
    /// First non-blank of `real_name`, `profile.real_name`,
    /// `profile.display_name`, `name`.
    pub fn best_name(self) -> Option<String> {
        let (profile_real, profile_display) = match self.profile {
            Some(p) => (p.real_name, p.display_name),
            None => (None, None),
        };
        [self.real_name, profile_real, profile_display, self.name]
            .into_iter()
            .flatten()
            .map(|n| n.trim().to_string())
            .find(|n| !n.is_empty())
    }
}
