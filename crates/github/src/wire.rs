//! GitHub REST response shapes. Every field the API may omit is optional.

use chrono::{DateTime, Utc};
use pipeline::{RawCommit, Timestamp};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(crate) struct CommitItem {
    pub sha: String,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub commit: Option<CommitDetail>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CommitDetail {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub author: Option<Signature>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Signature {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}

impl From<CommitItem> for RawCommit {
    fn from(item: CommitItem) -> Self {
        let (message, author) = match item.commit {
            Some(detail) => (detail.message, detail.author),
            None => (None, None),
        };
        let (author_name, authored_at) = match author {
            Some(sig) => (sig.name, sig.date.map(Timestamp::from_utc)),
            None => (None, None),
        };
        RawCommit {
            sha: item.sha,
            author_name,
            message,
            authored_at,
            url: item.html_url,
        }
    }
}
