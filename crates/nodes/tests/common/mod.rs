//! In-memory collaborators shared by the orchestration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use pipeline::{
    ActorId, ChannelId, CommitSource, CompletionRequest, Cursor, DeliveryError, EnrichmentError,
    HistoryPage, HistorySource, IdentityError, IdentityResolver, MessageSink, RawCommit,
    RawMessage, RegistryEntry, RegistryError, RegistrySource, RepositoryId, SourceError,
    SummaryProvider, Timestamp,
};
use tokio::sync::Notify;

pub fn channel(id: &str) -> ChannelId {
    ChannelId::new(id).unwrap()
}

pub fn hours_ago(hours: i64) -> Timestamp {
    Timestamp::from_utc(Utc::now() - Duration::hours(hours))
}

pub fn commit(sha: &str, author: &str, message: &str, authored_at: Timestamp) -> RawCommit {
    RawCommit {
        sha: sha.to_string(),
        author_name: Some(author.to_string()),
        message: Some(message.to_string()),
        authored_at: Some(authored_at),
        url: Some(format!("https://github.com/acme/widgets/commit/{sha}")),
    }
}

pub fn message(ts: &str, user: &str, text: &str) -> RawMessage {
    RawMessage {
        ts: ts.to_string(),
        user: ActorId::new(user),
        text: Some(text.to_string()),
        ..Default::default()
    }
}

pub fn entry(company: &str, person: &str, notes: &str) -> RegistryEntry {
    RegistryEntry::from_fields([
        (RegistryEntry::COMPANY, company),
        (RegistryEntry::PERSON, person),
        (RegistryEntry::RANKING, "1"),
        (RegistryEntry::NOTES, notes),
    ])
}

// ---------------------------------------------------------------------------
// Sink
// ---------------------------------------------------------------------------

/// Records every post. Posts whose text contains `fail_marker` are rejected.
#[derive(Default)]
pub struct RecordingSink {
    posts: Mutex<Vec<(ChannelId, String)>>,
    fail_marker: Option<String>,
}

impl RecordingSink {
    pub fn failing_on(marker: &str) -> Self {
        Self {
            posts: Mutex::new(Vec::new()),
            fail_marker: Some(marker.to_string()),
        }
    }

    pub fn posts(&self) -> Vec<(ChannelId, String)> {
        self.posts.lock().unwrap().clone()
    }

    pub fn texts_in(&self, channel: &ChannelId) -> Vec<String> {
        self.posts()
            .into_iter()
            .filter(|(c, _)| c == channel)
            .map(|(_, t)| t)
            .collect()
    }
}

#[async_trait]
impl MessageSink for RecordingSink {
    async fn post_message(&self, channel: &ChannelId, text: &str) -> Result<(), DeliveryError> {
        self.posts
            .lock()
            .unwrap()
            .push((channel.clone(), text.to_string()));
        match &self.fail_marker {
            Some(marker) if text.contains(marker.as_str()) => {
                Err(DeliveryError::Rejected("channel_not_found".to_string()))
            }
            _ => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

pub struct StaticCommits {
    repository: RepositoryId,
    commits: Vec<RawCommit>,
    fail: bool,
    pub calls: AtomicUsize,
    /// When set, each call waits for one notification before returning.
    gate: Option<Arc<Notify>>,
}

impl StaticCommits {
    pub fn new(commits: Vec<RawCommit>) -> Self {
        Self {
            repository: RepositoryId::new("acme", "widgets").unwrap(),
            commits,
            fail: false,
            calls: AtomicUsize::new(0),
            gate: None,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(Vec::new())
        }
    }

    pub fn gated(commits: Vec<RawCommit>, gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new(commits)
        }
    }
}

#[async_trait]
impl CommitSource for StaticCommits {
    fn repository(&self) -> &RepositoryId {
        &self.repository
    }

    async fn list_commits(
        &self,
        _since: Timestamp,
        _limit: usize,
    ) -> Result<Vec<RawCommit>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.fail {
            return Err(SourceError::Status {
                status: 502,
                body: "bad gateway".to_string(),
            });
        }
        Ok(self.commits.clone())
    }
}

/// Serves canned pages in order, each pointing at the next by cursor.
pub struct PagedHistory {
    pages: Vec<Vec<RawMessage>>,
    pub calls: AtomicUsize,
}

impl PagedHistory {
    pub fn new(pages: Vec<Vec<RawMessage>>) -> Self {
        Self {
            pages,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl HistorySource for PagedHistory {
    async fn history_page(
        &self,
        _channel: &ChannelId,
        cursor: Option<&Cursor>,
        _oldest: Timestamp,
        _limit: usize,
    ) -> Result<HistoryPage, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let index: usize = cursor.map(|c| c.as_str().parse().unwrap()).unwrap_or(0);
        let messages = self.pages.get(index).cloned().unwrap_or_default();
        let next_cursor = if index + 1 < self.pages.len() {
            Cursor::new((index + 1).to_string())
        } else {
            None
        };
        Ok(HistoryPage {
            messages,
            next_cursor,
        })
    }
}

/// Resolves from a fixed directory; unknown ids are `NotFound`.
pub struct DirectoryResolver {
    names: HashMap<String, String>,
    calls: Mutex<Vec<String>>,
}

impl DirectoryResolver {
    pub fn new(names: &[(&str, &str)]) -> Self {
        Self {
            names: names
                .iter()
                .map(|(id, name)| (id.to_string(), name.to_string()))
                .collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls_for(&self, id: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == id).count()
    }
}

#[async_trait]
impl IdentityResolver for DirectoryResolver {
    async fn display_name(&self, actor: &ActorId) -> Result<String, IdentityError> {
        self.calls.lock().unwrap().push(actor.to_string());
        self.names
            .get(actor.as_str())
            .cloned()
            .ok_or_else(|| IdentityError::NotFound(actor.clone()))
    }
}

pub struct StaticRegistry {
    entries: Vec<RegistryEntry>,
}

impl StaticRegistry {
    pub fn new(entries: Vec<RegistryEntry>) -> Self {
        Self { entries }
    }
}

#[async_trait]
impl RegistrySource for StaticRegistry {
    async fn load(&self) -> Result<Vec<RegistryEntry>, RegistryError> {
        Ok(self.entries.clone())
    }
}

// ---------------------------------------------------------------------------
// Summary provider
// ---------------------------------------------------------------------------

/// Answers every request with a fixed completion and counts calls.
pub struct CannedProvider {
    reply: String,
    pub calls: AtomicUsize,
}

impl CannedProvider {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SummaryProvider for CannedProvider {
    async fn complete(&self, _request: CompletionRequest) -> Result<String, EnrichmentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }
}
