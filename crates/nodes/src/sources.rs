//! Record sources for the three pipeline kinds.
//!
//! Each function fetches one bounded batch for a run. Errors are returned to
//! the executor, which degrades them to an explicit empty outcome.

use std::sync::Arc;

use pipeline::{
    ChannelId, CommitSource, FetchWindow, FuzzyIndex, HistoryPager, HistorySource, MatchSet,
    PageRequest, RawCommit, RawMessage, RegistryError, RegistrySource, SourceError, Timestamp,
};
use tracing::{debug, info};

use crate::IdentityCache;

/// Commits inside `window`, truncated to its record cap.
pub async fn fetch_commits(
    source: &dyn CommitSource,
    window: &FetchWindow,
    now: Timestamp,
) -> Result<Vec<RawCommit>, SourceError> {
    let since = window.since(now);
    info!(repository = %source.repository(), since = %since, "Fetching commits");

    let mut commits = source.list_commits(since, window.max_records()).await?;
    commits.truncate(window.max_records());
    info!(commits = commits.len(), "Fetched commits");
    Ok(commits)
}

/// Channel history inside `window`, walking pages until the cursor runs out
/// or the cap is reached, with senders resolved through the run's `identities`.
pub async fn fetch_channel_history(
    history: Arc<dyn HistorySource>,
    identities: &IdentityCache,
    channel: &ChannelId,
    window: &FetchWindow,
    now: Timestamp,
) -> Result<Vec<RawMessage>, SourceError> {
    let oldest = window.since(now);
    info!(channel = %channel, oldest = %oldest, max = window.max_records(), "Fetching channel history");

    let mut pager = HistoryPager::new(window, |request: PageRequest| {
        let history = history.clone();
        let channel = channel.clone();
        async move {
            history
                .history_page(&channel, request.cursor.as_ref(), oldest, request.limit)
                .await
        }
    });

    let mut messages = Vec::new();
    while let Some(page) = pager.next_page().await {
        let mut page = page?;
        identities.resolve_page(&mut page).await;
        debug!(page = pager.pages_fetched(), messages = page.len(), "Fetched history page");
        messages.extend(page);
    }
    let actors = identities.len().await;
    info!(
        messages = messages.len(),
        pages = pager.pages_fetched(),
        actors,
        "Fetched channel history"
    );
    Ok(messages)
}

/// Loads the registry once, indexes it, and runs one query.
pub async fn search_registry(
    registry: &dyn RegistrySource,
    threshold: f64,
    query: &str,
) -> Result<MatchSet, RegistryError> {
    let entries = registry.load().await?;
    let index = FuzzyIndex::for_registry(entries, threshold);
    let matches = index.search(query);
    info!(
        entries = index.len(),
        query = %query.trim(),
        matches = matches.len(),
        "Searched contact registry"
    );
    Ok(matches)
}
