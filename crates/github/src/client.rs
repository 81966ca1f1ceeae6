use std::time::Duration;

use async_trait::async_trait;
use pipeline::{CommitSource, RawCommit, RepositoryId, SourceError, Timestamp};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use thiserror::Error;
use tracing::debug;

use crate::wire::CommitItem;

pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Largest page the commits endpoint serves.
const MAX_PER_PAGE: usize = 100;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Failure to build a [`GithubClient`].
#[derive(Debug, Error)]
pub enum GithubClientError {
    #[error("GitHub token contains characters not allowed in a header")]
    InvalidToken,

    #[error("could not build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// Commit history for one repository.
pub struct GithubClient {
    http: reqwest::Client,
    api_base: String,
    repository: RepositoryId,
}

impl GithubClient {
    /// Anonymous access is allowed when `token` is `None`, at GitHub's lower
    /// rate limit.
    pub fn new(
        api_base: impl Into<String>,
        token: Option<&str>,
        repository: RepositoryId,
    ) -> Result<Self, GithubClientError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("digest-bot"));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            HeaderValue::from_static("2022-11-28"),
        );
        if let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| GithubClientError::InvalidToken)?;
            headers.insert(AUTHORIZATION, value);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            repository,
        })
    }
}

#[async_trait]
impl CommitSource for GithubClient {
    fn repository(&self) -> &RepositoryId {
        &self.repository
    }

    async fn list_commits(
        &self,
        since: Timestamp,
        limit: usize,
    ) -> Result<Vec<RawCommit>, SourceError> {
        let url = format!(
            "{}/repos/{}/{}/commits",
            self.api_base,
            self.repository.owner(),
            self.repository.name()
        );
        let per_page = limit.clamp(1, MAX_PER_PAGE).to_string();
        let since = since.as_datetime().to_rfc3339();
        debug!(url = %url, since = %since, per_page = %per_page, "Listing commits");

        let response = self
            .http
            .get(&url)
            .query(&[("since", since.as_str()), ("per_page", per_page.as_str())])
            .send()
            .await
            .map_err(|e| SourceError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let items: Vec<CommitItem> = response
            .json()
            .await
            .map_err(|e| SourceError::Malformed(e.to_string()))?;
        let mut commits: Vec<RawCommit> = items.into_iter().map(RawCommit::from).collect();
        commits.truncate(limit);
        Ok(commits)
    }
}
