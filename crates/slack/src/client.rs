use std::time::Duration;

use async_trait::async_trait;
use pipeline::{
    ActorId, ChannelId, Cursor, DeliveryError, HistoryPage, HistorySource, IdentityError,
    IdentityResolver, MessageSink, SourceError, Timestamp,
};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use thiserror::Error;
use tracing::debug;

use crate::wire::{Envelope, HistoryResponse, PostMessage, UserInfoResponse};

pub const DEFAULT_API_BASE: &str = "https://slack.com/api";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Failure to build a [`SlackClient`].
#[derive(Debug, Error)]
pub enum SlackClientError {
    #[error("Slack bot token contains characters not allowed in a header")]
    InvalidToken,

    #[error("could not build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// Bot-token client for the Slack Web API.
pub struct SlackClient {
    http: reqwest::Client,
    api_base: String,
}

impl SlackClient {
    pub fn new(api_base: impl Into<String>, bot_token: &str) -> Result<Self, SlackClientError> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", bot_token.trim()))
            .map_err(|_| SlackClientError::InvalidToken)?;
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{method}", self.api_base)
    }
}

#[async_trait]
impl MessageSink for SlackClient {
    async fn post_message(&self, channel: &ChannelId, text: &str) -> Result<(), DeliveryError> {
        let response = self
            .http
            .post(self.url("chat.postMessage"))
            .json(&PostMessage {
                channel: channel.as_str(),
                text,
                mrkdwn: true,
            })
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: Envelope = response
            .json()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;
        if !envelope.ok {
            return Err(DeliveryError::Rejected(envelope.error_code()));
        }
        Ok(())
    }
}

#[async_trait]
impl HistorySource for SlackClient {
    async fn history_page(
        &self,
        channel: &ChannelId,
        cursor: Option<&Cursor>,
        oldest: Timestamp,
        limit: usize,
    ) -> Result<HistoryPage, SourceError> {
        let limit = limit.to_string();
        let oldest = oldest.unix_seconds().to_string();
        let mut query = vec![
            ("channel", channel.as_str()),
            ("limit", limit.as_str()),
            ("oldest", oldest.as_str()),
        ];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor.as_str()));
        }
        debug!(channel = %channel, cursor = ?cursor.map(Cursor::as_str), "Fetching history page");

        let response = self
            .http
            .get(self.url("conversations.history"))
            .query(&query)
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

        let history: HistoryResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Malformed(e.to_string()))?;
        if !history.envelope.ok {
            return Err(SourceError::Api(history.envelope.error_code()));
        }
        Ok(history.into_page())
    }
}

#[async_trait]
impl IdentityResolver for SlackClient {
    async fn display_name(&self, actor: &ActorId) -> Result<String, IdentityError> {
        let response = self
            .http
            .get(self.url("users.info"))
            .query(&[("user", actor.as_str())])
            .send()
            .await
            .map_err(|e| IdentityError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(IdentityError::Status {
                status: status.as_u16(),
            });
        }

        let info: UserInfoResponse = response
            .json()
            .await
            .map_err(|e| IdentityError::Transport(e.to_string()))?;
        if !info.envelope.ok {
            return Err(IdentityError::Api(info.envelope.error_code()));
        }
        info.user
            .and_then(|u| u.best_name())
            .ok_or_else(|| IdentityError::NotFound(actor.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client(server: &MockServer) -> SlackClient {
        SlackClient::new(server.base_url(), "xoxb-test").unwrap()
    }

    fn channel() -> ChannelId {
        ChannelId::new("C123").unwrap()
    }

    #[tokio::test]
    async fn test_post_message_sends_mrkdwn_text() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/chat.postMessage")
                .header("authorization", "Bearer xoxb-test")
                .json_body(json!({ "channel": "C123", "text": "*hi*", "mrkdwn": true }));
            then.status(200).json_body(json!({ "ok": true, "ts": "1.2" }));
        });

        client(&server).post_message(&channel(), "*hi*").await.unwrap();
        mock.assert();
    }

    #[tokio::test]
    async fn test_ok_false_is_a_rejection() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/chat.postMessage");
            then.status(200)
                .json_body(json!({ "ok": false, "error": "channel_not_found" }));
        });

        let err = client(&server)
            .post_message(&channel(), "hello")
            .await
            .unwrap_err();
        assert_eq!(err, DeliveryError::Rejected("channel_not_found".to_string()));
    }

    #[tokio::test]
    async fn test_post_message_http_failure_carries_status() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/chat.postMessage");
            then.status(503).body("unavailable");
        });

        let err = client(&server)
            .post_message(&channel(), "hello")
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::Status { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_history_page_maps_messages_and_cursor() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/conversations.history")
                .query_param("channel", "C123")
                .query_param("limit", "100")
                .query_param("oldest", "1700000000")
                .query_param("cursor", "abc");
            then.status(200).json_body(json!({
                "ok": true,
                "messages": [
                    { "ts": "1700000100.000200", "user": "U1", "text": "hello" },
                    { "ts": "1700000200.000300", "bot_id": "B1", "subtype": "bot_message", "text": "beep" }
                ],
                "response_metadata": { "next_cursor": "def" }
            }));
        });

        let oldest = Timestamp::from_unix_str("1700000000").unwrap();
        let cursor = Cursor::new("abc").unwrap();
        let page = client(&server)
            .history_page(&channel(), Some(&cursor), oldest, 100)
            .await
            .unwrap();

        mock.assert();
        assert_eq!(page.messages.len(), 2);
        assert_eq!(page.messages[0].user.as_ref().map(|u| u.as_str()), Some("U1"));
        assert_eq!(page.messages[1].bot_id.as_deref(), Some("B1"));
        assert_eq!(page.next_cursor.as_ref().map(|c| c.as_str()), Some("def"));
    }

    #[tokio::test]
    async fn test_empty_next_cursor_means_last_page() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/conversations.history");
            then.status(200).json_body(json!({
                "ok": true,
                "messages": [],
                "response_metadata": { "next_cursor": "" }
            }));
        });

        let page = client(&server)
            .history_page(&channel(), None, Timestamp::epoch(), 100)
            .await
            .unwrap();
        assert!(page.next_cursor.is_none());
    }

    #[tokio::test]
    async fn test_history_api_error_is_reported() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/conversations.history");
            then.status(200)
                .json_body(json!({ "ok": false, "error": "not_in_channel" }));
        });

        let err = client(&server)
            .history_page(&channel(), None, Timestamp::epoch(), 100)
            .await
            .unwrap_err();
        assert_eq!(err, SourceError::Api("not_in_channel".to_string()));
    }

    #[tokio::test]
    async fn test_display_name_prefers_real_name_then_profile() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/users.info").query_param("user", "U1");
            then.status(200).json_body(json!({
                "ok": true,
                "user": { "name": "alice", "real_name": "Alice Liddell" }
            }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/users.info").query_param("user", "U2");
            then.status(200).json_body(json!({
                "ok": true,
                "user": { "name": "bob", "real_name": "", "profile": { "display_name": "Bobby" } }
            }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/users.info").query_param("user", "U3");
            then.status(200).json_body(json!({ "ok": true, "user": {} }));
        });

        let slack = client(&server);
        let name = |id: &str| {
            let actor = ActorId::new(id).unwrap();
            let slack = &slack;
            async move { slack.display_name(&actor).await }
        };
        assert_eq!(name("U1").await.unwrap(), "Alice Liddell");
        assert_eq!(name("U2").await.unwrap(), "Bobby");
        assert!(matches!(name("U3").await, Err(IdentityError::NotFound(_))));
    }
}
