//! Slash-command receiver.
//!
//! `POST /slack/commands` accepts Slack's form-encoded command payload,
//! verifies its signature, and queues a [`TriggerEvent`] for the
//! [`CommandInbox`]. The HTTP answer goes back before anything runs; Slack
//! gives up on a command after three seconds.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Router,
};
use pipeline::{ActorId, ChannelId, CommandContext, EventSource, PipelineKind, TriggerEvent};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::signature::verify_signature;

pub const COMMANDS_PATH: &str = "/slack/commands";

const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";
const SIGNATURE_HEADER: &str = "x-slack-signature";

/// The three commands the bot registers.
pub fn kind_for_command(command: &str) -> Option<PipelineKind> {
    match command.trim() {
        "/commit-summary" => Some(PipelineKind::Commits),
        "/summarize" => Some(PipelineKind::ChannelHistory),
        "/lookup" => Some(PipelineKind::Lookup),
        _ => None,
    }
}

/// Fields of Slack's slash-command payload that the bot reads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SlashCommand {
    pub command: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub user_id: String,
}

impl SlashCommand {
    fn into_event(self) -> Option<TriggerEvent> {
        let kind = kind_for_command(&self.command)?;
        let reply_channel = ChannelId::new(self.channel_id)?;
        Some(TriggerEvent::command(
            kind,
            CommandContext {
                user: ActorId::new(self.user_id),
                reply_channel,
                text: self.text,
            },
        ))
    }
}

// ---------------------------------------------------------------------------
// Inbox
// ---------------------------------------------------------------------------

pub type CommandSender = mpsc::Sender<TriggerEvent>;

/// Receiving half of the command queue.
pub struct CommandInbox {
    rx: mpsc::Receiver<TriggerEvent>,
}

/// A bounded queue between the HTTP receiver and the coordinator loop.
pub fn command_inbox(capacity: usize) -> (CommandSender, CommandInbox) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (tx, CommandInbox { rx })
}

#[async_trait]
impl EventSource for CommandInbox {
    async fn next_event(&mut self) -> Option<TriggerEvent> {
        self.rx.recv().await
    }
}

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct CommandsState {
    signing_secret: Arc<str>,
    sender: CommandSender,
}

impl CommandsState {
    pub fn new(signing_secret: &str, sender: CommandSender) -> Self {
        Self {
            signing_secret: Arc::from(signing_secret),
            sender,
        }
    }
}

pub fn commands_router(state: CommandsState) -> Router {
    Router::new()
        .route(COMMANDS_PATH, post(handle_command))
        .with_state(state)
}

/// Binds `addr` and serves the command route until `shutdown` resolves.
pub async fn serve_commands(
    addr: SocketAddr,
    state: CommandsState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, path = COMMANDS_PATH, "Slash-command receiver listening");
    axum::serve(listener, commands_router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

pub(crate) async fn handle_command(
    State(state): State<CommandsState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, String) {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    if let Err(e) = verify_signature(
        &state.signing_secret,
        header(TIMESTAMP_HEADER),
        header(SIGNATURE_HEADER),
        &body,
        chrono::Utc::now().timestamp(),
    ) {
        warn!(error = %e, "Rejected slash command");
        return (StatusCode::UNAUTHORIZED, "invalid request signature".to_string());
    }

    let command: SlashCommand = match serde_urlencoded::from_bytes(&body) {
        Ok(command) => command,
        Err(e) => {
            warn!(error = %e, "Malformed slash command payload");
            return (StatusCode::BAD_REQUEST, "malformed command payload".to_string());
        }
    };

    let name = command.command.clone();
    let Some(event) = command.into_event() else {
        info!(command = %name, "Unknown slash command");
        return (StatusCode::NOT_FOUND, format!("unknown command {name}"));
    };

    info!(command = %name, pipeline = %event.kind, "Slash command accepted");
    match state.sender.try_send(event) {
        Ok(()) => (StatusCode::OK, String::new()),
        Err(e) => {
            warn!(command = %name, error = %e, "Command queue unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "busy, try again shortly".to_string(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::sign;
    use axum::http::HeaderValue;
    use pipeline::TriggerOrigin;

    const SECRET: &str = "signing-secret";

    fn signed_headers(body: &[u8]) -> HeaderMap {
        let ts = chrono::Utc::now().timestamp().to_string();
        let mut headers = HeaderMap::new();
        headers.insert(TIMESTAMP_HEADER, HeaderValue::from_str(&ts).unwrap());
        headers.insert(
            SIGNATURE_HEADER,
            HeaderValue::from_str(&sign(SECRET, &ts, body)).unwrap(),
        );
        headers
    }

    async fn send(state: &CommandsState, headers: HeaderMap, body: &'static [u8]) -> StatusCode {
        handle_command(State(state.clone()), headers, Bytes::from_static(body))
            .await
            .0
    }

    #[tokio::test]
    async fn test_signed_lookup_is_queued_with_context() {
        let (tx, mut inbox) = command_inbox(4);
        let state = CommandsState::new(SECRET, tx);
        let body: &'static [u8] =
            b"command=%2Flookup&text=Acme+Games&channel_id=C42&user_id=U7&team_id=T1";

        assert_eq!(send(&state, signed_headers(body), body).await, StatusCode::OK);

        let event = inbox.next_event().await.unwrap();
        assert_eq!(event.kind, PipelineKind::Lookup);
        match event.origin {
            TriggerOrigin::Command(ctx) => {
                assert_eq!(ctx.reply_channel.as_str(), "C42");
                assert_eq!(ctx.user.as_ref().map(|u| u.as_str()), Some("U7"));
                assert_eq!(ctx.text, "Acme Games");
            }
            other => panic!("unexpected origin {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_bad_signature_is_unauthorized_and_not_queued() {
        let (tx, mut inbox) = command_inbox(4);
        let state = CommandsState::new(SECRET, tx);
        let body: &'static [u8] = b"command=%2Fsummarize&channel_id=C1";
        let mut headers = signed_headers(body);
        headers.insert(SIGNATURE_HEADER, HeaderValue::from_static("v0=deadbeef"));

        assert_eq!(send(&state, headers, body).await, StatusCode::UNAUTHORIZED);
        drop(state);
        assert!(inbox.next_event().await.is_none());
    }

    #[tokio::test]
    async fn test_unknown_command_is_not_found() {
        let (tx, _inbox) = command_inbox(4);
        let state = CommandsState::new(SECRET, tx);
        let body: &'static [u8] = b"command=%2Fdance&channel_id=C1";

        assert_eq!(send(&state, signed_headers(body), body).await, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_full_queue_answers_unavailable() {
        let (tx, _inbox) = command_inbox(1);
        let state = CommandsState::new(SECRET, tx);
        let body: &'static [u8] = b"command=%2Fcommit-summary&channel_id=C1";

        assert_eq!(send(&state, signed_headers(body), body).await, StatusCode::OK);
        assert_eq!(
            send(&state, signed_headers(body), body).await,
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_command_names_map_to_pipelines() {
        assert_eq!(kind_for_command("/commit-summary"), Some(PipelineKind::Commits));
        assert_eq!(kind_for_command("/summarize"), Some(PipelineKind::ChannelHistory));
        assert_eq!(kind_for_command("/lookup"), Some(PipelineKind::Lookup));
        assert_eq!(kind_for_command("/other"), None);
    }
}
