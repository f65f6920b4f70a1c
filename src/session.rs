//! Live session lifecycle: connect with a hard timeout, send, disconnect, and
//! the per-session transport task.
//!
//! ## Design
//! - `SessionManager` owns at most one [`Session`]; a reconnect replaces it.
//! - Each open session runs one tokio task that multiplexes the outbound
//!   channel and the inbound WebSocket stream with `tokio::select!`.
//! - The task reports frames and closures on a shared event channel, tagged
//!   with the session id so events from a superseded session are ignored.
//! - Dropping the outbound sender makes the task send a Close frame and exit.
//!
//! ## State machine
//! `Idle -> Connecting -> {Open, Failed}`, `Open -> Closed`. The connect
//! timeout drops the pending handshake, which closes the TCP stream.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use uuid::Uuid;

use crate::error::{ConnectError, ParseError, SendError};
use crate::protocol::OutboundMessage;
use crate::state::Context;

type LiveStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const DEFAULT_ENDPOINT: &str =
    "wss://generativelanguage.googleapis.com/v1beta/models/gemini-pro:streamGenerateContent";

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Socket URL without the credential query.
    pub endpoint: String,
    /// Hard limit for reaching the open state.
    pub connect_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl SessionConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Connection URL with the credential embedded as the `key` query.
    /// The credential is percent-encoded.
    pub fn session_url(&self, credential: &str) -> String {
        self.with_key(&encode_query_value(credential))
    }

    /// The URL as it may appear in logs.
    pub fn redacted_url(&self) -> String {
        self.with_key("***")
    }

    fn with_key(&self, value: &str) -> String {
        let sep = if self.endpoint.contains('?') { '&' } else { '?' };
        format!("{}{}key={}", self.endpoint, sep, value)
    }
}

/// Percent-encode everything outside the RFC 3986 unreserved set.
fn encode_query_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

/// Something the transport task observed.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Frame { session: Uuid, text: String },
    /// Binary frame that is not valid UTF-8.
    Undecodable { session: Uuid, len: usize },
    Closed {
        session: Uuid,
        code: Option<u16>,
        reason: String,
    },
}

impl TransportEvent {
    pub fn session(&self) -> Uuid {
        match self {
            TransportEvent::Frame { session, .. }
            | TransportEvent::Undecodable { session, .. }
            | TransportEvent::Closed { session, .. } => *session,
        }
    }
}

/// One logical socket connection, owned by the manager.
pub struct Session {
    id: Uuid,
    outbound: mpsc::UnboundedSender<WsMessage>,
    task: JoinHandle<()>,
}

impl Session {
    fn spawn(ws: LiveStream, events: mpsc::UnboundedSender<TransportEvent>) -> Self {
        let id = Uuid::new_v4();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_session(id, ws, outbound_rx, events));
        Self { id, outbound, task }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Close locally: the task flushes a Close frame and exits on its own.
    fn close(self) {
        drop(self.outbound);
        drop(self.task);
    }
}

async fn run_session(
    id: Uuid,
    ws: LiveStream,
    mut outbound: mpsc::UnboundedReceiver<WsMessage>,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    let (mut sink, mut stream) = ws.split();

    loop {
        tokio::select! {
            cmd = outbound.recv() => {
                match cmd {
                    Some(msg) => {
                        if let Err(e) = sink.send(msg).await {
                            let _ = events.send(TransportEvent::Closed {
                                session: id,
                                code: None,
                                reason: e.to_string(),
                            });
                            break;
                        }
                    }
                    None => {
                        // Local disconnect; the manager already updated state.
                        let _ = sink.send(WsMessage::Close(None)).await;
                        let _ = sink.close().await;
                        tracing::debug!(session = %id, "session closed locally");
                        break;
                    }
                }
            }
            frame = stream.next() => {
                match frame {
                    Some(Ok(WsMessage::Text(text))) => {
                        let _ = events.send(TransportEvent::Frame { session: id, text });
                    }
                    Some(Ok(WsMessage::Binary(bytes))) => {
                        let len = bytes.len();
                        let event = match String::from_utf8(bytes) {
                            Ok(text) => TransportEvent::Frame { session: id, text },
                            Err(_) => TransportEvent::Undecodable { session: id, len },
                        };
                        let _ = events.send(event);
                    }
                    Some(Ok(WsMessage::Close(frame))) => {
                        let (code, reason) = match frame {
                            Some(cf) => (Some(u16::from(cf.code)), cf.reason.into_owned()),
                            None => (None, String::new()),
                        };
                        let _ = events.send(TransportEvent::Closed { session: id, code, reason });
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        let _ = events.send(TransportEvent::Closed {
                            session: id,
                            code: None,
                            reason: e.to_string(),
                        });
                        break;
                    }
                    None => {
                        let _ = events.send(TransportEvent::Closed {
                            session: id,
                            code: None,
                            reason: "stream ended".to_string(),
                        });
                        break;
                    }
                }
            }
        }
    }
}

pub struct SessionManager {
    config: SessionConfig,
    session: Option<Session>,
    events_tx: mpsc::UnboundedSender<TransportEvent>,
}

impl SessionManager {
    /// Create a manager and the receiving end of its event channel. The
    /// caller's event loop feeds every received event back into
    /// [`SessionManager::handle_event`].
    pub fn new(config: SessionConfig) -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        (
            Self {
                config,
                session: None,
                events_tx,
            },
            events_rx,
        )
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.session.as_ref().map(Session::id)
    }

    /// Open a new session, replacing any existing one.
    ///
    /// # Returns
    /// - `Ok(())`: the handshake completed; `ctx.state.connected()` is true.
    /// - `Err(ConnectError::Transport)`: the handshake failed.
    /// - `Err(ConnectError::ClosedBeforeOpen)`: the peer hung up mid-handshake.
    /// - `Err(ConnectError::Timeout)`: no open within `connect_timeout`; the
    ///   pending transport has been dropped.
    pub async fn connect(&mut self, ctx: &mut Context, credential: &str) -> Result<(), ConnectError> {
        if let Some(old) = self.session.take() {
            tracing::debug!(session = %old.id(), "superseding existing session");
            old.close();
        }

        let url = self.config.session_url(credential);
        ctx.state.begin_connect();
        ctx.log.info("Attempting to connect to Gemini API...");
        tracing::info!(url = %self.config.redacted_url(), "connecting");

        let attempt = tokio::time::timeout(
            self.config.connect_timeout,
            tokio_tungstenite::connect_async(url.as_str()),
        )
        .await;

        match attempt {
            Ok(Ok((ws, _response))) => {
                let session = Session::spawn(ws, self.events_tx.clone());
                ctx.state.mark_open(session.id());
                tracing::info!(session = %session.id(), "session open");
                self.session = Some(session);
                ctx.log.info("WebSocket connection established");
                Ok(())
            }
            Ok(Err(e)) => {
                ctx.state.mark_failed();
                let err = classify_handshake_error(e);
                ctx.log.error(format!("WebSocket error: {}", err));
                Err(err)
            }
            Err(_elapsed) => {
                ctx.state.mark_failed();
                ctx.log.error("Connection timeout");
                Err(ConnectError::Timeout(self.config.connect_timeout))
            }
        }
    }

    /// Close the active session. No-op when not connected.
    pub fn disconnect(&mut self, ctx: &mut Context) {
        let session = self.session.take();
        if !ctx.state.connected() {
            if let Some(stale) = session {
                stale.close();
            }
            return;
        }
        if let Some(session) = session {
            session.close();
        }
        ctx.state.mark_closed();
        ctx.log.info("Disconnected from Gemini API");
    }

    /// Serialize and transmit; `false` when not connected or the session is gone.
    pub fn send(&mut self, ctx: &mut Context, message: &OutboundMessage) -> bool {
        match self.try_send(ctx, message) {
            Ok(()) => {
                ctx.log.info("Sent message to Gemini API");
                true
            }
            Err(SendError::NotConnected) => {
                ctx.log.error("Cannot send message: Not connected to Gemini API");
                false
            }
            Err(e) => {
                ctx.log.error(format!("Error sending message: {}", e));
                false
            }
        }
    }

    pub fn try_send(&mut self, ctx: &Context, message: &OutboundMessage) -> Result<(), SendError> {
        let session = match (&self.session, ctx.state.connected()) {
            (Some(session), true) => session,
            _ => return Err(SendError::NotConnected),
        };
        let json = message.to_json()?;
        session
            .outbound
            .send(WsMessage::Text(json))
            .map_err(|_| SendError::ChannelClosed)
    }

    /// Apply one transport event. Returns the frame text when it belongs to
    /// the current session and should be routed.
    pub fn handle_event(&mut self, ctx: &mut Context, event: TransportEvent) -> Option<String> {
        if self.session_id() != Some(event.session()) {
            tracing::debug!(session = %event.session(), "ignoring event from superseded session");
            return None;
        }

        match event {
            TransportEvent::Frame { text, .. } => Some(text),
            TransportEvent::Undecodable { len, .. } => {
                ctx.log.error(format!(
                    "Error parsing message: {} ({} bytes)",
                    ParseError::NotUtf8,
                    len
                ));
                None
            }
            TransportEvent::Closed { code, reason, .. } => {
                self.session = None;
                ctx.state.mark_closed();
                let code = code.map(|c| c.to_string()).unwrap_or_else(|| "none".to_string());
                if reason.is_empty() {
                    ctx.log.info(format!("WebSocket connection closed. Code: {}", code));
                } else {
                    ctx.log.info(format!(
                        "WebSocket connection closed. Code: {} ({})",
                        code, reason
                    ));
                }
                None
            }
        }
    }
}

fn classify_handshake_error(e: tokio_tungstenite::tungstenite::Error) -> ConnectError {
    use tokio_tungstenite::tungstenite::error::ProtocolError;
    use tokio_tungstenite::tungstenite::Error as WsError;
    match e {
        WsError::ConnectionClosed
        | WsError::AlreadyClosed
        | WsError::Protocol(ProtocolError::HandshakeIncomplete) => ConnectError::ClosedBeforeOpen,
        WsError::Io(io) if io.kind() == std::io::ErrorKind::UnexpectedEof => {
            ConnectError::ClosedBeforeOpen
        }
        other => ConnectError::Transport(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_url_embeds_credential() {
        let cfg = SessionConfig::new("wss://example.test/live");
        assert_eq!(cfg.session_url("abc"), "wss://example.test/live?key=abc");
    }

    #[test]
    fn test_session_url_appends_to_existing_query() {
        let cfg = SessionConfig::new("wss://example.test/live?alt=json");
        assert_eq!(cfg.session_url("abc"), "wss://example.test/live?alt=json&key=abc");
    }

    #[test]
    fn test_session_url_encodes_reserved_characters() {
        let cfg = SessionConfig::new("wss://example.test/live");
        assert_eq!(
            cfg.session_url("a&b#c d/é"),
            "wss://example.test/live?key=a%26b%23c%20d%2F%C3%A9"
        );
        assert_eq!(cfg.session_url("AIza-_.~9"), "wss://example.test/live?key=AIza-_.~9");
    }

    #[test]
    fn test_redacted_url_hides_credential() {
        let cfg = SessionConfig::default();
        assert!(cfg.redacted_url().ends_with("?key=***"));
        assert!(cfg.redacted_url().starts_with("wss://generativelanguage.googleapis.com/"));
    }

    #[test]
    fn test_default_timeout_is_ten_seconds() {
        assert_eq!(SessionConfig::default().connect_timeout, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_send_while_disconnected_returns_false() {
        let (mut manager, _rx) = SessionManager::new(SessionConfig::default());
        let mut ctx = Context::new();
        let msg = OutboundMessage::text("hello").unwrap();
        assert!(!manager.send(&mut ctx, &msg));
        assert!(ctx
            .log
            .contains(crate::diagnostics::Severity::Error, "Not connected"));
    }

    #[tokio::test]
    async fn test_disconnect_when_idle_is_noop() {
        let (mut manager, _rx) = SessionManager::new(SessionConfig::default());
        let mut ctx = Context::new();
        manager.disconnect(&mut ctx);
        manager.disconnect(&mut ctx);
        assert!(ctx.log.is_empty());
        assert!(!ctx.state.connected());
    }

    #[tokio::test]
    async fn test_events_for_unknown_session_ignored() {
        let (mut manager, _rx) = SessionManager::new(SessionConfig::default());
        let mut ctx = Context::new();
        let out = manager.handle_event(
            &mut ctx,
            TransportEvent::Frame {
                session: Uuid::new_v4(),
                text: "{}".into(),
            },
        );
        assert!(out.is_none());
        assert!(ctx.log.is_empty());
    }
}
