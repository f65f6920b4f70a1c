//! Session state and the explicit context every component is handed.
//!
//! The state is mutated only from the single event loop, so it is passed as
//! `&mut` rather than shared behind a lock. The fields that carry the
//! connection invariant are private: `connected` can only become true
//! together with a stored handle, and every transition out of `Connecting`
//! clears `connection_in_progress`.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::chat::ChatLog;
use crate::diagnostics::DiagnosticLog;

/// Which panel the user is currently working in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Text,
    Audio,
    Video,
    Screen,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Text => write!(f, "text"),
            Mode::Audio => write!(f, "audio"),
            Mode::Video => write!(f, "video"),
            Mode::Screen => write!(f, "screen"),
        }
    }
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" => Ok(Mode::Text),
            "audio" => Ok(Mode::Audio),
            "video" => Ok(Mode::Video),
            "screen" => Ok(Mode::Screen),
            other => Err(format!("Unknown mode: {}", other)),
        }
    }
}

/// Lifecycle of one logical connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionStatus {
    Connecting,
    Open,
    Closed,
    Failed,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Connecting => write!(f, "Connecting..."),
            SessionStatus::Open => write!(f, "Connected"),
            SessionStatus::Closed => write!(f, "Disconnected"),
            SessionStatus::Failed => write!(f, "Connection Failed"),
        }
    }
}

/// Read-only identity of the session the manager currently owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionHandle {
    pub id: Uuid,
    pub status: SessionStatus,
}

#[derive(Debug, Default)]
pub struct SessionState {
    connected: bool,
    connection_in_progress: bool,
    last_status: Option<SessionStatus>,
    transport_handle: Option<SessionHandle>,
    pub active_mode: Mode,
    pub audio_active: bool,
    pub video_active: bool,
    pub screen_active: bool,
    /// Held in memory only for the lifetime of the console.
    pub credential: String,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connected(&self) -> bool {
        self.connected
    }

    pub fn connection_in_progress(&self) -> bool {
        self.connection_in_progress
    }

    pub fn transport_handle(&self) -> Option<&SessionHandle> {
        self.transport_handle.as_ref()
    }

    /// Status of the latest session, `None` before the first attempt.
    pub fn status(&self) -> Option<SessionStatus> {
        self.last_status
    }

    /// `Idle|Closed|Failed -> Connecting`.
    pub fn begin_connect(&mut self) {
        self.connected = false;
        self.transport_handle = None;
        self.connection_in_progress = true;
        self.last_status = Some(SessionStatus::Connecting);
    }

    /// `Connecting -> Open`.
    pub fn mark_open(&mut self, id: Uuid) {
        self.connection_in_progress = false;
        self.connected = true;
        self.transport_handle = Some(SessionHandle {
            id,
            status: SessionStatus::Open,
        });
        self.last_status = Some(SessionStatus::Open);
    }

    /// `Connecting -> Failed` (error, early close or timeout).
    pub fn mark_failed(&mut self) {
        self.connection_in_progress = false;
        self.connected = false;
        self.transport_handle = None;
        self.last_status = Some(SessionStatus::Failed);
    }

    /// `Open -> Closed` (explicit disconnect, remote close or transport error).
    pub fn mark_closed(&mut self) {
        self.connection_in_progress = false;
        self.connected = false;
        self.transport_handle = None;
        self.last_status = Some(SessionStatus::Closed);
    }

    /// Human-readable status line for the connection indicator.
    pub fn status_label(&self) -> String {
        match self.last_status {
            Some(status) => status.to_string(),
            None => "Disconnected".to_string(),
        }
    }
}

/// Everything a handler may read or write, passed explicitly.
#[derive(Debug, Default)]
pub struct Context {
    pub state: SessionState,
    pub log: DiagnosticLog,
    pub chat: ChatLog,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sinks(log: DiagnosticLog, chat: ChatLog) -> Self {
        Self {
            state: SessionState::new(),
            log,
            chat,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_default_state_is_idle() {
        let s = SessionState::new();
        assert!(!s.connected());
        assert!(!s.connection_in_progress());
        assert!(s.transport_handle().is_none());
        assert_eq!(s.active_mode, Mode::Text);
        assert_eq!(s.status_label(), "Disconnected");
    }

    #[test]
    fn test_open_stores_handle() {
        let mut s = SessionState::new();
        let id = Uuid::new_v4();
        s.begin_connect();
        assert!(s.connection_in_progress());
        s.mark_open(id);
        assert!(s.connected());
        assert!(!s.connection_in_progress());
        assert_eq!(s.transport_handle().map(|h| h.id), Some(id));
    }

    #[test]
    fn test_failed_clears_progress() {
        let mut s = SessionState::new();
        s.begin_connect();
        s.mark_failed();
        assert!(!s.connection_in_progress());
        assert!(!s.connected());
        assert_eq!(s.status(), Some(SessionStatus::Failed));
    }

    #[test]
    fn test_mode_parse_and_display() {
        assert_eq!("Video".parse::<Mode>(), Ok(Mode::Video));
        assert_eq!(" screen ".parse::<Mode>(), Ok(Mode::Screen));
        assert!("holo".parse::<Mode>().is_err());
        assert_eq!(Mode::Audio.to_string(), "audio");
    }

    #[derive(Debug, Clone)]
    enum Step {
        Begin,
        Open,
        Fail,
        Close,
    }

    fn step() -> impl Strategy<Value = Step> {
        prop_oneof![
            Just(Step::Begin),
            Just(Step::Open),
            Just(Step::Fail),
            Just(Step::Close),
        ]
    }

    proptest! {
        #[test]
        fn prop_connected_and_in_progress_never_both_settled(steps in prop::collection::vec(step(), 0..64)) {
            let mut s = SessionState::new();
            for st in steps {
                match st {
                    Step::Begin => { s.begin_connect(); continue; }
                    Step::Open => s.mark_open(Uuid::new_v4()),
                    Step::Fail => s.mark_failed(),
                    Step::Close => s.mark_closed(),
                }
                prop_assert!(!(s.connected() && s.connection_in_progress()));
                prop_assert_eq!(s.connected(), s.transport_handle().is_some());
            }
        }
    }
}
