//! Error types for every layer of the console.
//!
//! None of these are fatal: each one ends up as a diagnostic log entry and a
//! user-visible state, and the user recovers manually (reconnect, re-grant a
//! permission, resend).

use std::time::Duration;

use thiserror::Error;

use crate::capture::SourceKind;

/// Failure to start or flush a capture source.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The user (or platform) refused access to the device.
    #[error("{0} permission denied")]
    PermissionDenied(SourceKind),
    /// The device is absent or the platform lacks the capability.
    #[error("{kind} not supported: {detail}")]
    Unsupported { kind: SourceKind, detail: String },
    /// `start` was called on a source that is already running.
    #[error("{0} is already active")]
    AlreadyActive(SourceKind),
    /// A payload was requested from a source that is not running.
    #[error("{0} is not active")]
    NotActive(SourceKind),
    /// The device was opened but failed while delivering data.
    #[error("{kind} device error: {detail}")]
    Device { kind: SourceKind, detail: String },
    /// The recorded samples could not be encoded into a clip.
    #[error("failed to encode {kind} clip: {detail}")]
    Encode { kind: SourceKind, detail: String },
}

impl CaptureError {
    /// The message shown in the blocking alert the console raises.
    pub fn user_hint(&self) -> String {
        match self {
            CaptureError::PermissionDenied(kind) | CaptureError::Unsupported { kind, .. } => format!(
                "{} access is required for this feature. Please grant permission and try again.",
                kind.device_label()
            ),
            other => other.to_string(),
        }
    }
}

/// Failure to bring a session to the open state.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The handshake failed (DNS, TCP, TLS, HTTP upgrade rejected, bad URL).
    #[error("transport error: {0}")]
    Transport(String),
    /// The peer closed the connection before the session opened.
    #[error("connection closed before opening")]
    ClosedBeforeOpen,
    /// The attempt did not reach the open state in time and was aborted.
    #[error("connection timeout after {}s", .0.as_secs_f32())]
    Timeout(Duration),
}

/// An inbound frame that could not be decoded.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("binary frame is not UTF-8")]
    NotUtf8,
}

/// Failure to transmit an outbound message.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("not connected")]
    NotConnected,
    #[error("could not serialize request: {0}")]
    Serialize(#[from] serde_json::Error),
    /// The session task has already exited.
    #[error("session channel closed")]
    ChannelClosed,
}

/// An outbound message was composed with nothing in it.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ComposeError {
    #[error("message must carry text or an attachment")]
    Empty,
}

/// Failure to load the console configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// Crate-level error that any of the layer errors converts into.
#[derive(Debug, Error)]
pub enum LiveError {
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Connect(#[from] ConnectError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Send(#[from] SendError),
    #[error(transparent)]
    Compose(#[from] ComposeError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Input rejected before any component was invoked.
    #[error("{0}")]
    Validation(String),
}
