//! # Capture sources
//!
//! Device-backed producers of payloads that can be attached to a message:
//! a JPEG still from a camera or a display, or a WAV clip from a microphone.
//!
//! ## Responsibility
//! Permission checks, opening and releasing the device, and producing an
//! encoded payload on demand.
//!
//! ## Guarantees
//! - `stop()` is idempotent; stopping an inactive source does nothing.
//! - `start()` on an active source is out of contract and returns
//!   [`CaptureError::AlreadyActive`]; callers check `is_active()` first.
//! - Frame capture on an inactive source returns `None`.
//!
//! ## NOT Responsible For
//! - Rendering previews or level visualizations
//! - Deciding whether a payload is sent (that is the console)

pub mod audio;
pub mod device;
pub mod frame;

pub use audio::{audio_level, AudioSource};
pub use device::{JpegFileDevice, NoDevice, WavFileMicrophone};
pub use frame::FrameSource;

use tokio::sync::mpsc;

use crate::diagnostics::DiagnosticLog;
use crate::error::CaptureError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Audio,
    Video,
    Screen,
}

impl SourceKind {
    /// Name of the physical device, as shown to the user.
    pub fn device_label(&self) -> &'static str {
        match self {
            SourceKind::Audio => "Microphone",
            SourceKind::Video => "Camera",
            SourceKind::Screen => "Screen capture",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.device_label())
    }
}

/// Answer of a permission query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
    /// The user will be asked when the device is opened.
    Prompt,
    /// The platform cannot answer the query.
    Unknown(String),
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Permission::Granted => write!(f, "granted"),
            Permission::Denied => write!(f, "denied"),
            Permission::Prompt => write!(f, "prompt"),
            Permission::Unknown(reason) => write!(f, "unknown ({})", reason),
        }
    }
}

/// A camera or display that yields compressed stills.
pub trait FrameDevice: Send {
    fn permission(&self) -> Permission {
        Permission::Prompt
    }
    fn open(&mut self) -> Result<(), CaptureError>;
    /// Rasterize the current frame to JPEG.
    fn grab_jpeg(&mut self) -> Result<Vec<u8>, CaptureError>;
    /// Release the device. Must tolerate being called when not open.
    fn close(&mut self);
}

/// PCM layout of a microphone stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

/// An open microphone: interleaved 16-bit chunks until the device stops.
/// Dropping the receiver releases the device.
pub struct AudioStream {
    pub format: AudioFormat,
    pub chunks: mpsc::UnboundedReceiver<Vec<i16>>,
}

pub trait AudioDevice: Send {
    fn permission(&self) -> Permission {
        Permission::Prompt
    }
    fn open(&mut self) -> Result<AudioStream, CaptureError>;
}

/// Shared permission gate run before any device is opened.
pub(crate) fn check_permission(
    kind: SourceKind,
    permission: Permission,
    log: &mut DiagnosticLog,
) -> Result<(), CaptureError> {
    log.info(format!("Requesting {} access...", kind.device_label().to_lowercase()));
    match permission {
        Permission::Unknown(reason) => {
            log.warning(format!(
                "Could not check {} permission: {}",
                kind.device_label().to_lowercase(),
                reason
            ));
            Ok(())
        }
        Permission::Denied => {
            log.info(format!("{} permission status: denied", kind));
            Err(CaptureError::PermissionDenied(kind))
        }
        other => {
            log.info(format!("{} permission status: {}", kind, other));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Severity;

    #[test]
    fn test_denied_permission_is_an_error() {
        let mut log = DiagnosticLog::new();
        let err = check_permission(SourceKind::Video, Permission::Denied, &mut log).unwrap_err();
        assert!(matches!(err, CaptureError::PermissionDenied(SourceKind::Video)));
        assert!(log.contains(Severity::Info, "Camera permission status: denied"));
    }

    #[test]
    fn test_unknown_permission_warns_and_continues() {
        let mut log = DiagnosticLog::new();
        check_permission(
            SourceKind::Screen,
            Permission::Unknown("query unsupported".into()),
            &mut log,
        )
        .unwrap();
        assert!(log.contains(
            Severity::Warning,
            "Could not check screen capture permission: query unsupported"
        ));
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(SourceKind::Audio.to_string(), "Microphone");
        assert_eq!(SourceKind::Screen.device_label(), "Screen capture");
    }
}
