//! Still-frame sources: webcam and screen share.

use crate::diagnostics::DiagnosticLog;
use crate::error::CaptureError;

use super::{check_permission, FrameDevice, SourceKind};

pub struct FrameSource {
    kind: SourceKind,
    device: Box<dyn FrameDevice>,
    active: bool,
}

impl FrameSource {
    pub fn new(kind: SourceKind, device: Box<dyn FrameDevice>) -> Self {
        Self {
            kind,
            device,
            active: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn start(&mut self, log: &mut DiagnosticLog) -> Result<(), CaptureError> {
        if self.active {
            return Err(CaptureError::AlreadyActive(self.kind));
        }
        check_permission(self.kind, self.device.permission(), log)?;
        self.device.open()?;
        self.active = true;
        Ok(())
    }

    pub fn stop(&mut self) {
        if !self.active {
            return;
        }
        self.device.close();
        self.active = false;
    }

    /// Current frame as JPEG, or `None` when inactive or the grab failed.
    /// A failed grab is reported on `log`.
    pub fn capture_frame(&mut self, log: &mut DiagnosticLog) -> Option<Vec<u8>> {
        if !self.active {
            return None;
        }
        match self.device.grab_jpeg() {
            Ok(jpeg) => Some(jpeg),
            Err(e) => {
                let what = match self.kind {
                    SourceKind::Screen => "screen",
                    _ => "video",
                };
                log.error(format!("Error capturing {} frame: {}", what, e));
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::Permission;
    use crate::diagnostics::Severity;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FakeCamera {
        permission: Permission,
        closes: Arc<AtomicUsize>,
        open_fails: bool,
        grab_fails: bool,
    }

    impl FrameDevice for FakeCamera {
        fn permission(&self) -> Permission {
            self.permission.clone()
        }
        fn open(&mut self) -> Result<(), CaptureError> {
            if self.open_fails {
                Err(CaptureError::Unsupported {
                    kind: SourceKind::Video,
                    detail: "no camera".into(),
                })
            } else {
                Ok(())
            }
        }
        fn grab_jpeg(&mut self) -> Result<Vec<u8>, CaptureError> {
            if self.grab_fails {
                return Err(CaptureError::Device {
                    kind: SourceKind::Video,
                    detail: "sensor unplugged".into(),
                });
            }
            Ok(vec![0xff, 0xd8, 0xff, 0xd9])
        }
        fn close(&mut self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn camera(permission: Permission, open_fails: bool) -> (FrameSource, Arc<AtomicUsize>) {
        let closes = Arc::new(AtomicUsize::new(0));
        let dev = FakeCamera {
            permission,
            closes: Arc::clone(&closes),
            open_fails,
            grab_fails: false,
        };
        (FrameSource::new(SourceKind::Video, Box::new(dev)), closes)
    }

    #[test]
    fn test_capture_requires_active() {
        let (mut src, _) = camera(Permission::Granted, false);
        let mut log = DiagnosticLog::new();
        assert!(src.capture_frame(&mut log).is_none());
        src.start(&mut log).unwrap();
        assert_eq!(src.capture_frame(&mut log), Some(vec![0xff, 0xd8, 0xff, 0xd9]));
    }

    #[test]
    fn test_failed_grab_reaches_diagnostic_log() {
        let dev = FakeCamera {
            permission: Permission::Granted,
            closes: Arc::new(AtomicUsize::new(0)),
            open_fails: false,
            grab_fails: true,
        };
        let mut src = FrameSource::new(SourceKind::Video, Box::new(dev));
        let mut log = DiagnosticLog::new();
        src.start(&mut log).unwrap();

        assert!(src.capture_frame(&mut log).is_none());
        assert!(log.contains(
            Severity::Error,
            "Error capturing video frame: Camera device error: sensor unplugged"
        ));
        assert!(src.is_active());
    }

    #[test]
    fn test_stop_inactive_is_noop() {
        let (mut src, closes) = camera(Permission::Granted, false);
        src.stop();
        src.stop();
        assert_eq!(closes.load(Ordering::SeqCst), 0);
        assert!(!src.is_active());
    }

    #[test]
    fn test_stop_releases_once() {
        let (mut src, closes) = camera(Permission::Granted, false);
        src.start(&mut DiagnosticLog::new()).unwrap();
        src.stop();
        src.stop();
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_denied_permission_never_opens() {
        let (mut src, _) = camera(Permission::Denied, false);
        let err = src.start(&mut DiagnosticLog::new()).unwrap_err();
        assert!(matches!(err, CaptureError::PermissionDenied(SourceKind::Video)));
        assert!(!src.is_active());
    }

    #[test]
    fn test_open_failure_leaves_inactive() {
        let (mut src, _) = camera(Permission::Prompt, true);
        assert!(matches!(
            src.start(&mut DiagnosticLog::new()),
            Err(CaptureError::Unsupported { .. })
        ));
        assert!(!src.is_active());
    }

    #[test]
    fn test_start_twice_is_rejected() {
        let (mut src, _) = camera(Permission::Granted, false);
        let mut log = DiagnosticLog::new();
        src.start(&mut log).unwrap();
        assert!(matches!(src.start(&mut log), Err(CaptureError::AlreadyActive(_))));
    }
}
