//! File-backed devices for terminals without camera or microphone access.
//!
//! - [`JpegFileDevice`] serves a JPEG on disk as the current frame. The file is
//!   re-read on every grab, so an external tool can keep overwriting it.
//! - [`WavFileMicrophone`] plays a WAV file into the recorder in chunks.
//! - [`NoDevice`] stands for an absent capability.

use std::path::{Path, PathBuf};

use tokio::sync::mpsc;

use crate::error::CaptureError;

use super::{AudioDevice, AudioFormat, AudioStream, FrameDevice, Permission, SourceKind};

const JPEG_SOI: [u8; 2] = [0xff, 0xd8];

/// Default chunk size in frames, about a quarter second at 16 kHz.
pub const DEFAULT_CHUNK_FRAMES: usize = 4096;

fn io_to_capture(kind: SourceKind, path: &Path, e: std::io::Error) -> CaptureError {
    if e.kind() == std::io::ErrorKind::NotFound {
        CaptureError::Unsupported {
            kind,
            detail: format!("no device at {}", path.display()),
        }
    } else {
        CaptureError::Device {
            kind,
            detail: format!("{}: {}", path.display(), e),
        }
    }
}

pub struct JpegFileDevice {
    kind: SourceKind,
    path: PathBuf,
    permission: Permission,
    open: bool,
}

impl JpegFileDevice {
    pub fn new(kind: SourceKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
            permission: Permission::Granted,
            open: false,
        }
    }

    /// Override the answer to permission queries.
    pub fn with_permission(mut self, permission: Permission) -> Self {
        self.permission = permission;
        self
    }

    fn read_jpeg(&self) -> Result<Vec<u8>, CaptureError> {
        let bytes = std::fs::read(&self.path).map_err(|e| io_to_capture(self.kind, &self.path, e))?;
        if !bytes.starts_with(&JPEG_SOI) {
            return Err(CaptureError::Device {
                kind: self.kind,
                detail: format!("{} is not a JPEG image", self.path.display()),
            });
        }
        Ok(bytes)
    }
}

impl FrameDevice for JpegFileDevice {
    fn permission(&self) -> Permission {
        self.permission.clone()
    }

    fn open(&mut self) -> Result<(), CaptureError> {
        self.read_jpeg()?;
        self.open = true;
        Ok(())
    }

    fn grab_jpeg(&mut self) -> Result<Vec<u8>, CaptureError> {
        if !self.open {
            return Err(CaptureError::NotActive(self.kind));
        }
        self.read_jpeg()
    }

    fn close(&mut self) {
        self.open = false;
    }
}

pub struct WavFileMicrophone {
    path: PathBuf,
    chunk_frames: usize,
    permission: Permission,
}

impl WavFileMicrophone {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            chunk_frames: DEFAULT_CHUNK_FRAMES,
            permission: Permission::Granted,
        }
    }

    pub fn chunk_frames(mut self, frames: usize) -> Self {
        self.chunk_frames = frames.max(1);
        self
    }

    pub fn with_permission(mut self, permission: Permission) -> Self {
        self.permission = permission;
        self
    }

    fn read_samples(&self) -> Result<(AudioFormat, Vec<i16>), CaptureError> {
        let kind = SourceKind::Audio;
        let reader = hound::WavReader::open(&self.path).map_err(|e| match e {
            hound::Error::IoError(io) => io_to_capture(kind, &self.path, io),
            other => CaptureError::Device {
                kind,
                detail: format!("{}: {}", self.path.display(), other),
            },
        })?;
        let spec = reader.spec();
        let format = AudioFormat {
            sample_rate: spec.sample_rate,
            channels: spec.channels,
        };
        let decode_err = |e: hound::Error| CaptureError::Device {
            kind,
            detail: e.to_string(),
        };

        let samples = match (spec.sample_format, spec.bits_per_sample) {
            (hound::SampleFormat::Int, 16) => reader
                .into_samples::<i16>()
                .collect::<Result<Vec<_>, _>>()
                .map_err(decode_err)?,
            (hound::SampleFormat::Int, bits) => reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| rescale_to_i16(v, bits)))
                .collect::<Result<Vec<_>, _>>()
                .map_err(decode_err)?,
            (hound::SampleFormat::Float, _) => reader
                .into_samples::<f32>()
                .map(|s| s.map(|v| (v.clamp(-1.0, 1.0) * i16::MAX as f32) as i16))
                .collect::<Result<Vec<_>, _>>()
                .map_err(decode_err)?,
        };
        Ok((format, samples))
    }
}

fn rescale_to_i16(v: i32, bits: u16) -> i16 {
    if bits > 16 {
        (v >> (bits - 16)) as i16
    } else {
        (v << (16 - bits)) as i16
    }
}

impl AudioDevice for WavFileMicrophone {
    fn permission(&self) -> Permission {
        self.permission.clone()
    }

    fn open(&mut self) -> Result<AudioStream, CaptureError> {
        let (format, samples) = self.read_samples()?;
        let (tx, rx) = mpsc::unbounded_channel();
        let chunk_len = self.chunk_frames * format.channels.max(1) as usize;
        for chunk in samples.chunks(chunk_len) {
            // The receiver is still in scope, so this cannot fail.
            let _ = tx.send(chunk.to_vec());
        }
        tracing::debug!(
            path = %self.path.display(),
            samples = samples.len(),
            "microphone file queued"
        );
        Ok(AudioStream { format, chunks: rx })
    }
}

/// A capability that is not available on this system.
pub struct NoDevice {
    kind: SourceKind,
}

impl NoDevice {
    pub fn new(kind: SourceKind) -> Self {
        Self { kind }
    }

    fn unsupported(&self) -> CaptureError {
        CaptureError::Unsupported {
            kind: self.kind,
            detail: format!("no {} configured", self.kind.device_label().to_lowercase()),
        }
    }
}

impl FrameDevice for NoDevice {
    fn open(&mut self) -> Result<(), CaptureError> {
        Err(self.unsupported())
    }

    fn grab_jpeg(&mut self) -> Result<Vec<u8>, CaptureError> {
        Err(self.unsupported())
    }

    fn close(&mut self) {}
}

impl AudioDevice for NoDevice {
    fn open(&mut self) -> Result<AudioStream, CaptureError> {
        Err(self.unsupported())
    }
}
