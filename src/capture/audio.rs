//! Microphone recording into a single WAV clip.
//!
//! While active, a recorder task drains the device's chunk channel into a
//! buffer. `stop_and_flush` signals the task, collects every chunk recorded so
//! far (including chunks still queued) and encodes them as 16-bit PCM WAV.

use std::io::Cursor;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::diagnostics::DiagnosticLog;
use crate::error::CaptureError;

use super::{check_permission, AudioDevice, AudioFormat, SourceKind};

/// Average magnitude of interleaved PCM, normalised to 0..1.
pub fn audio_level(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|s| (*s as f64).abs()).sum();
    ((sum / samples.len() as f64) / i16::MAX as f64).min(1.0) as f32
}

struct Recording {
    format: AudioFormat,
    stop_tx: oneshot::Sender<()>,
    task: JoinHandle<Vec<i16>>,
}

pub struct AudioSource {
    device: Box<dyn AudioDevice>,
    recording: Option<Recording>,
    /// f32 bits of the level of the most recent chunk.
    level: Arc<AtomicU32>,
}

impl AudioSource {
    pub fn new(device: Box<dyn AudioDevice>) -> Self {
        Self {
            device,
            recording: None,
            level: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn is_active(&self) -> bool {
        self.recording.is_some()
    }

    /// Level of the latest recorded chunk (0..1).
    pub fn level(&self) -> f32 {
        f32::from_bits(self.level.load(Ordering::Relaxed))
    }

    /// Begin recording. Must be called from within a tokio runtime.
    pub fn start(&mut self, log: &mut DiagnosticLog) -> Result<(), CaptureError> {
        if self.recording.is_some() {
            return Err(CaptureError::AlreadyActive(SourceKind::Audio));
        }
        check_permission(SourceKind::Audio, self.device.permission(), log)?;
        let stream = self.device.open()?;

        let (stop_tx, stop_rx) = oneshot::channel();
        self.level.store(0f32.to_bits(), Ordering::Relaxed);
        let task = tokio::spawn(record(stream.chunks, stop_rx, Arc::clone(&self.level)));
        self.recording = Some(Recording {
            format: stream.format,
            stop_tx,
            task,
        });
        Ok(())
    }

    /// Release the microphone and discard anything recorded.
    pub fn stop(&mut self) {
        if let Some(rec) = self.recording.take() {
            let _ = rec.stop_tx.send(());
            rec.task.abort();
        }
    }

    /// Stop recording and encode everything captured into one WAV clip.
    pub async fn stop_and_flush(&mut self) -> Result<Vec<u8>, CaptureError> {
        let rec = self
            .recording
            .take()
            .ok_or(CaptureError::NotActive(SourceKind::Audio))?;
        let _ = rec.stop_tx.send(());
        let samples = rec.task.await.map_err(|e| CaptureError::Device {
            kind: SourceKind::Audio,
            detail: e.to_string(),
        })?;
        encode_wav(rec.format, &samples)
    }
}

impl Drop for AudioSource {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn record(
    mut chunks: mpsc::UnboundedReceiver<Vec<i16>>,
    mut stop_rx: oneshot::Receiver<()>,
    level: Arc<AtomicU32>,
) -> Vec<i16> {
    let mut samples = Vec::new();
    loop {
        tokio::select! {
            _ = &mut stop_rx => break,
            chunk = chunks.recv() => match chunk {
                Some(chunk) => {
                    level.store(audio_level(&chunk).to_bits(), Ordering::Relaxed);
                    samples.extend_from_slice(&chunk);
                }
                None => return samples,
            },
        }
    }
    // Final flush of whatever the device queued before the stop.
    while let Ok(chunk) = chunks.try_recv() {
        samples.extend_from_slice(&chunk);
    }
    samples
}

/// Encode interleaved 16-bit PCM as a WAV file in memory.
pub fn encode_wav(format: AudioFormat, samples: &[i16]) -> Result<Vec<u8>, CaptureError> {
    let spec = hound::WavSpec {
        channels: format.channels,
        sample_rate: format.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let encode_err = |e: hound::Error| CaptureError::Encode {
        kind: SourceKind::Audio,
        detail: e.to_string(),
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).map_err(encode_err)?;
        for s in samples {
            writer.write_sample(*s).map_err(encode_err)?;
        }
        writer.finalize().map_err(encode_err)?;
    }
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{AudioStream, Permission};

    const FORMAT: AudioFormat = AudioFormat {
        sample_rate: 16_000,
        channels: 1,
    };

    /// Microphone whose chunks are pushed by the test.
    struct FakeMic {
        feed: Option<mpsc::UnboundedReceiver<Vec<i16>>>,
        permission: Permission,
    }

    impl AudioDevice for FakeMic {
        fn permission(&self) -> Permission {
            self.permission.clone()
        }
        fn open(&mut self) -> Result<AudioStream, CaptureError> {
            let chunks = self.feed.take().ok_or(CaptureError::Device {
                kind: SourceKind::Audio,
                detail: "already opened".into(),
            })?;
            Ok(AudioStream {
                format: FORMAT,
                chunks,
            })
        }
    }

    fn mic(permission: Permission) -> (AudioSource, mpsc::UnboundedSender<Vec<i16>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let dev = FakeMic {
            feed: Some(rx),
            permission,
        };
        (AudioSource::new(Box::new(dev)), tx)
    }

    #[test]
    fn test_level_of_silence_is_zero() {
        assert_eq!(audio_level(&[]), 0.0);
        assert_eq!(audio_level(&[0, 0, 0]), 0.0);
    }

    #[test]
    fn test_level_of_full_scale_is_one() {
        let level = audio_level(&[i16::MAX, -i16::MAX]);
        assert!((level - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_encode_wav_header_and_length() {
        let wav = encode_wav(FORMAT, &[1, 2, 3, 4]).unwrap();
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        let reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
        assert_eq!(reader.spec().bits_per_sample, 16);
        assert_eq!(reader.len(), 4);
    }

    #[tokio::test]
    async fn test_flush_collects_all_chunks() {
        let (mut src, tx) = mic(Permission::Granted);
        src.start(&mut DiagnosticLog::new()).unwrap();
        tx.send(vec![100, 200]).unwrap();
        tx.send(vec![300]).unwrap();

        let wav = src.stop_and_flush().await.unwrap();
        assert!(!src.is_active());

        let reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
        assert_eq!(reader.spec().sample_rate, 16_000);
        let samples: Vec<i16> = reader.into_samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![100, 200, 300]);
    }

    #[tokio::test]
    async fn test_flush_when_inactive_errors() {
        let (mut src, _tx) = mic(Permission::Granted);
        assert!(matches!(
            src.stop_and_flush().await,
            Err(CaptureError::NotActive(SourceKind::Audio))
        ));
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let (mut src, _tx) = mic(Permission::Granted);
        src.stop();
        src.start(&mut DiagnosticLog::new()).unwrap();
        src.stop();
        src.stop();
        assert!(!src.is_active());
    }

    #[tokio::test]
    async fn test_denied_microphone() {
        let (mut src, _tx) = mic(Permission::Denied);
        let err = src.start(&mut DiagnosticLog::new()).unwrap_err();
        assert!(matches!(err, CaptureError::PermissionDenied(SourceKind::Audio)));
        assert!(err.user_hint().contains("grant permission"));
    }
}
