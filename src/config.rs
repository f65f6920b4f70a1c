//! Console configuration: defaults, then an optional TOML file, then CLI flags.
//!
//! The API key is never a config field; `deny_unknown_fields`
//! rejects a file that tries to carry one.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::capture::device::DEFAULT_CHUNK_FRAMES;
use crate::cli::Args;
use crate::error::ConfigError;
use crate::session::{SessionConfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_ENDPOINT};
use crate::state::Mode;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConsoleConfig {
    pub endpoint: String,
    pub connect_timeout_secs: u64,
    /// Delay before the first frame is sent after a camera or screen starts.
    pub initial_frame_delay_ms: u64,
    pub audio_chunk_frames: usize,
    pub camera_image: Option<PathBuf>,
    pub screen_image: Option<PathBuf>,
    pub mic_wav: Option<PathBuf>,
    pub mode: Mode,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT.as_secs(),
            initial_frame_delay_ms: 1000,
            audio_chunk_frames: DEFAULT_CHUNK_FRAMES,
            camera_image: None,
            screen_image: None,
            mic_wav: None,
            mode: Mode::Text,
        }
    }
}

impl ConsoleConfig {
    pub fn from_toml_str(text: &str, origin: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_string(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let origin = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: origin.clone(),
            source,
        })?;
        Self::from_toml_str(&text, &origin)
    }

    /// Resolve the effective config for a command line.
    pub fn resolve(args: &Args) -> Result<Self, ConfigError> {
        let mut config = match &args.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_args(args);
        Ok(config)
    }

    /// Flags given on the command line win over the file.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(endpoint) = &args.endpoint {
            self.endpoint = endpoint.clone();
        }
        if let Some(secs) = args.connect_timeout_secs {
            self.connect_timeout_secs = secs;
        }
        if let Some(p) = &args.camera_image {
            self.camera_image = Some(p.clone());
        }
        if let Some(p) = &args.screen_image {
            self.screen_image = Some(p.clone());
        }
        if let Some(p) = &args.mic_wav {
            self.mic_wav = Some(p.clone());
        }
        if let Some(mode) = args.mode {
            self.mode = mode;
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::new(self.endpoint.clone())
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs.max(1)))
    }

    pub fn initial_frame_delay(&self) -> Duration {
        Duration::from_millis(self.initial_frame_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let c = ConsoleConfig::default();
        assert_eq!(c.connect_timeout_secs, 10);
        assert_eq!(c.initial_frame_delay_ms, 1000);
        assert_eq!(c.mode, Mode::Text);
        assert!(c.endpoint.starts_with("wss://"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let c = ConsoleConfig::from_toml_str(
            "endpoint = \"ws://localhost:9000/live\"\nmode = \"screen\"\n",
            "inline",
        )
        .unwrap();
        assert_eq!(c.endpoint, "ws://localhost:9000/live");
        assert_eq!(c.mode, Mode::Screen);
        assert_eq!(c.connect_timeout_secs, 10);
    }

    #[test]
    fn test_credential_in_file_is_rejected() {
        let err = ConsoleConfig::from_toml_str("api_key = \"secret\"\n", "inline").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_load_missing_file() {
        let err = ConsoleConfig::load(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_args_override_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "connect_timeout_secs = 30").unwrap();
        writeln!(file, "initial_frame_delay_ms = 250").unwrap();
        writeln!(file, "camera_image = \"/tmp/from-file.jpg\"").unwrap();

        let path = file.path().to_string_lossy().to_string();
        let args = Args::parse_from([
            "gemini-live",
            "--config",
            path.as_str(),
            "--connect-timeout-secs",
            "5",
        ]);
        let c = ConsoleConfig::resolve(&args).unwrap();
        assert_eq!(c.connect_timeout_secs, 5);
        assert_eq!(c.initial_frame_delay(), Duration::from_millis(250));
        assert_eq!(c.camera_image, Some(PathBuf::from("/tmp/from-file.jpg")));
        assert_eq!(c.session_config().connect_timeout, Duration::from_secs(5));
    }
}
