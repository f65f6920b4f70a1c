use std::path::PathBuf;

use clap::Parser;

use crate::state::Mode;

#[derive(Parser, Debug)]
#[command(name = "gemini-live")]
#[command(version)]
#[command(about = "Chat with a generative-AI API over a live WebSocket session, with camera, screen and microphone attachments")]
pub struct Args {
    /// TOML config file (endpoint, timeouts, device paths)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Socket endpoint, without the key query
    #[arg(long)]
    pub endpoint: Option<String>,

    /// API key; kept in memory only
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Seconds to wait for the session to open
    #[arg(long)]
    pub connect_timeout_secs: Option<u64>,

    /// JPEG served as the webcam frame
    #[arg(long)]
    pub camera_image: Option<PathBuf>,

    /// JPEG served as the screen-share frame
    #[arg(long)]
    pub screen_image: Option<PathBuf>,

    /// WAV file played as the microphone
    #[arg(long)]
    pub mic_wav: Option<PathBuf>,

    /// Initial mode
    #[arg(long, value_enum)]
    pub mode: Option<Mode>,

    /// Connect right after startup
    #[arg(long)]
    pub connect: bool,
}

/// One line typed at the console prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/connect [key]` toggles the connection.
    Connect(Option<String>),
    Disconnect,
    Mode(Mode),
    Mic,
    Video,
    Screen,
    ClearLog,
    ClearChat,
    Status,
    Help,
    Quit,
    Chat(String),
    Invalid(String),
}

pub const HELP: &str = "\
/connect [key]   connect (or disconnect when connected)
/disconnect      close the session
/mode <m>        text | audio | video | screen
/mic             start recording, or stop and send the clip
/video           toggle the camera
/screen          toggle screen sharing
/status          show connection and capture state
/clear-log       clear the diagnostic log
/clear-chat      clear the chat history
/quit            exit
anything else    send as a chat message";

pub fn parse_command(line: &str) -> Command {
    let line = line.trim();
    if !line.starts_with('/') {
        return Command::Chat(line.to_string());
    }

    let mut words = line.split_whitespace();
    let head = words.next().unwrap_or("");
    let rest: Vec<&str> = words.collect();

    match head {
        "/connect" => Command::Connect(rest.first().map(|s| s.to_string())),
        "/disconnect" => Command::Disconnect,
        "/mode" => match rest.first().map(|m| m.parse::<Mode>()) {
            Some(Ok(mode)) => Command::Mode(mode),
            Some(Err(e)) => Command::Invalid(e),
            None => Command::Invalid("usage: /mode <text|audio|video|screen>".to_string()),
        },
        "/mic" => Command::Mic,
        "/video" => Command::Video,
        "/screen" => Command::Screen,
        "/status" => Command::Status,
        "/clear-log" => Command::ClearLog,
        "/clear-chat" => Command::ClearChat,
        "/help" => Command::Help,
        "/quit" | "/exit" => Command::Quit,
        other => Command::Invalid(format!("Unknown command: {}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parse_minimal() {
        let args = Args::parse_from(["gemini-live"]);
        assert!(args.config.is_none());
        assert!(args.endpoint.is_none());
        assert!(args.mode.is_none());
        assert!(!args.connect);
    }

    #[test]
    fn test_args_parse_full() {
        let args = Args::parse_from([
            "gemini-live",
            "--config",
            "live.toml",
            "--endpoint",
            "ws://127.0.0.1:9000/live",
            "--api-key",
            "k",
            "--connect-timeout-secs",
            "3",
            "--camera-image",
            "cam.jpg",
            "--screen-image",
            "screen.jpg",
            "--mic-wav",
            "mic.wav",
            "--mode",
            "video",
            "--connect",
        ]);
        assert_eq!(args.config, Some(PathBuf::from("live.toml")));
        assert_eq!(args.endpoint.as_deref(), Some("ws://127.0.0.1:9000/live"));
        assert_eq!(args.api_key.as_deref(), Some("k"));
        assert_eq!(args.connect_timeout_secs, Some(3));
        assert_eq!(args.camera_image, Some(PathBuf::from("cam.jpg")));
        assert_eq!(args.mode, Some(Mode::Video));
        assert!(args.connect);
    }

    #[test]
    fn test_args_rejects_unknown_mode() {
        assert!(Args::try_parse_from(["gemini-live", "--mode", "hologram"]).is_err());
    }

    #[test]
    fn test_plain_line_is_chat() {
        assert_eq!(parse_command("  hello there "), Command::Chat("hello there".into()));
    }

    #[test]
    fn test_connect_with_and_without_key() {
        assert_eq!(parse_command("/connect"), Command::Connect(None));
        assert_eq!(parse_command("/connect abc"), Command::Connect(Some("abc".into())));
    }

    #[test]
    fn test_mode_command() {
        assert_eq!(parse_command("/mode screen"), Command::Mode(Mode::Screen));
        assert!(matches!(parse_command("/mode"), Command::Invalid(_)));
        assert!(matches!(parse_command("/mode 3d"), Command::Invalid(_)));
    }

    #[test]
    fn test_toggles_and_clears() {
        assert_eq!(parse_command("/mic"), Command::Mic);
        assert_eq!(parse_command("/video"), Command::Video);
        assert_eq!(parse_command("/screen"), Command::Screen);
        assert_eq!(parse_command("/clear-log"), Command::ClearLog);
        assert_eq!(parse_command("/clear-chat"), Command::ClearChat);
        assert_eq!(parse_command("/exit"), Command::Quit);
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(
            parse_command("/dance"),
            Command::Invalid("Unknown command: /dance".into())
        );
    }
}
