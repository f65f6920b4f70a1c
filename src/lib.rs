pub mod capture;
pub mod chat;
pub mod cli;
pub mod config;
pub mod console;
pub mod diagnostics;
pub mod error;
pub mod functions;
pub mod protocol;
pub mod router;
pub mod session;
pub mod state;

use colored::*;

pub use chat::{ChatLog, ChatMessage, Role};
pub use config::ConsoleConfig;
pub use console::{Console, ConsoleEvent, ConsoleEvents};
pub use diagnostics::{DiagnosticLog, LogEntry, Severity};
pub use error::LiveError;
pub use protocol::{Attachment, InboundEvent, OutboundMessage};
pub use router::MessageRouter;
pub use session::{SessionConfig, SessionManager, TransportEvent};
pub use state::{Context, Mode, SessionState, SessionStatus};

// ---------------------------------------------------------------------------
// Terminal rendering
// ---------------------------------------------------------------------------

/// Colour a diagnostic entry by severity.
pub fn render_log_entry(entry: &LogEntry) -> String {
    let time = diagnostics::format_timestamp(entry.timestamp_ms);
    let severity = entry.severity.to_string();
    let severity = match entry.severity {
        Severity::Info => severity.bright_blue(),
        Severity::Warning => severity.bright_yellow(),
        Severity::Error => severity.bright_red().bold(),
        Severity::Function => severity.bright_magenta(),
    };
    format!("{} {} {}", time.dimmed(), severity, entry.message)
}

/// Render one chat bubble as a prefixed line.
pub fn render_chat_message(msg: &ChatMessage) -> String {
    let who = match msg.role {
        Role::User => msg.role.to_string().bright_green().bold(),
        Role::Model => msg.role.to_string().bright_cyan().bold(),
    };
    format!("{}: {}", who, msg.text)
}

pub fn print_header(config: &ConsoleConfig) {
    println!("{}", "GEMINI LIVE CONSOLE".bright_cyan().bold());
    println!("{}: {}", "Endpoint".bright_yellow(), config.endpoint);
    println!("{}: {}", "Mode".bright_yellow(), config.mode);
    let device = |p: &Option<std::path::PathBuf>| match p {
        Some(p) => p.display().to_string().bright_white(),
        None => "none".dimmed(),
    };
    println!("{}: {}", "Camera".bright_yellow(), device(&config.camera_image));
    println!("{}: {}", "Screen".bright_yellow(), device(&config.screen_image));
    println!("{}: {}", "Microphone".bright_yellow(), device(&config.mic_wav));
    println!("{}", "=".repeat(50).bright_blue());
    println!("{}", "Type /help for commands.".bright_green());
    println!();
}
