use clap::Parser;
use colored::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_stream::wrappers::LinesStream;
use tokio_stream::StreamExt;
use tracing_subscriber::EnvFilter;

use gemini_live::cli::{parse_command, Args, Command, HELP};
use gemini_live::{
    print_header, render_chat_message, render_log_entry, ChatLog, Console, ConsoleConfig,
    DiagnosticLog, LiveError,
};

/// Print the alert a browser would have shown for a capture failure.
fn alert(err: &LiveError) {
    if let LiveError::Capture(e) = err {
        eprintln!("{} {}", "!".bright_red().bold(), e.user_hint().bright_red());
    }
}

/// Run one console command. Returns `false` when the loop should end.
async fn dispatch(console: &mut Console, command: Command, credential: &mut String) -> bool {
    let result = match command {
        Command::Connect(key) => {
            if let Some(key) = key {
                *credential = key;
            }
            console.toggle_connection(credential).await
        }
        Command::Disconnect => {
            console.disconnect();
            Ok(())
        }
        Command::Mode(mode) => {
            console.select_mode(mode);
            Ok(())
        }
        Command::Mic => console.toggle_audio().await,
        Command::Video => console.toggle_video(),
        Command::Screen => console.toggle_screen(),
        Command::ClearLog => {
            console.clear_log();
            Ok(())
        }
        Command::ClearChat => {
            console.clear_chat();
            Ok(())
        }
        Command::Status => {
            println!("{}", console.status_line().bright_white());
            Ok(())
        }
        Command::Help => {
            println!("{}", HELP);
            Ok(())
        }
        Command::Chat(text) => {
            console.send_chat(&text);
            Ok(())
        }
        Command::Invalid(msg) => {
            eprintln!("{}", msg.bright_yellow());
            Ok(())
        }
        Command::Quit => return false,
    };
    if let Err(e) = result {
        alert(&e);
    }
    true
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gemini_live=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = ConsoleConfig::resolve(&args)?;

    let (log_tx, mut log_rx) = mpsc::unbounded_channel();
    let (chat_tx, mut chat_rx) = mpsc::unbounded_channel();
    let log_printer = tokio::spawn(async move {
        while let Some(entry) = log_rx.recv().await {
            println!("{}", render_log_entry(&entry));
        }
    });
    let chat_printer = tokio::spawn(async move {
        while let Some(msg) = chat_rx.recv().await {
            println!("{}", render_chat_message(&msg));
        }
    });

    print_header(&config);
    let (mut console, mut events) =
        Console::new(&config, DiagnosticLog::with_tap(log_tx), ChatLog::with_tap(chat_tx));
    console.ctx_mut().log.info("Gemini live console initialized");

    let mut credential = args.api_key.clone().unwrap_or_default();
    if args.connect {
        if let Err(e) = console.toggle_connection(&credential).await {
            alert(&e);
        }
    }

    let mut lines = LinesStream::new(BufReader::new(tokio::io::stdin()).lines());
    loop {
        tokio::select! {
            line = lines.next() => match line {
                Some(Ok(line)) => {
                    if !dispatch(&mut console, parse_command(&line), &mut credential).await {
                        break;
                    }
                }
                Some(Err(e)) => {
                    tracing::error!(error = %e, "stdin read failed");
                    break;
                }
                None => break,
            },
            Some(event) = events.next() => console.handle(event),
        }
    }

    console.shutdown();
    // Dropping the console closes both taps; the printers then drain and exit.
    drop(console);
    let _ = log_printer.await;
    let _ = chat_printer.await;
    Ok(())
}
