//! User-facing controls: connection toggle, mode selector, capture toggles,
//! chat send and the clear actions.
//!
//! `Console` owns the [`Context`] and every component. All handlers run to
//! completion on the caller's single event loop; deferred work (the first
//! frame after a camera or screen starts) comes back as a [`ConsoleEvent`].

use std::time::Duration;

use base64::{engine::general_purpose, Engine as _};
use tokio::sync::mpsc;

use crate::capture::{
    AudioDevice, AudioSource, FrameDevice, FrameSource, JpegFileDevice, NoDevice, SourceKind,
    WavFileMicrophone,
};
use crate::chat::ChatLog;
use crate::config::ConsoleConfig;
use crate::diagnostics::DiagnosticLog;
use crate::error::LiveError;
use crate::protocol::{Attachment, OutboundMessage};
use crate::router::MessageRouter;
use crate::session::{SessionConfig, SessionManager, TransportEvent};
use crate::state::{Context, Mode};

const AUDIO_PROMPT: &str = "Processing this audio input";
const VIDEO_PROMPT: &str = "Analyzing this video frame";
const SCREEN_PROMPT: &str = "Analyzing this screen capture";

/// Something the event loop must hand back to the console.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleEvent {
    Transport(TransportEvent),
    /// The initial-frame delay of a capture start has elapsed.
    InitialFrameDue { kind: SourceKind, generation: u64 },
}

/// Receiving side of everything the console schedules.
pub struct ConsoleEvents {
    transport: mpsc::UnboundedReceiver<TransportEvent>,
    timers: mpsc::UnboundedReceiver<(SourceKind, u64)>,
}

impl ConsoleEvents {
    pub async fn next(&mut self) -> Option<ConsoleEvent> {
        tokio::select! {
            Some(ev) = self.transport.recv() => Some(ConsoleEvent::Transport(ev)),
            Some((kind, generation)) = self.timers.recv() => {
                Some(ConsoleEvent::InitialFrameDue { kind, generation })
            }
            else => None,
        }
    }
}

pub struct Console {
    ctx: Context,
    manager: SessionManager,
    router: MessageRouter,
    audio: AudioSource,
    video: FrameSource,
    screen: FrameSource,
    initial_frame_delay: Duration,
    timers_tx: mpsc::UnboundedSender<(SourceKind, u64)>,
    video_generation: u64,
    screen_generation: u64,
}

impl Console {
    /// Build a console from resolved configuration, wiring file-backed
    /// devices for every configured path and [`NoDevice`] for the rest.
    pub fn new(config: &ConsoleConfig, log: DiagnosticLog, chat: ChatLog) -> (Self, ConsoleEvents) {
        let audio: Box<dyn AudioDevice> = match &config.mic_wav {
            Some(path) => Box::new(WavFileMicrophone::new(path).chunk_frames(config.audio_chunk_frames)),
            None => Box::new(NoDevice::new(SourceKind::Audio)),
        };
        let video: Box<dyn FrameDevice> = match &config.camera_image {
            Some(path) => Box::new(JpegFileDevice::new(SourceKind::Video, path)),
            None => Box::new(NoDevice::new(SourceKind::Video)),
        };
        let screen: Box<dyn FrameDevice> = match &config.screen_image {
            Some(path) => Box::new(JpegFileDevice::new(SourceKind::Screen, path)),
            None => Box::new(NoDevice::new(SourceKind::Screen)),
        };

        let mut ctx = Context::with_sinks(log, chat);
        ctx.state.active_mode = config.mode;

        Self::from_parts(
            ctx,
            config.session_config(),
            AudioSource::new(audio),
            FrameSource::new(SourceKind::Video, video),
            FrameSource::new(SourceKind::Screen, screen),
            config.initial_frame_delay(),
        )
    }

    pub fn from_parts(
        ctx: Context,
        session: SessionConfig,
        audio: AudioSource,
        video: FrameSource,
        screen: FrameSource,
        initial_frame_delay: Duration,
    ) -> (Self, ConsoleEvents) {
        let (manager, transport) = SessionManager::new(session);
        let (timers_tx, timers) = mpsc::unbounded_channel();
        let console = Self {
            ctx,
            manager,
            router: MessageRouter::default(),
            audio,
            video,
            screen,
            initial_frame_delay,
            timers_tx,
            video_generation: 0,
            screen_generation: 0,
        };
        (console, ConsoleEvents { transport, timers })
    }

    pub fn ctx(&self) -> &Context {
        &self.ctx
    }

    pub fn ctx_mut(&mut self) -> &mut Context {
        &mut self.ctx
    }

    /// Level of the latest recorded chunk (0..1); zero when not recording.
    pub fn audio_level(&self) -> f32 {
        if !self.audio.is_active() {
            return 0.0;
        }
        self.audio.level()
    }

    // -- Connection ---------------------------------------------------------

    /// Connect with `credential`, or disconnect when already connected.
    pub async fn toggle_connection(&mut self, credential: &str) -> Result<(), LiveError> {
        let credential = credential.trim();
        if credential.is_empty() {
            self.ctx.log.error("API Key is required");
            return Err(LiveError::Validation("API key is required".to_string()));
        }

        if self.ctx.state.connected() {
            self.manager.disconnect(&mut self.ctx);
            return Ok(());
        }

        self.ctx.state.credential = credential.to_string();
        match self.manager.connect(&mut self.ctx, credential).await {
            Ok(()) => {
                self.ctx.log.info("Connected to Gemini API");
                Ok(())
            }
            Err(e) => {
                self.ctx.log.error("Failed to connect to Gemini API");
                Err(e.into())
            }
        }
    }

    pub fn disconnect(&mut self) {
        self.manager.disconnect(&mut self.ctx);
    }

    // -- Modes and chat -----------------------------------------------------

    pub fn select_mode(&mut self, mode: Mode) {
        self.ctx.state.active_mode = mode;
        self.ctx.log.info(format!("Switched to {} mode", mode));
    }

    /// Send a chat line, attaching the current frame in video or screen mode.
    pub fn send_chat(&mut self, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }
        if !self.ctx.state.connected() {
            self.ctx.log.error("Cannot send message: Not connected to Gemini API");
            return false;
        }

        self.ctx.chat.push_user(text);

        let frame = match self.ctx.state.active_mode {
            Mode::Video if self.ctx.state.video_active => self.video.capture_frame(&mut self.ctx.log),
            Mode::Screen if self.ctx.state.screen_active => self.screen.capture_frame(&mut self.ctx.log),
            _ => None,
        };
        let attachment = frame.map(|jpeg| Attachment::image_from_bytes(&jpeg));

        match OutboundMessage::new(Some(text.to_string()), attachment) {
            Ok(msg) => self.manager.send(&mut self.ctx, &msg),
            Err(e) => {
                self.ctx.log.error(format!("Error sending message: {}", e));
                false
            }
        }
    }

    pub fn clear_log(&mut self) {
        self.ctx.log.clear();
        self.ctx.log.info("Logs cleared");
    }

    pub fn clear_chat(&mut self) {
        self.ctx.chat.clear();
        self.ctx.log.info("Chat history cleared");
    }

    // -- Capture toggles ----------------------------------------------------

    /// Start recording, or stop and send the recorded clip.
    pub async fn toggle_audio(&mut self) -> Result<(), LiveError> {
        if self.audio.is_active() {
            let clip = self.audio.stop_and_flush().await;
            self.ctx.state.audio_active = false;
            self.ctx.log.info("Microphone stopped");

            let wav = match clip {
                Ok(wav) => wav,
                Err(e) => {
                    self.ctx.log.error(format!("Could not finalize recording: {}", e));
                    return Err(e.into());
                }
            };
            if self.ctx.state.connected() {
                let msg = OutboundMessage::with_audio(AUDIO_PROMPT, general_purpose::STANDARD.encode(&wav));
                if self.manager.send(&mut self.ctx, &msg) {
                    self.ctx.log.info("Audio sent to Gemini API");
                }
            }
            return Ok(());
        }

        match self.audio.start(&mut self.ctx.log) {
            Ok(()) => {
                self.ctx.state.audio_active = true;
                self.ctx.log.info("Microphone activated successfully");
                Ok(())
            }
            Err(e) => {
                self.ctx.state.audio_active = false;
                self.ctx.log.error(format!("Microphone access error: {}", e));
                Err(e.into())
            }
        }
    }

    pub fn toggle_video(&mut self) -> Result<(), LiveError> {
        self.toggle_frame_source(SourceKind::Video)
    }

    pub fn toggle_screen(&mut self) -> Result<(), LiveError> {
        self.toggle_frame_source(SourceKind::Screen)
    }

    fn toggle_frame_source(&mut self, kind: SourceKind) -> Result<(), LiveError> {
        let (source, label) = match kind {
            SourceKind::Screen => (&mut self.screen, "Screen sharing"),
            _ => (&mut self.video, "Camera"),
        };

        if source.is_active() {
            source.stop();
            self.set_frame_active(kind, false);
            self.ctx.log.info(format!("{} stopped", label));
            return Ok(());
        }

        if let Err(e) = source.start(&mut self.ctx.log) {
            self.set_frame_active(kind, false);
            self.ctx.log.error(format!("{} access error: {}", label, e));
            return Err(e.into());
        }
        self.set_frame_active(kind, true);
        self.ctx.log.info(format!("{} activated successfully", label));

        let generation = match kind {
            SourceKind::Screen => {
                self.screen_generation += 1;
                self.screen_generation
            }
            _ => {
                self.video_generation += 1;
                self.video_generation
            }
        };
        let delay = self.initial_frame_delay;
        let timers = self.timers_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = timers.send((kind, generation));
        });
        Ok(())
    }

    fn set_frame_active(&mut self, kind: SourceKind, active: bool) {
        match kind {
            SourceKind::Screen => self.ctx.state.screen_active = active,
            _ => self.ctx.state.video_active = active,
        }
    }

    /// Send the first frame of a freshly started camera or screen share, if it
    /// is still the same run and the session is still open.
    fn send_initial_frame(&mut self, kind: SourceKind, generation: u64) {
        let (source, current, prompt, what) = match kind {
            SourceKind::Screen => (&mut self.screen, self.screen_generation, SCREEN_PROMPT, "screen"),
            _ => (&mut self.video, self.video_generation, VIDEO_PROMPT, "video"),
        };
        if generation != current || !self.ctx.state.connected() {
            return;
        }
        let Some(jpeg) = source.capture_frame(&mut self.ctx.log) else {
            return;
        };
        let msg = OutboundMessage::with_image(prompt, general_purpose::STANDARD.encode(&jpeg));
        if self.manager.send(&mut self.ctx, &msg) {
            self.ctx.log.info(format!("Initial {} frame sent to Gemini API", what));
        }
    }

    // -- Events -------------------------------------------------------------

    pub fn handle(&mut self, event: ConsoleEvent) {
        match event {
            ConsoleEvent::Transport(ev) => {
                if let Some(raw) = self.manager.handle_event(&mut self.ctx, ev) {
                    self.router.route(&mut self.ctx, &raw);
                }
            }
            ConsoleEvent::InitialFrameDue { kind, generation } => {
                self.send_initial_frame(kind, generation);
            }
        }
    }

    /// One-line summary for the status command.
    pub fn status_line(&self) -> String {
        let s = &self.ctx.state;
        let on = |b: bool| if b { "on" } else { "off" };
        let mut line = format!(
            "{} | mode: {} | mic: {} | camera: {} | screen: {}",
            s.status_label(),
            s.active_mode,
            on(s.audio_active),
            on(s.video_active),
            on(s.screen_active)
        );
        if self.audio.is_active() {
            line.push_str(&format!(" | mic level: {:.0}%", self.audio_level() * 100.0));
        }
        line
    }

    /// Release every device and close the session.
    pub fn shutdown(&mut self) {
        self.audio.stop();
        self.video.stop();
        self.screen.stop();
        self.ctx.state.audio_active = false;
        self.ctx.state.video_active = false;
        self.ctx.state.screen_active = false;
        self.manager.disconnect(&mut self.ctx);
    }
}
