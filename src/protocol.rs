//! Wire types for the live session.
//!
//! Outbound requests are built from an [`OutboundMessage`]; inbound frames are
//! decoded once, at the boundary, into [`InboundEvent`] variants so nothing
//! downstream has to inspect raw JSON.

use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::{ComposeError, ParseError};

pub const IMAGE_MIME: &str = "image/jpeg";
pub const AUDIO_MIME: &str = "audio/wav";

// -- Outbound ---------------------------------------------------------------

/// Media carried alongside a message. One slot, so image and audio can never
/// travel in the same message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attachment {
    /// Base64 JPEG still.
    Image(String),
    /// Base64 WAV clip.
    Audio(String),
}

impl Attachment {
    pub fn image_from_bytes(jpeg: &[u8]) -> Self {
        Attachment::Image(general_purpose::STANDARD.encode(jpeg))
    }

    pub fn audio_from_bytes(wav: &[u8]) -> Self {
        Attachment::Audio(general_purpose::STANDARD.encode(wav))
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Attachment::Image(_) => IMAGE_MIME,
            Attachment::Audio(_) => AUDIO_MIME,
        }
    }

    pub fn data(&self) -> &str {
        match self {
            Attachment::Image(d) | Attachment::Audio(d) => d,
        }
    }
}

/// A user request: text, an attachment, or both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    text: Option<String>,
    attachment: Option<Attachment>,
}

impl OutboundMessage {
    pub fn new(text: Option<String>, attachment: Option<Attachment>) -> Result<Self, ComposeError> {
        let text = text.filter(|t| !t.is_empty());
        if text.is_none() && attachment.is_none() {
            return Err(ComposeError::Empty);
        }
        Ok(Self { text, attachment })
    }

    pub fn text(text: impl Into<String>) -> Result<Self, ComposeError> {
        Self::new(Some(text.into()), None)
    }

    pub fn with_image(text: impl Into<String>, jpeg_base64: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()).filter(|t: &String| !t.is_empty()),
            attachment: Some(Attachment::Image(jpeg_base64.into())),
        }
    }

    pub fn with_audio(text: impl Into<String>, wav_base64: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()).filter(|t: &String| !t.is_empty()),
            attachment: Some(Attachment::Audio(wav_base64.into())),
        }
    }

    pub fn text_part(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn attachment(&self) -> Option<&Attachment> {
        self.attachment.as_ref()
    }

    /// Build the request document. Text part first, then the inline data.
    pub fn to_request(&self) -> GenerateRequest {
        let mut parts = Vec::with_capacity(2);
        if let Some(text) = &self.text {
            parts.push(RequestPart::Text { text: text.clone() });
        }
        if let Some(att) = &self.attachment {
            parts.push(RequestPart::InlineData {
                inline_data: InlineData {
                    mime_type: att.mime_type().to_string(),
                    data: att.data().to_string(),
                },
            });
        }
        GenerateRequest {
            contents: vec![RequestContent {
                role: "user".to_string(),
                parts,
            }],
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.to_request())
    }
}

#[derive(Debug, Serialize)]
pub struct GenerateRequest {
    pub contents: Vec<RequestContent>,
}

#[derive(Debug, Serialize)]
pub struct RequestContent {
    pub role: String,
    pub parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum RequestPart {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Debug, Serialize)]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

// -- Inbound ----------------------------------------------------------------

/// Accept an explicit `null` wherever the field would default.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Function arguments: anything but an object counts as no arguments.
fn args_object<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Object(map) => Ok(map),
        _ => Ok(Map::new()),
    }
}

#[derive(Debug, Deserialize)]
pub struct ServerFrame {
    #[serde(default, deserialize_with = "null_as_default")]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
pub struct CandidateContent {
    #[serde(default, deserialize_with = "null_as_default")]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
pub struct ResponsePart {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default, rename = "functionCall")]
    pub function_call: Option<FunctionCall>,
}

/// A directive from the peer naming a local operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default, deserialize_with = "args_object")]
    pub args: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApiError {
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
}

/// One routable item decoded from a server frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    Text(String),
    FunctionCall(FunctionCall),
    Error(ApiError),
}

impl ServerFrame {
    /// Flatten the frame into events: at most one text, at most one function
    /// call (both from the first candidate), then the error if present.
    pub fn into_events(self) -> Vec<InboundEvent> {
        let mut events = Vec::new();

        let parts = self
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts)
            .unwrap_or_default();

        let mut text = None;
        let mut call = None;
        for part in parts {
            if text.is_none() {
                if let Some(t) = part.text.filter(|t| !t.is_empty()) {
                    text = Some(t);
                }
            }
            if call.is_none() {
                call = part.function_call;
            }
        }
        if let Some(t) = text {
            events.push(InboundEvent::Text(t));
        }
        if let Some(c) = call {
            events.push(InboundEvent::FunctionCall(c));
        }
        if let Some(e) = self.error {
            events.push(InboundEvent::Error(e));
        }
        events
    }
}

pub fn decode_frame(raw: &str) -> Result<Vec<InboundEvent>, ParseError> {
    let frame: ServerFrame = serde_json::from_str(raw)?;
    Ok(frame.into_events())
}

// -- Function responses -----------------------------------------------------

/// Acknowledgment produced for every function call. The peer protocol for
/// returning it is undefined, so it is never transmitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionResponse {
    pub name: String,
    pub response: FunctionOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionOutcome {
    pub status: String,
    pub message: String,
}

impl FunctionResponse {
    pub fn success(name: &str) -> Self {
        Self {
            name: name.to_string(),
            response: FunctionOutcome {
                status: "success".to_string(),
                message: format!("Function {} executed successfully", name),
            },
        }
    }
}
