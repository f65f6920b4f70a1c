//! Classifies inbound frames and hands each part to its sink.

use crate::functions::FunctionRegistry;
use crate::protocol::{decode_frame, FunctionResponse, InboundEvent};
use crate::state::Context;

pub struct MessageRouter {
    functions: FunctionRegistry,
}

impl Default for MessageRouter {
    fn default() -> Self {
        Self::new(FunctionRegistry::new())
    }
}

impl MessageRouter {
    pub fn new(functions: FunctionRegistry) -> Self {
        Self { functions }
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    /// Route one raw frame. Malformed frames are logged and dropped; the
    /// returned responses are the acknowledgments of any function calls.
    pub fn route(&self, ctx: &mut Context, raw: &str) -> Vec<FunctionResponse> {
        let events = match decode_frame(raw) {
            Ok(events) => events,
            Err(e) => {
                ctx.log.error(format!("Error parsing message: {}", e));
                return Vec::new();
            }
        };

        ctx.log.info("Received message from Gemini API");

        let mut responses = Vec::new();
        for event in events {
            match event {
                InboundEvent::Text(text) => ctx.chat.push_model(text),
                InboundEvent::FunctionCall(call) => {
                    responses.push(self.functions.dispatch(&call, &mut ctx.log));
                }
                InboundEvent::Error(err) => {
                    ctx.log.error(format!("API Error: {}", err.message));
                }
            }
        }
        responses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::Role;
    use crate::diagnostics::Severity;

    #[test]
    fn test_text_and_function_call_both_dispatched() {
        let router = MessageRouter::default();
        let mut ctx = Context::new();
        let raw = r#"{"candidates":[{"content":{"parts":[
            {"text":"hi"},
            {"functionCall":{"name":"getWeather","args":{"location":"NYC"}}}
        ]}}]}"#;

        let responses = router.route(&mut ctx, raw);

        assert_eq!(ctx.chat.len(), 1);
        assert_eq!(ctx.chat.history()[0].role, Role::Model);
        assert_eq!(ctx.chat.history()[0].text, "hi");
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].name, "getWeather");
        assert!(ctx.log.contains(Severity::Function, "Getting weather for location: NYC"));
    }

    #[test]
    fn test_error_descriptor_goes_to_log_only() {
        let router = MessageRouter::default();
        let mut ctx = Context::new();
        router.route(&mut ctx, r#"{"error":{"message":"quota exceeded"}}"#);
        assert!(ctx.chat.is_empty());
        assert!(ctx.log.contains(Severity::Error, "API Error: quota exceeded"));
    }

    #[test]
    fn test_malformed_frame_dropped_state_untouched() {
        let router = MessageRouter::default();
        let mut ctx = Context::new();
        ctx.state.begin_connect();
        ctx.state.mark_open(uuid::Uuid::new_v4());

        let responses = router.route(&mut ctx, "{{{ definitely not json");

        assert!(responses.is_empty());
        assert!(ctx.chat.is_empty());
        assert!(ctx.state.connected());
        assert_eq!(ctx.log.len(), 1);
        assert!(ctx.log.contains(Severity::Error, "Error parsing message"));
    }

    #[test]
    fn test_text_forwarded_verbatim() {
        let router = MessageRouter::default();
        let mut ctx = Context::new();
        router.route(
            &mut ctx,
            r#"{"candidates":[{"content":{"parts":[{"text":"**bold**\nline"}]}}]}"#,
        );
        assert_eq!(ctx.chat.history()[0].text, "**bold**\nline");
    }
}
