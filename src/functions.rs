//! Local handlers for function calls issued by the remote peer.
//!
//! The registry holds trait objects keyed by name. Unknown names are logged
//! and still acknowledged; the acknowledgment is returned to the caller and
//! never transmitted because the return leg of the protocol is undefined.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::diagnostics::DiagnosticLog;
use crate::protocol::{FunctionCall, FunctionResponse};

/// One locally executable operation.
pub trait FunctionHandler: Send + Sync {
    fn name(&self) -> &str;
    /// Execute with the peer's arguments; the returned line goes to the log.
    fn invoke(&self, args: &Map<String, Value>) -> String;
}

/// Render an argument for a log line; strings are shown without quotes.
pub fn arg_display(args: &Map<String, Value>, key: &str) -> String {
    match args.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => "<missing>".to_string(),
    }
}

pub struct SearchFunction;

impl FunctionHandler for SearchFunction {
    fn name(&self) -> &str {
        "search"
    }

    fn invoke(&self, args: &Map<String, Value>) -> String {
        format!("Executing search with query: {}", arg_display(args, "query"))
    }
}

pub struct WeatherFunction;

impl FunctionHandler for WeatherFunction {
    fn name(&self) -> &str {
        "getWeather"
    }

    fn invoke(&self, args: &Map<String, Value>) -> String {
        format!("Getting weather for location: {}", arg_display(args, "location"))
    }
}

pub struct MathFunction;

impl FunctionHandler for MathFunction {
    fn name(&self) -> &str {
        "calculateMath"
    }

    fn invoke(&self, args: &Map<String, Value>) -> String {
        format!("Calculating expression: {}", arg_display(args, "expression"))
    }
}

pub struct FunctionRegistry {
    handlers: HashMap<String, Box<dyn FunctionHandler>>,
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(SearchFunction));
        registry.register(Box::new(WeatherFunction));
        registry.register(Box::new(MathFunction));
        registry
    }
}

impl FunctionRegistry {
    /// Registry preloaded with the built-in handlers.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Add or replace a handler under its own name.
    pub fn register(&mut self, handler: Box<dyn FunctionHandler>) {
        self.handlers.insert(handler.name().to_string(), handler);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn dispatch(&self, call: &FunctionCall, log: &mut DiagnosticLog) -> FunctionResponse {
        log.function(format!("Function call received: {}", call.name));
        let args_pretty = serde_json::to_string_pretty(&call.args).unwrap_or_else(|_| "{}".into());
        log.info(format!("Function arguments: {}", args_pretty));

        match self.handlers.get(&call.name) {
            Some(handler) => log.function(handler.invoke(&call.args)),
            None => log.warning(format!("Unknown function call: {}", call.name)),
        }

        let response = FunctionResponse::success(&call.name);
        log.info(format!("Function {} response ready", call.name));
        tracing::debug!(
            function = %call.name,
            "function response return path is not defined by the peer protocol; not sent"
        );
        response
    }
}
