//! Structured model replies and the repair rules applied to raw model text.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// Fields that must hold lists even when the model returns a scalar.
pub const LIST_FIELDS: [&str; 3] = ["recommendations", "therapy_options", "medication_considerations"];

const RAW_EXCERPT_CHARS: usize = 500;

/// A JSON object produced by the model, or an `{"error": ...}` object
/// describing why none could be produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelReply(Map<String, Value>);

impl ModelReply {
    /// Wrap an existing object.
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// A reply that only carries `error`.
    pub fn error(message: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert("error".to_string(), Value::String(message.into()));
        Self(fields)
    }

    /// Parse raw model text, repairing the common malformations.
    ///
    /// 1. Strip a surrounding markdown fence.
    /// 2. Parse. On failure, cut at the first remaining fence and parse once more.
    /// 3. A list becomes its first element if that is an object, otherwise it
    ///    is wrapped under `results`.
    /// 4. Scalars in [`LIST_FIELDS`] become one-element lists; empty ones become `[]`.
    ///
    /// Unrecoverable text yields an error reply carrying an excerpt of the input.
    pub fn parse(raw: &str) -> Self {
        let text = strip_fence(raw.trim());
        let value = match serde_json::from_str::<Value>(text) {
            Ok(value) => value,
            Err(first) => {
                warn!(error = %first, "model reply is not valid JSON, retrying before first fence");
                let cut = text.split("```").next().unwrap_or_default().trim();
                match (!cut.is_empty()).then(|| serde_json::from_str::<Value>(cut)) {
                    Some(Ok(value)) => value,
                    _ => {
                        let mut reply = Self::error(format!("Failed to parse response as JSON: {first}"));
                        let excerpt: String = text.chars().take(RAW_EXCERPT_CHARS).collect();
                        reply.insert("raw_response", Value::String(excerpt));
                        return reply;
                    }
                }
            }
        };

        let mut reply = match value {
            Value::Object(fields) => Self(fields),
            Value::Array(items) => {
                warn!(len = items.len(), "model returned a list instead of an object");
                match items.first() {
                    Some(Value::Object(first)) => Self(first.clone()),
                    _ => {
                        let mut fields = Map::new();
                        fields.insert("results".to_string(), Value::Array(items));
                        Self(fields)
                    }
                }
            }
            other => {
                warn!(kind = value_kind(&other), "model returned a bare JSON scalar");
                return Self::error("Invalid response format from AI model");
            }
        };
        reply.coerce_list_fields();
        reply
    }

    fn coerce_list_fields(&mut self) {
        for field in LIST_FIELDS {
            let Some(value) = self.0.get_mut(field) else { continue };
            if value.is_array() {
                continue;
            }
            let taken = value.take();
            *value = if is_empty_value(&taken) { Value::Array(Vec::new()) } else { Value::Array(vec![taken]) };
        }
    }

    /// The `error` message, when this reply reports a failure.
    pub fn error_message(&self) -> Option<&str> {
        self.0.get("error").map(|v| v.as_str().unwrap_or("unknown error"))
    }

    /// Whether this reply reports a failure.
    pub fn is_error(&self) -> bool {
        self.0.contains_key("error")
    }

    /// A field as a string, if it is one.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// A field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Whether a field is present.
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Set a field, replacing any previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Set a field only when it is absent.
    pub fn insert_missing(&mut self, key: &str, value: impl FnOnce() -> Value) {
        if !self.0.contains_key(key) {
            self.0.insert(key.to_string(), value());
        }
    }

    /// Remove a field.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// The underlying object.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Unwrap into the underlying object.
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    /// Unwrap into a JSON value.
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

fn strip_fence(text: &str) -> &str {
    for opener in ["```json", "```JSON", "```"] {
        if let Some(body) = text.strip_prefix(opener) {
            if let Some(body) = body.strip_suffix("```") {
                return body.trim();
            }
        }
    }
    text
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Number(n) => n.as_f64() == Some(0.0),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
