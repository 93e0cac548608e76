use serde_json::Value;
use swarm_core::executor::traits::PayloadClassifier;
use swarm_core::Payload;

/// Classifies a payload by the value found at a JSON pointer
/// (RFC 6901, e.g. `/verdict/severity`).
pub struct JsonPointerClassifier {
    pointer: String,
}

impl JsonPointerClassifier {
    pub fn new(pointer: impl Into<String>) -> anyhow::Result<Self> {
        let pointer = pointer.into();
        if !pointer.is_empty() && !pointer.starts_with('/') {
            anyhow::bail!("json pointer must be empty or start with '/': {pointer:?}");
        }
        Ok(Self { pointer })
    }
}

impl PayloadClassifier for JsonPointerClassifier {
    fn name(&self) -> &str {
        &self.pointer
    }

    fn classify(&self, payload: &Payload) -> Option<String> {
        match payload.pointer(&self.pointer)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}
