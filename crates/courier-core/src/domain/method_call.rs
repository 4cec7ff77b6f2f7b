use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Message;
use crate::error::QueueError;

/// `{"Method": ..., "Params": [...]}` envelope consumed by the method
/// dispatcher. Field names match what existing producers emit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    #[serde(rename = "Method")]
    pub method: String,

    #[serde(rename = "Params", default)]
    pub params: Vec<Value>,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }

    pub fn to_message(&self) -> Result<Message, QueueError> {
        Message::json(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_uses_capitalized_field_names() {
        let call = MethodCall::new("SendMail", vec![json!("a@example.com"), json!(3)]);
        let msg = call.to_message().unwrap();
        assert_eq!(msg.as_str(), r#"{"Method":"SendMail","Params":["a@example.com",3]}"#);
    }

    #[test]
    fn missing_params_decode_as_empty() {
        let call: MethodCall = serde_json::from_str(r#"{"Method":"Ping"}"#).unwrap();
        assert_eq!(call.method, "Ping");
        assert!(call.params.is_empty());
    }
}
