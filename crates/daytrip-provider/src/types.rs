use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmMessage {
    pub role: String,
    pub content: String,
}

impl LlmMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: "assistant".into(),
            content: text.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRequest {
    pub model: String,
    pub system: Option<String>,
    pub messages: Vec<LlmMessage>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub temperature: Option<f32>,
    /// When set, the model is asked for JSON matching this schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<serde_json::Value>,
}

fn default_max_tokens() -> u32 {
    8192
}

impl LlmRequest {
    pub fn simple(model: String, system: Option<String>, user: String) -> Self {
        Self {
            model,
            system,
            messages: vec![LlmMessage::user(user)],
            max_tokens: default_max_tokens(),
            temperature: None,
            response_schema: None,
        }
    }

    pub fn structured(model: String, user: String, schema: serde_json::Value) -> Self {
        Self {
            response_schema: Some(schema),
            ..Self::simple(model, None, user)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub text: String,
    pub input_tokens: Option<u32>,
    pub output_tokens: Option<u32>,
    pub stop_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_request_carries_schema() {
        let schema = serde_json::json!({"type": "OBJECT"});
        let req = LlmRequest::structured("m".into(), "hi".into(), schema.clone());
        assert_eq!(req.response_schema, Some(schema));
        assert_eq!(req.messages, vec![LlmMessage::user("hi")]);
        assert!(req.system.is_none());
    }

    #[test]
    fn request_defaults_when_deserialized() {
        let req: LlmRequest = serde_json::from_value(serde_json::json!({
            "model": "m",
            "system": null,
            "messages": []
        }))
        .unwrap();
        assert_eq!(req.max_tokens, 8192);
        assert!(req.response_schema.is_none());
    }
}
