//! Google Gemini API provider
//!
//! https://ai.google.dev/api/generate-content

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::{LlmProvider, LlmRequest, LlmResponse};

pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Clone)]
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GeminiProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, GEMINI_API_BASE)
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn build_request(&self, request: &LlmRequest) -> GeminiRequest {
        let contents = request
            .messages
            .iter()
            .filter(|msg| !msg.content.is_empty())
            .map(|msg| GeminiContent {
                role: match msg.role.as_str() {
                    "assistant" => "model".to_string(),
                    _ => "user".to_string(),
                },
                parts: vec![GeminiPart {
                    text: msg.content.clone(),
                }],
            })
            .collect();

        let (response_mime_type, response_schema) = match &request.response_schema {
            Some(schema) => (Some("application/json".to_string()), Some(schema.clone())),
            None => (None, None),
        };

        GeminiRequest {
            contents,
            system_instruction: request.system.as_ref().map(|s| GeminiContent {
                role: "user".to_string(),
                parts: vec![GeminiPart { text: s.clone() }],
            }),
            generation_config: Some(GeminiGenerationConfig {
                max_output_tokens: Some(request.max_tokens),
                temperature: request.temperature,
                response_mime_type,
                response_schema,
            }),
        }
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    async fn chat(&self, request: LlmRequest) -> Result<LlmResponse> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url, request.model
        );

        let payload = self.build_request(&request);
        tracing::debug!(model = %request.model, structured = request.response_schema.is_some(), "gemini generateContent");

        let resp = match self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .header("x-goog-api-key", &self.api_key)
            .json(&payload)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                return Err(anyhow!(
                    "gemini api error (timeout) [retryable]: request timed out"
                ));
            }
            Err(e) if e.is_connect() => {
                return Err(anyhow!("gemini api error (connect) [retryable]: {e}"));
            }
            Err(e) => return Err(e.into()),
        };

        let status = resp.status();
        if status != StatusCode::OK {
            let text = resp.text().await?;
            return Err(format_api_error(status, &text));
        }

        let body: GeminiResponse = resp.json().await?;
        to_llm_response(body)
    }
}

fn to_llm_response(body: GeminiResponse) -> Result<LlmResponse> {
    let candidate = body
        .candidates
        .first()
        .ok_or_else(|| anyhow!("gemini api error: empty candidates"))?;

    let text: String = candidate
        .content
        .parts
        .iter()
        .map(|part| part.text.as_str())
        .collect();

    let stop_reason = match candidate.finish_reason.as_deref() {
        Some("STOP") => Some("end_turn".to_string()),
        Some("MAX_TOKENS") => Some("max_tokens".to_string()),
        Some("SAFETY") => Some("safety".to_string()),
        Some(r) => Some(r.to_lowercase()),
        None => None,
    };

    if text.trim().is_empty() {
        return Err(anyhow!(
            "gemini api error: candidate has no text (finish reason: {})",
            stop_reason.as_deref().unwrap_or("unknown")
        ));
    }

    Ok(LlmResponse {
        text,
        input_tokens: body.usage_metadata.as_ref().map(|u| u.prompt_token_count),
        output_tokens: body
            .usage_metadata
            .as_ref()
            .map(|u| u.candidates_token_count),
        stop_reason,
    })
}

fn format_api_error(status: StatusCode, text: &str) -> anyhow::Error {
    let retryable = match status.as_u16() {
        429 | 500..=599 => " [retryable]",
        _ => "",
    };
    anyhow!("gemini api error ({status}){retryable}: {text}")
}

// ============================================================
// Gemini API Types
// ============================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    role: String,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    usage_metadata: Option<GeminiUsageMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: GeminiContent,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LlmMessage;

    #[test]
    fn build_request_basic() {
        let provider = GeminiProvider::new("test-key");
        let req = LlmRequest::simple("gemini-2.5-flash".into(), Some("Be brief".into()), "Hi".into());
        let api_req = provider.build_request(&req);

        assert!(api_req.system_instruction.is_some());
        assert_eq!(api_req.contents.len(), 1);
        assert_eq!(api_req.contents[0].role, "user");
        let config = api_req.generation_config.unwrap();
        assert!(config.response_mime_type.is_none());
    }

    #[test]
    fn build_request_with_schema_asks_for_json() {
        let provider = GeminiProvider::new("test-key");
        let schema = serde_json::json!({
            "type": "OBJECT",
            "properties": { "name": { "type": "STRING" } }
        });
        let req = LlmRequest::structured("gemini-2.5-flash".into(), "Place?".into(), schema.clone());
        let api_req = provider.build_request(&req);

        let json = serde_json::to_value(&api_req).unwrap();
        assert_eq!(json["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(json["generationConfig"]["responseSchema"], schema);
        assert!(json.get("systemInstruction").is_none());
    }

    #[test]
    fn build_request_maps_assistant_to_model_and_skips_empty() {
        let provider = GeminiProvider::new("k");
        let req = LlmRequest {
            model: "m".into(),
            system: None,
            messages: vec![
                LlmMessage::user("a"),
                LlmMessage::assistant("b"),
                LlmMessage::user(""),
            ],
            max_tokens: 10,
            temperature: Some(0.2),
            response_schema: None,
        };
        let api_req = provider.build_request(&req);
        assert_eq!(api_req.contents.len(), 2);
        assert_eq!(api_req.contents[1].role, "model");
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let provider = GeminiProvider::with_base_url("k", "http://localhost:9/v1beta/");
        assert_eq!(provider.base_url, "http://localhost:9/v1beta");
    }

    #[test]
    fn to_llm_response_joins_text_parts() {
        let raw = serde_json::json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{"text": "{\"name\":"}, {"text": "\"Alfama\"}"}]
                },
                "finishReason": "STOP"
            }],
            "usageMetadata": {
                "promptTokenCount": 5,
                "candidatesTokenCount": 2
            }
        });
        let parsed: GeminiResponse = serde_json::from_value(raw).unwrap();
        let resp = to_llm_response(parsed).unwrap();

        assert_eq!(resp.text, "{\"name\":\"Alfama\"}");
        assert_eq!(resp.stop_reason.as_deref(), Some("end_turn"));
        assert_eq!(resp.input_tokens, Some(5));
        assert_eq!(resp.output_tokens, Some(2));
    }

    #[test]
    fn to_llm_response_rejects_empty_candidates() {
        let parsed: GeminiResponse =
            serde_json::from_value(serde_json::json!({ "candidates": [] })).unwrap();
        let err = to_llm_response(parsed).unwrap_err();
        assert!(err.to_string().contains("empty candidates"));
    }

    #[test]
    fn to_llm_response_rejects_blank_text() {
        let parsed: GeminiResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{
                "content": { "role": "model", "parts": [] },
                "finishReason": "SAFETY"
            }]
        }))
        .unwrap();
        let err = to_llm_response(parsed).unwrap_err();
        assert!(err.to_string().contains("safety"));
    }

    #[test]
    fn api_errors_mark_retryable_statuses() {
        let err = format_api_error(StatusCode::SERVICE_UNAVAILABLE, "overloaded");
        assert!(crate::is_retryable(&err));
        let err = format_api_error(StatusCode::BAD_REQUEST, "bad schema");
        assert!(!crate::is_retryable(&err));
        assert!(err.to_string().contains("bad schema"));
    }
}
