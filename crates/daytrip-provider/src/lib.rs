pub mod gemini;
pub mod types;

use anyhow::Result;
use async_trait::async_trait;

pub use gemini::GeminiProvider;
pub use types::*;

#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn chat(&self, request: LlmRequest) -> Result<LlmResponse>;
}

/// Whether an error produced by a provider is marked as worth retrying
/// (rate limits, 5xx, timeouts, connection failures). Context added on top
/// of the provider error does not hide the marker.
pub fn is_retryable(err: &anyhow::Error) -> bool {
    err.chain()
        .any(|cause| cause.to_string().contains("[retryable]"))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoProvider;

    #[async_trait]
    impl LlmProvider for EchoProvider {
        async fn chat(&self, request: LlmRequest) -> Result<LlmResponse> {
            let text = request
                .messages
                .last()
                .map(|m| m.content.clone())
                .unwrap_or_default();
            Ok(LlmResponse {
                text,
                input_tokens: None,
                output_tokens: None,
                stop_reason: Some("end_turn".into()),
            })
        }
    }

    #[tokio::test]
    async fn provider_is_object_safe() {
        let provider: Box<dyn LlmProvider> = Box::new(EchoProvider);
        let resp = provider
            .chat(LlmRequest::simple("m".into(), None, "ping".into()))
            .await
            .unwrap();
        assert_eq!(resp.text, "ping");
    }

    #[test]
    fn retryable_marker_detection() {
        assert!(is_retryable(&anyhow::anyhow!(
            "gemini api error (429 Too Many Requests) [retryable]: slow down"
        )));
        assert!(!is_retryable(&anyhow::anyhow!("gemini api error (400): bad")));
        let wrapped = anyhow::anyhow!("gemini api error (503) [retryable]: down")
            .context("failed to generate itinerary");
        assert!(is_retryable(&wrapped));
    }
}
