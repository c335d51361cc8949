//! Chat completions provider

use super::client::OpenAIClient;
use super::types::{ChatCompletionRequest, ChatCompletionResponse, Message};
use crate::providers::invalid_response;
use crate::InferenceProvider;
use async_trait::async_trait;
use vigil_core::{CompletionRequest, LlmError, ProviderConfig, VigilResult};

/// [`InferenceProvider`] backed by an OpenAI-compatible `chat/completions` endpoint.
pub struct OpenAICompatProvider {
    client: OpenAIClient,
}

impl OpenAICompatProvider {
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            client: OpenAIClient::new(config),
        }
    }

    fn to_wire(request: &CompletionRequest) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: request.model.clone(),
            messages: request
                .messages
                .iter()
                .map(|m| Message {
                    role: m.role.as_str().to_string(),
                    content: Some(m.content.clone()),
                })
                .collect(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        }
    }
}

/// Pull the first choice's text out of a response.
fn first_choice_text(response: ChatCompletionResponse) -> VigilResult<String> {
    if let Some(usage) = &response.usage {
        tracing::debug!(
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            total_tokens = usage.total_tokens,
            "completion usage"
        );
    }

    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| invalid_response("openai", "No completion in response"))?;

    if let Some(reason) = choice.finish_reason.as_deref() {
        if reason == "length" {
            tracing::warn!("completion truncated at max_tokens");
        }
    }

    match choice.message.content {
        Some(text) if !text.is_empty() => Ok(text),
        _ => Err(LlmError::EmptyCompletion {
            provider: "openai".to_string(),
        }
        .into()),
    }
}

#[async_trait]
impl InferenceProvider for OpenAICompatProvider {
    fn provider_id(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: &CompletionRequest) -> VigilResult<String> {
        let wire = Self::to_wire(request);
        let response: ChatCompletionResponse =
            self.client.request("chat/completions", &wire).await?;
        first_choice_text(response)
    }
}

impl std::fmt::Debug for OpenAICompatProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAICompatProvider")
            .field("client", &self.client)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::{ChatMessage, VigilError};

    #[test]
    fn test_wire_request_shape() {
        let request = CompletionRequest {
            model: "gpt-4o-mini".to_string(),
            messages: vec![ChatMessage::system("sys"), ChatMessage::user("hi")],
            max_tokens: 2000,
            temperature: None,
        };
        let json = serde_json::to_value(OpenAICompatProvider::to_wire(&request)).unwrap();
        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["max_tokens"], 2000);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hi");
        assert!(json.get("temperature").is_none());
    }

    #[test]
    fn test_first_choice_text() {
        let response: ChatCompletionResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"ok"},"finish_reason":"stop"}],
                "usage":{"prompt_tokens":10,"completion_tokens":1,"total_tokens":11}}"#,
        )
        .unwrap();
        assert_eq!(first_choice_text(response).unwrap(), "ok");
    }

    #[test]
    fn test_no_choices_is_invalid_response() {
        let response: ChatCompletionResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        let err = first_choice_text(response).unwrap_err();
        assert!(matches!(err, VigilError::Llm(LlmError::InvalidResponse { .. })));
    }

    #[test]
    fn test_null_content_is_empty_completion() {
        let response: ChatCompletionResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#,
        )
        .unwrap();
        let err = first_choice_text(response).unwrap_err();
        assert!(matches!(err, VigilError::Llm(LlmError::EmptyCompletion { .. })));
    }
}
