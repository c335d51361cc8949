//! Inference provider implementations
//!
//! Concrete [`InferenceProvider`](crate::InferenceProvider) backends.

pub mod openai;

pub use openai::{OpenAIClient, OpenAICompatProvider};

use vigil_core::{LlmError, VigilError};

pub(crate) fn request_failed(provider: &str, status: i32, message: impl Into<String>) -> VigilError {
    LlmError::RequestFailed {
        provider: provider.to_string(),
        status,
        message: message.into(),
    }
    .into()
}

pub(crate) fn invalid_response(provider: &str, reason: impl Into<String>) -> VigilError {
    LlmError::InvalidResponse {
        provider: provider.to_string(),
        reason: reason.into(),
    }
    .into()
}

pub(crate) fn rate_limited(provider: &str, retry_after_ms: i64) -> VigilError {
    LlmError::RateLimited {
        provider: provider.to_string(),
        retry_after_ms,
    }
    .into()
}
