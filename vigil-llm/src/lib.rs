//! Vigil LLM - inference provider seam
//!
//! Defines the [`InferenceProvider`] trait, the prompt the analyzer sends, and
//! the tolerant parser that turns whatever comes back into an
//! [`AnalysisResult`](vigil_core::AnalysisResult).

use async_trait::async_trait;
use std::sync::Arc;
use vigil_core::{CompletionRequest, VigilResult};

pub mod parser;
pub mod prompt;
pub mod providers;

pub use parser::{parse_response, ParsedResponse};
pub use prompt::{build_request, ChangeHistory, PromptBuilder, SYSTEM_PROMPT};
pub use providers::OpenAICompatProvider;

// ============================================================================
// INFERENCE PROVIDER TRAIT
// ============================================================================

/// Trait for text-inference providers.
/// Implementations must be thread-safe (Send + Sync).
///
/// # Example
/// ```ignore
/// struct LocalModel { /* ... */ }
///
/// #[async_trait]
/// impl InferenceProvider for LocalModel {
///     fn provider_id(&self) -> &str { "local" }
///     async fn complete(&self, request: &CompletionRequest) -> VigilResult<String> {
///         // Run the model
///     }
/// }
/// ```
#[async_trait]
pub trait InferenceProvider: Send + Sync {
    /// Identifier used in logs and error messages.
    fn provider_id(&self) -> &str;

    /// Run one completion and return the text of the first choice.
    ///
    /// # Returns
    /// * `Ok(String)` - Raw completion text, unparsed
    /// * `Err(VigilError::Llm)` - Transport, status or decode failure
    async fn complete(&self, request: &CompletionRequest) -> VigilResult<String>;
}

#[async_trait]
impl<T: InferenceProvider + ?Sized> InferenceProvider for Arc<T> {
    fn provider_id(&self) -> &str {
        (**self).provider_id()
    }

    async fn complete(&self, request: &CompletionRequest) -> VigilResult<String> {
        (**self).complete(request).await
    }
}
