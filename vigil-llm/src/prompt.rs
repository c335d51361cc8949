//! Prompt construction for an analysis request

use serde::{Deserialize, Serialize};
use vigil_context::{truncate_with_marker, ContextWindow};
use vigil_core::{AnalyzerConfig, ChatMessage, CompletionRequest};

pub const SYSTEM_PROMPT: &str = "You are a system metrics analyzer. Analyze the provided metrics \
and provide insights. Be concise and focus on key findings. Consider recent code changes when \
analyzing the metrics.";

/// Most recent change to the monitored codebase, if known.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeHistory {
    /// `<hash> <subject>` of the last commit
    pub commit: Option<String>,
    /// Diff excerpt for that commit, possibly already truncated
    pub diff: String,
}

impl ChangeHistory {
    pub fn new(commit: impl Into<String>, diff: impl Into<String>) -> Self {
        Self {
            commit: Some(commit.into()),
            diff: diff.into(),
        }
    }

    pub fn is_known(&self) -> bool {
        self.commit.as_deref().is_some_and(|c| !c.trim().is_empty())
    }
}

/// Builds the two-message prompt sent to the provider.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    model: String,
    max_output_tokens: u32,
    diff_char_limit: usize,
}

impl PromptBuilder {
    pub fn new(config: &AnalyzerConfig) -> Self {
        Self {
            model: config.model.clone(),
            max_output_tokens: config.max_output_tokens,
            diff_char_limit: config.diff_char_limit,
        }
    }

    /// User message: question, assembled telemetry, then recent changes when known.
    pub fn user_message(
        &self,
        question: &str,
        context: &ContextWindow,
        changes: &ChangeHistory,
    ) -> String {
        let mut message = format!(
            "Question: {}\n\nMetrics data:\n{}",
            question,
            context.as_text()
        );

        if changes.is_known() {
            let commit = changes.commit.as_deref().unwrap_or_default();
            let diff = truncate_with_marker(&changes.diff, self.diff_char_limit);
            message.push_str(&format!("\n\nRecent changes:\n{}\n{}", commit, diff));
        }

        message
    }

    pub fn build(
        &self,
        question: &str,
        context: &ContextWindow,
        changes: &ChangeHistory,
    ) -> CompletionRequest {
        CompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::system(SYSTEM_PROMPT),
                ChatMessage::user(self.user_message(question, context, changes)),
            ],
            max_tokens: self.max_output_tokens,
            temperature: None,
        }
    }
}

/// Convenience wrapper around [`PromptBuilder::build`].
pub fn build_request(
    config: &AnalyzerConfig,
    question: &str,
    context: &ContextWindow,
    changes: &ChangeHistory,
) -> CompletionRequest {
    PromptBuilder::new(config).build(question, context, changes)
}
