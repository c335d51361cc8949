//! OpenAI-compatible chat completions backend

mod client;
mod completion;
mod types;

pub use client::OpenAIClient;
pub use completion::OpenAICompatProvider;
