//! LLM integration
//!
//! - `completion`: the [`TextCompletion`] seam and JSON response parsing
//! - `client`: OpenRouter / OpenAI-compatible implementation
//! - `types`: chat-completion wire types

mod client;
mod completion;
mod types;

pub use client::{LlmClient, LlmClientBuilder};
pub use completion::{TextCompletion, extract_json_from_response, parse_completion};
pub use types::{ChatRequest, ChatResponse, LlmResponse, Message, MessageRole, ResponseFormat};
