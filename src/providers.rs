//! Dialect implementations.

pub mod anthropic;
pub mod openai;

// Re-export for convenience
pub use anthropic::AnthropicAdapter;
pub use openai::OpenAiAdapter;
