//! # unichat - streaming delta normalizer for chat LLM APIs
//!
//! Talks to OpenAI-style (`/v1/chat/completions`) and Anthropic-style
//! (`/v1/messages`) backends and turns either response, streamed or not, into
//! one uniform sequence of [`Delta`]s: answer tokens, reasoning text, and
//! start/end/error lifecycle events.
//!
//! ## Features
//! - Async-first, tokio compatible
//! - Chunk-boundary safe SSE decoding
//! - Inline `<think>` marker splitting, even when a marker straddles chunks
//! - Cooperative cancellation that ends the sequence cleanly
//!
//! ## Architecture
//!
//! ```text
//! bytes -> sse (frames) -> providers (fragments) -> scanner -> sequencer -> Delta
//! ```
//!
//! Every call owns its own decoder and scanner state; nothing is shared
//! between calls.
//!
//! ## Example
//! ```no_run
//! use futures::StreamExt;
//! use unichat::client::ChatModel;
//! use unichat::model::{ChatMessage, Delta};
//! use unichat::options::{ChatOptions, Dialect, ProviderConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ProviderConfig::new(
//!         Dialect::OpenAiLike,
//!         "https://api.deepseek.com",
//!         "your-api-key",
//!         "deepseek-reasoner",
//!     );
//!     let model = ChatModel::new(config);
//!
//!     let messages = vec![ChatMessage::user("Hello!")];
//!     let mut deltas = model.chat(messages, ChatOptions::default());
//!
//!     while let Some(delta) = deltas.next().await {
//!         match delta {
//!             Delta::Token { value } => print!("{}", value),
//!             Delta::Thinking { value } => eprint!("{}", value),
//!             Delta::Event { event, value } => println!("\n[{:?}] {}", event, value),
//!         }
//!     }
//! }
//! ```

pub mod client;
pub mod http;
pub mod model;
pub mod options;
pub mod providers;
pub mod scanner;
pub mod sequencer;
pub mod sse;
pub mod stream;

// Re-exports for convenience
pub use client::{create_chat_model, ChatModel, ClientError, DialectAdapter};
pub use model::{ChatMessage, Delta, EventKind, Role};
pub use options::{ChatOptions, Dialect, MarkerPair, ProviderConfig};
pub use stream::{DeltaStream, DeltaStreamExt, Reply};
