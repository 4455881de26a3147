//! Streaming chat against an OpenAI- or Anthropic-style backend.
//!
//! Run with:
//! ```bash
//! export CHAT_API_KEY="your-api-key"
//! export CHAT_ENDPOINT="https://api.deepseek.com"   # optional
//! export CHAT_MODEL="deepseek-reasoner"             # optional
//! export CHAT_DIALECT="openai"                      # or "anthropic"
//! RUST_LOG=unichat=debug cargo run --example streaming_chat
//! ```
//!
//! Press Ctrl-C to cancel mid-stream; the call still ends with an `end` event.

use std::io::Write;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use unichat::model::{ChatMessage, Delta, EventKind};
use unichat::options::{ChatOptions, Dialect, ProviderConfig};
use unichat::ChatModel;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let api_key = std::env::var("CHAT_API_KEY")?;
    let dialect = match std::env::var("CHAT_DIALECT").as_deref() {
        Ok("anthropic") => Dialect::AnthropicLike,
        _ => Dialect::OpenAiLike,
    };
    let (default_endpoint, default_model) = match dialect {
        Dialect::OpenAiLike => ("https://api.deepseek.com", "deepseek-reasoner"),
        Dialect::AnthropicLike => ("https://api.anthropic.com", "claude-sonnet-4-5"),
    };
    let endpoint = std::env::var("CHAT_ENDPOINT").unwrap_or_else(|_| default_endpoint.to_string());
    let model = std::env::var("CHAT_MODEL").unwrap_or_else(|_| default_model.to_string());

    let config = ProviderConfig::new(dialect, endpoint, api_key, model).with_thinking(true);
    let chat = ChatModel::new(config);

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let messages = vec![
        ChatMessage::system("Answer briefly."),
        ChatMessage::user("Write a haiku about Rust programming."),
    ];

    let mut deltas = chat.chat(messages, ChatOptions::streaming().with_cancellation(cancel));
    let mut stdout = std::io::stdout();
    let mut in_thinking = false;

    while let Some(delta) = deltas.next().await {
        match delta {
            Delta::Thinking { value } => {
                if !in_thinking {
                    print!("\n[thinking] ");
                    in_thinking = true;
                }
                print!("{}", value);
            }
            Delta::Token { value } => {
                if in_thinking {
                    print!("\n[answer] ");
                    in_thinking = false;
                }
                print!("{}", value);
            }
            Delta::Event { event: EventKind::Start, .. } => println!("=== start ==="),
            Delta::Event { event: EventKind::End, .. } => println!("\n=== end ==="),
            Delta::Event { event: EventKind::Error, value } => eprintln!("\n=== error: {} ===", value),
        }
        stdout.flush()?;
    }

    Ok(())
}
