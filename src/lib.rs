//! # cashflow-chat - streaming client for the financial-reporting AI assistant
//!
//! Talks to the reporting backend's `/ai/chat` and `/ai/health` endpoints.
//! The chat endpoint answers with a Server-Sent Events body that is decoded
//! incrementally and pushed to the caller as it arrives.
//!
//! ## Features
//! - Async-first, tokio compatible
//! - Chunk-boundary independent SSE decoding, including multi-byte characters
//! - Callback ([`stream::ChatHandler`]) and stream ([`ChatClient::chat_events`]) consumption
//! - Explicit credential injection, read fresh on every request
//! - Explicit cancellation of in-flight streams
//!
//! ## Wire format
//! ```text
//! data: {"type":"answer","content":"..."}
//!
//! data: {"type":"done"}
//!
//! data: {"type":"error","content":"..."}
//! ```
//! `token` is accepted as a legacy alias of `answer`.
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use cashflow_chat::{ChatClient, ChatMessage, ClientOptions, SessionStore};
//! use cashflow_chat::stream::Callbacks;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = Arc::new(SessionStore::new());
//!     session.set_token("your-jwt");
//!
//!     let client = ChatClient::new(ClientOptions::new("http://localhost:8080"), session)?;
//!
//!     let history = vec![
//!         ChatMessage::user("How much did we spend on rent?"),
//!         ChatMessage::assistant("Rent was 4,200 in March."),
//!     ];
//!
//!     let mut handler = Callbacks::new(
//!         |token| print!("{}", token),
//!         || println!(),
//!         |err| eprintln!("error: {}", err),
//!     );
//!
//!     let outcome = client.chat_stream("And in April?", history, &mut handler).await;
//!     println!("{:?}", outcome);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod http;
pub mod model;
pub mod options;
pub mod session;
pub mod sse;
pub mod stream;

// Re-exports for convenience
pub use client::{ChatClient, ClientError};
pub use model::{ChatEvent, ChatMessage, ChatRequest, HealthStatus, Role};
pub use options::{ClientOptions, SecretString};
pub use session::{CredentialProvider, SessionStore};
pub use stream::{CancelHandle, ChatHandler, StreamOutcome};
