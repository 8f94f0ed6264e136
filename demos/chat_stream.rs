//! Ask the reporting assistant one question and stream the answer to stdout.
//!
//! Run with:
//! ```bash
//! export CASHFLOW_API_BASE_URL="http://localhost:8080"
//! export CASHFLOW_TOKEN="your-jwt"
//! RUST_LOG=cashflow_chat=debug cargo run --example chat_stream -- "How is my cash flow this month?"
//! ```
//!
//! Press Ctrl-C to cancel the stream.

use std::io::Write;
use std::sync::Arc;

use cashflow_chat::stream::Callbacks;
use cashflow_chat::{CancelHandle, ChatClient, ClientOptions, SessionStore};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let token = std::env::var("CASHFLOW_TOKEN").expect("CASHFLOW_TOKEN environment variable must be set");
    let question = std::env::args()
        .skip(1)
        .collect::<Vec<_>>()
        .join(" ");
    let question = if question.is_empty() {
        "Summarize my income and expenses for this month.".to_string()
    } else {
        question
    };

    let session = Arc::new(SessionStore::new());
    session.set_token(token);

    let client = ChatClient::new(ClientOptions::from_env()?, session)?;

    let health = client.check_health().await;
    println!("AI service status: {}", health.status);
    if health.is_offline() {
        if let Some(message) = &health.message {
            println!("  {}", message);
        }
    }

    let cancel = CancelHandle::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    println!("\n> {}\n", question);

    let mut handler = Callbacks::new(
        |token| {
            print!("{}", token);
            // Flush stdout to show text immediately
            let _ = std::io::stdout().flush();
        },
        || println!("\n\n=== Stream Complete ==="),
        |err| eprintln!("\nError: {}", err),
    );

    let outcome = client
        .chat_stream_with_cancel(question, Vec::new(), &mut handler, &cancel)
        .await;

    println!("Outcome: {:?}", outcome);
    Ok(())
}
