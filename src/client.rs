//! Assistant client and error types.

use futures::Stream;
use reqwest::header::CONTENT_TYPE;
use thiserror::Error;

use crate::http::{add_bearer_auth, add_extra_headers, build_http_client};
use crate::model::{ChatEvent, ChatMessage, ChatRequest, HealthStatus};
use crate::options::ClientOptions;
use crate::session::CredentialProvider;
use crate::sse::SseResponseExt;
use crate::stream::{decode_events, dispatch, CancelHandle, ChatHandler, StreamOutcome};

const CHAT_PATH: &str = "/ai/chat";
const HEALTH_PATH: &str = "/ai/health";

/// Reported to `on_error` instead of the raw error when the connection drops
/// or times out.
pub const NETWORK_INTERRUPTED_MESSAGE: &str =
    "Network connection interrupted or the service timed out, please retry";

/// Errors that can occur during client operations.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP error! status: {0}")]
    Status(u16),

    /// The response body broke off while it was being read.
    #[error("Stream error: {0}")]
    Stream(#[source] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// Whether the error is a network-layer fault: the connection could not
    /// be made, timed out, or broke while the body was being read.
    pub fn is_network(&self) -> bool {
        match self {
            ClientError::Http(e) => e.is_connect() || e.is_timeout() || e.is_body(),
            ClientError::Stream(_) => true,
            _ => false,
        }
    }

    /// Text handed to `on_error`.
    pub fn user_message(&self) -> String {
        if self.is_network() {
            NETWORK_INTERRUPTED_MESSAGE.to_string()
        } else {
            self.to_string()
        }
    }
}

/// Client for the backend's AI assistant endpoints.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use cashflow_chat::{ChatClient, ClientOptions, SessionStore};
/// use cashflow_chat::stream::Callbacks;
///
/// # async fn run() -> Result<(), cashflow_chat::ClientError> {
/// let session = Arc::new(SessionStore::new());
/// session.set_token("eyJhbGciOi...");
///
/// let client = ChatClient::new(ClientOptions::from_env()?, session)?;
///
/// let mut answer = String::new();
/// let mut handler = Callbacks::new(
///     |token| answer.push_str(token),
///     || println!("done"),
///     |err| eprintln!("assistant failed: {}", err),
/// );
/// client.chat_stream("Summarize this month's cash flow", Vec::new(), &mut handler).await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ChatClient<C> {
    http: reqwest::Client,
    options: ClientOptions,
    credentials: C,
}

impl<C: CredentialProvider> ChatClient<C> {
    pub fn new(options: ClientOptions, credentials: C) -> Result<Self, ClientError> {
        let http = build_http_client(&options)?;
        Ok(Self {
            http,
            options,
            credentials,
        })
    }

    /// Send a chat request and return the decoded event stream.
    ///
    /// Fails up front if the credential cannot be read, the request cannot be
    /// sent, or the status is not a success. After that, transport errors
    /// show up as `Err` items and end the stream. Malformed frames and unknown
    /// event types are skipped.
    pub async fn chat_events(
        &self,
        request: &ChatRequest,
    ) -> Result<impl Stream<Item = Result<ChatEvent, ClientError>> + Send, ClientError> {
        let token = self.credentials.bearer_token().await?;
        let url = self.options.endpoint(CHAT_PATH);

        tracing::debug!(
            url = %url,
            message_len = request.message.len(),
            history_len = request.history.len(),
            authenticated = token.is_some(),
            "starting chat stream"
        );

        let mut req = self.http.post(&url).header(CONTENT_TYPE, "application/json");
        req = add_bearer_auth(req, token.as_ref());
        req = add_extra_headers(req, &self.options.extra_headers);

        let response = req.json(request).send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(ClientError::Status(status.as_u16()));
        }

        Ok(decode_events(response.sse()))
    }

    /// Stream an answer into `handler`.
    ///
    /// Every failure is reported through `on_error`; nothing is returned as
    /// an error. A body that ends without a `done` event produces no
    /// `on_done` call.
    pub async fn chat_stream<H>(
        &self,
        message: impl Into<String>,
        history: Vec<ChatMessage>,
        handler: &mut H,
    ) -> StreamOutcome
    where
        H: ChatHandler + ?Sized,
    {
        self.chat_stream_with_cancel(message, history, handler, &CancelHandle::new())
            .await
    }

    /// Like [`chat_stream`](Self::chat_stream), but stops as soon as `cancel`
    /// fires, whether the request is still being sent or the body is being read.
    /// No callback is invoked after cancellation.
    pub async fn chat_stream_with_cancel<H>(
        &self,
        message: impl Into<String>,
        history: Vec<ChatMessage>,
        handler: &mut H,
        cancel: &CancelHandle,
    ) -> StreamOutcome
    where
        H: ChatHandler + ?Sized,
    {
        let request = ChatRequest::new(message, history);

        let started = tokio::select! {
            biased;
            _ = cancel.cancelled() => return StreamOutcome::Cancelled,
            started = self.chat_events(&request) => started,
        };

        match started {
            Ok(events) => dispatch(events, handler, cancel).await,
            Err(e) => {
                tracing::error!(error = %e, "chat request failed");
                let message = e.user_message();
                handler.on_error(&message);
                StreamOutcome::Failed(message)
            }
        }
    }

    /// Ask the backend whether the AI service is up.
    ///
    /// Never fails: any error is turned into an `offline` status carrying the
    /// error text.
    pub async fn check_health(&self) -> HealthStatus {
        match self.fetch_health().await {
            Ok(health) => health,
            Err(e) => {
                tracing::warn!(error = %e, "AI health check failed");
                HealthStatus::offline(e.to_string())
            }
        }
    }

    async fn fetch_health(&self) -> Result<HealthStatus, ClientError> {
        let token = self.credentials.bearer_token().await?;

        let mut req = self.http.get(self.options.endpoint(HEALTH_PATH));
        req = add_bearer_auth(req, token.as_ref());
        req = add_extra_headers(req, &self.options.extra_headers);

        let body = req.send().await?.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}
