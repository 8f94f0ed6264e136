//! Chat event decoding, callback dispatch and cancellation.

use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::client::ClientError;
use crate::model::ChatEvent;

/// Receiver of chat stream events.
///
/// Callbacks run synchronously inside the read loop, in the order the frames
/// arrived. A misbehaving server may send both `done` and `error`, or
/// neither, so implementations must tolerate any number of terminal calls.
pub trait ChatHandler {
    /// A fragment of the answer.
    fn on_token(&mut self, content: &str);

    /// The server signalled completion.
    fn on_done(&mut self);

    /// The request failed, the transport broke, or the server sent an error event.
    fn on_error(&mut self, message: &str);

    /// A reasoning fragment. Ignored unless overridden.
    fn on_thinking(&mut self, _content: &str) {}
}

/// [`ChatHandler`] built from three closures.
///
/// # Example
/// ```
/// use cashflow_chat::stream::Callbacks;
///
/// let mut answer = String::new();
/// let handler = Callbacks::new(
///     |token| answer.push_str(token),
///     || println!("done"),
///     |err| eprintln!("error: {}", err),
/// );
/// # drop(handler);
/// ```
pub struct Callbacks<T, D, E> {
    on_token: T,
    on_done: D,
    on_error: E,
}

impl<T, D, E> Callbacks<T, D, E>
where
    T: FnMut(&str),
    D: FnMut(),
    E: FnMut(&str),
{
    pub fn new(on_token: T, on_done: D, on_error: E) -> Self {
        Self {
            on_token,
            on_done,
            on_error,
        }
    }
}

impl<T, D, E> ChatHandler for Callbacks<T, D, E>
where
    T: FnMut(&str),
    D: FnMut(),
    E: FnMut(&str),
{
    fn on_token(&mut self, content: &str) {
        (self.on_token)(content)
    }

    fn on_done(&mut self) {
        (self.on_done)()
    }

    fn on_error(&mut self, message: &str) {
        (self.on_error)(message)
    }
}

/// How one `chat_stream` invocation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    /// The last terminal event was `done`.
    Completed,
    /// The last terminal event was a server `error` event.
    ServerError(String),
    /// The request was rejected or the transport failed.
    Failed(String),
    /// The body ended without any terminal event.
    Ended,
    /// The caller cancelled the stream.
    Cancelled,
}

/// A handle that can be used to abort an in-flight chat stream.
///
/// Cancelling wakes a pending read immediately; the response body and its
/// decoder are dropped, which releases the connection.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// A future that resolves when cancellation is requested.
    pub fn cancelled(&self) -> tokio_util::sync::WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }
}

/// Decode SSE payloads into chat events.
///
/// Payloads that are not valid JSON are logged and skipped, as are unknown
/// event types. Transport errors pass through untouched.
pub fn decode_events<S>(payloads: S) -> impl Stream<Item = Result<ChatEvent, ClientError>> + Send
where
    S: Stream<Item = Result<String, ClientError>> + Send,
{
    payloads.filter_map(|item| async move {
        match item {
            Ok(payload) => match ChatEvent::from_payload(&payload) {
                Ok(ChatEvent::Unknown) => {
                    tracing::trace!(payload = %payload, "ignoring unknown chat event type");
                    None
                }
                Ok(event) => Some(Ok(event)),
                Err(e) => {
                    tracing::warn!(payload = %payload, error = %e, "failed to parse SSE data");
                    None
                }
            },
            Err(e) => Some(Err(e)),
        }
    })
}

/// Drive `events` to the end, forwarding each one to `handler`.
///
/// A transport error is reported through `on_error` and stops the loop.
pub async fn dispatch<S, H>(events: S, handler: &mut H, cancel: &CancelHandle) -> StreamOutcome
where
    S: Stream<Item = Result<ChatEvent, ClientError>>,
    H: ChatHandler + ?Sized,
{
    futures::pin_mut!(events);
    let mut outcome = StreamOutcome::Ended;

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!("chat stream cancelled by caller");
                return StreamOutcome::Cancelled;
            }
            item = events.next() => item,
        };

        let Some(item) = next else {
            return outcome;
        };

        match item {
            Ok(ChatEvent::Answer { content }) => handler.on_token(&content),
            Ok(ChatEvent::Thinking { content }) => handler.on_thinking(&content),
            Ok(ChatEvent::Done) => {
                handler.on_done();
                outcome = StreamOutcome::Completed;
            }
            Ok(ChatEvent::Error { content }) => {
                handler.on_error(&content);
                outcome = StreamOutcome::ServerError(content);
            }
            Ok(ChatEvent::Unknown) => {}
            Err(e) => {
                tracing::error!(error = %e, "streaming error");
                let message = e.user_message();
                handler.on_error(&message);
                return StreamOutcome::Failed(message);
            }
        }
    }
}
