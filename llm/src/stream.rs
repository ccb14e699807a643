use crate::client::BoxedStream;
use crate::decode::extract_fragment;
use crate::error::ChatError;
use crate::sse::{EventStream, SseEvent};
use bytes::Bytes;
use futures::stream::{FusedStream, Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll, ready};

type ByteSource = BoxedStream<Result<Bytes, ChatError>>;

/// Text fragments of one streamed completion, in server order.
///
/// Pull-based: the response body is only read while the stream is polled.
/// Dropping the stream, or calling [`FragmentStream::cancel`], drops the
/// underlying response and with it the connection. A body that ends without
/// delivering a single byte yields one [`ChatError::EmptyBody`].
pub struct FragmentStream {
    events: Option<EventStream<ByteSource>>,
}

impl FragmentStream {
    pub fn new<S, E>(body: S) -> Self
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: Into<ChatError> + 'static,
    {
        let body: ByteSource = Box::pin(body.map(|chunk| chunk.map_err(Into::into)));
        FragmentStream {
            events: Some(EventStream::new(body)),
        }
    }

    pub fn from_response(response: reqwest::Response) -> Self {
        Self::new(response.bytes_stream())
    }

    /// Stop reading and release the connection. Nothing is yielded afterwards.
    pub fn cancel(&mut self) {
        self.events = None;
    }
}

impl Stream for FragmentStream {
    type Item = Result<String, ChatError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            let Some(events) = this.events.as_mut() else {
                return Poll::Ready(None);
            };

            match ready!(events.poll_next_unpin(cx)) {
                Some(Ok(SseEvent::Data(payload))) => {
                    if let Some(fragment) = extract_fragment(&payload) {
                        return Poll::Ready(Some(Ok(fragment)));
                    }
                }
                Some(Ok(SseEvent::End)) => {
                    this.events = None;
                    return Poll::Ready(None);
                }
                None => {
                    let empty = !events.received_bytes();
                    this.events = None;
                    return Poll::Ready(empty.then_some(Err(ChatError::EmptyBody)));
                }
                Some(Err(err)) => {
                    this.events = None;
                    return Poll::Ready(Some(Err(err)));
                }
            }
        }
    }
}

impl FusedStream for FragmentStream {
    fn is_terminated(&self) -> bool {
        self.events.is_none()
    }
}
