//! Incremental Server-Sent Events framing.
//!
//! Bytes arrive in arbitrary network chunks. [`LineBuffer`] reassembles them
//! into lines, [`parse_line`] classifies each line, and [`Frames`] /
//! [`EventStream`] drive that classification lazily over a line iterator or
//! a byte stream respectively.

use bytes::{Bytes, BytesMut};
use futures::stream::{Stream, StreamExt};
use std::iter::FusedIterator;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

const DATA_PREFIX: &str = "data: ";
const DONE_SENTINEL: &str = "[DONE]";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SseEvent {
    Data(String),
    /// The `[DONE]` sentinel. Nothing follows it.
    End,
}

/// Classify a single line (without its terminator).
///
/// Returns `None` for lines that carry no event: blank separators, `:`
/// comments, blank `data:` payloads and any field this client does not use.
pub fn parse_line(line: &str) -> Option<SseEvent> {
    let payload = line.strip_prefix(DATA_PREFIX)?;
    if payload == DONE_SENTINEL {
        Some(SseEvent::End)
    } else if payload.trim().is_empty() {
        None
    } else {
        Some(SseEvent::Data(payload.to_string()))
    }
}

/// Lazy event sequence over already-split lines.
///
/// Stops pulling from the underlying iterator as soon as `End` is produced.
#[derive(Debug)]
pub struct Frames<I> {
    lines: I,
    done: bool,
}

pub fn frames<I>(lines: I) -> Frames<I::IntoIter>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    Frames {
        lines: lines.into_iter(),
        done: false,
    }
}

impl<I> Iterator for Frames<I>
where
    I: Iterator,
    I::Item: AsRef<str>,
{
    type Item = SseEvent;

    fn next(&mut self) -> Option<SseEvent> {
        if self.done {
            return None;
        }
        for line in self.lines.by_ref() {
            if let Some(event) = parse_line(line.as_ref()) {
                self.done = event == SseEvent::End;
                return Some(event);
            }
        }
        self.done = true;
        None
    }
}

impl<I> FusedIterator for Frames<I>
where
    I: Iterator,
    I::Item: AsRef<str>,
{
}

/// Holds at most one partial line between network reads.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: BytesMut,
    /// Prefix of `buf` already known to contain no `\n`.
    scanned: usize,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Next complete line with its `\n` or `\r\n` terminator removed.
    ///
    /// Decoding happens per line so multi-byte characters split across
    /// chunks are reassembled before conversion.
    pub fn next_line(&mut self) -> Option<String> {
        let Some(offset) = self.buf[self.scanned..].iter().position(|&b| b == b'\n') else {
            self.scanned = self.buf.len();
            return None;
        };
        let pos = self.scanned + offset;
        self.scanned = 0;
        let line = self.buf.split_to(pos + 1);
        Some(decode_line(&line[..pos]))
    }

    /// Trailing bytes left when the source ends without a final newline.
    pub fn finish(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        self.scanned = 0;
        let rest = self.buf.split();
        Some(decode_line(&rest))
    }
}

fn decode_line(line: &[u8]) -> String {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line).into_owned()
}

/// Event stream over a chunked byte source.
///
/// Pull-based: the source is only polled when no complete line is buffered,
/// and never again once `End` or an error has been produced.
pub struct EventStream<S> {
    source: S,
    lines: LineBuffer,
    received_bytes: bool,
    source_done: bool,
    finished: bool,
}

impl<S> EventStream<S> {
    pub fn new(source: S) -> Self {
        EventStream {
            source,
            lines: LineBuffer::new(),
            received_bytes: false,
            source_done: false,
            finished: false,
        }
    }

    /// Whether the source has delivered at least one byte so far.
    pub fn received_bytes(&self) -> bool {
        self.received_bytes
    }
}

impl<S, E> Stream for EventStream<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    type Item = Result<SseEvent, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if this.finished {
                return Poll::Ready(None);
            }

            while let Some(line) = this.lines.next_line() {
                if let Some(event) = parse_line(&line) {
                    this.finished = event == SseEvent::End;
                    return Poll::Ready(Some(Ok(event)));
                }
            }

            if this.source_done {
                this.finished = true;
                let trailing = this.lines.finish().and_then(|line| parse_line(&line));
                return Poll::Ready(trailing.map(Ok));
            }

            match ready!(this.source.poll_next_unpin(cx)) {
                Some(Ok(chunk)) => {
                    this.received_bytes |= !chunk.is_empty();
                    this.lines.push(&chunk);
                }
                Some(Err(err)) => {
                    this.finished = true;
                    return Poll::Ready(Some(Err(err)));
                }
                None => this.source_done = true,
            }
        }
    }
}
