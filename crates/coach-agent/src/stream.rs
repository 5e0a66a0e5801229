use std::pin::Pin;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{CoachError, Result};

// ─── ChatStream ───────────────────────────────────────────────────────────

/// An async stream of text chunks from the coach.
///
/// Backed by a Tokio mpsc channel fed by a background task. Dropping the
/// stream closes the receiver, which stops the producer on its next send.
pub struct ChatStream {
    rx: mpsc::Receiver<Result<String>>,
}

impl ChatStream {
    /// Wrap a raw receiver. Transports feed the sending half; tests inject
    /// pre-built chunk sequences.
    pub fn from_channel(rx: mpsc::Receiver<Result<String>>) -> Self {
        Self { rx }
    }

    /// A finished stream yielding `chunks` in order.
    pub fn from_chunks<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let chunks: Vec<String> = chunks.into_iter().map(Into::into).collect();
        let (tx, rx) = mpsc::channel(chunks.len().max(1));
        for chunk in chunks {
            // Capacity covers every chunk, so this never fails.
            let _ = tx.try_send(Ok(chunk));
        }
        Self { rx }
    }
}

impl Stream for ChatStream {
    type Item = Result<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

// ─── drain ────────────────────────────────────────────────────────────────

/// Read `stream` to the end and return the concatenated text.
///
/// Returns [`CoachError::Cancelled`] as soon as `cancel` fires; partial text
/// is discarded.
pub async fn drain(mut stream: ChatStream, cancel: &CancellationToken) -> Result<String> {
    let mut text = String::new();
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CoachError::Cancelled),
            chunk = stream.next() => match chunk {
                Some(chunk) => text.push_str(&chunk?),
                None => return Ok(text),
            },
        }
    }
}

// ─── Utf8Decoder ──────────────────────────────────────────────────────────

/// Incremental UTF-8 decoding for byte chunks that may split a character.
#[derive(Debug, Default)]
pub(crate) struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    /// Decode as much of `pending + bytes` as forms complete characters.
    pub(crate) fn push(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(s) => {
                    out.push_str(s);
                    self.pending.clear();
                    return out;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    // Everything before `valid` was just checked.
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match e.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + bad);
                        }
                        None => {
                            self.pending.drain(..valid);
                            return out;
                        }
                    }
                }
            }
        }
    }

    /// Flush whatever is left at end of stream.
    pub(crate) fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        rest
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn mock_stream(chunks: Vec<Result<String>>) -> ChatStream {
        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(async move {
            for chunk in chunks {
                if tx.send(chunk).await.is_err() {
                    break;
                }
            }
        });
        ChatStream::from_channel(rx)
    }

    #[tokio::test]
    async fn drain_concatenates_chunks() {
        let stream = mock_stream(vec![Ok("Hel".into()), Ok("lo ".into()), Ok("there".into())]);
        let text = drain(stream, &CancellationToken::new()).await.unwrap();
        assert_eq!(text, "Hello there");
    }

    #[tokio::test]
    async fn drain_propagates_chunk_error() {
        let stream = mock_stream(vec![
            Ok("partial".into()),
            Err(CoachError::Transport("connection reset".into())),
        ]);
        let err = drain(stream, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, CoachError::Transport(_)));
    }

    #[tokio::test]
    async fn drain_stops_on_cancel() {
        let (tx, rx) = mpsc::channel::<Result<String>>(4);
        tx.send(Ok("never finished".into())).await.unwrap();
        let cancel = CancellationToken::new();
        let child = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            child.cancel();
        });
        let err = drain(ChatStream::from_channel(rx), &cancel).await.unwrap_err();
        assert!(matches!(err, CoachError::Cancelled));
        drop(tx);
    }

    #[tokio::test]
    async fn from_chunks_ends() {
        let text = drain(ChatStream::from_chunks(["a", "b"]), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(text, "ab");
    }

    #[test]
    fn decoder_reassembles_split_characters() {
        let bytes = "同理心 ✨".as_bytes();
        let mut d = Utf8Decoder::default();
        let mut out = String::new();
        for b in bytes {
            out.push_str(&d.push(std::slice::from_ref(b)));
        }
        out.push_str(&d.finish());
        assert_eq!(out, "同理心 ✨");
    }

    #[test]
    fn decoder_replaces_invalid_bytes() {
        let mut d = Utf8Decoder::default();
        let out = d.push(&[b'a', 0xFF, b'b']);
        assert_eq!(out, "a\u{FFFD}b");
    }

    #[test]
    fn decoder_flushes_truncated_tail() {
        let mut d = Utf8Decoder::default();
        let first = d.push(&"é".as_bytes()[..1]);
        assert_eq!(first, "");
        assert_eq!(d.finish(), "\u{FFFD}");
    }
}
