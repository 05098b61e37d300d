use futures::{Stream, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;

use super::{AdapterError, StreamEvent};

pub const DONE_SENTINEL: &str = "[DONE]";

/// What a provider-specific decoder made of one `data:` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Skip,
    Stop,
}

/// Splits a byte stream into complete lines, keeping a trailing partial
/// line buffered until the next read. Buffering happens on bytes so a
/// multi-byte character split across reads is reassembled intact.
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    pending: Vec<u8>,
}

impl SseLineBuffer {
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(line_end) = self.pending.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=line_end).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// Returns whatever is left once the body is exhausted.
    pub fn finish(&mut self) -> Option<String> {
        let mut rest = std::mem::take(&mut self.pending);
        if rest.last() == Some(&b'\r') {
            rest.pop();
        }
        if rest.iter().all(u8::is_ascii_whitespace) {
            return None;
        }
        Some(String::from_utf8_lossy(&rest).into_owned())
    }
}

pub fn data_payload(line: &str) -> Option<&str> {
    let data = line.strip_prefix("data:")?;
    Some(data.strip_prefix(' ').unwrap_or(data).trim_end())
}

enum Flow {
    Continue,
    Finished,
    Cancelled,
}

/// Reads an SSE body to the end, handing each JSON `data:` payload to
/// `decode` and forwarding text frames to `tx` in order.
///
/// Lines without the `data:` prefix and payloads that are not JSON are
/// skipped. The body is released on every return path.
pub async fn forward_events<S, B, E, D, M>(
    body: S,
    decode: D,
    tx: &mpsc::Sender<StreamEvent>,
    map_err: M,
) -> Result<(), AdapterError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    D: Fn(&Value) -> Result<Frame, AdapterError>,
    M: Fn(E) -> AdapterError,
{
    futures::pin_mut!(body);
    let mut lines = SseLineBuffer::default();

    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(&map_err)?;
        for line in lines.push(chunk.as_ref()) {
            match handle_line(&line, &decode, tx).await? {
                Flow::Continue => {}
                Flow::Finished => return finish(tx).await,
                Flow::Cancelled => return Ok(()),
            }
        }
    }

    if let Some(line) = lines.finish() {
        if let Flow::Cancelled = handle_line(&line, &decode, tx).await? {
            return Ok(());
        }
    }

    finish(tx).await
}

async fn handle_line<D>(
    line: &str,
    decode: &D,
    tx: &mpsc::Sender<StreamEvent>,
) -> Result<Flow, AdapterError>
where
    D: Fn(&Value) -> Result<Frame, AdapterError>,
{
    let Some(data) = data_payload(line) else {
        return Ok(Flow::Continue);
    };
    if data == DONE_SENTINEL {
        return Ok(Flow::Finished);
    }

    let payload = match serde_json::from_str::<Value>(data) {
        Ok(payload) => payload,
        Err(error) => {
            log::trace!("skipping non-JSON stream frame: {error}");
            return Ok(Flow::Continue);
        }
    };

    match decode(&payload)? {
        Frame::Text(text) if !text.is_empty() => {
            if tx.send(StreamEvent::Text(text)).await.is_err() {
                log::debug!("stream receiver dropped, abandoning provider stream");
                return Ok(Flow::Cancelled);
            }
            Ok(Flow::Continue)
        }
        Frame::Text(_) | Frame::Skip => Ok(Flow::Continue),
        Frame::Stop => Ok(Flow::Finished),
    }
}

async fn finish(tx: &mpsc::Sender<StreamEvent>) -> Result<(), AdapterError> {
    let _ = tx.send(StreamEvent::Done).await;
    Ok(())
}
