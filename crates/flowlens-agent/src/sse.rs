//! Server-Sent Events decoding for the oracle transports.
//!
//! Both providers put the whole event in the `data:` payload (Anthropic
//! repeats the event name in the JSON `type` field), so the decoder only
//! surfaces data payloads and drops `event:`, `id:`, `retry:` and comment
//! lines.

use flowlens_common::OracleError;
use futures_util::StreamExt;

/// Incremental SSE decoder. Feed it raw body chunks as they arrive; it
/// buffers partial lines across chunk boundaries and yields one string per
/// completed event.
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: String,
    data: String,
}

impl SseDecoder {
    /// Absorb one body chunk and return the data payloads it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.push_str(&String::from_utf8_lossy(chunk));

        let mut payloads = Vec::new();
        while let Some(newline) = self.pending.find('\n') {
            let line: String = self.pending.drain(..=newline).collect();
            if let Some(payload) = self.take_line(line.trim_end_matches(['\n', '\r'])) {
                payloads.push(payload);
            }
        }
        payloads
    }

    /// Flush a payload left unterminated when the stream ended.
    pub fn finish(mut self) -> Option<String> {
        if let Some(payload) = self.take_line(self.pending.clone().trim_end_matches('\r')) {
            return Some(payload);
        }
        if self.data.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.data))
        }
    }

    fn take_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            if self.data.is_empty() {
                return None;
            }
            return Some(std::mem::take(&mut self.data));
        }
        if let Some(rest) = line.strip_prefix("data:") {
            if !self.data.is_empty() {
                self.data.push('\n');
            }
            self.data.push_str(rest.strip_prefix(' ').unwrap_or(rest));
        }
        None
    }
}

/// Drain a streaming response, invoking `on_payload` per decoded event.
pub async fn each_data_payload(
    response: reqwest::Response,
    mut on_payload: impl FnMut(&str),
) -> Result<(), OracleError> {
    let mut body = response.bytes_stream();
    let mut decoder = SseDecoder::default();

    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| OracleError::Network(e.to_string()))?;
        for payload in decoder.feed(&chunk) {
            on_payload(&payload);
        }
    }
    if let Some(payload) = decoder.finish() {
        on_payload(&payload);
    }
    Ok(())
}
