//! Byte-stream framing shared by the provider adapters.
//!
//! Providers stream in one of two framings: server-sent events
//! (blank-line delimited, `event:`/`data:` fields) or newline-delimited
//! JSON. [`FrameDecoder`] turns raw network chunks into [`Frame`]s for
//! either framing. Multi-byte UTF-8 sequences split across chunk
//! boundaries are carried over to the next chunk; permanently invalid bytes
//! are skipped.
//!
//! [`ToolCallAccumulator`] collects tool-call fragments that arrive over
//! several frames, keyed by the provider's call index.

use std::collections::BTreeMap;

use futures::StreamExt;

use crate::chat::ToolCallInfo;
use crate::error::LlmError;

/// Maximum size for buffers before we abort the stream.
pub const MAX_BUF: usize = 16 * 1024 * 1024; // 16 MiB

/// How the byte stream is split into frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// Server-sent events separated by a blank line.
    Sse,
    /// One JSON document per line.
    JsonLines,
}

/// One decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// SSE `event:` name, if present. Always `None` for JSON lines.
    pub event: Option<String>,
    /// The payload: joined `data:` lines for SSE, the whole line otherwise.
    pub data: String,
}

/// Incremental decoder from byte chunks to [`Frame`]s.
#[derive(Debug)]
pub struct FrameDecoder {
    framing: Framing,
    text: String,
    utf8_buf: Vec<u8>,
}

impl FrameDecoder {
    /// Creates a decoder for the given framing.
    pub fn new(framing: Framing) -> Self {
        Self {
            framing,
            text: String::new(),
            utf8_buf: Vec::new(),
        }
    }

    /// Feeds one network chunk and returns every frame it completed.
    ///
    /// Only the unterminated remainder counts against [`MAX_BUF`], so a
    /// large chunk of small frames is fine.
    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<Frame>, LlmError> {
        self.utf8_buf.extend_from_slice(bytes);
        self.decode_utf8();

        let (delimiter, parse): (&str, fn(&str) -> Option<Frame>) = match self.framing {
            Framing::Sse => ("\n\n", parse_sse_block),
            Framing::JsonLines => ("\n", json_line),
        };
        let mut frames = Vec::new();
        let mut consumed = 0;
        while let Some(pos) = self.text[consumed..].find(delimiter) {
            let end = consumed + pos + delimiter.len();
            frames.extend(parse(&self.text[consumed..end]));
            consumed = end;
        }
        self.text.drain(..consumed);

        if self.text.len() > MAX_BUF {
            self.text.clear();
            return Err(LlmError::ResponseFormat {
                message: "stream buffer exceeded 16 MiB".into(),
                raw: String::new(),
            });
        }
        Ok(frames)
    }

    /// Flushes whatever remains once the stream has ended.
    ///
    /// Servers are not required to terminate the last event or line, so the
    /// tail is parsed as one final frame.
    pub fn finish(&mut self) -> Vec<Frame> {
        let tail = std::mem::take(&mut self.text);
        self.utf8_buf.clear();
        match self.framing {
            Framing::Sse => parse_sse_block(&tail).into_iter().collect(),
            Framing::JsonLines => json_line(&tail).into_iter().collect(),
        }
    }

    fn decode_utf8(&mut self) {
        loop {
            match std::str::from_utf8(&self.utf8_buf) {
                Ok(text) => {
                    push_normalized(&mut self.text, text);
                    self.utf8_buf.clear();
                    return;
                }
                Err(e) => {
                    let valid_up_to = e.valid_up_to();
                    if let Ok(valid) = std::str::from_utf8(&self.utf8_buf[..valid_up_to]) {
                        push_normalized(&mut self.text, valid);
                    }
                    match e.error_len() {
                        // Skip past permanently invalid bytes and keep going.
                        Some(len) => {
                            self.utf8_buf.drain(..valid_up_to + len);
                        }
                        // Incomplete sequence at the end: wait for more bytes.
                        None => {
                            self.utf8_buf.drain(..valid_up_to);
                            return;
                        }
                    }
                }
            }
        }
    }
}

/// CRLF line endings are folded to LF so frame splitting only looks for `\n`.
fn push_normalized(buf: &mut String, text: &str) {
    buf.extend(text.chars().filter(|&c| c != '\r'));
}

fn parse_sse_block(block: &str) -> Option<Frame> {
    let mut event = None;
    let mut data: Option<String> = None;
    for line in block.lines() {
        if line.starts_with(':') {
            continue;
        }
        if let Some(name) = line.strip_prefix("event:") {
            event = Some(name.trim().to_owned());
        } else if let Some(payload) = line.strip_prefix("data:") {
            let payload = payload.strip_prefix(' ').unwrap_or(payload);
            match &mut data {
                Some(existing) => {
                    existing.push('\n');
                    existing.push_str(payload);
                }
                None => data = Some(payload.to_owned()),
            }
        }
    }
    data.map(|data| Frame { event, data })
}

fn json_line(line: &str) -> Option<Frame> {
    let line = line.trim();
    (!line.is_empty()).then(|| Frame {
        event: None,
        data: line.to_owned(),
    })
}

/// Reads a response body to the end, handing each frame to `on_frame` in
/// arrival order.
///
/// Stops at the first error returned by `on_frame`.
pub async fn read_frames<F>(
    response: reqwest::Response,
    framing: Framing,
    mut on_frame: F,
) -> Result<(), LlmError>
where
    F: FnMut(Frame) -> Result<(), LlmError>,
{
    let mut decoder = FrameDecoder::new(framing);
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let bytes = chunk.map_err(|e| LlmError::Http {
            status: None,
            message: format!("Stream read error: {e}"),
        })?;
        for frame in decoder.push(&bytes)? {
            on_frame(frame)?;
        }
    }
    for frame in decoder.finish() {
        on_frame(frame)?;
    }
    Ok(())
}

#[derive(Debug, Default)]
struct PartialCall {
    id: String,
    name: String,
    arguments: String,
}

/// Accretes tool calls from incremental fragments.
///
/// Fragments are keyed by the provider-assigned index. Ids and names
/// replace earlier values when non-empty; argument fragments are appended.
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    calls: BTreeMap<u32, PartialCall>,
}

impl ToolCallAccumulator {
    /// Creates an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one fragment for the call at `index`.
    pub fn apply(
        &mut self,
        index: u32,
        id: Option<&str>,
        name: Option<&str>,
        arguments: Option<&str>,
    ) {
        let call = self.calls.entry(index).or_default();
        if let Some(id) = id.filter(|s| !s.is_empty()) {
            id.clone_into(&mut call.id);
        }
        if let Some(name) = name.filter(|s| !s.is_empty()) {
            name.clone_into(&mut call.name);
        }
        if let Some(args) = arguments {
            call.arguments.push_str(args);
        }
    }

    /// Returns `true` if no fragment has been applied.
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Yields the complete calls in index order.
    ///
    /// Calls still missing an id or a name are dropped, as if the model had
    /// never requested them.
    pub fn finish(self) -> Vec<ToolCallInfo> {
        self.calls
            .into_iter()
            .filter_map(|(index, call)| {
                if call.id.is_empty() || call.name.is_empty() {
                    tracing::warn!(
                        index,
                        id = %call.id,
                        name = %call.name,
                        "dropping incomplete tool call"
                    );
                    return None;
                }
                Some(ToolCallInfo {
                    id: call.id,
                    name: call.name,
                    arguments: call.arguments,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sse_frames_split_on_blank_line() {
        let mut decoder = FrameDecoder::new(Framing::Sse);
        let frames = decoder
            .push(b"data: {\"a\":1}\n\ndata: {\"a\":2}\n\ndata: par")
            .unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].data, r#"{"a":1}"#);
        assert_eq!(frames[1].data, r#"{"a":2}"#);

        let frames = decoder.push(b"tial\n\n").unwrap();
        assert_eq!(frames[0].data, "partial");
    }

    #[test]
    fn test_sse_event_name_retained() {
        let mut decoder = FrameDecoder::new(Framing::Sse);
        let frames = decoder
            .push(b"event: message_stop\ndata: {\"type\":\"message_stop\"}\n\n")
            .unwrap();
        assert_eq!(frames[0].event.as_deref(), Some("message_stop"));
    }

    #[test]
    fn test_sse_crlf_and_comments() {
        let mut decoder = FrameDecoder::new(Framing::Sse);
        let frames = decoder
            .push(b": keep-alive\r\n\r\ndata: [DONE]\r\n\r\n")
            .unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "[DONE]");
    }

    #[test]
    fn test_sse_multiline_data_joined() {
        let mut decoder = FrameDecoder::new(Framing::Sse);
        let frames = decoder.push(b"data: one\ndata: two\n\n").unwrap();
        assert_eq!(frames[0].data, "one\ntwo");
    }

    #[test]
    fn test_utf8_split_across_chunks() {
        let text = "data: caf\u{e9}\n\n";
        let bytes = text.as_bytes();
        // Split inside the two-byte encoding of 'é'.
        let split = bytes.iter().position(|&b| b == 0xC3).unwrap() + 1;

        let mut decoder = FrameDecoder::new(Framing::Sse);
        assert!(decoder.push(&bytes[..split]).unwrap().is_empty());
        let frames = decoder.push(&bytes[split..]).unwrap();
        assert_eq!(frames[0].data, "caf\u{e9}");
    }

    #[test]
    fn test_invalid_utf8_is_skipped() {
        let mut decoder = FrameDecoder::new(Framing::JsonLines);
        let frames = decoder.push(b"{\"a\":\xFF1}\n").unwrap();
        assert_eq!(frames[0].data, r#"{"a":1}"#);
    }

    #[test]
    fn test_json_lines_and_unterminated_tail() {
        let mut decoder = FrameDecoder::new(Framing::JsonLines);
        let frames = decoder.push(b"{\"done\":false}\n\n{\"done\":").unwrap();
        assert_eq!(frames.len(), 1);
        assert!(decoder.push(b"true}").unwrap().is_empty());
        let tail = decoder.finish();
        assert_eq!(tail[0].data, r#"{"done":true}"#);
    }

    #[test]
    fn test_oversized_buffer_aborts() {
        let mut decoder = FrameDecoder::new(Framing::Sse);
        let big = vec![b'x'; MAX_BUF + 1];
        let err = decoder.push(&big).unwrap_err();
        assert!(matches!(err, LlmError::ResponseFormat { .. }));
    }

    #[test]
    fn test_large_chunk_of_small_lines_is_accepted() {
        let mut decoder = FrameDecoder::new(Framing::JsonLines);
        let line = b"{\"message\":{\"content\":\"x\"},\"done\":false}\n";
        let count = MAX_BUF / line.len() + 2;
        let chunk = line.repeat(count);
        assert!(chunk.len() > MAX_BUF);

        let frames = decoder.push(&chunk).unwrap();
        assert_eq!(frames.len(), count);
    }

    #[test]
    fn test_accumulator_accretes_by_index() {
        let mut acc = ToolCallAccumulator::new();
        acc.apply(1, Some("call_b"), Some("second"), Some("{}"));
        acc.apply(0, Some("call_a"), Some("first"), Some("{\"x\":"));
        acc.apply(0, None, None, Some("1}"));

        let calls = acc.finish();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].name, "first");
        assert_eq!(calls[0].arguments, r#"{"x":1}"#);
        assert_eq!(calls[1].id, "call_b");
    }

    #[test]
    fn test_accumulator_drops_incomplete_calls() {
        let mut acc = ToolCallAccumulator::new();
        acc.apply(0, None, Some("no_id"), Some("{}"));
        acc.apply(1, Some("call_1"), None, Some("{}"));
        acc.apply(2, Some("call_2"), Some(""), None);
        acc.apply(3, Some("call_3"), Some("ok"), None);

        let calls = acc.finish();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "ok");
    }
}
