//! SSE wire plumbing shared by the transport session.
//!
//! The MCP SSE transport carries JSON-RPC frames as `data:` payloads on a
//! long-lived event stream; the first event (`event: endpoint`) names the
//! URL the client must POST its own messages to. This module owns the
//! byte-level framing: chunk-boundary-safe line splitting, event assembly,
//! and endpoint URL construction.

/// Incremental line splitter for SSE byte streams.
///
/// Chunks may end mid-line; completed lines are returned as they close and
/// the trailing partial line is kept buffered until the next push.
#[derive(Default)]
pub struct SseLineBuffer {
    buffer: Vec<u8>,
}

impl SseLineBuffer {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        self.drain_lines(false)
    }

    pub fn finish(&mut self) -> Vec<String> {
        self.drain_lines(true)
    }

    fn drain_lines(&mut self, flush: bool) -> Vec<String> {
        let mut lines = Vec::new();
        let mut search_index = 0;

        while let Some(relative_pos) = self.buffer[search_index..].iter().position(|b| *b == b'\n')
        {
            let newline_index = search_index + relative_pos;
            let mut line_end = newline_index;
            if line_end > search_index && self.buffer[line_end - 1] == b'\r' {
                line_end -= 1;
            }

            let line_bytes = &self.buffer[search_index..line_end];
            if let Ok(text) = std::str::from_utf8(line_bytes) {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    lines.push(trimmed.to_string());
                }
            }

            search_index = newline_index + 1;
        }

        if flush {
            if let Ok(text) = std::str::from_utf8(&self.buffer[search_index..]) {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    lines.push(trimmed.to_string());
                }
            }
            self.buffer.clear();
        } else if search_index > 0 {
            self.buffer.drain(..search_index);
        }

        lines
    }
}

/// One decoded server-sent event: its `event:` name and `data:` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub name: String,
    pub data: String,
}

/// Pairs `event:` lines with the `data:` line that follows them.
///
/// Events without an explicit name default to `message`, per the SSE spec.
/// Multi-line data payloads do not occur in this protocol; each `data:` line
/// closes the pending event.
#[derive(Default)]
pub struct SseEventParser {
    pending_name: Option<String>,
}

impl SseEventParser {
    pub fn feed(&mut self, line: &str) -> Option<SseEvent> {
        if let Some(name) = line.strip_prefix("event:") {
            self.pending_name = Some(name.trim().to_string());
            return None;
        }
        let payload = sse_data_payload(line)?;
        if payload.is_empty() {
            return None;
        }
        let name = self
            .pending_name
            .take()
            .unwrap_or_else(|| "message".to_string());
        Some(SseEvent {
            name,
            data: payload.to_string(),
        })
    }
}

pub fn sse_data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim)
}

pub fn is_event_stream_content_type(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(str::trim)
        .is_some_and(|value| value.eq_ignore_ascii_case("text/event-stream"))
}

/// Build the SSE stream URL for a configured endpoint address.
///
/// A bare `host:port` is treated as http; trailing slashes are stripped so
/// the `/sse` suffix never doubles up.
///
/// # Examples
///
/// ```
/// use toolgate::mcp::transport::sse_stream_url;
///
/// assert_eq!(sse_stream_url("localhost:7001"), "http://localhost:7001/sse");
/// assert_eq!(sse_stream_url("https://tools.internal/"), "https://tools.internal/sse");
/// ```
pub fn sse_stream_url(host: &str) -> String {
    let base = if host.contains("://") {
        host.to_string()
    } else {
        format!("http://{host}")
    };
    format!("{}/sse", base.trim_end_matches('/'))
}

/// Resolve the message-POST URL announced on the stream against the stream's
/// origin. Servers send either an absolute URL or a path like
/// `/messages/?session_id=abc`.
pub fn resolve_message_url(stream_url: &str, announced: &str) -> String {
    if announced.contains("://") {
        return announced.to_string();
    }
    let origin = match stream_url.find("://") {
        Some(scheme_end) => {
            let authority_start = scheme_end + 3;
            match stream_url[authority_start..].find('/') {
                Some(path_start) => &stream_url[..authority_start + path_start],
                None => stream_url,
            }
        }
        None => stream_url,
    };
    format!("{}/{}", origin.trim_end_matches('/'), announced.trim_start_matches('/'))
}
