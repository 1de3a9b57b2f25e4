use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Header blocks larger than this are treated as garbage.
const MAX_HEADER: usize = 8 * 1024;
/// Bodies claiming more than this are not buffered.
const MAX_BODY: usize = 64 * 1024 * 1024;
const HEADER_END: &[u8] = b"\r\n\r\n";

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame header has no Content-Length")]
    MissingLength,

    #[error("invalid Content-Length {0:?}")]
    BadLength(String),

    #[error("frame header exceeds 8 KiB without a terminator")]
    HeaderTooLarge,

    #[error("frame body of {0} bytes exceeds 64 MiB")]
    BodyTooLarge(usize),

    #[error("frame body is not JSON-RPC: {0}")]
    Json(#[from] serde_json::Error),
}

/// What a JSON-RPC message is, as far as logging cares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameKind {
    Request,
    Notification,
    Response,
}

/// Summary of one complete LSP frame.
#[derive(Debug, Clone, PartialEq)]
pub struct LspFrame {
    pub kind: FrameKind,
    pub method: Option<String>,
    pub id: Option<Value>,
    pub len: usize,
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    method: Option<String>,
}

/// Incremental parser for `Content-Length` framed JSON-RPC streams.
///
/// Bytes arrive in arbitrary chunks; complete frames are reported as soon
/// as their body is in.
#[derive(Debug, Default)]
pub struct FrameScanner {
    buf: Vec<u8>,
}

impl FrameScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes and collect every frame they complete.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Result<LspFrame, FrameError>> {
        self.buf.extend_from_slice(bytes);
        let mut frames = Vec::new();
        loop {
            let Some(header_end) = find(&self.buf, HEADER_END) else {
                if self.buf.len() > MAX_HEADER {
                    self.buf.clear();
                    frames.push(Err(FrameError::HeaderTooLarge));
                }
                break;
            };
            let body_start = header_end + HEADER_END.len();
            let len = match content_length(&self.buf[..header_end]) {
                Ok(len) => len,
                Err(err) => {
                    self.buf.drain(..body_start);
                    frames.push(Err(err));
                    continue;
                }
            };
            let frame_end = match body_start.checked_add(len) {
                Some(end) if len <= MAX_BODY => end,
                _ => {
                    // Resync on whatever header follows.
                    self.buf.clear();
                    frames.push(Err(FrameError::BodyTooLarge(len)));
                    break;
                }
            };
            if self.buf.len() < frame_end {
                break;
            }
            let body: Vec<u8> = self.buf.drain(..frame_end).skip(body_start).collect();
            frames.push(summarize(&body));
        }
        frames
    }

    /// Bytes held while waiting for the rest of a frame.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

fn summarize(body: &[u8]) -> Result<LspFrame, FrameError> {
    let envelope: Envelope = serde_json::from_slice(body)?;
    let kind = match (&envelope.method, &envelope.id) {
        (Some(_), Some(_)) => FrameKind::Request,
        (Some(_), None) => FrameKind::Notification,
        (None, _) => FrameKind::Response,
    };
    Ok(LspFrame {
        kind,
        method: envelope.method,
        id: envelope.id,
        len: body.len(),
    })
}

fn content_length(header: &[u8]) -> Result<usize, FrameError> {
    let header = String::from_utf8_lossy(header);
    for line in header.split("\r\n") {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        if name.trim().eq_ignore_ascii_case("content-length") {
            let value = value.trim();
            return value
                .parse()
                .map_err(|_| FrameError::BadLength(value.to_string()));
        }
    }
    Err(FrameError::MissingLength)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Frame a JSON body the way LSP peers expect.
pub fn encode(body: &str) -> Vec<u8> {
    let mut out = format!("Content-Length: {}\r\n\r\n", body.len()).into_bytes();
    out.extend_from_slice(body.as_bytes());
    out
}
