//! Framed message channel used between Cadence processes.
//!
//! Every frame is a `Content-Length` header block followed by a JSON body:
//!
//! ```text
//! Content-Length: 42\r\n
//! \r\n
//! {"selector":"open","data":["/a/b.scd"]}
//! ```
//!
//! The decoder accepts bytes in arbitrary chunks and only yields a message
//! once a whole frame has been buffered.

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Selector of the message that asks the primary instance to open files.
pub const OPEN_SELECTOR: &str = "open";

const MAX_BODY_SIZE: usize = 1024 * 1024;
const MAX_HEADER_SIZE: usize = 8 * 1024;
const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";
const READ_CHUNK_SIZE: usize = 8192;

/// A single IPC message: a selector naming the request plus its arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpcMessage {
    pub selector: String,
    #[serde(default)]
    pub data: Vec<String>,
}

impl IpcMessage {
    pub fn new(selector: impl Into<String>, data: Vec<String>) -> Self {
        Self {
            selector: selector.into(),
            data,
        }
    }

    /// An `open` request carrying already-canonicalized paths.
    pub fn open(paths: Vec<String>) -> Self {
        Self::new(OPEN_SELECTOR, paths)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("IPC socket error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed IPC frame header: {0}")]
    MalformedHeader(String),
    #[error("IPC frame too large ({len} bytes, max {max})")]
    FrameTooLarge { len: usize, max: usize },
    #[error("failed to encode IPC message: {0}")]
    Encode(serde_json::Error),
    #[error("failed to decode IPC message: {0}")]
    Decode(serde_json::Error),
    #[error("IPC peer did not respond within {0:?}")]
    Timeout(std::time::Duration),
}

/// Serialize `message` into one self-delimited frame.
pub fn encode_frame(message: &IpcMessage) -> Result<Vec<u8>, ChannelError> {
    let body = serde_json::to_vec(message).map_err(ChannelError::Encode)?;
    if body.len() > MAX_BODY_SIZE {
        return Err(ChannelError::FrameTooLarge {
            len: body.len(),
            max: MAX_BODY_SIZE,
        });
    }

    let header = format!("Content-Length: {}\r\n\r\n", body.len());
    let mut frame = Vec::with_capacity(header.len() + body.len());
    frame.extend_from_slice(header.as_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Incremental frame decoder.
///
/// Bytes are appended with [`push`](Self::push); [`decode`](Self::decode)
/// returns `Ok(None)` while the buffered data does not yet hold a complete
/// frame. After an error the decoder state is unspecified and the owning
/// connection should be dropped.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Number of bytes received but not yet consumed by a decoded frame.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    pub fn decode(&mut self) -> Result<Option<IpcMessage>, ChannelError> {
        let header_end = match find_subsequence(&self.buffer, HEADER_TERMINATOR) {
            Some(pos) => pos,
            None => {
                if self.buffer.len() > MAX_HEADER_SIZE {
                    return Err(ChannelError::MalformedHeader(format!(
                        "no header terminator within {} bytes",
                        MAX_HEADER_SIZE
                    )));
                }
                return Ok(None);
            }
        };
        if header_end > MAX_HEADER_SIZE {
            return Err(ChannelError::MalformedHeader(format!(
                "header block is {} bytes, max {}",
                header_end, MAX_HEADER_SIZE
            )));
        }

        let content_length = parse_content_length(&self.buffer[..header_end])?;
        if content_length > MAX_BODY_SIZE {
            return Err(ChannelError::FrameTooLarge {
                len: content_length,
                max: MAX_BODY_SIZE,
            });
        }

        let body_start = header_end + HEADER_TERMINATOR.len();
        let frame_end = body_start + content_length;
        if self.buffer.len() < frame_end {
            return Ok(None);
        }

        let message = serde_json::from_slice::<IpcMessage>(&self.buffer[body_start..frame_end])
            .map_err(ChannelError::Decode)?;
        self.buffer.drain(..frame_end);
        Ok(Some(message))
    }
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn parse_content_length(header: &[u8]) -> Result<usize, ChannelError> {
    let header = std::str::from_utf8(header)
        .map_err(|_| ChannelError::MalformedHeader("header is not valid UTF-8".to_string()))?;

    let mut content_length = None;
    for line in header.split("\r\n") {
        let (name, value) = line.split_once(':').ok_or_else(|| {
            ChannelError::MalformedHeader(format!("invalid header line '{}'", line))
        })?;
        // Other headers are tolerated and ignored.
        if name.trim().eq_ignore_ascii_case("content-length") {
            let value = value.trim();
            let len = value.parse::<usize>().map_err(|e| {
                ChannelError::MalformedHeader(format!("invalid Content-Length '{}': {}", value, e))
            })?;
            content_length = Some(len);
        }
    }

    content_length
        .ok_or_else(|| ChannelError::MalformedHeader("missing Content-Length".to_string()))
}

/// A framed duplex channel over one TCP connection.
///
/// The channel owns its socket; dropping the channel closes the connection
/// and discards any partially received frame.
pub struct IpcChannel {
    name: String,
    stream: TcpStream,
    decoder: FrameDecoder,
    scratch: Box<[u8]>,
}

impl IpcChannel {
    pub fn new(stream: TcpStream, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stream,
            decoder: FrameDecoder::new(),
            scratch: vec![0u8; READ_CHUNK_SIZE].into_boxed_slice(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Write one message as a single frame.
    pub async fn write(&mut self, selector: &str, data: &[String]) -> Result<(), ChannelError> {
        let frame = encode_frame(&IpcMessage::new(selector, data.to_vec()))?;
        self.stream.write_all(&frame).await?;
        self.stream.flush().await?;
        log::debug!(
            "IPC [{}]: sent '{}' with {} argument(s)",
            self.name,
            selector,
            data.len()
        );
        Ok(())
    }

    /// Wait for the next complete message.
    ///
    /// Returns `Ok(None)` once the peer has closed the connection.
    pub async fn read(&mut self) -> Result<Option<IpcMessage>, ChannelError> {
        loop {
            if let Some(message) = self.decoder.decode()? {
                return Ok(Some(message));
            }

            let n = self.stream.read(&mut self.scratch).await?;
            if n == 0 {
                if self.decoder.buffered_len() > 0 {
                    log::debug!(
                        "IPC [{}]: peer disconnected with {} byte(s) of an incomplete frame",
                        self.name,
                        self.decoder.buffered_len()
                    );
                }
                self.decoder.clear();
                return Ok(None);
            }
            self.decoder.push(&self.scratch[..n]);
        }
    }

    /// Flush and close the write half so the peer observes end-of-stream.
    pub async fn close(mut self) -> Result<(), ChannelError> {
        self.stream.shutdown().await?;
        Ok(())
    }
}
