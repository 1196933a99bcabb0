//! Push channel framing
//!
//! The server writes one message per block: `data: <payload>` lines terminated
//! by a blank line. `FrameDecoder` turns an arbitrary chunking of that byte
//! stream back into complete payloads, so it can sit behind `FramedRead`.

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::error::SchemaError;
use crate::DATA_PREFIX;

/// Incremental decoder yielding the `data` payload of each complete block
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameDecoder;

impl FrameDecoder {
    pub fn new() -> Self {
        Self
    }
}

/// Frame one payload as a push-channel block. Multi-line payloads become
/// one `data:` line per line.
pub fn encode_frame(payload: &str) -> String {
    let mut frame = String::with_capacity(payload.len() + 8);
    for line in payload.split('\n') {
        frame.push_str(DATA_PREFIX);
        frame.push(' ');
        frame.push_str(line);
        frame.push('\n');
    }
    frame.push('\n');
    frame
}

/// Locate the blank line ending the first block.
/// Returns (length of the block body, bytes to consume including the blank line).
fn find_block_end(buf: &[u8]) -> Option<(usize, usize)> {
    let mut line_start = 0;
    while let Some(rel) = buf[line_start..].iter().position(|b| *b == b'\n') {
        let line_end = line_start + rel;
        let line = &buf[line_start..line_end];
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.is_empty() {
            return Some((line_start, line_end + 1));
        }
        line_start = line_end + 1;
    }
    None
}

/// Extract the data payload from one block; `None` if it has no data lines
fn block_payload(block: &str) -> Option<String> {
    let mut data_lines = Vec::new();
    for line in block.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.starts_with(':') {
            continue;
        }
        if let Some(rest) = line.strip_prefix(DATA_PREFIX) {
            data_lines.push(rest.strip_prefix(' ').unwrap_or(rest));
        }
    }

    if data_lines.is_empty() {
        None
    } else {
        Some(data_lines.join("\n"))
    }
}

impl Decoder for FrameDecoder {
    type Item = String;
    type Error = SchemaError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let Some((body_len, consumed)) = find_block_end(src) else {
                return Ok(None);
            };
            let block = src.split_to(consumed);
            let text =
                std::str::from_utf8(&block[..body_len]).map_err(|_| SchemaError::InvalidUtf8)?;
            if let Some(payload) = block_payload(text) {
                return Ok(Some(payload));
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(payload) => Ok(Some(payload)),
            None => {
                // Unterminated block at close is never delivered
                src.clear();
                Ok(None)
            }
        }
    }
}
