//! Byte framing for wire messages.
//!
//! Two formats: newline-delimited JSON (the default, one message per line)
//! and length-prefixed (4-byte big-endian length followed by JSON). Both
//! enforce a frame-size ceiling so a hostile peer cannot balloon the read
//! buffer.

use bytes::{Buf, BufMut, BytesMut};
use capnode_core::Message;
use std::io;
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

/// Default ceiling on a single frame.
pub const DEFAULT_MAX_FRAME: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameFormat {
    /// One JSON message per line.
    #[default]
    NewlineDelimited,
    /// 4-byte big-endian length prefix followed by JSON.
    LengthPrefixed,
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("frame of {0} bytes exceeds the configured maximum")]
    FrameTooLarge(usize),

    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

pub struct MessageCodec {
    format: FrameFormat,
    max_frame_size: usize,
}

impl MessageCodec {
    pub fn new(format: FrameFormat) -> Self {
        MessageCodec {
            format,
            max_frame_size: DEFAULT_MAX_FRAME,
        }
    }

    pub fn with_max_frame_size(format: FrameFormat, max_frame_size: usize) -> Self {
        MessageCodec {
            format,
            max_frame_size,
        }
    }
}

impl Default for MessageCodec {
    fn default() -> Self {
        MessageCodec::new(FrameFormat::default())
    }
}

impl Decoder for MessageCodec {
    type Item = Message;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>, CodecError> {
        match self.format {
            FrameFormat::NewlineDelimited => {
                let Some(pos) = src.iter().position(|&b| b == b'\n') else {
                    if src.len() > self.max_frame_size {
                        return Err(CodecError::FrameTooLarge(src.len()));
                    }
                    return Ok(None);
                };
                if pos > self.max_frame_size {
                    return Err(CodecError::FrameTooLarge(pos));
                }
                let line = src.split_to(pos);
                src.advance(1);
                trace!(bytes = line.len(), "decoding frame");
                Ok(Some(serde_json::from_slice(&line)?))
            }
            FrameFormat::LengthPrefixed => {
                if src.len() < 4 {
                    return Ok(None);
                }
                let mut length = [0u8; 4];
                length.copy_from_slice(&src[..4]);
                let frame_len = u32::from_be_bytes(length) as usize;
                if frame_len > self.max_frame_size {
                    return Err(CodecError::FrameTooLarge(frame_len));
                }
                if src.len() < 4 + frame_len {
                    src.reserve(4 + frame_len - src.len());
                    return Ok(None);
                }
                src.advance(4);
                let frame = src.split_to(frame_len);
                trace!(bytes = frame.len(), "decoding frame");
                Ok(Some(serde_json::from_slice(&frame)?))
            }
        }
    }
}

impl Encoder<Message> for MessageCodec {
    type Error = CodecError;

    fn encode(&mut self, msg: Message, dst: &mut BytesMut) -> Result<(), CodecError> {
        let json = serde_json::to_vec(&msg)?;
        if json.len() > self.max_frame_size {
            return Err(CodecError::FrameTooLarge(json.len()));
        }
        match self.format {
            FrameFormat::NewlineDelimited => {
                dst.reserve(json.len() + 1);
                dst.put_slice(&json);
                dst.put_u8(b'\n');
            }
            FrameFormat::LengthPrefixed => {
                dst.reserve(4 + json.len());
                dst.put_u32(json.len() as u32);
                dst.put_slice(&json);
            }
        }
        Ok(())
    }
}
