/*! Codec for encoding/decoding `Frame`s using tokio-io

A connection carries a single frame that ends where the stream ends, so
decoding happens only on EOF.
*/

use std::io::Error as IoError;

use bytes::BytesMut;
use ringchat_packet::frame::Frame;
use ringchat_packet::FrameError;
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

/// A serialized `Frame` should be not longer than 64 KiB.
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

/// Error that can happen when decoding `Frame` from bytes.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Error indicates that we received too big frame.
    #[error("Frame should not be longer than {} bytes: {} bytes", MAX_FRAME_SIZE, len)]
    TooBigFrame {
        /// Length of received frame.
        len: usize
    },
    /// Error indicates that received frame can't be parsed.
    #[error("Deserialize Frame error: {:?}", error)]
    Deserialize {
        /// Parsing error.
        error: FrameError,
    },
    /// General IO error that can happen with TCP socket.
    #[error("IO Error")]
    Io(IoError),
}

impl DecodeError {
    pub(crate) fn too_big_frame(len: usize) -> DecodeError {
        DecodeError::TooBigFrame { len }
    }
}

/// Error that can happen when encoding `Frame` to bytes.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// Error indicates that `Frame` is invalid and can't be serialized.
    #[error("Serialize Frame error: {:?}", error)]
    Serialize {
        /// Serialization error.
        error: FrameError,
    },
    /// Error indicates that serialized `Frame` is too big.
    #[error("Frame should not be longer than {} bytes: {} bytes", MAX_FRAME_SIZE, len)]
    TooBigFrame {
        /// Length of serialized frame.
        len: usize
    },
    /// General IO error that can happen with TCP socket.
    #[error("IO Error")]
    Io(IoError),
}

impl From<IoError> for DecodeError {
    fn from(error: IoError) -> DecodeError {
        DecodeError::Io(error)
    }
}

impl From<IoError> for EncodeError {
    fn from(error: IoError) -> EncodeError {
        EncodeError::Io(error)
    }
}

/// Struct to use for {de-,}serializing frames of a connection.
#[derive(Clone, Copy, Debug, Default)]
pub struct FrameCodec;

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = DecodeError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if buf.len() > MAX_FRAME_SIZE {
            return Err(DecodeError::too_big_frame(buf.len()))
        }

        // wait for the peer to close its writing half
        Ok(None)
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if buf.is_empty() {
            return Ok(None);
        }

        let len = buf.len();
        if len > MAX_FRAME_SIZE {
            return Err(DecodeError::too_big_frame(len))
        }

        let result = Frame::parse(buf)
            .map(Some)
            .map_err(|error| DecodeError::Deserialize { error });

        buf.clear();

        result
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = EncodeError;

    fn encode(&mut self, frame: Frame, buf: &mut BytesMut) -> Result<(), Self::Error> {
        let bytes = frame.to_bytes()
            .map_err(|error| EncodeError::Serialize { error })?;
        if bytes.len() > MAX_FRAME_SIZE {
            return Err(EncodeError::TooBigFrame { len: bytes.len() });
        }
        buf.extend_from_slice(&bytes);
        Ok(())
    }
}
