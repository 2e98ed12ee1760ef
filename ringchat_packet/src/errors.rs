/*! Errors enum for packet payloads and frames.
*/

use nom::error::Error as NomError;
use thiserror::Error;

/// Error that can happen when decrypting and parsing an encrypted payload.
#[derive(Debug, PartialEq, Error)]
pub enum GetPayloadError {
    /// Error indicates that received payload of encrypted packet can't be
    /// decrypted.
    #[error("Decrypt payload error")]
    Decrypt,
    /// Error indicates that decrypted binary payload can't be parsed.
    #[error("Deserialize payload error: {:?}, data: {:?}", error, payload)]
    Deserialize {
        /// Parsing error.
        error: nom::Err<NomError<Vec<u8>>>,
        /// Decrypted payload.
        payload: Vec<u8>,
    },
    /// Error indicates that decrypted text payload is not a valid record.
    #[error("Invalid payload record: {}", _0)]
    Record(String),
}

impl GetPayloadError {
    pub(crate) fn decrypt() -> GetPayloadError {
        GetPayloadError::Decrypt
    }

    pub(crate) fn deserialize(e: nom::Err<NomError<&[u8]>>, payload: Vec<u8>) -> GetPayloadError {
        GetPayloadError::Deserialize { error: e.map(|e| NomError::new(e.input.to_vec(), e.code)), payload }
    }

    pub(crate) fn record(e: serde_json::Error) -> GetPayloadError {
        GetPayloadError::Record(e.to_string())
    }
}

/// Error that can happen when building an encrypted payload.
#[derive(Debug, Error)]
pub enum MakePayloadError {
    /// Payload can't be serialized.
    #[error("Serialize payload error: {:?}", _0)]
    Serialize(cookie_factory::GenError),
    /// Payload record can't be serialized.
    #[error("Serialize payload record error: {}", _0)]
    Record(serde_json::Error),
    /// Payload can't be encrypted.
    #[error("Encrypt payload error")]
    Encrypt,
}

/// Error that can happen when parsing or serializing a `Frame`.
#[derive(Debug, Error)]
pub enum FrameError {
    /// Record after a known tag is not valid.
    #[error("Invalid {} record: {}", tag, error)]
    Record {
        /// Tag of the frame.
        tag: &'static str,
        /// JSON error.
        error: serde_json::Error,
    },
    /// Sealed key exchange is not valid hex.
    #[error("Invalid sealed key exchange: {:?}", _0)]
    SealedHex(hex::FromHexError),
    /// Unexpected data follows a tag without a record.
    #[error("Unexpected data after {} tag: {} bytes", tag, len)]
    TrailingData {
        /// Tag of the frame.
        tag: &'static str,
        /// Length of the data after the tag.
        len: usize,
    },
}

impl FrameError {
    pub(crate) fn record(tag: &'static str, error: serde_json::Error) -> FrameError {
        FrameError::Record { tag, error }
    }
}
