/*! Top-level frame of a TCP connection.

A connection carries exactly one frame. A frame starting with a known tag is
a text frame, anything else is an onion envelope:

Frame                     | Body
------------------------- | ------
`==REGISTER==`            | JSON [`NodeIdentity`] of the joining node
`==REGISTERRETURN==`      | JSON [`RingTable`] computed for the joining node
`==UPDATESUCCESSOR==`     | JSON [`NodeIdentity`] of the new successor
`==UPDATEPREDECESSOR==`   | JSON [`NodeIdentity`] of the new predecessor
`==SEARCH==`              | JSON [`SearchRequest`]
`==SEARCHRETURN==`        | JSON [`NodeIdentity`] that was searched for
`==CREATE==`              | hex encoded sealed key exchange
`==KEYRECIEVED==`         | empty
untagged                  | onion envelope

Chat text inside the innermost onion layer is itself prefixed with the
`==MSG==` tag, see [`ChatMessage`].
*/

use nom::{branch::alt, bytes::complete::tag, IResult};
use serde::{de::DeserializeOwned, Serialize};

use crate::errors::*;
use crate::identity::NodeIdentity;
use crate::key_exchange::CreateRequest;
use crate::ring::RingTable;
use crate::search::SearchRequest;

/// Tag of a join request.
pub const REGISTER_TAG: &str = "==REGISTER==";
/// Tag of a join reply.
pub const REGISTER_RETURN_TAG: &str = "==REGISTERRETURN==";
/// Tag of a successor update.
pub const UPDATE_SUCCESSOR_TAG: &str = "==UPDATESUCCESSOR==";
/// Tag of a predecessor update.
pub const UPDATE_PREDECESSOR_TAG: &str = "==UPDATEPREDECESSOR==";
/// Tag of a search request.
pub const SEARCH_TAG: &str = "==SEARCH==";
/// Tag of a search reply.
pub const SEARCH_RETURN_TAG: &str = "==SEARCHRETURN==";
/// Tag of a key exchange.
pub const CREATE_TAG: &str = "==CREATE==";
/// Tag of a key exchange acknowledgement. The spelling is part of the
/// protocol.
pub const KEY_RECEIVED_TAG: &str = "==KEYRECIEVED==";
/// Tag of chat text inside the innermost onion layer.
pub const MSG_TAG: &str = "==MSG==";

/// One frame of the protocol.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    /// Node asks to be placed in the ring.
    Register(NodeIdentity),
    /// Ring table computed for a joining node.
    RegisterReturn(RingTable),
    /// Receiver has to replace its successor.
    UpdateSuccessor(NodeIdentity),
    /// Receiver has to replace its predecessor.
    UpdatePredecessor(NodeIdentity),
    /// Lookup of a `NodeId`.
    Search(SearchRequest),
    /// Result of a lookup.
    SearchReturn(NodeIdentity),
    /// Circuit key for the receiver.
    Create(CreateRequest),
    /// Circuit key was stored.
    KeyReceived,
    /// Onion envelope.
    Onion(Vec<u8>),
}

fn frame_tag(input: &[u8]) -> IResult<&[u8], &[u8]> {
    alt((
        tag(REGISTER_RETURN_TAG.as_bytes()),
        tag(REGISTER_TAG.as_bytes()),
        tag(UPDATE_SUCCESSOR_TAG.as_bytes()),
        tag(UPDATE_PREDECESSOR_TAG.as_bytes()),
        tag(SEARCH_RETURN_TAG.as_bytes()),
        tag(SEARCH_TAG.as_bytes()),
        tag(CREATE_TAG.as_bytes()),
        tag(KEY_RECEIVED_TAG.as_bytes()),
    ))(input)
}

fn record<T: DeserializeOwned>(tag: &'static str, body: &[u8]) -> Result<T, FrameError> {
    serde_json::from_slice(body).map_err(|e| FrameError::record(tag, e))
}

fn tagged<T: Serialize>(tag: &'static str, record: &T) -> Result<Vec<u8>, FrameError> {
    let mut buf = tag.as_bytes().to_vec();
    serde_json::to_writer(&mut buf, record).map_err(|e| FrameError::record(tag, e))?;
    Ok(buf)
}

impl Frame {
    /** Parse a complete frame.

    Data that doesn't start with a known tag is an onion envelope. Data that
    starts with a known tag but has an invalid body is an error.
    */
    pub fn parse(data: &[u8]) -> Result<Frame, FrameError> {
        let (body, tag) = match frame_tag(data) {
            Ok(parsed) => parsed,
            Err(_) => return Ok(Frame::Onion(data.to_vec())),
        };

        // `tag` is one of the constants above, so it's valid UTF-8
        match std::str::from_utf8(tag).unwrap_or_default() {
            REGISTER_TAG => record(REGISTER_TAG, body).map(Frame::Register),
            REGISTER_RETURN_TAG => record(REGISTER_RETURN_TAG, body).map(Frame::RegisterReturn),
            UPDATE_SUCCESSOR_TAG => record(UPDATE_SUCCESSOR_TAG, body).map(Frame::UpdateSuccessor),
            UPDATE_PREDECESSOR_TAG => record(UPDATE_PREDECESSOR_TAG, body).map(Frame::UpdatePredecessor),
            SEARCH_TAG => record(SEARCH_TAG, body).map(Frame::Search),
            SEARCH_RETURN_TAG => record(SEARCH_RETURN_TAG, body).map(Frame::SearchReturn),
            CREATE_TAG => hex::decode(body)
                .map(|sealed| Frame::Create(CreateRequest { sealed }))
                .map_err(FrameError::SealedHex),
            _ => {
                if body.is_empty() {
                    Ok(Frame::KeyReceived)
                } else {
                    Err(FrameError::TrailingData { tag: KEY_RECEIVED_TAG, len: body.len() })
                }
            },
        }
    }

    /// Serialize frame to the bytes sent over a connection.
    pub fn to_bytes(&self) -> Result<Vec<u8>, FrameError> {
        match *self {
            Frame::Register(ref node) => tagged(REGISTER_TAG, node),
            Frame::RegisterReturn(ref table) => tagged(REGISTER_RETURN_TAG, table),
            Frame::UpdateSuccessor(ref node) => tagged(UPDATE_SUCCESSOR_TAG, node),
            Frame::UpdatePredecessor(ref node) => tagged(UPDATE_PREDECESSOR_TAG, node),
            Frame::Search(ref request) => tagged(SEARCH_TAG, request),
            Frame::SearchReturn(ref node) => tagged(SEARCH_RETURN_TAG, node),
            Frame::Create(ref request) => {
                let mut buf = CREATE_TAG.as_bytes().to_vec();
                buf.extend_from_slice(hex::encode(&request.sealed).as_bytes());
                Ok(buf)
            },
            Frame::KeyReceived => Ok(KEY_RECEIVED_TAG.as_bytes().to_vec()),
            Frame::Onion(ref envelope) => Ok(envelope.clone()),
        }
    }

    /// Short name of the frame for logs.
    pub fn kind(&self) -> &'static str {
        match *self {
            Frame::Register(_) => "REGISTER",
            Frame::RegisterReturn(_) => "REGISTERRETURN",
            Frame::UpdateSuccessor(_) => "UPDATESUCCESSOR",
            Frame::UpdatePredecessor(_) => "UPDATEPREDECESSOR",
            Frame::Search(_) => "SEARCH",
            Frame::SearchReturn(_) => "SEARCHRETURN",
            Frame::Create(_) => "CREATE",
            Frame::KeyReceived => "KEYRECIEVED",
            Frame::Onion(_) => "onion",
        }
    }
}

/// Chat text delivered at the end of a circuit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatMessage {
    /// Text typed by the sender.
    pub text: String,
}

impl ChatMessage {
    /// Create message from text.
    pub fn new(text: impl Into<String>) -> ChatMessage {
        ChatMessage { text: text.into() }
    }

    /// Plaintext put into the innermost onion layer.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = MSG_TAG.as_bytes().to_vec();
        buf.extend_from_slice(self.text.as_bytes());
        buf
    }

    /// Recover the text from a delivered payload, stripping the `==MSG==`
    /// tag. Invalid UTF-8 is replaced rather than rejected.
    pub fn from_bytes(payload: &[u8]) -> ChatMessage {
        let text = payload.strip_prefix(MSG_TAG.as_bytes()).unwrap_or(payload);
        ChatMessage {
            text: String::from_utf8_lossy(text).into_owned(),
        }
    }
}
