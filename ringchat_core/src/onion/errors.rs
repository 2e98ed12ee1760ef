/*! Errors enum for onion circuits.
*/

use futures::channel::mpsc::SendError;
use ringchat_packet::{GetPayloadError, MakePayloadError};
use thiserror::Error;

use crate::net::SendError as NetSendError;

/// Error that can happen when building a route.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Error)]
pub enum RouteError {
    /// Relays are taken from the ring neighbors and there are none.
    #[error("Node has no ring neighbors to relay through")]
    NoNeighbors,
    /// Destination of the route is the empty identity.
    #[error("Route has no destination")]
    NoDestination,
}

/// Error that can happen during a key exchange.
#[derive(Debug, Error)]
pub enum KeyExchangeError {
    /// Hop didn't publish a `PublicKey` so its key can't be sealed.
    #[error("Hop {} has no public key", pseudonym)]
    MissingPublicKey {
        /// Pseudonym of the hop.
        pseudonym: String,
    },
    /// Failed to seal the key.
    #[error("Failed to seal circuit key: {}", _0)]
    Seal(MakePayloadError),
    /// Failed to open a received key exchange.
    #[error("Failed to open key exchange: {}", _0)]
    Open(GetPayloadError),
}

/// Error that can happen when peeling an envelope.
#[derive(Debug, PartialEq, Error)]
pub enum PeelError {
    /// None of the held keys decrypts the envelope.
    #[error("No held key decrypts the envelope, {} keys tried", tried)]
    NoMatchingKey {
        /// Number of keys that were tried.
        tried: usize,
    },
    /// A held key decrypted the envelope but the layer inside is invalid.
    #[error("Invalid onion layer: {}", _0)]
    InvalidLayer(GetPayloadError),
}

/// Error that can happen when calling `handle_*` of an onion frame.
#[derive(Debug, Error)]
pub enum HandleOnionError {
    /// Failed to store a circuit key.
    #[error("Key exchange error: {}", _0)]
    KeyExchange(KeyExchangeError),
    /// Failed to peel an envelope.
    #[error("Peel error: {}", _0)]
    Peel(PeelError),
    /// Error indicates that sending frame error.
    #[error("Sending frame error")]
    SendTo(SendError),
}

/// Error that can happen when opening or using a circuit.
#[derive(Debug, Error)]
pub enum CircuitError {
    /// There is no chat partner to build a circuit to.
    #[error("No chat partner")]
    NoPartner,
    /// Failed to build a route.
    #[error("Route error: {}", _0)]
    Route(RouteError),
    /// Failed to prepare key exchanges.
    #[error("Key exchange error: {}", _0)]
    KeyExchange(KeyExchangeError),
    /// Hop didn't acknowledge its key.
    #[error("Hop {} didn't acknowledge its key: {}", addr, error)]
    NoAcknowledgement {
        /// Address of the hop.
        addr: String,
        /// Transport error.
        error: NetSendError,
    },
    /// Hop replied with something else than `KEYRECIEVED`.
    #[error("Hop {} replied with {} instead of KEYRECIEVED", addr, kind)]
    UnexpectedReply {
        /// Address of the hop.
        addr: String,
        /// Kind of the received frame.
        kind: &'static str,
    },
    /// Failed to wrap the message.
    #[error("Failed to wrap message: {}", _0)]
    Encrypt(MakePayloadError),
    /// Error indicates that sending frame error.
    #[error("Sending frame error")]
    SendTo(SendError),
}
