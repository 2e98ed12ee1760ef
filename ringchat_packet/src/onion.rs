/*! Onion layers.

An envelope is an [`OnionLayer`] encrypted with the [`CircuitKey`] of one
hop. Envelopes carry no cleartext header: a relay finds the key of an
envelope by trying every key it holds.

Serialized form of a layer (before encryption):

Length   | Content
-------- | ------
`16`     | circuit id (UUID)
`1`      | `0x01` for forward, `0x02` for message
`2`      | length of next hop address, forward only
variable | next hop address as `host:port`, forward only
variable | payload

The payload of a forward layer is the envelope for the next hop. The payload
of a message layer is the chat text for the destination.
*/

use cookie_factory::{
    bytes::{be_u16, be_u8},
    combinator::slice,
    gen_simple,
    sequence::tuple,
};
use nom::{
    branch::alt,
    bytes::complete::{tag, take},
    combinator::{map, map_opt, map_res, rest},
    multi::length_data,
    number::complete::be_u16 as parse_be_u16,
    sequence::{pair, preceded},
};
use ringchat_crypto::CircuitKey;
use uuid::Uuid;

use crate::binary_io::*;
use crate::errors::*;

/// Marker of a layer that has to be forwarded.
pub const FORWARD_KIND: u8 = 0x01;
/// Marker of a layer that carries the message itself.
pub const MESSAGE_KIND: u8 = 0x02;

/// What a hop has to do after peeling its layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OnionCommand {
    /// Send `payload` verbatim to `next_hop`.
    Forward {
        /// Address of the next hop in the `host:port` form.
        next_hop: String,
        /// Envelope for the next hop.
        payload: Vec<u8>,
    },
    /// This hop is the destination, `payload` is the message.
    Message {
        /// Message for the destination.
        payload: Vec<u8>,
    },
}

/// Decrypted content of one envelope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OnionLayer {
    /// Identifier of the circuit the layer belongs to.
    pub circuit_id: Uuid,
    /// Command for the hop.
    pub command: OnionCommand,
}

impl OnionLayer {
    /// Layer telling a relay to pass `payload` to `next_hop`.
    pub fn forward(circuit_id: Uuid, next_hop: impl Into<String>, payload: Vec<u8>) -> OnionLayer {
        OnionLayer {
            circuit_id,
            command: OnionCommand::Forward { next_hop: next_hop.into(), payload },
        }
    }

    /// Innermost layer carrying the message.
    pub fn message(circuit_id: Uuid, payload: Vec<u8>) -> OnionLayer {
        OnionLayer {
            circuit_id,
            command: OnionCommand::Message { payload },
        }
    }

    /// Serialize and encrypt the layer with `key`.
    pub fn seal(&self, key: &CircuitKey) -> Result<Vec<u8>, MakePayloadError> {
        let bytes = self.to_bytes().map_err(MakePayloadError::Serialize)?;
        key.encrypt(&bytes).map_err(|_| MakePayloadError::Encrypt)
    }

    /** Decrypt and parse an envelope with `key`.

    Returns `Error` in case of failure:

    - fails to decrypt, which is what happens when `key` belongs to another
      envelope
    - fails to parse the decrypted layer
    */
    pub fn open(envelope: &[u8], key: &CircuitKey) -> Result<OnionLayer, GetPayloadError> {
        let decrypted = key.decrypt(envelope)
            .map_err(|_| GetPayloadError::decrypt())?;
        match OnionLayer::from_bytes(&decrypted) {
            Err(error) => Err(GetPayloadError::deserialize(error, decrypted.clone())),
            Ok((_, layer)) => Ok(layer),
        }
    }
}

impl FromBytes for OnionLayer {
    fn from_bytes(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, circuit_id) = map_opt(take(16usize), |id: &[u8]| Uuid::from_slice(id).ok())(input)?;
        let (input, command) = alt((
            preceded(
                tag(&[FORWARD_KIND][..]),
                map(
                    pair(map_res(length_data(parse_be_u16), std::str::from_utf8), rest),
                    |(next_hop, payload): (&str, &[u8])| OnionCommand::Forward {
                        next_hop: next_hop.to_owned(),
                        payload: payload.to_vec(),
                    },
                ),
            ),
            preceded(
                tag(&[MESSAGE_KIND][..]),
                map(rest, |payload: &[u8]| OnionCommand::Message { payload: payload.to_vec() }),
            ),
        ))(input)?;
        Ok((input, OnionLayer { circuit_id, command }))
    }
}

impl ToBytes for OnionLayer {
    fn to_bytes(&self) -> Result<Vec<u8>, GenError> {
        let circuit_id = self.circuit_id.as_bytes();
        match self.command {
            OnionCommand::Forward { ref next_hop, ref payload } => {
                let len = u16::try_from(next_hop.len())
                    .map_err(|_| GenError::CustomError(0))?;
                gen_simple(
                    tuple((
                        slice(circuit_id),
                        be_u8(FORWARD_KIND),
                        be_u16(len),
                        slice(next_hop.as_bytes()),
                        slice(payload),
                    )),
                    Vec::new(),
                )
            },
            OnionCommand::Message { ref payload } => gen_simple(
                tuple((
                    slice(circuit_id),
                    be_u8(MESSAGE_KIND),
                    slice(payload),
                )),
                Vec::new(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_layout() {
        let circuit_id = Uuid::from_bytes([7; 16]);
        let layer = OnionLayer::forward(circuit_id, "10.0.0.2:80", vec![1, 2, 3]);
        let bytes = layer.to_bytes().unwrap();

        assert_eq!(&bytes[..16], &[7; 16]);
        assert_eq!(bytes[16], FORWARD_KIND);
        assert_eq!(&bytes[17..19], &[0, 11]);
        assert_eq!(&bytes[19..30], b"10.0.0.2:80");
        assert_eq!(&bytes[30..], &[1, 2, 3]);

        let (rest, parsed) = OnionLayer::from_bytes(&bytes).unwrap();
        assert!(rest.is_empty());
        assert_eq!(parsed, layer);
    }

    #[test]
    fn message_layout() {
        let layer = OnionLayer::message(Uuid::new_v4(), b"==MSG==hi".to_vec());
        let bytes = layer.to_bytes().unwrap();

        assert_eq!(bytes[16], MESSAGE_KIND);
        assert_eq!(&bytes[17..], b"==MSG==hi");
        assert_eq!(OnionLayer::from_bytes(&bytes).unwrap().1, layer);
    }

    #[test]
    fn unknown_kind() {
        let mut bytes = OnionLayer::message(Uuid::new_v4(), vec![]).to_bytes().unwrap();
        bytes[16] = 0x03;

        assert!(OnionLayer::from_bytes(&bytes).is_err());
    }

    #[test]
    fn seal_open() {
        let key = CircuitKey::generate();
        let layer = OnionLayer::forward(Uuid::new_v4(), "127.0.0.1:4000", vec![42; 100]);

        let envelope = layer.seal(&key).unwrap();
        assert_eq!(OnionLayer::open(&envelope, &key).unwrap(), layer);
    }

    #[test]
    fn open_with_other_key() {
        let layer = OnionLayer::message(Uuid::new_v4(), b"secret".to_vec());
        let envelope = layer.seal(&CircuitKey::generate()).unwrap();

        assert_eq!(OnionLayer::open(&envelope, &CircuitKey::generate()), Err(GetPayloadError::Decrypt));
    }

    #[test]
    fn open_garbage_layer() {
        let key = CircuitKey::generate();
        let envelope = key.encrypt(&[1, 2, 3]).unwrap();

        assert_eq!(
            OnionLayer::open(&envelope, &key),
            Err(GetPayloadError::Deserialize {
                error: nom::Err::Error(nom::error::Error::new(vec![1, 2, 3], nom::error::ErrorKind::Eof)),
                payload: vec![1, 2, 3],
            })
        );
    }
}
