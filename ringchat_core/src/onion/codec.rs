/*! Building and peeling onion envelopes.
*/

use ringchat_packet::GetPayloadError;
use ringchat_packet::MakePayloadError;
use ringchat_packet::frame::Frame;
use ringchat_packet::key_exchange::{CreateRequest, KeyExchangePayload};
use ringchat_packet::onion::OnionLayer;

use crate::onion::errors::*;
use crate::onion::relay::RelayCircuitEntry;
use crate::onion::route::*;

/// `CREATE` frame for every hop of `route`, paired with the hop address.
pub fn key_exchange_frames(route: &Route, keys: &CircuitKeys) -> Result<Vec<(String, Frame)>, KeyExchangeError> {
    route.hops().iter()
        .zip(keys.iter().iter())
        .map(|(hop, key)| {
            let pk = hop.public_key.as_ref()
                .ok_or_else(|| KeyExchangeError::MissingPublicKey { pseudonym: hop.pseudonym.clone() })?;
            let payload = KeyExchangePayload::create((*key).clone());
            let request = CreateRequest::new(pk, &payload)
                .map_err(KeyExchangeError::Seal)?;
            Ok((hop.address(), Frame::Create(request)))
        })
        .collect()
}

/** Wrap `plaintext` in three layers, innermost first.

The destination layer carries the message, the second relay layer points to
the destination and the first relay layer points to the second relay. The
returned envelope has to be sent to `route.hop1`.
*/
pub fn encrypt(route: &Route, keys: &CircuitKeys, plaintext: &[u8]) -> Result<Vec<u8>, MakePayloadError> {
    let token3 = OnionLayer::message(route.circuit_id, plaintext.to_vec())
        .seal(&keys.destination)?;
    let token2 = OnionLayer::forward(route.circuit_id, route.destination.address(), token3)
        .seal(&keys.hop2)?;
    OnionLayer::forward(route.circuit_id, route.hop2.address(), token2)
        .seal(&keys.hop1)
}

/** Remove one layer of `envelope` with the first held key that decrypts it.

The key that decrypts the envelope is removed whatever the layer turns out
to be, so every key is used at most once. Keys that fail to decrypt are kept.
*/
pub fn peel(entries: &mut Vec<RelayCircuitEntry>, envelope: &[u8]) -> Result<OnionLayer, PeelError> {
    let tried = entries.len();
    for index in 0..entries.len() {
        match OnionLayer::open(envelope, &entries[index].key) {
            Ok(layer) => {
                entries.remove(index);
                return Ok(layer);
            },
            Err(GetPayloadError::Decrypt) => continue,
            Err(e) => {
                entries.remove(index);
                return Err(PeelError::InvalidLayer(e));
            },
        }
    }

    Err(PeelError::NoMatchingKey { tried })
}
