/*! Key exchange of a circuit hop.

The initiator of a circuit sends every hop a `==CREATE==` frame with a
[`CreateRequest`]: a [`KeyExchangePayload`] sealed with the hop's long-term
`PublicKey`. Only that hop can open it, and it learns nothing but its own
key. The hop answers with `==KEYRECIEVED==` on the same connection.
*/

use ringchat_crypto::{open, seal, CircuitKey, OpenError, PublicKey, SecretKey};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::errors::*;

/// Command of a key exchange record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyExchangeCommand {
    /// Create a new circuit entry with the enclosed key.
    #[serde(rename = "CREATE")]
    Create,
}

/** Plaintext of a key exchange.

Serialized form (JSON): `{"cmd": "CREATE", "key": <hex CircuitKey>}`.
*/
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyExchangePayload {
    /// Always `CREATE`.
    pub cmd: KeyExchangeCommand,
    /// Key the hop has to use for exactly one envelope.
    #[serde(with = "circuit_key_hex")]
    pub key: CircuitKey,
}

impl KeyExchangePayload {
    /// Payload handing `key` over to a hop.
    pub fn create(key: CircuitKey) -> KeyExchangePayload {
        KeyExchangePayload {
            cmd: KeyExchangeCommand::Create,
            key,
        }
    }
}

/// Sealed [`KeyExchangePayload`] sent in a `==CREATE==` frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateRequest {
    /// Payload sealed with the long-term `PublicKey` of the hop.
    pub sealed: Vec<u8>,
}

impl CreateRequest {
    /// Seal payload for the hop owning `recipient`.
    pub fn new(recipient: &PublicKey, payload: &KeyExchangePayload) -> Result<CreateRequest, MakePayloadError> {
        let plaintext = Zeroizing::new(serde_json::to_vec(payload).map_err(MakePayloadError::Record)?);
        let sealed = seal(recipient, &plaintext).map_err(|_| MakePayloadError::Encrypt)?;
        Ok(CreateRequest { sealed })
    }

    /** Open the sealed payload with the long-term `SecretKey` of this node.

    Returns `Error` in case of failure:

    - fails to open the box (wrong key or tampered data)
    - fails to parse the opened record
    */
    pub fn get_payload(&self, sk: &SecretKey) -> Result<KeyExchangePayload, GetPayloadError> {
        let plaintext = match open(sk, &self.sealed) {
            Ok(plaintext) => Zeroizing::new(plaintext),
            Err(OpenError::InvalidLength { .. }) | Err(OpenError::Decrypt) => return Err(GetPayloadError::decrypt()),
        };
        serde_json::from_slice(&plaintext).map_err(GetPayloadError::record)
    }
}

/// Serde helpers storing a `CircuitKey` as hex.
mod circuit_key_hex {
    use super::*;
    use serde::{de, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(key: &CircuitKey, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&key.to_hex())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<CircuitKey, D::Error> {
        let s = Zeroizing::new(String::deserialize(deserializer)?);
        CircuitKey::from_hex(&s).map_err(de::Error::custom)
    }
}
