//! Functions for the core crypto.
//!
//! Three primitives are used across ringchat:
//!
//! - node identifiers, the SHA-256 digest of a pseudonym;
//! - sealed boxes, used to hand a circuit key to a single hop knowing only
//!   its long-term `PublicKey`;
//! - [`CircuitKey`], a one-time symmetric key protecting one onion layer.

use sha2::{Digest, Sha256};

pub use crypto_box::{PublicKey, SecretKey, KEY_SIZE};

mod circuit_key;
mod sealed;

pub use circuit_key::*;
pub use sealed::*;

/** Derive the ring identifier of a pseudonym.

    The identifier is the lowercase hex encoding of the SHA-256 digest of the
    pseudonym's UTF-8 bytes, so the same pseudonym always lands on the same
    position in the ring.
*/
pub fn hash_pseudonym(pseudonym: &str) -> String {
    hex::encode(Sha256::digest(pseudonym.as_bytes()))
}
