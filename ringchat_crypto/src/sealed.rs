/*! Anonymous sealed boxes.

A sealed box is encrypted for a recipient's long-term `PublicKey` with a
freshly generated temporary key pair. The temporary `PublicKey` travels in
front of the ciphertext, so only the recipient can open it and the sender
stays anonymous to it:

```text
temporary public key (32) || nonce (24) || ciphertext
```
*/

use crypto_box::{SalsaBox, aead::{Aead, AeadCore}};
use crypto_box::aead::generic_array::typenum::marker_traits::Unsigned;
use rand::thread_rng;
use thiserror::Error;

use crate::{PublicKey, SecretKey, KEY_SIZE};

/// Length of the nonce stored in a sealed box.
pub const SEALED_NONCE_SIZE: usize = <SalsaBox as AeadCore>::NonceSize::USIZE;

/// Number of bytes a sealed box adds to its plaintext.
pub const SEALED_OVERHEAD: usize = KEY_SIZE + SEALED_NONCE_SIZE + <SalsaBox as AeadCore>::TagSize::USIZE;

/// Error that can happen when sealing data.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Error)]
pub enum SealError {
    /// Encryption failed.
    #[error("Failed to seal data")]
    Failed,
}

/// Error that can happen when opening a sealed box.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Error)]
pub enum OpenError {
    /// Sealed box is too short to contain a header and an authentication tag.
    #[error("Sealed box is too short: {} bytes", len)]
    InvalidLength {
        /// Length of the received sealed box.
        len: usize,
    },
    /// Authentication failed, the box was sealed for another key or was
    /// tampered with.
    #[error("Failed to open sealed box")]
    Decrypt,
}

/// Seal `plaintext` so that only the owner of `recipient` can read it.
pub fn seal(recipient: &PublicKey, plaintext: &[u8]) -> Result<Vec<u8>, SealError> {
    let mut rng = thread_rng();
    let temporary_sk = SecretKey::generate(&mut rng);
    let temporary_pk = temporary_sk.public_key();
    let salsa_box = SalsaBox::new(recipient, &temporary_sk);
    let nonce = SalsaBox::generate_nonce(&mut rng);

    let ciphertext = salsa_box.encrypt(&nonce, plaintext)
        .map_err(|_| SealError::Failed)?;

    let mut output = Vec::with_capacity(SEALED_OVERHEAD + plaintext.len());
    output.extend_from_slice(temporary_pk.as_bytes());
    output.extend_from_slice(&nonce);
    output.extend_from_slice(&ciphertext);
    Ok(output)
}

/// Open a box sealed for the `PublicKey` of `sk`.
pub fn open(sk: &SecretKey, sealed: &[u8]) -> Result<Vec<u8>, OpenError> {
    if sealed.len() < SEALED_OVERHEAD {
        return Err(OpenError::InvalidLength { len: sealed.len() });
    }

    let mut temporary_pk = [0; KEY_SIZE];
    temporary_pk.copy_from_slice(&sealed[..KEY_SIZE]);
    let temporary_pk = PublicKey::from(temporary_pk);
    let salsa_box = SalsaBox::new(&temporary_pk, sk);

    salsa_box
        .decrypt(
            (&sealed[KEY_SIZE..KEY_SIZE + SEALED_NONCE_SIZE]).into(),
            &sealed[KEY_SIZE + SEALED_NONCE_SIZE..],
        )
        .map_err(|_| OpenError::Decrypt)
}
