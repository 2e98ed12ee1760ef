/*! One-time symmetric keys protecting a single onion layer.

Encrypted data produced by a [`CircuitKey`] has the layout

```text
nonce (24) || ciphertext with authentication tag
```

Authentication is what lets a relay find the key of an envelope by trial
decryption: only the right key produces `Ok`.
*/

use std::fmt;

use hex::FromHex;
use rand::{thread_rng, Rng};
use thiserror::Error;
use xsalsa20poly1305::{aead::{Aead, AeadCore}, KeyInit, XSalsa20Poly1305};
use zeroize::Zeroize;

/// Length in bytes of a `CircuitKey`.
pub const CIRCUIT_KEY_SIZE: usize = 32;

/// Number of bytes a `CircuitKey` adds to encrypted data.
pub const CIRCUIT_OVERHEAD: usize = xsalsa20poly1305::NONCE_SIZE + xsalsa20poly1305::TAG_SIZE;

/// Error when trying to encrypt data.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Error)]
pub enum EncryptionError {
    /// Cipher refused the data.
    #[error("Failed to encrypt data")]
    Failed,
}

/// Error when trying to decrypt data.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Error)]
pub enum DecryptionError {
    /// There's not enough data to decrypt.
    #[error("There's not enough data to decrypt")]
    InvalidLength,
    /// Data was encrypted with another key or was tampered with.
    #[error("Failure due to encrypted data being invalid")]
    Failed,
}

/// Error when parsing a hex encoded `CircuitKey`.
#[derive(Clone, Debug, PartialEq, Error)]
#[error("Invalid circuit key: {0}")]
pub struct InvalidCircuitKey(pub hex::FromHexError);

/** Symmetric key of one circuit hop.

Key bytes are zeroed when the key is dropped. `Debug` never prints them.
*/
#[derive(Clone, PartialEq, Eq)]
pub struct CircuitKey([u8; CIRCUIT_KEY_SIZE]);

impl CircuitKey {
    /// Generate a new random key.
    pub fn generate() -> CircuitKey {
        let mut key = [0; CIRCUIT_KEY_SIZE];
        thread_rng().fill(&mut key);
        CircuitKey(key)
    }

    /// Create a key from raw bytes.
    pub fn from_bytes(bytes: [u8; CIRCUIT_KEY_SIZE]) -> CircuitKey {
        CircuitKey(bytes)
    }

    /// Parse a key from its lowercase or uppercase hex encoding.
    pub fn from_hex(s: &str) -> Result<CircuitKey, InvalidCircuitKey> {
        <[u8; CIRCUIT_KEY_SIZE]>::from_hex(s)
            .map(CircuitKey)
            .map_err(InvalidCircuitKey)
    }

    /// Hex encoding of the key.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; CIRCUIT_KEY_SIZE] {
        &self.0
    }

    fn cipher(&self) -> XSalsa20Poly1305 {
        XSalsa20Poly1305::new((&self.0).into())
    }

    /// Encrypt `data` with a fresh random nonce.
    pub fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>, EncryptionError> {
        let nonce = XSalsa20Poly1305::generate_nonce(&mut thread_rng());
        let mut output = Vec::with_capacity(CIRCUIT_OVERHEAD + data.len());
        output.extend_from_slice(&nonce);
        output.append(&mut self.cipher().encrypt(&nonce, data).or(Err(EncryptionError::Failed))?);
        Ok(output)
    }

    /// Decrypt data produced by `encrypt` with the same key.
    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, DecryptionError> {
        if data.len() < CIRCUIT_OVERHEAD {
            return Err(DecryptionError::InvalidLength);
        }

        self.cipher()
            .decrypt(
                (&data[..xsalsa20poly1305::NONCE_SIZE]).into(),
                &data[xsalsa20poly1305::NONCE_SIZE..],
            )
            .or(Err(DecryptionError::Failed))
    }
}

impl Drop for CircuitKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for CircuitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CircuitKey(..)")
    }
}
