//! Traits for binary (de)serialization of onion layers.

pub use cookie_factory::GenError;
pub use nom::IResult;

/// The trait provides method to deserialize struct from raw bytes.
pub trait FromBytes: Sized {
    /// Deserialize struct using `nom` from raw bytes.
    fn from_bytes(input: &[u8]) -> IResult<&[u8], Self>;
}

/// The trait provides method to serialize struct into raw bytes.
pub trait ToBytes {
    /// Serialize struct into raw bytes using `cookie_factory`.
    fn to_bytes(&self) -> Result<Vec<u8>, GenError>;
}
