/*! Wire types of the ringchat protocol.

Every message travels over its own TCP connection. Ring and key exchange
messages are text frames made of a tag such as `==REGISTER==` followed by a
JSON record, see [`frame`]. Onion envelopes are untagged binary data, see
[`onion`].
*/

#![forbid(unsafe_code)]

pub mod binary_io;
pub mod errors;
pub mod frame;
pub mod identity;
pub mod key_exchange;
pub mod onion;
pub mod ring;
pub mod search;

pub use errors::*;
