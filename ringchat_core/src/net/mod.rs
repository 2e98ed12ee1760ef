/*! Transport of frames over TCP: one connection per frame.
*/

pub mod codec;
pub mod transport;

pub use codec::*;
pub use transport::*;
