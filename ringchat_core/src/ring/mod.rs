/*! Ring membership and lookup.

Nodes are ordered by `NodeId` and every node tracks only its immediate
successor and predecessor. A joining node asks any member to place it; the
request travels along the ring until it reaches the node the newcomer has to
be spliced next to. Lookups travel the same way, one neighbor at a time.
*/

pub mod errors;
pub mod position;
pub mod server;

pub use self::errors::*;
pub use self::position::*;
pub use self::server::*;
