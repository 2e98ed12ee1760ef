/*! Three hop onion circuits.

A circuit goes through both ring neighbors of the sender, in random order,
and ends at the chat partner. Each of the three hops gets its own one-time
key through a sealed key exchange. A message is wrapped in three layers, and
every hop removes exactly one of them:

```text
sender --token1--> hop1 --token2--> hop2 --token3--> destination
```

Relays don't learn which circuit an envelope belongs to from the envelope
itself; they try every key they hold and drop the one that fits.
*/

pub mod circuit;
pub mod codec;
pub mod errors;
pub mod messenger;
pub mod relay;
pub mod route;

pub use self::circuit::*;
pub use self::codec::*;
pub use self::errors::*;
pub use self::messenger::*;
pub use self::relay::*;
pub use self::route::*;
