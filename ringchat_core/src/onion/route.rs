//! Route of a circuit and its keys.

use rand::Rng;
use ringchat_crypto::CircuitKey;
use ringchat_packet::identity::NodeIdentity;
use ringchat_packet::ring::RingTable;
use uuid::Uuid;

use crate::onion::errors::RouteError;

/// Path of one circuit: two relays and the destination.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Route {
    /// First relay, receives the envelope from the sender.
    pub hop1: NodeIdentity,
    /// Second relay.
    pub hop2: NodeIdentity,
    /// Final hop, reads the message.
    pub destination: NodeIdentity,
    /// Random identifier of the circuit.
    pub circuit_id: Uuid,
}

impl Route {
    /// Build a route to `destination` through the neighbors in `table`. A
    /// single random bit decides which neighbor goes first.
    pub fn construct<R: Rng + ?Sized>(table: &RingTable, destination: NodeIdentity, rng: &mut R) -> Result<Route, RouteError> {
        if table.successor.is_empty() || table.predecessor.is_empty() {
            return Err(RouteError::NoNeighbors);
        }
        if destination.is_empty() {
            return Err(RouteError::NoDestination);
        }

        let (hop1, hop2) = if rng.gen::<bool>() {
            (table.successor.clone(), table.predecessor.clone())
        } else {
            (table.predecessor.clone(), table.successor.clone())
        };

        Ok(Route {
            hop1,
            hop2,
            destination,
            circuit_id: Uuid::new_v4(),
        })
    }

    /// Hops in the order an envelope passes them.
    pub fn hops(&self) -> [&NodeIdentity; 3] {
        [&self.hop1, &self.hop2, &self.destination]
    }
}

/// One independent key per hop.
#[derive(Clone, Debug)]
pub struct CircuitKeys {
    /// Key of the first relay.
    pub hop1: CircuitKey,
    /// Key of the second relay.
    pub hop2: CircuitKey,
    /// Key of the destination.
    pub destination: CircuitKey,
}

impl CircuitKeys {
    /// Generate three fresh unrelated keys.
    pub fn generate() -> CircuitKeys {
        CircuitKeys {
            hop1: CircuitKey::generate(),
            hop2: CircuitKey::generate(),
            destination: CircuitKey::generate(),
        }
    }

    /// Keys in the same order as `Route::hops`.
    pub fn iter(&self) -> [&CircuitKey; 3] {
        [&self.hop1, &self.hop2, &self.destination]
    }
}
