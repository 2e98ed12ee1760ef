/*! Local view of the ring.
*/

use serde::{Deserialize, Serialize};

use crate::identity::{NodeId, NodeIdentity};

/** This node and its two ring neighbors.

Serialized form (JSON): `{"nodeid": .., "successor": .., "predecessor": ..}`,
each a full [`NodeIdentity`]. The same record is sent to a joining node in
`==REGISTERRETURN==` and persisted after every change.

A node alone in the ring has sentinel neighbors. In a ring of two both
neighbors are the same node.
*/
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RingTable {
    /// Identity of the node owning the table.
    #[serde(rename = "nodeid")]
    pub node: NodeIdentity,
    /// Next node in the ring order.
    pub successor: NodeIdentity,
    /// Previous node in the ring order.
    pub predecessor: NodeIdentity,
}

impl RingTable {
    /// Table of a node that is alone in the ring.
    pub fn new(node: NodeIdentity) -> RingTable {
        RingTable {
            node,
            successor: NodeIdentity::empty(),
            predecessor: NodeIdentity::empty(),
        }
    }

    /// `NodeId` of the owner.
    pub fn node_id(&self) -> &NodeId {
        &self.node.node_id
    }

    /// Check if the owner doesn't know any other node.
    pub fn is_alone(&self) -> bool {
        self.successor.is_empty() && self.predecessor.is_empty()
    }

    /// Check if the ring consists of the owner and exactly one other node.
    pub fn is_pair(&self) -> bool {
        !self.successor.is_empty() && self.successor.node_id == self.predecessor.node_id
    }

    /// Find identity with the given `NodeId` among the successor, the
    /// predecessor and the owner, in this order.
    pub fn find(&self, node_id: &NodeId) -> Option<&NodeIdentity> {
        [&self.successor, &self.predecessor, &self.node]
            .into_iter()
            .find(|node| !node.is_empty() && &node.node_id == node_id)
    }
}
