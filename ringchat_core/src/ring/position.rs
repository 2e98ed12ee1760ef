/*! Placement of a joining node relative to the local ring table.

`locate` only decides; the ring server applies the decision. Node ids are
compared as strings.

Decision order for a joining node `x` at a node `s` with predecessor `p` and
successor `n`:

1. `s` is alone: `x` becomes both neighbors.
2. `p == n` (ring of two): `x` becomes the predecessor if `x < s`, otherwise
   the successor.
3. `s < p` (`s` is the lowest node): `x < s` becomes the predecessor,
   `s < x < n` the successor, `x > n` is forwarded to the successor and
   `x < p` becomes the successor.
4. `s > n` (`s` is the highest node): `x > s` becomes the successor,
   `p < x < s` the predecessor, `x > n` is forwarded to the successor and
   `x < p` becomes the successor.
5. Otherwise `p < x < s` becomes the predecessor, `s < x < n` the successor,
   `x > n` is forwarded to the successor and `x < p` to the predecessor.
*/

use ringchat_packet::identity::NodeId;
use ringchat_packet::ring::RingTable;

use crate::ring::errors::LocateError;

/// Where a joining node belongs.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Position {
    /// This node is alone, the joining node becomes both its neighbors.
    SecondNode,
    /// Joining node goes between the predecessor and this node.
    NewPredecessor,
    /// Joining node goes between this node and the successor.
    NewSuccessor,
    /// Joining node belongs further along the ring, ask the successor.
    ForwardToSuccessor,
    /// Joining node belongs further back in the ring, ask the predecessor.
    ForwardToPredecessor,
}

/// Decide where the node with `incoming` id belongs relative to `table`.
pub fn locate(table: &RingTable, incoming: &NodeId) -> Result<Position, LocateError> {
    let s = table.node_id();
    let p = &table.predecessor.node_id;
    let n = &table.successor.node_id;
    let x = incoming;

    if x.is_empty() {
        return Err(LocateError::EmptyId);
    }
    if x == s || x == p || x == n {
        return Err(LocateError::DuplicateId);
    }

    if table.is_alone() {
        return Ok(Position::SecondNode);
    }

    if table.is_pair() {
        return Ok(if x < s { Position::NewPredecessor } else { Position::NewSuccessor });
    }

    if s < p {
        // lowest node, the predecessor wraps around
        return if x < s && x < p {
            Ok(Position::NewPredecessor)
        } else if x > s && x < n {
            Ok(Position::NewSuccessor)
        } else if x > n {
            Ok(Position::ForwardToSuccessor)
        } else if x < p {
            Ok(Position::NewSuccessor)
        } else {
            Err(LocateError::NoInterval)
        };
    }

    if s > n {
        // highest node, the successor wraps around
        return if x > s && x > n {
            Ok(Position::NewSuccessor)
        } else if x < s && x > p {
            Ok(Position::NewPredecessor)
        } else if x > n {
            Ok(Position::ForwardToSuccessor)
        } else if x < p {
            Ok(Position::NewSuccessor)
        } else {
            Err(LocateError::NoInterval)
        };
    }

    if p < x && x < s {
        Ok(Position::NewPredecessor)
    } else if s < x && x < n {
        Ok(Position::NewSuccessor)
    } else if x > n {
        Ok(Position::ForwardToSuccessor)
    } else if x < p {
        Ok(Position::ForwardToPredecessor)
    } else {
        Err(LocateError::NoInterval)
    }
}
