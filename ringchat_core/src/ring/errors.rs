/*! Errors enum for the ring server.
*/

use futures::channel::mpsc::SendError;
use thiserror::Error;

use crate::state::StateError;

/// Error that can happen when looking for the place of a joining node.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Error)]
pub enum LocateError {
    /// Joining node has an empty `NodeId`.
    #[error("Joining node has an empty node id")]
    EmptyId,
    /// Joining node has the `NodeId` of this node or of one of its neighbors.
    #[error("Joining node has the node id of a known node")]
    DuplicateId,
    /// None of the ring intervals contains the joining node. The local ring
    /// table is inconsistent.
    #[error("No ring interval matches the joining node")]
    NoInterval,
}

/// Error that can happen when calling `handle_*` of a ring frame.
#[derive(Debug, Error)]
pub enum HandlePacketError {
    /// Joining node can't be placed.
    #[error("Failed to place joining node: {}", _0)]
    Locate(LocateError),
    /// Ring table received in `REGISTERRETURN` belongs to another node.
    #[error("Received ring table of another node")]
    ForeignTable,
    /// Neighbor update points this node to itself.
    #[error("Neighbor update refers to this node")]
    SelfNeighbor,
    /// Search request has exhausted its hop limit.
    #[error("Search hop limit exhausted")]
    SearchExhausted,
    /// Search can't be forwarded because this node has no neighbors.
    #[error("Node has no neighbors to forward to")]
    NoNeighbors,
    /// Failed to persist the ring table or the chat partner.
    #[error("Failed to persist state: {}", _0)]
    State(StateError),
    /// Error indicates that sending frame error.
    #[error("Sending frame error")]
    SendTo(SendError),
}
