/*! Node that routes received frames to the ring server, the relay and the
messenger.
*/

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::channel::mpsc;
use ringchat_crypto::SecretKey;
use ringchat_packet::frame::{ChatMessage, Frame};
use ringchat_packet::identity::NodeIdentity;
use ringchat_packet::ring::RingTable;
use thiserror::Error;

use crate::net::Tx;
use crate::onion::{HandleOnionError, Messenger, Relay};
use crate::ring::{HandlePacketError, Server};
use crate::state::{StateError, Store};

/// Error that can happen when handling a received frame.
#[derive(Debug, Error)]
pub enum HandleFrameError {
    /// Ring frame handler failed.
    #[error("Ring error: {}", _0)]
    Ring(HandlePacketError),
    /// Onion frame handler failed.
    #[error("Onion error: {}", _0)]
    Onion(HandleOnionError),
    /// Frame is only valid as a reply on an outgoing connection.
    #[error("Unexpected {} frame", _0)]
    UnexpectedFrame(&'static str),
}

/** Ring table to start with.

A table saved by a previous run is reused when it belongs to the same node
id, so the node takes its old place in the ring. Its own identity is
refreshed because the address could change. Otherwise the node starts alone.
*/
pub fn restore_table(store: &dyn Store, node: NodeIdentity) -> Result<RingTable, StateError> {
    match store.load_ring()? {
        Some(mut table) if table.node.node_id == node.node_id => {
            info!("Restored ring table: successor {}, predecessor {}", table.successor, table.predecessor);
            table.node = node;
            Ok(table)
        },
        Some(_) => {
            warn!("Saved ring table belongs to another node id, starting alone");
            Ok(RingTable::new(node))
        },
        None => Ok(RingTable::new(node)),
    }
}

/// Ring server, relay and messenger of one node.
#[derive(Clone)]
pub struct Node {
    /// Ring membership and lookups.
    pub ring: Server,
    /// Hop of circuits built by other nodes.
    pub relay: Relay,
    /// Sender of messages to the chat partner.
    pub messenger: Messenger,
}

impl Node {
    /// Create new `Node` from its parts.
    pub fn new(ring: Server, relay: Relay, messenger: Messenger) -> Node {
        Node { ring, relay, messenger }
    }

    /** Create new `Node` with its state restored from `store`.

    The saved chat partner is forgotten since the circuits to it are gone,
    and the identity is saved for other tools to read.
    */
    pub fn start(
        tx: Tx,
        node: NodeIdentity,
        sk: SecretKey,
        store: Arc<dyn Store>,
        key_exchange_timeout: Duration,
    ) -> Result<Node, StateError> {
        let table = restore_table(&*store, node.clone())?;
        store.clear_partner()?;
        store.save_identity(&node)?;
        store.save_ring(&table)?;

        let ring = Server::with_table(tx.clone(), table, store);
        let relay = Relay::new(sk, tx.clone());
        let messenger = Messenger::new(ring.clone(), tx, key_exchange_timeout);
        Ok(Node::new(ring, relay, messenger))
    }

    /// Set sink for chat partners found by lookups.
    pub fn set_partner_sink(&mut self, sink: mpsc::UnboundedSender<NodeIdentity>) {
        self.ring.set_partner_sink(sink);
    }

    /// Set sink for messages this node is the destination of.
    pub fn set_message_sink(&mut self, sink: mpsc::UnboundedSender<ChatMessage>) {
        self.relay.set_message_sink(sink);
    }

    /// Handle a frame received from `peer`. Returns the frame to write back
    /// on the same connection, if any.
    pub async fn handle_frame(&self, frame: Frame, peer: SocketAddr) -> Result<Option<Frame>, HandleFrameError> {
        match frame {
            Frame::Register(node) =>
                self.ring.handle_register(node).await.map(|()| None).map_err(HandleFrameError::Ring),
            Frame::RegisterReturn(table) =>
                self.ring.handle_register_return(table).await.map(|()| None).map_err(HandleFrameError::Ring),
            Frame::UpdateSuccessor(node) =>
                self.ring.handle_update_successor(node).await.map(|()| None).map_err(HandleFrameError::Ring),
            Frame::UpdatePredecessor(node) =>
                self.ring.handle_update_predecessor(node).await.map(|()| None).map_err(HandleFrameError::Ring),
            Frame::Search(request) =>
                self.ring.handle_search(request).await.map(|()| None).map_err(HandleFrameError::Ring),
            Frame::SearchReturn(node) =>
                self.found(node).await.map(|()| None).map_err(HandleFrameError::Ring),
            Frame::Create(request) =>
                self.relay.handle_create(request, peer).await.map(Some).map_err(HandleFrameError::Onion),
            Frame::Onion(envelope) =>
                self.relay.handle_envelope(envelope).await.map(|()| None).map_err(HandleFrameError::Onion),
            Frame::KeyReceived =>
                Err(HandleFrameError::UnexpectedFrame(Frame::KeyReceived.kind())),
        }
    }

    /// Look for the node with `pseudonym` and make it the chat partner once
    /// found. Returns the node when it's known locally.
    pub async fn search(&self, pseudonym: &str) -> Result<Option<NodeIdentity>, HandlePacketError> {
        let found = self.ring.search(pseudonym).await?;
        if let Some(ref node) = found {
            self.found(node.clone()).await?;
        }
        Ok(found)
    }

    /// Join the ring through the node at `bootstrap_addr`.
    pub async fn join(&self, bootstrap_addr: &str) -> Result<(), HandlePacketError> {
        self.ring.join(bootstrap_addr).await
    }

    async fn found(&self, node: NodeIdentity) -> Result<(), HandlePacketError> {
        self.ring.handle_search_return(node.clone()).await?;
        self.messenger.set_partner(node).await;

        let messenger = self.messenger.clone();
        tokio::spawn(async move {
            match messenger.prepare().await {
                Ok(()) => debug!("Circuit to the chat partner is ready"),
                Err(e) => warn!("Failed to prepare circuit to the chat partner: {}", e),
            }
        });

        Ok(())
    }
}
