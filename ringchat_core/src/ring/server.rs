/*! Ring server: applies join decisions, neighbor updates and lookups to the
local ring table.
*/

use std::sync::Arc;

use futures::SinkExt;
use futures::channel::mpsc;
use ringchat_packet::frame::Frame;
use ringchat_packet::identity::{NodeId, NodeIdentity};
use ringchat_packet::ring::RingTable;
use ringchat_packet::search::SearchRequest;
use tokio::sync::RwLock;

use crate::io_tokio::maybe_send_unbounded;
use crate::net::Tx;
use crate::ring::errors::*;
use crate::ring::position::*;
use crate::state::Store;

/// What to do with a lookup that reached this node.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SearchOutcome {
    /// The wanted node is this node or one of its neighbors.
    Found(NodeIdentity),
    /// Pass the lookup to the node with this identity.
    Forward(NodeIdentity),
    /// This node is alone and doesn't have the wanted node.
    NotFound,
}

/// Decide what to do with a lookup of `node_id` given the local ring table.
///
/// The successor, the predecessor and this node are checked for equality
/// first. Otherwise the lookup continues towards the successor for greater
/// ids and towards the predecessor for lesser ones.
pub fn information_search(table: &RingTable, node_id: &NodeId) -> SearchOutcome {
    if let Some(node) = table.find(node_id) {
        return SearchOutcome::Found(node.clone());
    }

    if table.is_alone() {
        return SearchOutcome::NotFound;
    }

    if node_id > table.node_id() {
        SearchOutcome::Forward(table.successor.clone())
    } else {
        SearchOutcome::Forward(table.predecessor.clone())
    }
}

/**
Ring server. Keeps the local ring table and reacts to ring frames.

Every handler that changes the table holds the write lock from the moment it
reads the table until the change is persisted, so concurrent joins can't
overwrite each other. Notifications are queued into the outbound sink and
never acknowledged.
*/
#[derive(Clone)]
pub struct Server {
    /// Local ring table.
    table: Arc<RwLock<RingTable>>,
    /// Sink for outbound frames.
    tx: Tx,
    /// Durable storage of the ring table and the chat partner.
    store: Arc<dyn Store>,
    /// Sink for identities found by lookups started here.
    partner_sink: Option<mpsc::UnboundedSender<NodeIdentity>>,
}

impl Server {
    /// Create new `Server` for a node that is alone in the ring.
    pub fn new(tx: Tx, node: NodeIdentity, store: Arc<dyn Store>) -> Server {
        Server::with_table(tx, RingTable::new(node), store)
    }

    /// Create new `Server` with a ring table restored from storage.
    pub fn with_table(tx: Tx, table: RingTable, store: Arc<dyn Store>) -> Server {
        Server {
            table: Arc::new(RwLock::new(table)),
            tx,
            store,
            partner_sink: None,
        }
    }

    /// Set sink for identities found by lookups.
    pub fn set_partner_sink(&mut self, sink: mpsc::UnboundedSender<NodeIdentity>) {
        self.partner_sink = Some(sink);
    }

    /// Snapshot of the local ring table.
    pub async fn table(&self) -> RingTable {
        self.table.read().await.clone()
    }

    /// Identity of this node.
    pub async fn identity(&self) -> NodeIdentity {
        self.table.read().await.node.clone()
    }

    /// Queue frame for delivery to `addr`.
    async fn send_to(&self, addr: String, frame: Frame) -> Result<(), HandlePacketError> {
        self.tx.clone().send((frame, addr)).await
            .map_err(HandlePacketError::SendTo)
    }

    fn persist(&self, table: &RingTable) -> Result<(), HandlePacketError> {
        self.store.save_ring(table)
            .map_err(HandlePacketError::State)
    }

    /// Ask the node at `bootstrap_addr` to place this node in its ring.
    pub async fn join(&self, bootstrap_addr: &str) -> Result<(), HandlePacketError> {
        let node = self.identity().await;
        info!("Joining the ring through {}", bootstrap_addr);
        self.send_to(bootstrap_addr.to_owned(), Frame::Register(node)).await
    }

    /// Handle `REGISTER` of a node that wants to join the ring.
    pub async fn handle_register(&self, incoming: NodeIdentity) -> Result<(), HandlePacketError> {
        let mut table = self.table.write().await;

        let position = locate(&table, &incoming.node_id)
            .map_err(|e| {
                error!("Can't place node {} next to {}: {}", incoming.node_id, table.node_id(), e);
                HandlePacketError::Locate(e)
            })?;
        debug!("Node {} joins as {:?} of {}", incoming.node_id, position, table.node_id());

        match position {
            Position::SecondNode => {
                table.successor = incoming.clone();
                table.predecessor = incoming.clone();
                let reply = RingTable {
                    node: incoming.clone(),
                    successor: table.node.clone(),
                    predecessor: table.node.clone(),
                };
                self.send_to(incoming.address(), Frame::RegisterReturn(reply)).await?;
                self.persist(&table)
            },
            Position::NewPredecessor => {
                let old_predecessor = std::mem::replace(&mut table.predecessor, incoming.clone());
                self.send_to(old_predecessor.address(), Frame::UpdateSuccessor(incoming.clone())).await?;
                let reply = RingTable {
                    node: incoming.clone(),
                    successor: table.node.clone(),
                    predecessor: old_predecessor,
                };
                self.send_to(incoming.address(), Frame::RegisterReturn(reply)).await?;
                self.persist(&table)
            },
            Position::NewSuccessor => {
                let old_successor = std::mem::replace(&mut table.successor, incoming.clone());
                self.send_to(old_successor.address(), Frame::UpdatePredecessor(incoming.clone())).await?;
                let reply = RingTable {
                    node: incoming.clone(),
                    successor: old_successor,
                    predecessor: table.node.clone(),
                };
                self.send_to(incoming.address(), Frame::RegisterReturn(reply)).await?;
                self.persist(&table)
            },
            Position::ForwardToSuccessor => {
                let addr = table.successor.address();
                self.send_to(addr, Frame::Register(incoming)).await
            },
            Position::ForwardToPredecessor => {
                let addr = table.predecessor.address();
                self.send_to(addr, Frame::Register(incoming)).await
            },
        }
    }

    /// Handle `REGISTERRETURN`: adopt the neighbors computed by the node that
    /// placed this node.
    pub async fn handle_register_return(&self, received: RingTable) -> Result<(), HandlePacketError> {
        let mut table = self.table.write().await;

        if received.node.node_id != table.node.node_id {
            return Err(HandlePacketError::ForeignTable);
        }
        if received.successor.node_id == table.node.node_id || received.predecessor.node_id == table.node.node_id {
            return Err(HandlePacketError::SelfNeighbor);
        }

        table.successor = received.successor;
        table.predecessor = received.predecessor;
        info!("Joined the ring between {} and {}", table.predecessor, table.successor);

        self.persist(&table)
    }

    /// Handle `UPDATESUCCESSOR`: a node was spliced in right after this node.
    pub async fn handle_update_successor(&self, node: NodeIdentity) -> Result<(), HandlePacketError> {
        let mut table = self.table.write().await;

        if node.node_id == table.node.node_id {
            return Err(HandlePacketError::SelfNeighbor);
        }

        debug!("Successor of {} is now {}", table.node_id(), node.node_id);
        table.successor = node;
        self.persist(&table)
    }

    /// Handle `UPDATEPREDECESSOR`: a node was spliced in right before this
    /// node.
    pub async fn handle_update_predecessor(&self, node: NodeIdentity) -> Result<(), HandlePacketError> {
        let mut table = self.table.write().await;

        if node.node_id == table.node.node_id {
            return Err(HandlePacketError::SelfNeighbor);
        }

        debug!("Predecessor of {} is now {}", table.node_id(), node.node_id);
        table.predecessor = node;
        self.persist(&table)
    }

    /// Handle `SEARCH`: answer the requester directly if the wanted node is
    /// known here, otherwise pass the request one hop further.
    pub async fn handle_search(&self, request: SearchRequest) -> Result<(), HandlePacketError> {
        let outcome = information_search(&*self.table.read().await, &request.node_id);

        match outcome {
            SearchOutcome::Found(node) => {
                trace!("Search for {} resolved to {}", request.node_id, node);
                self.send_to(request.reply_address(), Frame::SearchReturn(node)).await
            },
            SearchOutcome::Forward(next) => {
                let forwarded = request.next_hop()
                    .ok_or(HandlePacketError::SearchExhausted)?;
                self.send_to(next.address(), Frame::Search(forwarded)).await
            },
            SearchOutcome::NotFound => Err(HandlePacketError::NoNeighbors),
        }
    }

    /** Look for the node of `pseudonym`.

    Returns the identity right away when this node knows it. Otherwise sends
    `SEARCH` along the ring and returns `None`; the answer arrives later as
    `SEARCHRETURN`. A node that is alone in the ring has nobody to ask and
    fails with `NoNeighbors`.
    */
    pub async fn search(&self, pseudonym: &str) -> Result<Option<NodeIdentity>, HandlePacketError> {
        self.search_id(NodeId::from_pseudonym(pseudonym)).await
    }

    /// Look for the node with `node_id`, see `search`.
    pub async fn search_id(&self, node_id: NodeId) -> Result<Option<NodeIdentity>, HandlePacketError> {
        let table = self.table().await;

        match information_search(&table, &node_id) {
            SearchOutcome::Found(node) => Ok(Some(node)),
            SearchOutcome::Forward(next) => {
                let request = SearchRequest::new(node_id, table.node.ip.clone(), table.node.port);
                self.send_to(next.address(), Frame::Search(request)).await?;
                Ok(None)
            },
            SearchOutcome::NotFound => Err(HandlePacketError::NoNeighbors),
        }
    }

    /// Handle `SEARCHRETURN`: remember the found node as the chat partner.
    pub async fn handle_search_return(&self, node: NodeIdentity) -> Result<(), HandlePacketError> {
        info!("Found {}", node);
        self.store.save_partner(&node)
            .map_err(HandlePacketError::State)?;
        maybe_send_unbounded(self.partner_sink.clone(), node).await
            .map_err(HandlePacketError::SendTo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::{HashMap, HashSet};

    use futures::StreamExt;
    use rand::seq::SliceRandom;
    use rand::thread_rng;

    use crate::state::MemoryStore;

    macro_rules! unpack {
        ($variable:expr, $variant:path) => (
            match $variable {
                $variant(inner) => inner,
                other => panic!("Expected {} but got {:?}", stringify!($variant), other),
            }
        )
    }

    fn node(pseudonym: &str, port: u16) -> NodeIdentity {
        NodeIdentity {
            ip: "127.0.0.1".into(),
            port,
            pseudonym: pseudonym.into(),
            public_key: None,
            node_id: NodeId::from_pseudonym(pseudonym),
        }
    }

    /// Node with a raw id, to pin the ring order in tests.
    fn raw_node(id: &str, port: u16) -> NodeIdentity {
        NodeIdentity {
            node_id: NodeId::from(id),
            ..node(id, port)
        }
    }

    fn create_server(me: NodeIdentity) -> (Server, mpsc::Receiver<(Frame, String)>, Arc<MemoryStore>) {
        let (tx, rx) = mpsc::channel(32);
        let store = Arc::new(MemoryStore::new());
        let server = Server::new(tx, me, store.clone());
        (server, rx, store)
    }

    fn create_server_with(pred: NodeIdentity, me: NodeIdentity, succ: NodeIdentity)
        -> (Server, mpsc::Receiver<(Frame, String)>, Arc<MemoryStore>) {
        let (tx, rx) = mpsc::channel(32);
        let store = Arc::new(MemoryStore::new());
        let table = RingTable { node: me, successor: succ, predecessor: pred };
        let server = Server::with_table(tx, table, store.clone());
        (server, rx, store)
    }

    #[tokio::test]
    async fn join_sends_register() {
        let alice = node("Alice", 1);
        let (server, mut rx, _store) = create_server(alice.clone());

        server.join("10.0.0.1:33445").await.unwrap();

        let (frame, addr) = rx.next().await.unwrap();
        assert_eq!(addr, "10.0.0.1:33445");
        assert_eq!(unpack!(frame, Frame::Register), alice);
    }

    #[tokio::test]
    async fn handle_register_second_node() {
        let alice = raw_node("5", 1);
        let bob = raw_node("7", 2);
        let (server, mut rx, store) = create_server(alice.clone());

        server.handle_register(bob.clone()).await.unwrap();

        let table = server.table().await;
        assert_eq!(table.successor, bob);
        assert_eq!(table.predecessor, bob);
        assert_eq!(store.ring_saves(), 1);

        let (frame, addr) = rx.next().await.unwrap();
        assert_eq!(addr, bob.address());
        let reply = unpack!(frame, Frame::RegisterReturn);
        assert_eq!(reply.node, bob);
        assert_eq!(reply.successor, alice);
        assert_eq!(reply.predecessor, alice);
    }

    #[tokio::test]
    async fn handle_register_third_node_lower_becomes_predecessor() {
        let alice = raw_node("5", 1);
        let bob = raw_node("7", 2);
        let carol = raw_node("3", 3);
        let (server, mut rx, _store) = create_server_with(bob.clone(), alice.clone(), bob.clone());

        server.handle_register(carol.clone()).await.unwrap();

        let table = server.table().await;
        assert_eq!(table.predecessor, carol);
        assert_eq!(table.successor, bob);

        let (frame, addr) = rx.next().await.unwrap();
        assert_eq!(addr, bob.address());
        assert_eq!(unpack!(frame, Frame::UpdateSuccessor), carol);

        let (frame, addr) = rx.next().await.unwrap();
        assert_eq!(addr, carol.address());
        let reply = unpack!(frame, Frame::RegisterReturn);
        assert_eq!(reply.successor, alice);
        assert_eq!(reply.predecessor, bob);
    }

    #[tokio::test]
    async fn handle_register_new_successor() {
        let pred = raw_node("3", 1);
        let me = raw_node("5", 2);
        let succ = raw_node("8", 3);
        let incoming = raw_node("6", 4);
        let (server, mut rx, store) = create_server_with(pred.clone(), me.clone(), succ.clone());

        server.handle_register(incoming.clone()).await.unwrap();

        let table = server.table().await;
        assert_eq!(table.successor, incoming);
        assert_eq!(table.predecessor, pred);
        assert_eq!(store.load_ring().unwrap(), Some(table));

        let (frame, addr) = rx.next().await.unwrap();
        assert_eq!(addr, succ.address());
        assert_eq!(unpack!(frame, Frame::UpdatePredecessor), incoming);

        let (frame, _addr) = rx.next().await.unwrap();
        let reply = unpack!(frame, Frame::RegisterReturn);
        assert_eq!(reply.successor, succ);
        assert_eq!(reply.predecessor, me);
    }

    #[tokio::test]
    async fn handle_register_forwards() {
        let pred = raw_node("3", 1);
        let me = raw_node("5", 2);
        let succ = raw_node("7", 3);
        let (server, mut rx, store) = create_server_with(pred.clone(), me, succ.clone());

        let high = raw_node("9", 4);
        server.handle_register(high.clone()).await.unwrap();
        let (frame, addr) = rx.next().await.unwrap();
        assert_eq!(addr, succ.address());
        assert_eq!(unpack!(frame, Frame::Register), high);

        let low = raw_node("1", 5);
        server.handle_register(low.clone()).await.unwrap();
        let (frame, addr) = rx.next().await.unwrap();
        assert_eq!(addr, pred.address());
        assert_eq!(unpack!(frame, Frame::Register), low);

        assert_eq!(store.ring_saves(), 0);
    }

    #[tokio::test]
    async fn handle_register_duplicate_leaves_table() {
        let pred = raw_node("3", 1);
        let me = raw_node("5", 2);
        let succ = raw_node("7", 3);
        let (server, mut rx, store) = create_server_with(pred, me, succ.clone());
        let before = server.table().await;

        let res = server.handle_register(raw_node("7", 9)).await;
        assert!(matches!(res, Err(HandlePacketError::Locate(LocateError::DuplicateId))));
        assert_eq!(server.table().await, before);
        assert_eq!(store.ring_saves(), 0);
        assert!(rx.try_next().is_err());
    }

    #[tokio::test]
    async fn handle_register_return() {
        let alice = raw_node("5", 1);
        let bob = raw_node("7", 2);
        let (server, _rx, store) = create_server(alice.clone());

        let received = RingTable { node: alice.clone(), successor: bob.clone(), predecessor: bob.clone() };
        server.handle_register_return(received.clone()).await.unwrap();

        assert_eq!(server.table().await, received);
        assert_eq!(store.ring_saves(), 1);
    }

    #[tokio::test]
    async fn handle_register_return_foreign() {
        let alice = raw_node("5", 1);
        let bob = raw_node("7", 2);
        let (server, _rx, _store) = create_server(alice.clone());

        let received = RingTable { node: bob.clone(), successor: alice.clone(), predecessor: alice };
        let res = server.handle_register_return(received).await;
        assert!(matches!(res, Err(HandlePacketError::ForeignTable)));
        assert!(server.table().await.is_alone());
    }

    #[tokio::test]
    async fn handle_updates() {
        let pred = raw_node("3", 1);
        let me = raw_node("5", 2);
        let succ = raw_node("8", 3);
        let (server, _rx, store) = create_server_with(pred, me.clone(), succ);

        server.handle_update_successor(raw_node("6", 4)).await.unwrap();
        server.handle_update_predecessor(raw_node("4", 5)).await.unwrap();

        let table = server.table().await;
        assert_eq!(table.successor.node_id, NodeId::from("6"));
        assert_eq!(table.predecessor.node_id, NodeId::from("4"));
        assert_eq!(store.ring_saves(), 2);

        let res = server.handle_update_successor(me).await;
        assert!(matches!(res, Err(HandlePacketError::SelfNeighbor)));
    }

    #[test]
    fn information_search_checks_known_nodes() {
        let table = RingTable {
            node: raw_node("5", 2),
            successor: raw_node("7", 3),
            predecessor: raw_node("3", 1),
        };

        assert_eq!(information_search(&table, &NodeId::from("5")), SearchOutcome::Found(raw_node("5", 2)));
        assert_eq!(information_search(&table, &NodeId::from("7")), SearchOutcome::Found(raw_node("7", 3)));
        assert_eq!(information_search(&table, &NodeId::from("3")), SearchOutcome::Found(raw_node("3", 1)));
        assert_eq!(information_search(&table, &NodeId::from("9")), SearchOutcome::Forward(raw_node("7", 3)));
        assert_eq!(information_search(&table, &NodeId::from("1")), SearchOutcome::Forward(raw_node("3", 1)));
    }

    #[tokio::test]
    async fn search_for_self_does_not_forward() {
        let alice = node("Alice", 1);
        let (server, mut rx, _store) = create_server_with(node("Bob", 2), alice.clone(), node("Bob", 2));

        let found = server.search("Alice").await.unwrap();
        assert_eq!(found, Some(alice));
        assert!(rx.try_next().is_err());
    }

    #[tokio::test]
    async fn search_when_alone_sends_nothing() {
        let (server, mut rx, _store) = create_server(node("Alice", 1));

        assert!(matches!(server.search("Bob").await, Err(HandlePacketError::NoNeighbors)));
        assert!(rx.try_next().is_err());

        assert_eq!(server.search("Alice").await.unwrap(), Some(node("Alice", 1)));
    }

    #[tokio::test]
    async fn search_sends_request() {
        let pred = raw_node("3", 1);
        let me = raw_node("5", 2);
        let succ = raw_node("7", 3);
        let (server, mut rx, _store) = create_server_with(pred.clone(), me.clone(), succ.clone());

        assert_eq!(server.search("Dave").await.unwrap(), None);

        let (frame, addr) = rx.next().await.unwrap();
        let request = unpack!(frame, Frame::Search);
        assert_eq!(request.node_id, NodeId::from_pseudonym("Dave"));
        assert_eq!(request.reply_address(), me.address());
        let expected = if request.node_id > me.node_id { succ } else { pred };
        assert_eq!(addr, expected.address());
    }

    #[tokio::test]
    async fn handle_search_found_replies_to_requester() {
        let (server, mut rx, _store) = create_server_with(raw_node("3", 1), raw_node("5", 2), raw_node("7", 3));

        let request = SearchRequest::new(NodeId::from("7"), "10.1.1.1", 4444);
        server.handle_search(request).await.unwrap();

        let (frame, addr) = rx.next().await.unwrap();
        assert_eq!(addr, "10.1.1.1:4444");
        assert_eq!(unpack!(frame, Frame::SearchReturn), raw_node("7", 3));
    }

    #[tokio::test]
    async fn handle_search_forwards_and_decrements() {
        let (server, mut rx, _store) = create_server_with(raw_node("3", 1), raw_node("5", 2), raw_node("7", 3));

        let request = SearchRequest::new(NodeId::from("9"), "10.1.1.1", 4444);
        server.handle_search(request.clone()).await.unwrap();

        let (frame, addr) = rx.next().await.unwrap();
        assert_eq!(addr, raw_node("7", 3).address());
        let forwarded = unpack!(frame, Frame::Search);
        assert_eq!(forwarded.ttl, request.ttl - 1);
        assert_eq!(forwarded.node_id, request.node_id);
    }

    #[tokio::test]
    async fn handle_search_exhausted() {
        let (server, mut rx, _store) = create_server_with(raw_node("3", 1), raw_node("5", 2), raw_node("7", 3));

        let request = SearchRequest { ttl: 0, ..SearchRequest::new(NodeId::from("9"), "10.1.1.1", 4444) };
        let res = server.handle_search(request).await;
        assert!(matches!(res, Err(HandlePacketError::SearchExhausted)));
        assert!(rx.try_next().is_err());
    }

    #[tokio::test]
    async fn handle_search_return_saves_partner() {
        let (mut server, _rx, store) = create_server(node("Alice", 1));
        let (partner_tx, mut partner_rx) = mpsc::unbounded();
        server.set_partner_sink(partner_tx);

        server.handle_search_return(node("Bob", 2)).await.unwrap();

        assert_eq!(store.load_partner().unwrap(), Some(node("Bob", 2)));
        assert_eq!(partner_rx.next().await, Some(node("Bob", 2)));
    }

    /// Deliver queued frames between servers until the network is quiet.
    async fn settle(
        servers: &HashMap<String, Server>,
        receivers: &mut [mpsc::Receiver<(Frame, String)>],
    ) {
        loop {
            let mut delivered = false;
            for rx in receivers.iter_mut() {
                while let Ok(Some((frame, addr))) = rx.try_next() {
                    delivered = true;
                    let server = &servers[&addr];
                    let res = match frame {
                        Frame::Register(node) => server.handle_register(node).await,
                        Frame::RegisterReturn(table) => server.handle_register_return(table).await,
                        Frame::UpdateSuccessor(node) => server.handle_update_successor(node).await,
                        Frame::UpdatePredecessor(node) => server.handle_update_predecessor(node).await,
                        Frame::Search(request) => server.handle_search(request).await,
                        Frame::SearchReturn(node) => server.handle_search_return(node).await,
                        other => panic!("Unexpected frame {:?}", other),
                    };
                    res.unwrap();
                }
            }
            if !delivered {
                break;
            }
        }
    }

    async fn assert_ring_closed(servers: &HashMap<String, Server>) {
        for server in servers.values() {
            let start = server.identity().await;
            let mut visited = HashSet::new();
            let mut current = start.clone();
            loop {
                assert!(visited.insert(current.node_id.clone()), "ring revisits {}", current.node_id);
                let table = servers[&current.address()].table().await;
                assert_eq!(
                    servers[&table.predecessor.address()].table().await.successor.node_id,
                    current.node_id
                );
                current = table.successor;
                if current.node_id == start.node_id {
                    break;
                }
            }
            assert_eq!(visited.len(), servers.len());
        }
    }

    #[tokio::test]
    async fn ring_stays_closed_for_any_join_order() {
        let mut rng = thread_rng();
        for round in 0..20 {
            let count = 2 + round % 9;
            let mut nodes: Vec<NodeIdentity> = (0..count)
                .map(|i| node(&format!("node-{}-{}", round, i), 10_000 + i as u16))
                .collect();
            nodes.shuffle(&mut rng);

            let mut servers = HashMap::new();
            let mut receivers = Vec::new();
            for joining in &nodes {
                let (server, rx, _store) = create_server(joining.clone());
                servers.insert(joining.address(), server.clone());
                receivers.push(rx);

                if servers.len() > 1 {
                    let bootstrap = nodes[..servers.len() - 1].choose(&mut rng).unwrap();
                    server.join(&bootstrap.address()).await.unwrap();
                    settle(&servers, &mut receivers).await;
                    assert_ring_closed(&servers).await;
                }
            }
        }
    }

    #[tokio::test]
    async fn search_travels_the_ring() {
        let mut servers = HashMap::new();
        let mut receivers = Vec::new();
        let (partner_tx, mut partner_rx) = mpsc::unbounded();
        // this join order ends with the ring sorted by id
        let nodes: Vec<NodeIdentity> = ["3", "1", "5", "2", "6", "4"].iter()
            .enumerate()
            .map(|(i, id)| raw_node(id, 20_000 + i as u16))
            .collect();

        for (i, joining) in nodes.iter().enumerate() {
            let (mut server, rx, _store) = create_server(joining.clone());
            if i == 0 {
                server.set_partner_sink(partner_tx.clone());
            }
            servers.insert(joining.address(), server.clone());
            receivers.push(rx);
            if i > 0 {
                server.join(&nodes[0].address()).await.unwrap();
                settle(&servers, &mut receivers).await;
            }
        }

        let first = &servers[&nodes[0].address()];
        for target in &nodes[1..] {
            if let Some(found) = first.search_id(target.node_id.clone()).await.unwrap() {
                assert_eq!(&found, target);
                continue;
            }
            settle(&servers, &mut receivers).await;
            assert_eq!(&partner_rx.next().await.unwrap(), target);
        }
    }
}
