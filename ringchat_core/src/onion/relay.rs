/*! Relay side of onion circuits: keeps the keys received through `CREATE`
and removes one layer from every envelope.
*/

use std::net::SocketAddr;
use std::sync::Arc;

use futures::SinkExt;
use futures::channel::mpsc;
use ringchat_crypto::{CircuitKey, SecretKey};
use ringchat_packet::frame::{ChatMessage, Frame};
use ringchat_packet::key_exchange::CreateRequest;
use ringchat_packet::onion::{OnionCommand, OnionLayer};
use tokio::sync::Mutex;

use crate::io_tokio::maybe_send_unbounded;
use crate::net::Tx;
use crate::onion::codec::peel;
use crate::onion::errors::*;

/// Key received from a circuit builder.
#[derive(Clone, Debug)]
pub struct RelayCircuitEntry {
    /// Address the key exchange came from.
    pub peer_addr: SocketAddr,
    /// One-time key of the circuit.
    pub key: CircuitKey,
}

/// Keys this node holds as a hop of other nodes' circuits.
#[derive(Clone)]
pub struct RelayKeyStore {
    sk: SecretKey,
    entries: Arc<Mutex<Vec<RelayCircuitEntry>>>,
}

impl RelayKeyStore {
    /// Create new empty `RelayKeyStore` opening key exchanges with `sk`.
    pub fn new(sk: SecretKey) -> RelayKeyStore {
        RelayKeyStore {
            sk,
            entries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Open a key exchange and keep the key.
    pub async fn receive(&self, request: &CreateRequest, peer_addr: SocketAddr) -> Result<(), KeyExchangeError> {
        let payload = request.get_payload(&self.sk)
            .map_err(KeyExchangeError::Open)?;
        self.entries.lock().await.push(RelayCircuitEntry {
            peer_addr,
            key: payload.key,
        });
        Ok(())
    }

    /// Remove one layer of `envelope`, using up the key that fits.
    pub async fn peel(&self, envelope: &[u8]) -> Result<OnionLayer, PeelError> {
        peel(&mut *self.entries.lock().await, envelope)
    }

    /// Number of keys not used yet.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Whether no keys are held.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Handles `CREATE` frames and onion envelopes.
#[derive(Clone)]
pub struct Relay {
    keys: RelayKeyStore,
    tx: Tx,
    message_sink: Option<mpsc::UnboundedSender<ChatMessage>>,
}

impl Relay {
    /// Create new `Relay`.
    pub fn new(sk: SecretKey, tx: Tx) -> Relay {
        Relay {
            keys: RelayKeyStore::new(sk),
            tx,
            message_sink: None,
        }
    }

    /// Set sink for messages this node is the destination of.
    pub fn set_message_sink(&mut self, sink: mpsc::UnboundedSender<ChatMessage>) {
        self.message_sink = Some(sink);
    }

    /// Keys held by this relay.
    pub fn keys(&self) -> &RelayKeyStore {
        &self.keys
    }

    /// Handle `CREATE`. The returned frame has to be written back on the
    /// connection the request came from.
    pub async fn handle_create(&self, request: CreateRequest, peer_addr: SocketAddr) -> Result<Frame, HandleOnionError> {
        self.keys.receive(&request, peer_addr).await
            .map_err(HandleOnionError::KeyExchange)?;
        debug!("Received circuit key from {}", peer_addr);
        Ok(Frame::KeyReceived)
    }

    /// Handle an onion envelope: forward it or deliver the message.
    pub async fn handle_envelope(&self, envelope: Vec<u8>) -> Result<(), HandleOnionError> {
        let layer = self.keys.peel(&envelope).await
            .map_err(|e| {
                warn!("Dropping onion envelope of {} bytes: {}", envelope.len(), e);
                HandleOnionError::Peel(e)
            })?;

        match layer.command {
            OnionCommand::Forward { next_hop, payload } => {
                trace!("Forwarding circuit {} to {}", layer.circuit_id, next_hop);
                self.tx.clone().send((Frame::Onion(payload), next_hop)).await
                    .map_err(HandleOnionError::SendTo)
            },
            OnionCommand::Message { payload } => {
                let message = ChatMessage::from_bytes(&payload);
                info!("Received message on circuit {}", layer.circuit_id);
                maybe_send_unbounded(self.message_sink.clone(), message).await
                    .map_err(HandleOnionError::SendTo)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use futures::StreamExt;
    use rand::thread_rng;
    use ringchat_packet::identity::NodeIdentity;
    use ringchat_packet::key_exchange::KeyExchangePayload;
    use ringchat_packet::ring::RingTable;

    use crate::net::OUTBOUND_CHANNEL_SIZE;
    use crate::onion::codec::encrypt;
    use crate::onion::route::*;

    fn peer() -> SocketAddr {
        "127.0.0.1:33445".parse().unwrap()
    }

    fn create_relay() -> (Relay, SecretKey, mpsc::Receiver<(Frame, String)>) {
        let sk = SecretKey::generate(&mut thread_rng());
        let (tx, rx) = mpsc::channel(OUTBOUND_CHANNEL_SIZE);
        (Relay::new(sk.clone(), tx), sk, rx)
    }

    fn create_request(sk: &SecretKey, key: &CircuitKey) -> CreateRequest {
        CreateRequest::new(&sk.public_key(), &KeyExchangePayload::create(key.clone())).unwrap()
    }

    fn identity(pseudonym: &str, port: u16, sk: &SecretKey) -> NodeIdentity {
        NodeIdentity::new("127.0.0.1", port, pseudonym, sk.public_key())
    }

    #[tokio::test]
    async fn handle_create_acknowledges() {
        let (relay, sk, _rx) = create_relay();
        let key = CircuitKey::generate();

        let reply = relay.handle_create(create_request(&sk, &key), peer()).await.unwrap();

        assert_eq!(reply, Frame::KeyReceived);
        assert_eq!(relay.keys().len().await, 1);
    }

    #[tokio::test]
    async fn handle_create_foreign_key() {
        let (relay, _sk, _rx) = create_relay();
        let other = SecretKey::generate(&mut thread_rng());

        let res = relay.handle_create(create_request(&other, &CircuitKey::generate()), peer()).await;

        assert!(matches!(res, Err(HandleOnionError::KeyExchange(KeyExchangeError::Open(_)))));
        assert!(relay.keys().is_empty().await);
    }

    #[tokio::test]
    async fn handle_envelope_forwards() {
        let (relay, sk, mut rx) = create_relay();
        let other = SecretKey::generate(&mut thread_rng());
        let table = RingTable {
            node: identity("Sender", 1, &other),
            successor: identity("Relay", 2, &sk),
            predecessor: identity("Relay", 2, &sk),
        };
        let route = Route::construct(&table, identity("Dest", 3, &other), &mut thread_rng()).unwrap();
        let keys = CircuitKeys::generate();
        relay.handle_create(create_request(&sk, &keys.hop1), peer()).await.unwrap();

        let envelope = encrypt(&route, &keys, b"hi").unwrap();
        relay.handle_envelope(envelope).await.unwrap();

        let (frame, addr) = rx.next().await.unwrap();
        assert_eq!(addr, route.hop2.address());
        assert!(matches!(frame, Frame::Onion(_)));
        assert!(relay.keys().is_empty().await);
    }

    #[tokio::test]
    async fn handle_envelope_delivers_message() {
        let (mut relay, sk, _rx) = create_relay();
        let (sink_tx, mut sink_rx) = mpsc::unbounded();
        relay.set_message_sink(sink_tx);

        let key = CircuitKey::generate();
        relay.handle_create(create_request(&sk, &key), peer()).await.unwrap();
        let layer = OnionLayer::message(
            uuid::Uuid::new_v4(),
            ChatMessage::new("hello there").to_bytes(),
        );
        relay.handle_envelope(layer.seal(&key).unwrap()).await.unwrap();

        assert_eq!(sink_rx.next().await.unwrap(), ChatMessage::new("hello there"));
    }

    #[tokio::test]
    async fn handle_envelope_without_key() {
        let (relay, _sk, _rx) = create_relay();
        let envelope = CircuitKey::generate().encrypt(b"data").unwrap();

        let res = relay.handle_envelope(envelope).await;

        assert!(matches!(res, Err(HandleOnionError::Peel(PeelError::NoMatchingKey { tried: 0 }))));
    }
}
