/*! Sender side of one circuit.
*/

use std::time::Duration;

use futures::future;
use ringchat_packet::frame::{ChatMessage, Frame};

use crate::net::request;
use crate::onion::codec::*;
use crate::onion::errors::*;
use crate::onion::route::*;

/// Default time to wait for every hop to acknowledge its key.
pub const KEY_EXCHANGE_TIMEOUT: Duration = Duration::from_secs(5);

/** Circuit with keys for its three hops.

A circuit carries exactly one message: relays forget their key after
peeling, so [`Circuit::seal`] consumes the circuit.
*/
#[derive(Debug)]
pub struct Circuit {
    route: Route,
    keys: CircuitKeys,
}

impl Circuit {
    /// Create new `Circuit` over `route` with fresh keys. Hops don't know
    /// the keys until the key exchange is done.
    pub fn new(route: Route) -> Circuit {
        Circuit {
            route,
            keys: CircuitKeys::generate(),
        }
    }

    /// Route of the circuit.
    pub fn route(&self) -> &Route {
        &self.route
    }

    /// `CREATE` frames for the hops, paired with their addresses.
    pub fn key_exchanges(&self) -> Result<Vec<(String, Frame)>, KeyExchangeError> {
        key_exchange_frames(&self.route, &self.keys)
    }

    /** Create a circuit over `route` and hand out its keys.

    Key exchanges run concurrently. Every hop has to reply with
    `KEYRECIEVED` within `timeout`, otherwise the circuit is not usable.
    */
    pub async fn open(route: Route, timeout: Duration) -> Result<Circuit, CircuitError> {
        let circuit = Circuit::new(route);
        let exchanges = circuit.key_exchanges()
            .map_err(CircuitError::KeyExchange)?;

        future::try_join_all(exchanges.into_iter().map(|(addr, frame)| async move {
            match request(&addr, frame, timeout).await {
                Ok(Frame::KeyReceived) => Ok(()),
                Ok(reply) => Err(CircuitError::UnexpectedReply { addr, kind: reply.kind() }),
                Err(error) => Err(CircuitError::NoAcknowledgement { addr, error }),
            }
        })).await?;

        debug!("Opened circuit {} to {}", circuit.route.circuit_id, circuit.route.destination);
        Ok(circuit)
    }

    /// Wrap `message` for this circuit. Returns the frame and the address of
    /// the first hop to send it to.
    pub fn seal(self, message: &ChatMessage) -> Result<(String, Frame), CircuitError> {
        let envelope = encrypt(&self.route, &self.keys, &message.to_bytes())
            .map_err(CircuitError::Encrypt)?;
        Ok((self.route.hop1.address(), Frame::Onion(envelope)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use futures::{SinkExt, StreamExt};
    use rand::thread_rng;
    use ringchat_crypto::SecretKey;
    use ringchat_packet::identity::NodeIdentity;
    use ringchat_packet::ring::RingTable;
    use tokio::net::TcpListener;
    use tokio_util::codec::Framed;

    use crate::net::FrameCodec;
    use crate::onion::relay::RelayKeyStore;

    async fn hop(pseudonym: &str) -> (NodeIdentity, SecretKey, TcpListener) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let sk = SecretKey::generate(&mut thread_rng());
        (NodeIdentity::new("127.0.0.1", port, pseudonym, sk.public_key()), sk, listener)
    }

    /// Accept `count` key exchanges and reply to each with `reply`.
    async fn serve(listener: TcpListener, store: RelayKeyStore, count: usize, reply: Frame) {
        for _ in 0..count {
            let (socket, peer) = listener.accept().await.unwrap();
            let mut framed = Framed::new(socket, FrameCodec);
            let request = match framed.next().await.unwrap().unwrap() {
                Frame::Create(request) => request,
                frame => panic!("Unexpected frame {:?}", frame),
            };
            store.receive(&request, peer).await.unwrap();
            framed.send(reply.clone()).await.unwrap();
        }
    }

    #[tokio::test]
    async fn open_hands_out_keys() {
        let (relay, relay_sk, relay_listener) = hop("Relay").await;
        let (dest, dest_sk, dest_listener) = hop("Dest").await;
        let table = RingTable {
            node: NodeIdentity::new("127.0.0.1", 1, "Sender", SecretKey::generate(&mut thread_rng()).public_key()),
            successor: relay.clone(),
            predecessor: relay,
        };
        let route = Route::construct(&table, dest, &mut thread_rng()).unwrap();

        let relay_store = RelayKeyStore::new(relay_sk);
        let dest_store = RelayKeyStore::new(dest_sk);
        tokio::spawn(serve(relay_listener, relay_store.clone(), 2, Frame::KeyReceived));
        tokio::spawn(serve(dest_listener, dest_store.clone(), 1, Frame::KeyReceived));

        let circuit = Circuit::open(route, KEY_EXCHANGE_TIMEOUT).await.unwrap();
        let circuit_id = circuit.route().circuit_id;

        assert_eq!(relay_store.len().await, 2);
        assert_eq!(dest_store.len().await, 1);

        let (addr, frame) = circuit.seal(&ChatMessage::new("hi")).unwrap();
        let envelope = match frame {
            Frame::Onion(envelope) => envelope,
            frame => panic!("Unexpected frame {:?}", frame),
        };
        assert_eq!(addr, table.successor.address());

        let layer = relay_store.peel(&envelope).await.unwrap();
        assert_eq!(layer.circuit_id, circuit_id);
        assert_eq!(relay_store.len().await, 1);
    }

    #[tokio::test]
    async fn open_rejects_unexpected_reply() {
        let (dest, dest_sk, dest_listener) = hop("Dest").await;
        let table = RingTable {
            node: NodeIdentity::new("127.0.0.1", 1, "Sender", SecretKey::generate(&mut thread_rng()).public_key()),
            successor: dest.clone(),
            predecessor: dest.clone(),
        };
        let route = Route::construct(&table, dest, &mut thread_rng()).unwrap();

        tokio::spawn(serve(dest_listener, RelayKeyStore::new(dest_sk), 3, Frame::Onion(vec![1, 2, 3])));
        let res = Circuit::open(route, KEY_EXCHANGE_TIMEOUT).await;

        assert!(matches!(res, Err(CircuitError::UnexpectedReply { kind: "onion", .. })));
    }

    #[tokio::test]
    async fn open_fails_without_hop() {
        let (dest, _dest_sk, dest_listener) = hop("Dest").await;
        drop(dest_listener);
        let table = RingTable {
            node: NodeIdentity::new("127.0.0.1", 1, "Sender", SecretKey::generate(&mut thread_rng()).public_key()),
            successor: dest.clone(),
            predecessor: dest.clone(),
        };
        let route = Route::construct(&table, dest, &mut thread_rng()).unwrap();

        let res = Circuit::open(route, KEY_EXCHANGE_TIMEOUT).await;

        assert!(matches!(res, Err(CircuitError::NoAcknowledgement { .. })));
    }
}
