/*! Sending chat messages to the current partner.
*/

use std::sync::Arc;
use std::time::Duration;

use futures::SinkExt;
use rand::thread_rng;
use ringchat_packet::frame::ChatMessage;
use ringchat_packet::identity::NodeIdentity;
use tokio::sync::{Mutex, RwLock};

use crate::net::Tx;
use crate::onion::circuit::*;
use crate::onion::errors::*;
use crate::onion::route::*;
use crate::ring::Server;

/**
Sends messages to the chat partner, one circuit per message.

A circuit to the partner is opened as soon as the partner is known, so the
first message doesn't wait for the key exchange. After a message is sent the
next circuit is prepared in background.
*/
#[derive(Clone)]
pub struct Messenger {
    ring: Server,
    tx: Tx,
    partner: Arc<RwLock<Option<NodeIdentity>>>,
    prepared: Arc<Mutex<Option<Circuit>>>,
    key_exchange_timeout: Duration,
}

impl Messenger {
    /// Create new `Messenger` without a partner.
    pub fn new(ring: Server, tx: Tx, key_exchange_timeout: Duration) -> Messenger {
        Messenger {
            ring,
            tx,
            partner: Arc::new(RwLock::new(None)),
            prepared: Arc::new(Mutex::new(None)),
            key_exchange_timeout,
        }
    }

    /// Current chat partner.
    pub async fn partner(&self) -> Option<NodeIdentity> {
        self.partner.read().await.clone()
    }

    /// Whether a circuit to the partner is ready to carry a message.
    pub async fn is_ready(&self) -> bool {
        self.prepared.lock().await.is_some()
    }

    /// Switch to a new partner. A circuit prepared for the old one is
    /// dropped.
    pub async fn set_partner(&self, partner: NodeIdentity) {
        info!("Chat partner is now {}", partner);
        *self.partner.write().await = Some(partner);
        *self.prepared.lock().await = None;
    }

    async fn open_circuit(&self) -> Result<Circuit, CircuitError> {
        let partner = self.partner().await.ok_or(CircuitError::NoPartner)?;
        let table = self.ring.table().await;
        let route = Route::construct(&table, partner, &mut thread_rng())
            .map_err(CircuitError::Route)?;
        Circuit::open(route, self.key_exchange_timeout).await
    }

    /// Open a circuit to the partner and keep it for the next message.
    pub async fn prepare(&self) -> Result<(), CircuitError> {
        let circuit = self.open_circuit().await?;
        let mut prepared = self.prepared.lock().await;
        // the partner could change while the keys were exchanged
        if self.partner().await.as_ref() == Some(&circuit.route().destination) {
            *prepared = Some(circuit);
        }
        Ok(())
    }

    /// Send `text` to the partner. Uses the prepared circuit if there is one
    /// and opens a new circuit otherwise.
    pub async fn send(&self, text: &str) -> Result<(), CircuitError> {
        let prepared = self.prepared.lock().await.take();
        let circuit = match prepared {
            Some(circuit) => circuit,
            None => self.open_circuit().await?,
        };

        let circuit_id = circuit.route().circuit_id;
        let (addr, frame) = circuit.seal(&ChatMessage::new(text))?;
        self.tx.clone().send((frame, addr)).await
            .map_err(CircuitError::SendTo)?;
        debug!("Sent message over circuit {}", circuit_id);

        let messenger = self.clone();
        tokio::spawn(async move {
            if let Err(e) = messenger.prepare().await {
                warn!("Failed to prepare next circuit: {}", e);
            }
        });

        Ok(())
    }
}
