//! In-process mesh
//!
//! Every opened peer registers with a shared [`MemoryNetwork`]. A link is a
//! pair of queues, one per direction, each drained in order by a forwarding
//! task, so per-link ordering holds while nothing is ordered across links.

use super::{
    EventReceiver, EventSender, PeerId, PeerTable, Transport, TransportError, TransportEvent,
};
use crate::protocol::Message;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};

#[derive(Debug, Clone)]
struct MemoryNode {
    events: EventSender,
    links: Arc<PeerTable>,
}

/// Registry of every peer opened on this in-process network
#[derive(Debug, Clone, Default)]
pub struct MemoryNetwork {
    nodes: Arc<RwLock<HashMap<PeerId, MemoryNode>>>,
    dial_delay: Arc<RwLock<Option<Duration>>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a peer. Without an explicit id a fresh ULID is used.
    pub async fn open(
        &self,
        id: Option<PeerId>,
    ) -> Result<(MemoryTransport, EventReceiver), TransportError> {
        let id = id.unwrap_or_else(|| ulid::Ulid::new().to_string());
        if id.is_empty() {
            return Err(TransportError::InvalidPeer(id));
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let links = Arc::new(PeerTable::new());

        let mut nodes = self.nodes.write().await;
        if nodes.contains_key(&id) {
            return Err(TransportError::AddressInUse(id));
        }
        nodes.insert(
            id.clone(),
            MemoryNode {
                events: events_tx.clone(),
                links: links.clone(),
            },
        );
        drop(nodes);

        tracing::info!("Memory transport opened: {}", id);

        Ok((
            MemoryTransport {
                id,
                network: self.clone(),
                links,
                events: events_tx,
            },
            events_rx,
        ))
    }

    /// Delay every dial by `delay`, standing in for slow signaling
    pub async fn set_dial_delay(&self, delay: Duration) {
        *self.dial_delay.write().await = Some(delay);
    }

    async fn node(&self, id: &PeerId) -> Option<MemoryNode> {
        self.nodes.read().await.get(id).cloned()
    }
}

/// Moves one direction of a link into the receiving peer's event queue.
/// Once the queue is closed and drained, the receiver drops its side of
/// the same link (`reverse`) and learns the link is gone, unless a newer
/// link to `from` replaced it.
async fn forward(
    from: PeerId,
    mut outbound: mpsc::UnboundedReceiver<Message>,
    to: MemoryNode,
    reverse: mpsc::WeakUnboundedSender<Message>,
) {
    while let Some(message) = outbound.recv().await {
        let _ = to.events.send(TransportEvent::Message {
            from: from.clone(),
            message,
        });
    }
    if to.links.retire(&from, &reverse).await {
        let _ = to.events.send(TransportEvent::Closed(from));
    } else {
        tracing::debug!("Superseded memory link from {} closed", from);
    }
}

pub struct MemoryTransport {
    id: PeerId,
    network: MemoryNetwork,
    links: Arc<PeerTable>,
    events: EventSender,
}

#[async_trait]
impl Transport for MemoryTransport {
    fn local_id(&self) -> &PeerId {
        &self.id
    }

    async fn connect(&self, remote: &PeerId) -> Result<(), TransportError> {
        if *remote == self.id {
            return Err(TransportError::InvalidPeer(remote.clone()));
        }

        let delay = *self.network.dial_delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let remote_node = self
            .network
            .node(remote)
            .await
            .ok_or_else(|| TransportError::PeerUnavailable(remote.clone()))?;
        let local_node = MemoryNode {
            events: self.events.clone(),
            links: self.links.clone(),
        };

        let (to_remote, to_remote_rx) = mpsc::unbounded_channel();
        let (to_local, to_local_rx) = mpsc::unbounded_channel();
        let (to_remote_link, to_local_link) = (to_remote.downgrade(), to_local.downgrade());
        // Old links to this peer close only once both new halves are in place
        let _replaced = (
            self.links.insert(remote.clone(), to_remote).await,
            remote_node.links.insert(self.id.clone(), to_local).await,
        );

        let _ = remote_node
            .events
            .send(TransportEvent::Connected(self.id.clone()));
        let _ = self.events.send(TransportEvent::Connected(remote.clone()));

        tokio::spawn(forward(
            self.id.clone(),
            to_remote_rx,
            remote_node,
            to_local_link,
        ));
        tokio::spawn(forward(remote.clone(), to_local_rx, local_node, to_remote_link));

        tracing::debug!("Memory link {} <-> {} open", self.id, remote);
        Ok(())
    }

    async fn send(&self, to: &PeerId, message: &Message) {
        self.links.send(to, message).await;
    }

    async fn peers(&self) -> Vec<PeerId> {
        self.links.peers().await
    }

    async fn close(&self, peer: &PeerId) {
        self.links.remove(peer).await;
        if let Some(remote) = self.network.node(peer).await {
            remote.links.remove(&self.id).await;
        }
    }

    async fn shutdown(&self) {
        self.network.nodes.write().await.remove(&self.id);
        for peer in self.links.drain().await {
            if let Some(remote) = self.network.node(&peer).await {
                remote.links.remove(&self.id).await;
            }
        }
        tracing::info!("Memory transport {} shut down", self.id);
    }
}
