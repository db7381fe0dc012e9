//! Peer-to-peer messaging substrate
//!
//! A [`Transport`] opens direct links to other peers and delivers what
//! happens on them as [`TransportEvent`]s on an unbounded channel handed
//! out when the transport is opened. Sends are fire-and-forget: a send to a
//! peer without an open link is dropped with a warning.
//!
//! Two implementations ship with the crate: [`memory`] connects peers inside
//! one process, [`tcp`] connects peers over plain TCP with one JSON frame per
//! line.

pub mod memory;
pub mod tcp;

use crate::protocol::Message;
use crate::types::PlayerId;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};

pub use memory::{MemoryNetwork, MemoryTransport};
pub use tcp::TcpTransport;

pub type PeerId = PlayerId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Failed to open transport: {0}")]
    Open(String),

    #[error("Peer {0} is unavailable")]
    PeerUnavailable(PeerId),

    #[error("Connection timed out after {0:?}")]
    Timeout(Duration),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Peer id {0} is already in use")]
    AddressInUse(PeerId),

    #[error("Invalid peer id: {0}")]
    InvalidPeer(PeerId),
}

/// Something that happened on the local transport
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A link to `peer` is open, dialed by either side
    Connected(PeerId),
    Message { from: PeerId, message: Message },
    /// The link to `peer` is gone. Delivered once per link.
    Closed(PeerId),
    /// Failure not tied to a specific link
    Error(TransportError),
}

pub type EventSender = mpsc::UnboundedSender<TransportEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<TransportEvent>;

#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// This peer's id, which other peers dial
    fn local_id(&self) -> &PeerId;

    /// Open a link to `remote`. Resolves once the link is usable.
    async fn connect(&self, remote: &PeerId) -> Result<(), TransportError>;

    /// Best-effort delivery to one peer
    async fn send(&self, to: &PeerId, message: &Message);

    /// Currently open links
    async fn peers(&self) -> Vec<PeerId>;

    /// Drop the link to `peer`
    async fn close(&self, peer: &PeerId);

    /// Drop every link and stop accepting new ones
    async fn shutdown(&self);

    /// Best-effort delivery to every open link
    async fn broadcast(&self, message: &Message) {
        let peers = self.peers().await;
        tracing::debug!(
            "Broadcasting {} to {} peers",
            message.kind(),
            peers.len()
        );
        futures::future::join_all(peers.iter().map(|peer| self.send(peer, message))).await;
    }
}

/// Dial with a bounded wait. The attempt is abandoned once `timeout` passes.
pub async fn connect_with_timeout<T: Transport + ?Sized>(
    transport: &T,
    remote: &PeerId,
    timeout: Duration,
) -> Result<(), TransportError> {
    match tokio::time::timeout(timeout, transport.connect(remote)).await {
        Ok(result) => result,
        Err(_) => {
            tracing::error!("Connection to {} timed out after {:?}", remote, timeout);
            transport.close(remote).await;
            Err(TransportError::Timeout(timeout))
        }
    }
}

type LinkSender = mpsc::UnboundedSender<Message>;
type WeakLinkSender = mpsc::WeakUnboundedSender<Message>;

/// Peer id -> outbound queue of an open link
#[derive(Debug, Default)]
pub struct PeerTable {
    links: RwLock<HashMap<PeerId, LinkSender>>,
}

impl PeerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a link. A previous link to the same peer is handed back;
    /// it closes once the caller drops it.
    pub async fn insert(&self, peer: PeerId, link: LinkSender) -> Option<LinkSender> {
        let replaced = self.links.write().await.insert(peer.clone(), link);
        if replaced.is_some() {
            tracing::debug!("Replaced existing link to {}", peer);
        }
        replaced
    }

    pub async fn remove(&self, peer: &PeerId) -> bool {
        self.links.write().await.remove(peer).is_some()
    }

    /// A link ended. Drop its entry unless a newer link to the same peer
    /// took its place. Returns whether the peer is now unlinked, which is
    /// when a close should be reported.
    pub async fn retire(&self, peer: &PeerId, link: &WeakLinkSender) -> bool {
        let mut links = self.links.write().await;
        let Some(current) = links.get(peer) else {
            return true;
        };
        match link.upgrade() {
            Some(link) if current.same_channel(&link) => {
                links.remove(peer);
                true
            }
            _ => false,
        }
    }

    pub async fn contains(&self, peer: &PeerId) -> bool {
        self.links.read().await.contains_key(peer)
    }

    pub async fn peers(&self) -> Vec<PeerId> {
        let mut peers: Vec<PeerId> = self.links.read().await.keys().cloned().collect();
        peers.sort();
        peers
    }

    pub async fn drain(&self) -> Vec<PeerId> {
        self.links.write().await.drain().map(|(peer, _)| peer).collect()
    }

    pub async fn send(&self, to: &PeerId, message: &Message) {
        let links = self.links.read().await;
        match links.get(to) {
            Some(link) => {
                if link.send(message.clone()).is_err() {
                    tracing::warn!("Link to {} is closed, dropping {}", to, message.kind());
                } else {
                    tracing::debug!("Sent {} to {}", message.kind(), to);
                }
            }
            None => {
                tracing::warn!(
                    "Attempted to send {} to {} without an open connection",
                    message.kind(),
                    to
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_without_link_is_dropped() {
        let table = PeerTable::new();
        table.send(&"ghost".to_string(), &Message::PlayAgain).await;
        assert!(table.peers().await.is_empty());
    }

    #[tokio::test]
    async fn test_retire_ignores_replaced_link() {
        let table = PeerTable::new();
        let peer = "p".to_string();
        let (old_tx, _old_rx) = mpsc::unbounded_channel();
        let (new_tx, mut new_rx) = mpsc::unbounded_channel();
        let old_link = old_tx.downgrade();
        let new_link = new_tx.downgrade();

        table.insert(peer.clone(), old_tx).await;
        table.insert(peer.clone(), new_tx).await;
        assert!(!table.retire(&peer, &old_link).await);
        assert!(table.contains(&peer).await);

        table.send(&peer, &Message::PlayAgain).await;
        assert_eq!(new_rx.recv().await, Some(Message::PlayAgain));

        assert!(table.retire(&peer, &new_link).await);
        assert!(!table.contains(&peer).await);
        // Already gone, still reported as unlinked
        assert!(table.retire(&peer, &new_link).await);
    }

    #[tokio::test]
    async fn test_connect_with_timeout_gives_up() {
        let network = MemoryNetwork::new();
        let (transport, _events) = network.open(Some("a".to_string())).await.unwrap();
        network.set_dial_delay(Duration::from_millis(200)).await;

        let result =
            connect_with_timeout(&transport, &"a2".to_string(), Duration::from_millis(20)).await;
        assert_eq!(result, Err(TransportError::Timeout(Duration::from_millis(20))));
    }
}
