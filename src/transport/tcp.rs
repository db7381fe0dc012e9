//! Direct TCP links
//!
//! A peer's id is the address its listener is bound to. Frames are JSON, one
//! per line. The dialing side opens every link with a hello frame naming its
//! own id so the accepting side can key the link by peer id.

use super::{
    EventReceiver, EventSender, PeerId, PeerTable, Transport, TransportError, TransportEvent,
};
use crate::protocol::{self, Message};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Serialize, Deserialize)]
struct Hello {
    peer: PeerId,
}

pub struct TcpTransport {
    id: PeerId,
    links: Arc<PeerTable>,
    events: EventSender,
    listener: JoinHandle<()>,
}

impl TcpTransport {
    /// Bind the listener and start accepting links
    pub async fn open(bind: SocketAddr) -> Result<(Self, EventReceiver), TransportError> {
        let listener = TcpListener::bind(bind)
            .await
            .map_err(|e| TransportError::Open(e.to_string()))?;
        let id = listener
            .local_addr()
            .map_err(|e| TransportError::Open(e.to_string()))?
            .to_string();

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let links = Arc::new(PeerTable::new());

        let accept_links = links.clone();
        let accept_events = events_tx.clone();
        let listener = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        tracing::debug!("Incoming TCP connection from {}", addr);
                        tokio::spawn(accept_link(
                            stream,
                            accept_links.clone(),
                            accept_events.clone(),
                        ));
                    }
                    Err(e) => {
                        tracing::error!("Accept failed: {}", e);
                        let _ = accept_events
                            .send(TransportEvent::Error(TransportError::Network(e.to_string())));
                    }
                }
            }
        });

        tracing::info!("TCP transport listening on {}", id);

        Ok((
            Self {
                id,
                links,
                events: events_tx,
                listener,
            },
            events_rx,
        ))
    }
}

async fn accept_link(stream: TcpStream, links: Arc<PeerTable>, events: EventSender) {
    let (read_half, write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    let hello = match lines.next_line().await {
        Ok(Some(line)) => serde_json::from_str::<Hello>(&line),
        Ok(None) => return,
        Err(e) => {
            tracing::warn!("Failed to read hello frame: {}", e);
            return;
        }
    };
    let peer = match hello {
        Ok(hello) if !hello.peer.is_empty() => hello.peer,
        _ => {
            tracing::warn!("Rejecting connection without a valid hello frame");
            return;
        }
    };

    open_link(peer, lines, write_half, links, events).await;
}

/// Register the link and report it open, then hand it to a pump task
async fn open_link(
    peer: PeerId,
    lines: Lines<BufReader<OwnedReadHalf>>,
    write_half: OwnedWriteHalf,
    links: Arc<PeerTable>,
    events: EventSender,
) {
    let (outbound, outbound_rx) = mpsc::unbounded_channel::<Message>();
    let handle = outbound.downgrade();
    links.insert(peer.clone(), outbound).await;
    let _ = events.send(TransportEvent::Connected(peer.clone()));

    tokio::spawn(pump_link(
        peer,
        lines,
        write_half,
        outbound_rx,
        handle,
        links,
        events,
    ));
}

/// Write outbound frames and read inbound frames until either side closes.
/// The table holds the only strong sender, so removing the entry ends the
/// writer and half-closes the socket.
async fn pump_link(
    peer: PeerId,
    mut lines: Lines<BufReader<OwnedReadHalf>>,
    mut write_half: OwnedWriteHalf,
    mut outbound_rx: mpsc::UnboundedReceiver<Message>,
    handle: mpsc::WeakUnboundedSender<Message>,
    links: Arc<PeerTable>,
    events: EventSender,
) {
    let writer_peer = peer.clone();
    let writer = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            let frame = match protocol::encode(&message) {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::error!("Failed to encode {}: {}", message.kind(), e);
                    continue;
                }
            };
            if let Err(e) = write_frame(&mut write_half, &frame).await {
                tracing::warn!("Write to {} failed: {}", writer_peer, e);
                break;
            }
        }
        let _ = write_half.shutdown().await;
    });

    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => continue,
            Ok(Some(line)) => match protocol::decode(&line) {
                Ok(message) => {
                    let _ = events.send(TransportEvent::Message {
                        from: peer.clone(),
                        message,
                    });
                }
                Err(e) => tracing::warn!("Dropping frame from {}: {}", peer, e),
            },
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("Read from {} failed: {}", peer, e);
                break;
            }
        }
    }

    writer.abort();
    if links.retire(&peer, &handle).await {
        tracing::info!("TCP link to {} closed", peer);
        let _ = events.send(TransportEvent::Closed(peer));
    } else {
        tracing::debug!("Superseded TCP link to {} closed", peer);
    }
}

async fn write_frame(write_half: &mut OwnedWriteHalf, frame: &str) -> std::io::Result<()> {
    write_half.write_all(frame.as_bytes()).await?;
    write_half.write_all(b"\n").await?;
    write_half.flush().await
}

#[async_trait]
impl Transport for TcpTransport {
    fn local_id(&self) -> &PeerId {
        &self.id
    }

    async fn connect(&self, remote: &PeerId) -> Result<(), TransportError> {
        let addr: SocketAddr = remote
            .parse()
            .map_err(|_| TransportError::InvalidPeer(remote.clone()))?;
        if *remote == self.id {
            return Err(TransportError::InvalidPeer(remote.clone()));
        }

        let stream = TcpStream::connect(addr).await.map_err(|e| {
            tracing::warn!("Dial {} failed: {}", remote, e);
            match e.kind() {
                std::io::ErrorKind::ConnectionRefused => {
                    TransportError::PeerUnavailable(remote.clone())
                }
                _ => TransportError::Network(e.to_string()),
            }
        })?;

        let (read_half, mut write_half) = stream.into_split();
        let hello = serde_json::to_string(&Hello {
            peer: self.id.clone(),
        })
        .map_err(|e| TransportError::Network(e.to_string()))?;
        write_frame(&mut write_half, &hello)
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let lines = BufReader::new(read_half).lines();
        open_link(
            remote.clone(),
            lines,
            write_half,
            self.links.clone(),
            self.events.clone(),
        )
        .await;
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
    }

    async fn shutdown(&self) {
        self.listener.abort();
        self.links.drain().await;
        tracing::info!("TCP transport {} shut down", self.id);
    }
}
