use crate::network::codec::JsonCodec;
use crate::network::message::WireMessage;
use anyhow::Result;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

/// Outbound queue depth per connection
pub const OUT_CAP: usize = 1024;

/// Where every connection delivers decoded frames, tagged with the peer address
pub type InboundSender = mpsc::UnboundedSender<(SocketAddr, WireMessage)>;
pub type OutboundSender = mpsc::Sender<WireMessage>;

type FrameReader = SplitStream<Framed<TcpStream, JsonCodec>>;
type FrameWriter = SplitSink<Framed<TcpStream, JsonCodec>, WireMessage>;

/// One live TCP link to a peer, driven by a reader and a writer task.
pub struct Connection {
    pub peer_addr: SocketAddr,
    pub outbound: OutboundSender,
    shutdown: watch::Sender<bool>,
}

impl Connection {
    /// Split `stream` into framed halves and spawn a task for each.
    /// Decoded frames go to `inbound_tx`; frames that fail to decode are
    /// logged and skipped without closing the link.
    pub fn spawn(stream: TcpStream, inbound_tx: InboundSender) -> Result<Connection> {
        let peer_addr = stream.peer_addr()?;
        let (writer, reader) = Framed::new(stream, JsonCodec::new()).split();
        let (out_tx, out_rx) = mpsc::channel::<WireMessage>(OUT_CAP);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(read_loop(peer_addr, reader, inbound_tx, shutdown_rx.clone()));
        tokio::spawn(write_loop(peer_addr, writer, out_rx, shutdown_rx));

        Ok(Self { peer_addr, outbound: out_tx, shutdown: shutdown_tx })
    }

    /// Queue `msg` without waiting; fails if the queue is full or closed.
    pub fn try_send(&self, msg: WireMessage) -> Result<()> {
        self.outbound
            .try_send(msg)
            .map_err(|e| anyhow::anyhow!("queue to {} rejected message: {}", self.peer_addr, e))
    }

    pub fn is_closed(&self) -> bool {
        self.outbound.is_closed()
    }

    /// Stop both tasks; queued frames not yet written are lost.
    pub fn close(self) {
        let _ = self.shutdown.send(true);
    }
}

async fn read_loop(
    peer_addr: SocketAddr,
    mut reader: FrameReader,
    inbound_tx: InboundSender,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let frame = tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            frame = reader.next() => frame,
        };
        match frame {
            Some(Ok(Ok(msg))) => {
                if inbound_tx.send((peer_addr, msg)).is_err() {
                    debug!("inbound dispatcher gone; dropping {}", peer_addr);
                    break;
                }
            }
            Some(Ok(Err(e))) => warn!("undecodable frame from {}: {}", peer_addr, e),
            Some(Err(e)) => {
                warn!("read error from {}: {:?}", peer_addr, e);
                break;
            }
            None => {
                info!("peer {} closed connection", peer_addr);
                break;
            }
        }
    }
    debug!("reader for {} stopped", peer_addr);
}

async fn write_loop(
    peer_addr: SocketAddr,
    mut writer: FrameWriter,
    mut out_rx: mpsc::Receiver<WireMessage>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let next = tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            next = out_rx.recv() => next,
        };
        let Some(msg) = next else { break };
        if let Err(e) = writer.send(msg).await {
            warn!("write to {} failed: {:?}", peer_addr, e);
            break;
        }
    }
    debug!("writer for {} stopped", peer_addr);
}
