use crate::network::connection::{Connection, InboundSender};
use crate::network::message::{BlockMessage, WireMessage};
use crate::network::transport::PeerTransport;
use anyhow::Result;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

/// Holds the live peer connections of one voter process.
///
/// Topology mirrors voter start order: a starting voter dials every voter
/// already registered, and accepts connections from those that start later.
/// Each connection is used in both directions.
pub struct PeerManager {
    local_id: u32,
    /// active connections: remote addr -> Connection
    conns: Arc<Mutex<HashMap<SocketAddr, Connection>>>,
    inbound_tx: InboundSender,
    connect_retries: u32,
    connect_backoff: Duration,
}

impl PeerManager {
    pub fn new(local_id: u32, inbound_tx: InboundSender, connect_retries: u32, connect_backoff: Duration) -> Self {
        Self {
            local_id,
            conns: Arc::new(Mutex::new(HashMap::new())),
            inbound_tx,
            connect_retries,
            connect_backoff,
        }
    }

    /// Bind `bind_addr` and accept peers until `shutdown` flips.
    /// Returns the bound address (useful with port 0).
    pub async fn start_listener(&self, bind_addr: &str, mut shutdown: watch::Receiver<bool>) -> Result<SocketAddr> {
        let listener = TcpListener::bind(bind_addr).await?;
        let local = listener.local_addr()?;
        info!("listening on {}", local);

        let inbound = self.inbound_tx.clone();
        let conns = self.conns.clone();
        let local_id = self.local_id;

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.changed() => {
                        debug!("listener on {} shutting down", local);
                        return;
                    }
                    accepted = listener.accept() => match accepted {
                        Ok((stream, peer_addr)) => {
                            info!("accepted connection from {}", peer_addr);
                            if let Err(e) = register(&conns, stream, inbound.clone(), local_id) {
                                warn!("connection setup failed for {}: {:?}", peer_addr, e);
                            }
                        }
                        Err(e) => {
                            warn!("accept failed: {:?}", e);
                            sleep(Duration::from_millis(100)).await;
                        }
                    }
                }
            }
        });
        Ok(local)
    }

    /// Dial a peer, retrying with exponential backoff up to the configured
    /// number of attempts.
    pub async fn connect_peer(&self, addr: &str) -> Result<()> {
        let mut backoff = self.connect_backoff;
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match TcpStream::connect(addr).await {
                Ok(stream) => {
                    register(&self.conns, stream, self.inbound_tx.clone(), self.local_id)?;
                    info!("connected to peer {}", addr);
                    return Ok(());
                }
                Err(e) if attempt < self.connect_retries => {
                    debug!("connect to {} failed (attempt {}): {}", addr, attempt, e);
                    sleep(backoff).await;
                    backoff = (backoff * 2).min(Duration::from_secs(30));
                }
                Err(e) => {
                    return Err(anyhow::anyhow!("could not reach peer {} after {} attempts: {}", addr, attempt, e));
                }
            }
        }
    }

    pub fn peer_count(&self) -> usize {
        self.conns.lock().len()
    }

    /// Close every connection.
    pub fn close_all(&self) {
        let drained: Vec<Connection> = self.conns.lock().drain().map(|(_, c)| c).collect();
        for conn in drained {
            conn.close();
        }
    }
}

fn register(
    conns: &Mutex<HashMap<SocketAddr, Connection>>,
    stream: TcpStream,
    inbound: InboundSender,
    local_id: u32,
) -> Result<()> {
    let conn = Connection::spawn(stream, inbound)?;
    conn.try_send(WireMessage::Hello { voter_id: local_id })?;
    conns.lock().insert(conn.peer_addr, conn);
    Ok(())
}

impl PeerTransport for PeerManager {
    /// Best-effort fan-out to every live connection; dead ones are pruned.
    fn broadcast(&self, message: BlockMessage) {
        let mut conns = self.conns.lock();
        let mut dead = Vec::new();
        for (addr, conn) in conns.iter() {
            if conn.is_closed() {
                dead.push(*addr);
                continue;
            }
            if let Err(e) = conn.try_send(WireMessage::Block(message.clone())) {
                warn!("broadcast to {} failed: {}", addr, e);
            }
        }
        for addr in dead {
            debug!("pruning closed connection {}", addr);
            conns.remove(&addr);
        }
    }
}
