//! Node orchestration: keys, registration, network, voter and the inbound
//! dispatcher, started in that order.

use crate::crypto::Keypair;
use crate::network::{PeerManager, WireMessage};
use crate::node::config::NodeConfig;
use crate::node::service_handle::ServiceHandle;
use crate::voting::{FsRegistry, Inbound, Voter, VoterId, VoterRegistry};
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, info, warn};

/// A running voter process.
pub struct VoterNode {
    pub voter: Arc<Voter>,
    pub peers: Arc<PeerManager>,
    pub listen_addr: SocketAddr,
    registry: Arc<FsRegistry>,
    svc: ServiceHandle,
}

impl VoterNode {
    /// Generate keys, register, listen on `port_base + id`, dial every other
    /// registered voter, and start dispatching inbound blocks to the voter.
    pub async fn start(id: VoterId, cfg: NodeConfig) -> Result<VoterNode> {
        cfg.validate()?;
        let pow = cfg.proof_of_work()?;
        let (mut svc, shutdown_rx) = ServiceHandle::new();

        let registry = Arc::new(
            FsRegistry::open(&cfg.registry_dir)
                .with_context(|| format!("opening registry {}", cfg.registry_dir.display()))?,
        );
        if registry.is_registered(id) {
            warn!(voter = id, "a registration for this id already exists; replacing it");
        }

        info!(voter = id, bits = cfg.key_bits, "generating key pair");
        let keys = tokio::task::spawn_blocking({
            let bits = cfg.key_bits;
            move || Keypair::generate(bits)
        })
        .await??;

        // network first, so peers dialing us right after registration find a listener
        let (inbound_tx, mut inbound_rx) = mpsc::unbounded_channel::<(SocketAddr, WireMessage)>();
        let peers = Arc::new(PeerManager::new(
            id,
            inbound_tx,
            cfg.connect_retries,
            Duration::from_millis(cfg.connect_backoff_ms),
        ));
        let listen_addr = peers.start_listener(&cfg.voter_addr(id)?, shutdown_rx.clone()).await?;

        registry.register(id, keys.public())?;
        info!(voter = id, dir = %registry.dir().display(), "registered");

        let voter = Arc::new(Voter::new(id, keys, registry.clone(), peers.clone(), pow));

        // inbound dispatcher
        {
            let voter = voter.clone();
            let mut shutdown_rx = shutdown_rx.clone();
            let h: JoinHandle<Result<()>> = tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = shutdown_rx.changed() => break,
                        next = inbound_rx.recv() => match next {
                            Some((addr, WireMessage::Hello { voter_id })) => {
                                debug!("peer {} says it is voter {}", addr, voter_id);
                            }
                            Some((addr, WireMessage::Block(msg))) => {
                                // mining may take a while; keep the runtime's other tasks moving
                                let voter = voter.clone();
                                let outcome = tokio::task::spawn_blocking(move || voter.handle_message(&msg)).await?;
                                if let Inbound::Rejected(reason) = outcome {
                                    debug!("block from {} dropped: {}", addr, reason);
                                }
                            }
                            None => break,
                        }
                    }
                }
                info!("inbound dispatcher shutting down");
                Ok::<(), anyhow::Error>(())
            });
            svc.attach("inbound-dispatcher", h);
        }

        for peer in registry.registered_ids()? {
            if peer == id {
                continue;
            }
            let addr = cfg.voter_addr(peer)?;
            if let Err(e) = peers.connect_peer(&addr).await {
                warn!(voter = id, peer, "could not connect: {:#}", e);
            }
        }
        info!(voter = id, peers = peers.peer_count(), "voter started");

        Ok(VoterNode { voter, peers, listen_addr, registry, svc })
    }

    /// Deregister, close every connection and stop background tasks.
    pub async fn stop(self) -> Result<()> {
        let id = self.voter.id();
        if let Err(e) = self.registry.deregister(id) {
            warn!(voter = id, "could not remove registration: {}", e);
        }
        self.peers.close_all();
        self.svc.shutdown().await?;
        info!(voter = id, "voter stopped");
        Ok(())
    }
}
