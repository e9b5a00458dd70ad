//! In-process voter cluster for integration tests.
//!
//! Every voter gets an unbounded inbox and a dispatcher task that feeds it
//! into `Voter::handle_message`. Broadcasts push into every other inbox, so
//! each voter sees blocks in the order they were produced. Run tests on the
//! current-thread runtime and call `settle` between protocol steps.

#![allow(dead_code)]

use ballotchain::crypto::{Keypair, Signer};
use ballotchain::ledger::{Block, BlockKind, ProofOfWork};
use ballotchain::network::{BlockMessage, PeerTransport};
use ballotchain::voting::{Inbound, MemRegistry, Voter, VoterId, VoterRegistry};
use lazy_static::lazy_static;
use parking_lot::Mutex;
use rsa::RsaPrivateKey;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

pub const KEY_BITS: usize = 1024;

lazy_static! {
    /// Private key of voter id `i` is `PRIVATE[i - 1]`; generated once per test binary.
    pub static ref PRIVATE: Vec<RsaPrivateKey> = (0..5)
        .map(|_| RsaPrivateKey::new(&mut rand::thread_rng(), KEY_BITS).unwrap())
        .collect();
}

pub fn private_for(id: VoterId) -> &'static RsaPrivateKey {
    &PRIVATE[(id - 1) as usize]
}

pub fn key_for(id: VoterId) -> Keypair {
    Keypair::from_private(private_for(id).clone()).unwrap()
}

/// A block authored by `from`, signed with its key and mined on `prev`.
pub fn authored_block(kind: BlockKind, from: VoterId, to: VoterId, payload: Vec<u8>, prev: Vec<u8>) -> BlockMessage {
    let keys = key_for(from);
    let signature = keys.sign(&payload).unwrap();
    let mut block = Block::new(
        kind,
        keys.public().clone(),
        from.to_string(),
        to.to_string(),
        payload,
        signature,
        prev,
    );
    block.mine(&ProofOfWork::default());
    BlockMessage::from_block(&block)
}

#[derive(Default)]
pub struct Hub {
    inboxes: Mutex<BTreeMap<VoterId, mpsc::UnboundedSender<BlockMessage>>>,
    in_flight: AtomicUsize,
}

impl Hub {
    fn deliver(&self, from: VoterId, msg: &BlockMessage) {
        for (id, inbox) in self.inboxes.lock().iter() {
            if *id == from {
                continue;
            }
            self.in_flight.fetch_add(1, Ordering::SeqCst);
            if inbox.send(msg.clone()).is_err() {
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
            }
        }
    }
}

pub struct HubTransport {
    me: VoterId,
    hub: Arc<Hub>,
}

impl PeerTransport for HubTransport {
    fn broadcast(&self, message: BlockMessage) {
        self.hub.deliver(self.me, &message);
    }
}

pub struct Cluster {
    pub hub: Arc<Hub>,
    pub registry: Arc<MemRegistry>,
    pub voters: BTreeMap<VoterId, Arc<Voter>>,
    /// dispositions of every delivered block, in processing order
    pub outcomes: Arc<Mutex<Vec<(VoterId, Inbound)>>>,
}

impl Cluster {
    /// Register and start `ids`. Must be called inside a tokio runtime.
    pub fn start(ids: &[VoterId]) -> Cluster {
        let hub = Arc::new(Hub::default());
        let registry = Arc::new(MemRegistry::new());
        let outcomes = Arc::new(Mutex::new(Vec::new()));
        let mut voters = BTreeMap::new();

        for &id in ids {
            registry.register(id, key_for(id).public()).unwrap();
        }
        for &id in ids {
            let transport = Arc::new(HubTransport { me: id, hub: hub.clone() });
            let voter = Arc::new(Voter::new(id, key_for(id), registry.clone(), transport, ProofOfWork::default()));

            let (tx, mut rx) = mpsc::unbounded_channel::<BlockMessage>();
            hub.inboxes.lock().insert(id, tx);
            let (v, h, out) = (voter.clone(), hub.clone(), outcomes.clone());
            tokio::spawn(async move {
                while let Some(msg) = rx.recv().await {
                    let outcome = v.handle_message(&msg);
                    out.lock().push((v.id(), outcome));
                    h.in_flight.fetch_sub(1, Ordering::SeqCst);
                }
            });
            voters.insert(id, voter);
        }
        Cluster { hub, registry, voters, outcomes }
    }

    pub fn voter(&self, id: VoterId) -> Arc<Voter> {
        self.voters[&id].clone()
    }

    /// Yield until every queued block has been handled.
    pub async fn settle(&self) {
        while self.hub.in_flight.load(Ordering::SeqCst) > 0 {
            tokio::task::yield_now().await;
        }
    }

    /// True iff every voter holds the same chain.
    pub fn chains_agree(&self) -> bool {
        let mut chains = self.voters.values().map(|v| v.chain_snapshot());
        match chains.next() {
            Some(first) => chains.all(|c| c == first),
            None => true,
        }
    }

    pub fn rejections(&self) -> Vec<(VoterId, Inbound)> {
        self.outcomes
            .lock()
            .iter()
            .filter(|(_, o)| matches!(o, Inbound::Rejected(_)))
            .copied()
            .collect()
    }
}

/// Tip block of `voter`'s chain.
pub fn tip(voter: &Voter) -> Block {
    voter.chain_snapshot().pop().unwrap()
}
