//! Voting protocol state machine.
//!
//! One `Voter` per process. It owns the key pair, the local chain and the
//! session, and is driven from two sides:
//! - local calls: `vote`, `cast_ballot`, `count`
//! - inbound blocks from peers: `handle_message`
//!
//! A single mutex guards chain and session together. Blocks are built, mined
//! and appended while holding it, so a block's `previous_digest` is always
//! the tip it gets appended to. Broadcasting happens after the lock is gone.
//! `vote` waits for countersignatures on a `Notify` that inbound Sign handling
//! pokes; the wait has no deadline.

use crate::crypto::blind::{blind, int_from_bytes, int_to_bytes, raw_sign, raw_verify, unblind};
use crate::crypto::{Keypair, PublicKey, Signer};
use crate::ledger::{Block, BlockKind, Chain, ProofOfWork};
use crate::network::{BlockMessage, PeerTransport};
use crate::utils::metrics::{INBOUND_DROPPED, SHARES_RECORDED, SIGNATURES_ISSUED, METRICS};
use crate::utils::{BallotError, Result};
use crate::voting::ballot::BallotPayload;
use crate::voting::candidate::Candidate;
use crate::voting::registry::{VoterId, VoterRegistry};
use crate::voting::session::{PendingBallot, Phase, Session};
use crate::voting::tally::Tally;
use parking_lot::Mutex;
use rsa::{BigUint, RsaPublicKey};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

/// What became of an inbound block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inbound {
    /// appended to the chain, nothing else to do
    Appended,
    /// appended, and we answered with a Sign block
    Countersigned,
    /// appended, and the unblinded share was stored
    ShareRecorded,
    Rejected(Rejection),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// not a decodable block
    Malformed,
    /// `fromId` is not in the registry
    Unregistered,
    /// signature missing, invalid, or made with a key other than the registered one
    Unauthenticated,
    /// wrong linkage or proof-of-work; the chain is unchanged
    Structural,
    /// Sign block for a request we never made; the block stays on the chain
    UnknownBlinding,
    /// Sign block whose share does not open to our commitment; the block stays on the chain
    InvalidShare,
    /// kinds that peers never send (Genesis, Normal)
    Ignored,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Rejection::Malformed => "malformed",
            Rejection::Unregistered => "unregistered sender",
            Rejection::Unauthenticated => "unauthenticated",
            Rejection::Structural => "does not extend the chain",
            Rejection::UnknownBlinding => "no outstanding request",
            Rejection::InvalidShare => "share does not open",
            Rejection::Ignored => "ignored kind",
        };
        f.write_str(s)
    }
}

struct VoterState {
    chain: Chain,
    session: Session,
}

pub struct Voter {
    id: VoterId,
    keys: Keypair,
    registry: Arc<dyn VoterRegistry>,
    transport: Arc<dyn PeerTransport>,
    inner: Mutex<VoterState>,
    share_arrived: Notify,
}

impl Voter {
    pub fn new(
        id: VoterId,
        keys: Keypair,
        registry: Arc<dyn VoterRegistry>,
        transport: Arc<dyn PeerTransport>,
        pow: ProofOfWork,
    ) -> Self {
        Self {
            id,
            keys,
            registry,
            transport,
            inner: Mutex::new(VoterState { chain: Chain::new(pow), session: Session::new() }),
            share_arrived: Notify::new(),
        }
    }

    pub fn id(&self) -> VoterId {
        self.id
    }

    pub fn public_key(&self) -> &PublicKey {
        self.keys.public()
    }

    pub fn phase(&self) -> Phase {
        self.inner.lock().session.phase()
    }

    pub fn chain_snapshot(&self) -> Vec<Block> {
        self.inner.lock().chain.blocks().to_vec()
    }

    pub fn chain_len(&self) -> usize {
        self.inner.lock().chain.len()
    }

    /// Collect a countersignature on a commitment to `choice` from every
    /// registered voter, ourselves included.
    ///
    /// Requests go out one peer at a time and each waits for its share
    /// before the next is sent. Does not return while a peer stays silent.
    pub async fn vote(&self, choice: u32) -> Result<()> {
        let pending = PendingBallot::new(Candidate::new(choice)?);
        let commitment = pending.commitment.clone();
        let own_share = raw_sign(&commitment, self.keys.rsa_private());

        // keys are resolved before the round starts so a bad registration
        // leaves the session idle
        let peers = self.peer_keys()?;
        {
            let mut st = self.inner.lock();
            st.session.begin(pending)?;
            st.session.record_share(self.id, own_share);
            st.session.set_phase(Phase::AwaitingSignatures);
        }
        info!(voter = self.id, candidate = choice, peers = peers.len(), "vote started");

        for (peer, key) in peers {
            if let Err(e) = self.request_share(peer, &key, &commitment) {
                warn!(voter = self.id, peer, error = %e, "vote abandoned");
                self.inner.lock().session.abandon();
                return Err(e);
            }
            debug!(voter = self.id, peer, "awaiting countersignature");
            self.wait_for_share(peer).await;
            info!(voter = self.id, peer, "countersignature received");
        }
        Ok(())
    }

    /// Every other registered voter with its key, in id order. A voter that
    /// deregisters between listing and reading is skipped.
    fn peer_keys(&self) -> Result<Vec<(VoterId, RsaPublicKey)>> {
        let mut peers = Vec::new();
        for peer in self.registry.registered_ids()? {
            if peer == self.id {
                continue;
            }
            match self.registry.public_key(peer)? {
                Some(key) => peers.push((peer, key.to_rsa()?)),
                None => warn!(voter = self.id, peer, "peer deregistered before its key was read; skipping"),
            }
        }
        Ok(peers)
    }

    /// Blind `commitment` for `peer` and publish the Vote block asking it to sign.
    fn request_share(&self, peer: VoterId, key: &RsaPublicKey, commitment: &BigUint) -> Result<()> {
        let (blinded, inverse) = blind(commitment, key)?;
        let outbound = {
            let mut st = self.inner.lock();
            let block = self.build_signed(&st.chain, BlockKind::Vote, peer, int_to_bytes(&blinded))?;
            st.session.record_inverse(peer, inverse);
            let msg = BlockMessage::from_block(&block);
            st.chain.append(block).then_some(msg)
        };
        match outbound {
            Some(msg) => self.transport.broadcast(msg),
            None => warn!(voter = self.id, peer, "own vote block did not extend the chain"),
        }
        Ok(())
    }

    /// Publish the ballot. Every registered voter's share must be present.
    pub fn cast_ballot(&self) -> Result<()> {
        let registered = self.registry.registered_ids()?;
        let msg = {
            let mut st = self.inner.lock();
            match st.session.phase() {
                Phase::AwaitingSignatures | Phase::Ballotted => {}
                other => {
                    return Err(BallotError::ProtocolError(format!("cannot cast a ballot while {}", other)));
                }
            }
            let missing = st.session.missing_shares(&registered);
            if !missing.is_empty() {
                return Err(BallotError::ProtocolError(format!("missing countersignatures from {:?}", missing)));
            }
            let pending = st
                .session
                .pending()
                .ok_or_else(|| BallotError::ProtocolError("no vote in progress".into()))?;
            let payload = BallotPayload::new(pending, st.session.shares()).to_bytes()?;

            let mut block = Block::new(
                BlockKind::Ballot,
                PublicKey::genesis(),
                String::new(),
                String::new(),
                payload,
                Vec::new(),
                st.chain.last_digest(),
            );
            block.mine(st.chain.pow());
            let msg = BlockMessage::from_block(&block);
            if !st.chain.append(block) {
                return Err(BallotError::ProtocolError("ballot did not extend the chain".into()));
            }
            st.session.set_phase(Phase::Ballotted);
            msg
        };
        self.transport.broadcast(msg);
        info!(voter = self.id, "ballot cast");
        Ok(())
    }

    /// Tally every valid Ballot block on the local chain.
    ///
    /// Validity is judged against the registry as it is now. A commitment
    /// already counted is skipped.
    pub fn count(&self) -> Result<Tally> {
        let mut keys: BTreeMap<VoterId, RsaPublicKey> = BTreeMap::new();
        for id in self.registry.registered_ids()? {
            // a voter may deregister between listing and reading
            if let Some(key) = self.registry.public_key(id)? {
                keys.insert(id, key.to_rsa()?);
            }
        }

        let ballots: Vec<Vec<u8>> = {
            let st = self.inner.lock();
            st.chain
                .iter()
                .filter(|b| b.kind == BlockKind::Ballot)
                .map(|b| b.payload.clone())
                .collect()
        };

        let mut tally = Tally::new();
        let mut seen = HashSet::new();
        for payload in ballots {
            let verified = BallotPayload::from_bytes(&payload).and_then(|b| b.verify(&keys));
            match verified {
                Ok((candidate, commitment)) => {
                    if seen.insert(commitment) {
                        tally.record(candidate);
                    } else {
                        debug!(voter = self.id, "duplicate ballot skipped");
                    }
                }
                Err(e) => debug!(voter = self.id, "ballot not counted: {}", e),
            }
        }
        Ok(tally)
    }

    /// React to a block received from a peer. Never fails; anything that
    /// cannot be used is dropped and reported as `Rejected`.
    pub fn handle_message(&self, msg: &BlockMessage) -> Inbound {
        let block = match msg.to_block() {
            Ok(b) => b,
            Err(e) => {
                debug!(voter = self.id, "undecodable block: {}", e);
                return self.reject(Rejection::Malformed);
            }
        };
        match block.kind {
            BlockKind::Vote => self.on_vote(block),
            BlockKind::Sign => self.on_sign(block),
            BlockKind::Ballot => self.on_ballot(block),
            BlockKind::Genesis | BlockKind::Normal => self.reject(Rejection::Ignored),
        }
    }

    fn on_vote(&self, block: Block) -> Inbound {
        let from = match self.authenticate(&block) {
            Ok((from, _)) => from,
            Err(r) => return self.reject(r),
        };
        let reply = {
            let mut st = self.inner.lock();
            let blinded = int_from_bytes(&block.payload);
            let addressed_to_us = self.is_addressed_to_us(&block);
            if !st.chain.append(block) {
                return self.reject(Rejection::Structural);
            }
            if !addressed_to_us || st.session.is_countersigned(from) {
                return Inbound::Appended;
            }

            let blind_sig = raw_sign(&blinded, self.keys.rsa_private());
            let sign = match self.build_signed(&st.chain, BlockKind::Sign, from, int_to_bytes(&blind_sig)) {
                Ok(b) => b,
                Err(e) => {
                    warn!(voter = self.id, peer = from, "could not build countersignature: {}", e);
                    return Inbound::Appended;
                }
            };
            let msg = BlockMessage::from_block(&sign);
            if !st.chain.append(sign) {
                warn!(voter = self.id, peer = from, "own sign block did not extend the chain");
                return Inbound::Appended;
            }
            st.session.mark_countersigned(from);
            msg
        };
        self.transport.broadcast(reply);
        METRICS.inc_counter(SIGNATURES_ISSUED);
        info!(voter = self.id, peer = from, "countersigned vote");
        Inbound::Countersigned
    }

    fn on_sign(&self, block: Block) -> Inbound {
        let (from, key) = match self.authenticate(&block) {
            Ok(v) => v,
            Err(r) => return self.reject(r),
        };
        let key = match key.to_rsa() {
            Ok(k) => k,
            Err(_) => return self.reject(Rejection::Unauthenticated),
        };
        {
            let mut st = self.inner.lock();
            let blind_sig = int_from_bytes(&block.payload);
            let addressed_to_us = self.is_addressed_to_us(&block);
            if !st.chain.append(block) {
                return self.reject(Rejection::Structural);
            }
            if !addressed_to_us {
                return Inbound::Appended;
            }
            let inverse = match st.session.inverse(from) {
                Some(inv) => inv.clone(),
                None => return self.reject(Rejection::UnknownBlinding),
            };
            let share = unblind(&blind_sig, &inverse, &key);
            let opens = st
                .session
                .pending()
                .map(|p| raw_verify(&share, &key) == p.commitment)
                .unwrap_or(false);
            if !opens {
                return self.reject(Rejection::InvalidShare);
            }
            st.session.record_share(from, share);
        }
        self.share_arrived.notify_waiters();
        METRICS.inc_counter(SHARES_RECORDED);
        Inbound::ShareRecorded
    }

    fn on_ballot(&self, block: Block) -> Inbound {
        if self.inner.lock().chain.append(block) {
            Inbound::Appended
        } else {
            self.reject(Rejection::Structural)
        }
    }

    /// Registered sender whose registered key signed the payload.
    fn authenticate(&self, block: &Block) -> std::result::Result<(VoterId, PublicKey), Rejection> {
        let from: VoterId = block.from_id.parse().map_err(|_| Rejection::Malformed)?;
        let key = match self.registry.public_key(from) {
            Ok(Some(key)) => key,
            Ok(None) => return Err(Rejection::Unregistered),
            Err(e) => {
                warn!(voter = self.id, peer = from, "registry lookup failed: {}", e);
                return Err(Rejection::Unregistered);
            }
        };
        if key != block.sender_key || !block.verify_signature() {
            return Err(Rejection::Unauthenticated);
        }
        Ok((from, key))
    }

    fn is_addressed_to_us(&self, block: &Block) -> bool {
        block.to_id.parse::<VoterId>().map(|to| to == self.id).unwrap_or(false)
    }

    fn reject(&self, reason: Rejection) -> Inbound {
        debug!(voter = self.id, "inbound block dropped: {}", reason);
        METRICS.inc_counter(INBOUND_DROPPED);
        Inbound::Rejected(reason)
    }

    /// Build, sign and mine a block on top of `chain`'s tip.
    fn build_signed(&self, chain: &Chain, kind: BlockKind, to: VoterId, payload: Vec<u8>) -> Result<Block> {
        let signature = self.keys.sign(&payload)?;
        let mut block = Block::new(
            kind,
            self.keys.public().clone(),
            self.id.to_string(),
            to.to_string(),
            payload,
            signature,
            chain.last_digest(),
        );
        block.mine(chain.pow());
        Ok(block)
    }

    async fn wait_for_share(&self, peer: VoterId) {
        loop {
            // register interest before looking, so an insert in between is not missed
            let notified = self.share_arrived.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let ready = self.inner.lock().session.has_share(peer);
            if ready {
                return;
            }
            notified.await;
        }
    }
}

impl fmt::Debug for Voter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Voter").field("id", &self.id).field("phase", &self.phase()).finish_non_exhaustive()
    }
}
