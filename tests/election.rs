//! Multi-voter protocol runs over the in-process hub.

mod common;

use ballotchain::crypto::blind::{int_from_bytes, int_to_bytes, raw_sign};
use ballotchain::ledger::{Block, BlockKind, ProofOfWork};
use ballotchain::crypto::PublicKey;
use ballotchain::network::{BlockMessage, PeerTransport};
use ballotchain::voting::{Inbound, MemRegistry, Phase, Rejection, Voter, VoterId, VoterRegistry};
use common::{authored_block, key_for, private_for, tip, Cluster};
use rsa::BigUint;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::time::{timeout, Duration};
use tokio_test::{assert_pending, task};

#[tokio::test(flavor = "current_thread")]
async fn three_voters_tally() {
    let c = Cluster::start(&[1, 2, 3]);
    for (id, choice) in [(1, 0), (2, 1), (3, 0)] {
        c.voter(id).vote(choice).await.unwrap();
        c.settle().await;
    }
    for id in [1, 2, 3] {
        c.voter(id).cast_ballot().unwrap();
        c.settle().await;
        assert_eq!(c.voter(id).phase(), Phase::Ballotted);
    }

    assert!(c.rejections().is_empty(), "{:?}", c.rejections());
    assert!(c.chains_agree());
    // genesis + 3 voters * 2 peers * (Vote + Sign) + 3 ballots
    assert_eq!(c.voter(1).chain_len(), 16);

    for voter in c.voters.values() {
        let tally = voter.count().unwrap();
        assert_eq!(tally.into_map(), BTreeMap::from([(0u8, 2usize), (1, 1)]));
    }
}

#[tokio::test(flavor = "current_thread")]
async fn identical_ballots_count_once() {
    let c = Cluster::start(&[1, 2]);
    c.voter(1).vote(5).await.unwrap();
    c.settle().await;
    c.voter(2).vote(6).await.unwrap();
    c.settle().await;

    c.voter(1).cast_ballot().unwrap();
    c.settle().await;
    c.voter(1).cast_ballot().unwrap();
    c.settle().await;
    c.voter(2).cast_ballot().unwrap();
    c.settle().await;

    let ballots = c
        .voter(2)
        .chain_snapshot()
        .iter()
        .filter(|b| b.kind == BlockKind::Ballot)
        .count();
    assert_eq!(ballots, 3);
    let tally = c.voter(2).count().unwrap();
    assert_eq!(tally.votes_for(5), 1);
    assert_eq!(tally.votes_for(6), 1);
    assert_eq!(tally.total(), 2);
}

#[tokio::test(flavor = "current_thread")]
async fn ballot_missing_a_registered_share_counts_zero() {
    let c = Cluster::start(&[1, 2]);
    for id in [1, 2] {
        c.voter(id).vote(0).await.unwrap();
        c.settle().await;
    }
    for id in [1, 2] {
        c.voter(id).cast_ballot().unwrap();
        c.settle().await;
    }
    assert_eq!(c.voter(1).count().unwrap().total(), 2);

    // a newcomer never countersigned either ballot
    c.registry.register(3, key_for(3).public()).unwrap();
    assert_eq!(c.voter(1).count().unwrap().total(), 0);

    c.registry.deregister(3).unwrap();
    assert_eq!(c.voter(1).count().unwrap().total(), 2);
}

#[tokio::test(flavor = "current_thread")]
async fn blocks_that_do_not_extend_the_chain_are_dropped() {
    let c = Cluster::start(&[1, 2]);
    let voter = c.voter(1);
    let before = voter.chain_snapshot();
    let pow = ProofOfWork::default();

    // wrong linkage
    let stale = authored_block(BlockKind::Vote, 2, 1, vec![1, 2, 3], vec![7; 48]);
    assert_eq!(voter.handle_message(&stale), Inbound::Rejected(Rejection::Structural));

    // right linkage, proof-of-work broken
    let mut unmined = Block::new(
        BlockKind::Ballot,
        ballotchain::crypto::PublicKey::genesis(),
        String::new(),
        String::new(),
        b"{}".to_vec(),
        Vec::new(),
        before[0].digest(),
    );
    unmined.mine(&pow);
    while unmined.is_mined(&pow) {
        unmined.nonce += 1;
    }
    let msg = BlockMessage::from_block(&unmined);
    assert_eq!(voter.handle_message(&msg), Inbound::Rejected(Rejection::Structural));

    assert_eq!(voter.chain_snapshot(), before);
    c.settle().await;
    assert!(c.chains_agree());
}

#[tokio::test(flavor = "current_thread")]
async fn unregistered_sender_is_ignored_and_not_propagated() {
    let c = Cluster::start(&[1, 2]);
    let voter = c.voter(1);
    let genesis = tip(&voter).digest();

    // key 4 exists but was never registered
    let msg = authored_block(BlockKind::Vote, 4, 1, vec![9; 16], genesis.clone());
    assert_eq!(voter.handle_message(&msg), Inbound::Rejected(Rejection::Unregistered));

    // claims to be voter 2 but is signed by voter 4
    let mut forged = authored_block(BlockKind::Vote, 4, 1, vec![9; 16], genesis);
    forged.from_id = "2".into();
    assert_eq!(voter.handle_message(&forged), Inbound::Rejected(Rejection::Unauthenticated));

    c.settle().await;
    assert_eq!(voter.chain_len(), 1);
    assert_eq!(c.voter(2).chain_len(), 1);
}

#[tokio::test(flavor = "current_thread")]
async fn sign_without_a_request_is_not_used() {
    let c = Cluster::start(&[1, 2]);
    let voter = c.voter(1);
    let msg = authored_block(BlockKind::Sign, 2, 1, vec![4; 32], tip(&voter).digest());
    assert_eq!(voter.handle_message(&msg), Inbound::Rejected(Rejection::UnknownBlinding));
    assert_eq!(voter.chain_len(), 2);
    assert!(voter.cast_ballot().is_err());
}

#[tokio::test(flavor = "current_thread")]
async fn silent_peer_blocks_the_vote_forever() {
    let c = Cluster::start(&[1]);
    // registered, but no process behind it
    c.registry.register(2, key_for(2).public()).unwrap();
    let voter = c.voter(1);

    assert!(timeout(Duration::from_millis(300), voter.vote(1)).await.is_err());
    assert_eq!(voter.phase(), Phase::AwaitingSignatures);
    // vote block went out, nothing came back
    assert_eq!(voter.chain_len(), 2);
    assert!(voter.cast_ballot().is_err());
}

#[test]
fn vote_stays_pending_without_a_countersignature() {
    let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
    let c = rt.block_on(async { Cluster::start(&[1]) });
    c.registry.register(2, key_for(2).public()).unwrap();
    let voter = c.voter(1);

    let mut vote = task::spawn(voter.vote(0));
    assert_pending!(vote.poll());
    assert_pending!(vote.poll());
    assert!(!vote.is_woken());
}

#[tokio::test(flavor = "current_thread")]
async fn late_countersignature_releases_the_vote() {
    let c = Cluster::start(&[1]);
    c.registry.register(2, key_for(2).public()).unwrap();
    let voter = c.voter(1);

    let pending = tokio::spawn({
        let voter = voter.clone();
        async move { voter.vote(9).await }
    });
    while voter.chain_len() < 2 {
        tokio::task::yield_now().await;
    }

    // play voter 2 by hand; a share that does not open is refused first
    let request = tip(&voter);
    assert_eq!(request.kind, BlockKind::Vote);
    assert_eq!(request.to_id, "2");

    let bogus = authored_block(BlockKind::Sign, 2, 1, int_to_bytes(&BigUint::from(12345u32)), request.digest());
    assert_eq!(voter.handle_message(&bogus), Inbound::Rejected(Rejection::InvalidShare));
    assert!(!pending.is_finished());

    let blind_sig = raw_sign(&int_from_bytes(&request.payload), private_for(2));
    let reply = authored_block(BlockKind::Sign, 2, 1, int_to_bytes(&blind_sig), tip(&voter).digest());
    assert_eq!(voter.handle_message(&reply), Inbound::ShareRecorded);

    timeout(Duration::from_secs(5), pending).await.unwrap().unwrap().unwrap();
    voter.cast_ballot().unwrap();
    assert_eq!(voter.count().unwrap().votes_for(9), 1);
}

#[tokio::test(flavor = "current_thread")]
async fn repeat_vote_request_is_signed_once() {
    let c = Cluster::start(&[1, 2]);
    let voter = c.voter(1);

    let first = authored_block(BlockKind::Vote, 2, 1, vec![5; 32], tip(&voter).digest());
    assert_eq!(voter.handle_message(&first), Inbound::Countersigned);
    let countersign = tip(&voter);
    assert_eq!(countersign.kind, BlockKind::Sign);
    assert_eq!(countersign.to_id, "2");
    assert!(countersign.verify_signature());

    let again = authored_block(BlockKind::Vote, 2, 1, vec![6; 32], tip(&voter).digest());
    assert_eq!(voter.handle_message(&again), Inbound::Appended);
    assert_eq!(tip(&voter).kind, BlockKind::Vote);
    assert_eq!(voter.chain_len(), 4);
}

#[tokio::test(flavor = "current_thread")]
async fn local_misuse_is_reported_not_fatal() {
    let c = Cluster::start(&[1]);
    let voter = c.voter(1);
    assert!(voter.cast_ballot().is_err());
    assert!(voter.vote(32).await.is_err());
    assert_eq!(voter.phase(), Phase::Idle);

    voter.vote(2).await.unwrap();
    assert!(voter.vote(3).await.is_err());
    voter.cast_ballot().unwrap();
    assert_eq!(voter.count().unwrap().votes_for(2), 1);
}

#[tokio::test(flavor = "current_thread")]
async fn unreadable_peer_key_leaves_the_vote_retryable() {
    let c = Cluster::start(&[1, 2]);
    let voter = c.voter(1);
    c.registry.register(2, &PublicKey::from_pem(b"junk".to_vec())).unwrap();

    assert!(voter.vote(0).await.is_err());
    assert_eq!(voter.phase(), Phase::Idle);
    assert_eq!(voter.chain_len(), 1);

    c.registry.register(2, key_for(2).public()).unwrap();
    voter.vote(0).await.unwrap();
    c.settle().await;
    voter.cast_ballot().unwrap();
    c.settle().await;
    assert_eq!(c.voter(2).count().unwrap().votes_for(0), 1);
}

/// Lists an id whose key is already gone, as when a peer stops mid-read.
struct VanishingRegistry {
    inner: MemRegistry,
    gone: VoterId,
}

impl VoterRegistry for VanishingRegistry {
    fn registered_ids(&self) -> ballotchain::utils::Result<BTreeSet<VoterId>> {
        let mut ids = self.inner.registered_ids()?;
        ids.insert(self.gone);
        Ok(ids)
    }

    fn public_key(&self, id: VoterId) -> ballotchain::utils::Result<Option<PublicKey>> {
        self.inner.public_key(id)
    }

    fn register(&self, id: VoterId, key: &PublicKey) -> ballotchain::utils::Result<()> {
        self.inner.register(id, key)
    }

    fn deregister(&self, id: VoterId) -> ballotchain::utils::Result<()> {
        self.inner.deregister(id)
    }
}

struct Silent;

impl PeerTransport for Silent {
    fn broadcast(&self, _message: BlockMessage) {}
}

#[tokio::test(flavor = "current_thread")]
async fn peer_that_vanishes_mid_vote_is_skipped() {
    let registry = VanishingRegistry { inner: MemRegistry::new(), gone: 2 };
    registry.register(1, key_for(1).public()).unwrap();
    let voter = Voter::new(1, key_for(1), Arc::new(registry), Arc::new(Silent), ProofOfWork::default());

    timeout(Duration::from_secs(5), voter.vote(3)).await.unwrap().unwrap();
    assert_eq!(voter.phase(), Phase::AwaitingSignatures);
    // no request went to the missing peer
    assert_eq!(voter.chain_len(), 1);
}
