use crate::utils::{BallotError, Result};
use crate::voting::candidate::{Candidate, VoteNonce};
use crate::voting::registry::VoterId;
use rsa::BigUint;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;

/// Where a voter is in its own voting round.
///
/// `Voting` covers choosing the commitment and signing our own share.
/// `AwaitingSignatures` starts with the first blinded request and lasts until
/// a ballot is cast, so a completed `vote` leaves the voter here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Voting,
    AwaitingSignatures,
    Ballotted,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Idle => "idle",
            Phase::Voting => "voting",
            Phase::AwaitingSignatures => "awaiting signatures",
            Phase::Ballotted => "ballotted",
        };
        f.write_str(s)
    }
}

/// The voter's own choice, kept until the ballot is cast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingBallot {
    pub candidate: Candidate,
    pub nonce: VoteNonce,
    pub commitment: BigUint,
}

impl PendingBallot {
    pub fn new(candidate: Candidate) -> Self {
        let (commitment, nonce) = candidate.commitment(None);
        Self { candidate, nonce, commitment }
    }
}

/// Per-process protocol bookkeeping. Lives in memory only.
#[derive(Debug)]
pub struct Session {
    phase: Phase,
    blind_inverses: HashMap<VoterId, BigUint>,
    shares: BTreeMap<VoterId, BigUint>,
    countersigned: HashSet<VoterId>,
    ballot: Option<PendingBallot>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            blind_inverses: HashMap::new(),
            shares: BTreeMap::new(),
            countersigned: HashSet::new(),
            ballot: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    /// Start a round. Only one round per session.
    pub fn begin(&mut self, ballot: PendingBallot) -> Result<()> {
        if self.phase != Phase::Idle {
            return Err(BallotError::ProtocolError(format!("already voted (session is {})", self.phase)));
        }
        self.ballot = Some(ballot);
        self.phase = Phase::Voting;
        Ok(())
    }

    /// Drop the round in progress and return to `Idle`. Peers we have
    /// already countersigned for stay countersigned.
    pub fn abandon(&mut self) {
        self.ballot = None;
        self.blind_inverses.clear();
        self.shares.clear();
        self.phase = Phase::Idle;
    }

    pub fn pending(&self) -> Option<&PendingBallot> {
        self.ballot.as_ref()
    }

    pub fn record_inverse(&mut self, peer: VoterId, inverse: BigUint) {
        self.blind_inverses.insert(peer, inverse);
    }

    pub fn inverse(&self, peer: VoterId) -> Option<&BigUint> {
        self.blind_inverses.get(&peer)
    }

    pub fn record_share(&mut self, peer: VoterId, share: BigUint) {
        self.shares.insert(peer, share);
    }

    pub fn has_share(&self, peer: VoterId) -> bool {
        self.shares.contains_key(&peer)
    }

    pub fn shares(&self) -> &BTreeMap<VoterId, BigUint> {
        &self.shares
    }

    /// Registered voters we still lack a share from, in id order.
    pub fn missing_shares(&self, registered: &BTreeSet<VoterId>) -> Vec<VoterId> {
        registered.iter().copied().filter(|id| !self.shares.contains_key(id)).collect()
    }

    pub fn is_countersigned(&self, peer: VoterId) -> bool {
        self.countersigned.contains(&peer)
    }

    /// Returns false if `peer` had already been countersigned.
    pub fn mark_countersigned(&mut self, peer: VoterId) -> bool {
        self.countersigned.insert(peer)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_round_per_session() {
        let mut s = Session::new();
        assert_eq!(s.phase(), Phase::Idle);
        s.begin(PendingBallot::new(Candidate::new(3).unwrap())).unwrap();
        assert_eq!(s.phase(), Phase::Voting);
        assert_eq!(s.pending().unwrap().candidate.id(), 3);
        assert!(s.begin(PendingBallot::new(Candidate::new(4).unwrap())).is_err());
        assert_eq!(s.pending().unwrap().candidate.id(), 3);
    }

    #[test]
    fn abandoned_round_can_restart() {
        let mut s = Session::new();
        s.begin(PendingBallot::new(Candidate::new(3).unwrap())).unwrap();
        s.record_share(1, BigUint::from(5u32));
        s.record_inverse(2, BigUint::from(7u32));
        assert!(s.mark_countersigned(4));

        s.abandon();
        assert_eq!(s.phase(), Phase::Idle);
        assert!(s.pending().is_none());
        assert!(!s.has_share(1));
        assert!(s.inverse(2).is_none());
        assert!(s.is_countersigned(4));

        s.begin(PendingBallot::new(Candidate::new(4).unwrap())).unwrap();
        assert_eq!(s.pending().unwrap().candidate.id(), 4);
    }

    #[test]
    fn missing_shares_tracks_registry() {
        let mut s = Session::new();
        let registered: BTreeSet<VoterId> = [1, 2, 3].into_iter().collect();
        assert_eq!(s.missing_shares(&registered), vec![1, 2, 3]);
        s.record_share(2, BigUint::from(9u32));
        s.record_share(7, BigUint::from(9u32));
        assert_eq!(s.missing_shares(&registered), vec![1, 3]);
        assert!(s.has_share(7));
    }

    #[test]
    fn countersign_once() {
        let mut s = Session::new();
        assert!(!s.is_countersigned(4));
        assert!(s.mark_countersigned(4));
        assert!(!s.mark_countersigned(4));
        assert!(s.is_countersigned(4));
    }
}
