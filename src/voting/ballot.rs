//! Payload of a Ballot block.
//!
//! A flat JSON object: `voteChoice`, `voteRandom` (the commitment nonce as a
//! big-endian integer) and one entry per countersigning voter, keyed by the
//! voter id and holding the unblinded share as a decimal string.
//!
//! ```json
//! {"voteChoice":1,"voteRandom":3735928559,"1":"8841...","2":"1203..."}
//! ```

use crate::crypto::blind::raw_verify;
use crate::utils::{BallotError, Result};
use crate::voting::candidate::Candidate;
use crate::voting::registry::VoterId;
use crate::voting::session::PendingBallot;
use rsa::{BigUint, RsaPublicKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotPayload {
    #[serde(rename = "voteChoice")]
    pub vote_choice: u32,
    #[serde(rename = "voteRandom")]
    pub vote_random: u32,
    #[serde(flatten)]
    pub shares: BTreeMap<String, String>,
}

impl BallotPayload {
    pub fn new(ballot: &PendingBallot, shares: &BTreeMap<VoterId, BigUint>) -> Self {
        Self {
            vote_choice: ballot.candidate.id() as u32,
            vote_random: u32::from_be_bytes(ballot.nonce),
            shares: shares.iter().map(|(id, s)| (id.to_string(), s.to_string())).collect(),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn share(&self, voter: VoterId) -> Option<BigUint> {
        self.shares
            .get(&voter.to_string())
            .and_then(|s| BigUint::parse_bytes(s.as_bytes(), 10))
    }

    /// Check the ballot against the registered keys.
    ///
    /// Every voter in `keys` must have contributed a share that opens to the
    /// recomputed commitment. On success returns the candidate and the
    /// commitment, which identifies the ballot for de-duplication.
    pub fn verify(&self, keys: &BTreeMap<VoterId, RsaPublicKey>) -> Result<(Candidate, BigUint)> {
        let candidate = Candidate::new(self.vote_choice)?;
        let (commitment, _) = candidate.commitment(Some(self.vote_random.to_be_bytes()));

        for (voter, key) in keys {
            let share = self
                .share(*voter)
                .ok_or_else(|| BallotError::ProtocolError(format!("no share from voter {}", voter)))?;
            if raw_verify(&share, key) != commitment {
                return Err(BallotError::ProtocolError(format!("share from voter {} does not open", voter)));
            }
        }
        Ok((candidate, commitment))
    }
}
