use crate::utils::{BallotError, Result};
use rsa::BigUint;
use sha2::{Digest, Sha384};

/// Highest valid candidate id
pub const MAX_CANDIDATE: u8 = 31;

/// Width of the candidate id, of the zero pad and of the random nonce
pub const FIELD_LEN: usize = 4;

/// Random bytes mixed into a vote commitment
pub type VoteNonce = [u8; FIELD_LEN];

/// A ballot option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Candidate(u8);

impl Candidate {
    pub fn new(id: u32) -> Result<Self> {
        if id > MAX_CANDIDATE as u32 {
            return Err(BallotError::ProtocolError(format!(
                "candidate {} out of range 0..={}",
                id, MAX_CANDIDATE
            )));
        }
        Ok(Self(id as u8))
    }

    pub fn id(&self) -> u8 {
        self.0
    }

    /// `SHA384(id_be32 || 0x00000000 || nonce)` as a big-endian integer.
    ///
    /// Draws a fresh nonce when `nonce` is `None`; tallying passes the
    /// recorded nonce back in and must get the identical integer.
    pub fn commitment(&self, nonce: Option<VoteNonce>) -> (BigUint, VoteNonce) {
        let nonce = nonce.unwrap_or_else(rand::random);

        let mut h = Sha384::new();
        h.update((self.0 as u32).to_be_bytes());
        h.update([0u8; FIELD_LEN]);
        h.update(nonce);
        (BigUint::from_bytes_be(&h.finalize()), nonce)
    }
}
