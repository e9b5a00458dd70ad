//! Block record, canonical digest and proof-of-work.
//!
//! The digest is the linkage value between blocks and the object checked by
//! proof-of-work, so its byte layout must be identical in every process:
//!
//! ```text
//! payload || sender_key(PEM) || utf8(from_id || to_id || kind || timestamp)
//!         || signature || previous_digest || nonce(minimal big-endian)
//! ```

use crate::crypto::{PublicKey, Verifier};
use crate::utils::{BallotError, Result};
use sha2::{Digest as _, Sha384};
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

/// SHA-384 output
pub type Digest = Vec<u8>;

pub const DIGEST_LEN: usize = 48;

/// 2022-05-09T00:00:00Z, shared by every genesis block
pub const GENESIS_TIMESTAMP: f64 = 1_652_054_400.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    Genesis,
    Vote,
    Sign,
    Ballot,
    Normal,
}

impl BlockKind {
    /// Stable token used in the digest and on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockKind::Genesis => "Genesis",
            BlockKind::Vote => "Vote",
            BlockKind::Sign => "Sign",
            BlockKind::Ballot => "Ballot",
            BlockKind::Normal => "Normal",
        }
    }
}

impl FromStr for BlockKind {
    type Err = BallotError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Genesis" => Ok(BlockKind::Genesis),
            "Vote" => Ok(BlockKind::Vote),
            "Sign" => Ok(BlockKind::Sign),
            "Ballot" => Ok(BlockKind::Ballot),
            "Normal" => Ok(BlockKind::Normal),
            other => Err(BallotError::CodecError(format!("unknown block kind {:?}", other))),
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Proof-of-work target: a mined digest must start with these bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofOfWork {
    target: Vec<u8>,
}

impl ProofOfWork {
    pub fn new(target: impl Into<Vec<u8>>) -> Result<Self> {
        let target = target.into();
        if target.is_empty() || target.len() > DIGEST_LEN {
            return Err(BallotError::ConfigError(format!(
                "proof-of-work target must be 1..={} bytes, got {}",
                DIGEST_LEN,
                target.len()
            )));
        }
        Ok(Self { target })
    }

    pub fn target(&self) -> &[u8] {
        &self.target
    }

    pub fn prefix_len(&self) -> usize {
        self.target.len()
    }

    pub fn is_satisfied_by(&self, digest: &[u8]) -> bool {
        digest.starts_with(&self.target)
    }
}

impl Default for ProofOfWork {
    fn default() -> Self {
        Self { target: b"0".to_vec() }
    }
}

/// One protocol message plus its proof-of-work evidence.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub kind: BlockKind,
    pub sender_key: PublicKey,
    /// empty for broadcast (ballot/genesis) blocks
    pub from_id: String,
    pub to_id: String,
    pub payload: Vec<u8>,
    /// empty when unsigned
    pub signature: Vec<u8>,
    pub previous_digest: Digest,
    /// wall-clock seconds
    pub timestamp: f64,
    pub nonce: u64,
}

impl Block {
    /// Unmined block stamped with the current time.
    pub fn new(
        kind: BlockKind,
        sender_key: PublicKey,
        from_id: String,
        to_id: String,
        payload: Vec<u8>,
        signature: Vec<u8>,
        previous_digest: Digest,
    ) -> Self {
        Block {
            kind,
            sender_key,
            from_id,
            to_id,
            payload,
            signature,
            previous_digest,
            timestamp: now_timestamp(),
            nonce: 0,
        }
    }

    /// The publicly known root of every chain, already mined against `pow`.
    pub fn genesis(pow: &ProofOfWork) -> Self {
        let mut block = Block {
            kind: BlockKind::Genesis,
            sender_key: PublicKey::genesis(),
            from_id: String::new(),
            to_id: String::new(),
            payload: Vec::new(),
            signature: Vec::new(),
            previous_digest: Vec::new(),
            timestamp: GENESIS_TIMESTAMP,
            nonce: 0,
        };
        block.mine(pow);
        block
    }

    // everything but the nonce, so mining can clone the state per attempt
    fn prefix_hasher(&self) -> Sha384 {
        let mut h = Sha384::new();
        h.update(&self.payload);
        h.update(self.sender_key.as_pem());
        h.update(self.from_id.as_bytes());
        h.update(self.to_id.as_bytes());
        h.update(self.kind.as_str().as_bytes());
        h.update(format_timestamp(self.timestamp).as_bytes());
        h.update(&self.signature);
        h.update(&self.previous_digest);
        h
    }

    pub fn digest(&self) -> Digest {
        let mut h = self.prefix_hasher();
        h.update(nonce_bytes(self.nonce));
        h.finalize().to_vec()
    }

    pub fn is_mined(&self, pow: &ProofOfWork) -> bool {
        pow.is_satisfied_by(&self.digest())
    }

    /// Search nonces from zero until the digest meets `pow`. Unbounded.
    pub fn mine(&mut self, pow: &ProofOfWork) {
        let base = self.prefix_hasher();
        self.nonce = 0;
        loop {
            let mut h = base.clone();
            h.update(nonce_bytes(self.nonce));
            if pow.is_satisfied_by(&h.finalize()) {
                return;
            }
            self.nonce += 1;
        }
    }

    /// True iff `signature` is a valid PKCS#1 v1.5 SHA-384 signature of
    /// `payload` under `sender_key`.
    pub fn verify_signature(&self) -> bool {
        !self.signature.is_empty() && self.sender_key.verify(&self.payload, &self.signature).is_ok()
    }
}

/// Shortest round-trip decimal, always with a fractional part (`1652054400.0`).
pub fn format_timestamp(ts: f64) -> String {
    format!("{:?}", ts)
}

pub fn now_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Minimal big-endian encoding; zero is empty.
pub fn nonce_bytes(nonce: u64) -> Vec<u8> {
    let bytes = nonce.to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count();
    bytes[skip..].to_vec()
}
