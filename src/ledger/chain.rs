use crate::ledger::block::{Block, Digest, ProofOfWork};
use crate::utils::metrics::{BLOCKS_APPENDED, BLOCKS_REJECTED, CHAIN_HEIGHT, METRICS};
use tracing::debug;

/// Append-only sequence of blocks rooted at the genesis block.
///
/// `append` is the only consistency gate: it checks linkage and
/// proof-of-work, nothing about signatures or payload meaning.
#[derive(Debug, Clone)]
pub struct Chain {
    blocks: Vec<Block>,
    pow: ProofOfWork,
}

// never empty: genesis is pushed in `new`
#[allow(clippy::len_without_is_empty)]
impl Chain {
    pub fn new(pow: ProofOfWork) -> Self {
        let genesis = Block::genesis(&pow);
        Self { blocks: vec![genesis], pow }
    }

    /// Append `candidate` iff it extends the current tip and is mined.
    pub fn append(&mut self, candidate: Block) -> bool {
        let tip = self.last_digest();
        if candidate.previous_digest != tip {
            debug!(kind = %candidate.kind, "append rejected: does not extend tip");
            METRICS.inc_counter(BLOCKS_REJECTED);
            return false;
        }
        let digest = candidate.digest();
        if !self.pow.is_satisfied_by(&digest) {
            debug!(kind = %candidate.kind, "append rejected: proof-of-work not met");
            METRICS.inc_counter(BLOCKS_REJECTED);
            return false;
        }
        debug!(kind = %candidate.kind, height = self.blocks.len(), digest = %short_hex(&digest), "appended");
        self.blocks.push(candidate);
        METRICS.inc_counter(BLOCKS_APPENDED);
        METRICS.set_gauge(CHAIN_HEIGHT, self.blocks.len() as f64);
        true
    }

    pub fn last_digest(&self) -> Digest {
        self.blocks.last().map(Block::digest).unwrap_or_default()
    }

    pub fn pow(&self) -> &ProofOfWork {
        &self.pow
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn iter(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }
}

/// First bytes of a digest in hex, for log lines.
pub fn short_hex(digest: &[u8]) -> String {
    hex::encode(&digest[..digest.len().min(6)])
}

impl Default for Chain {
    fn default() -> Self {
        Self::new(ProofOfWork::default())
    }
}
