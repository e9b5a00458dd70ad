//! Ledger module: blocks with proof-of-work and the per-process chain.

pub mod block;
pub mod chain;

pub use block::{Block, BlockKind, Digest, ProofOfWork, GENESIS_TIMESTAMP};
pub use chain::Chain;
