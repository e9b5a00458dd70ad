//! Permissioned ledger for anonymous voting.
//!
//! Each voter process keeps its own proof-of-work chain and gathers an RSA
//! blind countersignature from every registered voter before publishing a
//! ballot that anyone can verify and tally.

pub mod crypto;
pub mod ledger;
pub mod network;
pub mod node;
pub mod utils;
pub mod voting;
