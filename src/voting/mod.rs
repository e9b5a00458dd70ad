//! Voting module - candidate commitments, voter registry, session state,
//! ballots and the protocol state machine that ties them to the chain.

pub mod ballot;
pub mod candidate;
pub mod registry;
pub mod session;
pub mod tally;
pub mod voter;

pub use ballot::BallotPayload;
pub use candidate::{Candidate, MAX_CANDIDATE};
pub use registry::{FsRegistry, MemRegistry, VoterId, VoterRegistry};
pub use session::{PendingBallot, Phase, Session};
pub use tally::Tally;
pub use voter::{Inbound, Rejection, Voter};
