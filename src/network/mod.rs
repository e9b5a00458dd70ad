//! Network module - framing, connections, peer manager.
//! Exposes PeerManager, Connection, the wire message types and the
//! PeerTransport seam used by the voting core.

pub mod codec;
pub mod message;
pub mod connection;
pub mod manager;
pub mod transport;

pub use message::{BlockMessage, WireMessage};
pub use connection::Connection;
pub use manager::PeerManager;
pub use transport::{NullTransport, PeerTransport};
