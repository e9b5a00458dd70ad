use crate::network::message::BlockMessage;

/// Outbound half of the peer link as seen by the voting core.
///
/// Delivery is best-effort and fire-and-forget; the core never learns
/// whether a peer received a block. Inbound blocks reach the core through
/// `Voter::handle_message`, called by whoever owns the receiving side.
pub trait PeerTransport: Send + Sync + 'static {
    /// Send `message` to every connected peer (never back to ourselves).
    fn broadcast(&self, message: BlockMessage);
}

/// Transport for a voter with no peers; everything is dropped.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTransport;

impl PeerTransport for NullTransport {
    fn broadcast(&self, _message: BlockMessage) {}
}
