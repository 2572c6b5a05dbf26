use std::time::Duration;

/// Transport collaborator supplied by the host application
///
/// The engine only needs a fire-and-forget outbound path; framing,
/// connection lifecycle, reconnection and TLS all live behind this trait
/// (WebSocket, stdio pipe, socket). Delivery is assumed reliable and
/// order-preserving for a single connection. The inbound direction is the
/// host's read loop calling [`Engine::receive`](crate::Engine::receive)
/// once per complete message.
pub trait Transport: Send + Sync {
    /// Queue one complete JSON-RPC message for delivery to the peer
    fn send(&self, message: String);

    /// Default deadline applied to calls that don't carry their own;
    /// `None` lets such calls stay pending indefinitely
    fn default_timeout(&self) -> Option<Duration> {
        None
    }
}
