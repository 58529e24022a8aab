//! Point-to-point transport for envelopes.
//!
//! The coordinator and worker runners only see [`MessageChannel`]; the TCP
//! transport is used by the binary and the in-memory transport by tests.
mod memory;
mod tcp;

use async_trait::async_trait;

use crate::error::DistributedError;

use super::protocol::Envelope;

pub use memory::{MemoryChannel, MemoryHub, memory_hub};
pub use tcp::{TcpCoordinatorChannel, TcpWorkerChannel};

#[async_trait]
pub trait MessageChannel: Send {
    /// Queues an envelope for delivery without waiting for the peer.
    ///
    /// On the coordinator side the envelope's `node_id` selects the
    /// destination worker.
    ///
    /// # Errors
    ///
    /// Returns an error when the destination is unknown or the channel closed.
    fn send(&self, envelope: Envelope) -> Result<(), DistributedError>;

    /// Waits for the next inbound envelope.
    ///
    /// # Errors
    ///
    /// Returns an error once the channel is closed.
    async fn recv(&mut self) -> Result<Envelope, DistributedError>;

    /// Delivers everything already queued by [`MessageChannel::send`], then
    /// closes the outbound side.
    ///
    /// Transports that deliver synchronously have nothing to flush and keep
    /// the default.
    async fn close(&mut self) {}
}
