use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::distributed::protocol::Envelope;
use crate::error::DistributedError;

use super::MessageChannel;

type Routes = Arc<Mutex<HashMap<String, mpsc::UnboundedSender<Envelope>>>>;

enum Route {
    Peer(mpsc::UnboundedSender<Envelope>),
    Hub(Routes),
}

/// In-process channel end backed by unbounded tokio queues.
pub struct MemoryChannel {
    inbound: mpsc::UnboundedReceiver<Envelope>,
    route: Route,
}

impl MemoryChannel {
    /// Two connected ends: whatever one sends, the other receives.
    #[must_use]
    pub fn pair() -> (Self, Self) {
        let (left_tx, left_rx) = mpsc::unbounded_channel();
        let (right_tx, right_rx) = mpsc::unbounded_channel();
        (
            Self {
                inbound: left_rx,
                route: Route::Peer(right_tx),
            },
            Self {
                inbound: right_rx,
                route: Route::Peer(left_tx),
            },
        )
    }

    /// Returns the next already-delivered envelope, if any.
    pub fn try_recv(&mut self) -> Option<Envelope> {
        self.inbound.try_recv().ok()
    }

    /// Drains every envelope delivered so far.
    pub fn drain(&mut self) -> Vec<Envelope> {
        let mut envelopes = Vec::new();
        while let Ok(envelope) = self.inbound.try_recv() {
            envelopes.push(envelope);
        }
        envelopes
    }
}

#[async_trait]
impl MessageChannel for MemoryChannel {
    fn send(&self, envelope: Envelope) -> Result<(), DistributedError> {
        let sender = match &self.route {
            Route::Peer(sender) => sender.clone(),
            Route::Hub(routes) => {
                let node_id = envelope
                    .node_id
                    .as_deref()
                    .ok_or(DistributedError::MissingNodeId)?;
                let routes = routes.lock().unwrap_or_else(PoisonError::into_inner);
                routes
                    .get(node_id)
                    .cloned()
                    .ok_or_else(|| DistributedError::UnknownNode {
                        node_id: node_id.to_owned(),
                    })?
            }
        };
        sender
            .send(envelope)
            .map_err(|_err| DistributedError::ChannelClosed)
    }

    async fn recv(&mut self) -> Result<Envelope, DistributedError> {
        self.inbound
            .recv()
            .await
            .ok_or(DistributedError::ChannelClosed)
    }
}

/// Connector handing out worker ends of an in-memory coordinator channel.
#[derive(Clone)]
pub struct MemoryHub {
    inbound_tx: mpsc::UnboundedSender<Envelope>,
    routes: Routes,
}

/// Creates a coordinator end plus a hub that workers connect through.
#[must_use]
pub fn memory_hub() -> (MemoryChannel, MemoryHub) {
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let routes: Routes = Arc::new(Mutex::new(HashMap::new()));
    (
        MemoryChannel {
            inbound: inbound_rx,
            route: Route::Hub(routes.clone()),
        },
        MemoryHub { inbound_tx, routes },
    )
}

impl MemoryHub {
    /// Opens the worker end for `node_id`. Reconnecting replaces the route.
    #[must_use]
    pub fn connect(&self, node_id: &str) -> MemoryChannel {
        let (worker_tx, worker_rx) = mpsc::unbounded_channel();
        let mut routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
        routes.insert(node_id.to_owned(), worker_tx);
        MemoryChannel {
            inbound: worker_rx,
            route: Route::Peer(self.inbound_tx.clone()),
        }
    }

    /// Drops the route for `node_id`; later sends to it fail.
    pub fn disconnect(&self, node_id: &str) {
        let mut routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
        routes.remove(node_id);
    }
}
