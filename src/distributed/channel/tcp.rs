use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::distributed::protocol::{Envelope, read_envelope, write_envelope};
use crate::error::DistributedError;

use super::MessageChannel;

type Routes = Arc<Mutex<HashMap<String, mpsc::UnboundedSender<Envelope>>>>;
type Writers = Arc<Mutex<Vec<JoinHandle<()>>>>;

/// Upper bound on flushing queued envelopes when a channel closes.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Coordinator side of the TCP transport: accepts worker connections and
/// routes outbound envelopes by `node_id`.
pub struct TcpCoordinatorChannel {
    inbound: mpsc::UnboundedReceiver<Envelope>,
    routes: Routes,
    writers: Writers,
    local_addr: SocketAddr,
    accept_handle: JoinHandle<()>,
}

impl TcpCoordinatorChannel {
    /// Binds `addr` and starts accepting workers in the background.
    ///
    /// # Errors
    ///
    /// Returns an error when the listener cannot be bound.
    pub async fn bind(addr: &str) -> Result<Self, DistributedError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|err| DistributedError::Bind {
                addr: addr.to_owned(),
                source: err,
            })?;
        let local_addr = listener.local_addr().map_err(|err| DistributedError::Io {
            context: "read listener address",
            source: err,
        })?;
        info!("Coordinator listening for workers on {}", local_addr);

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let routes: Routes = Arc::new(Mutex::new(HashMap::new()));
        let writers: Writers = Arc::new(Mutex::new(Vec::new()));
        let accept_routes = routes.clone();
        let accept_writers = writers.clone();
        let accept_handle = tokio::spawn(async move {
            loop {
                let (stream, peer) = match listener.accept().await {
                    Ok(result) => result,
                    Err(err) => {
                        warn!("Failed to accept worker: {}", err);
                        continue;
                    }
                };
                debug!("Worker connection from {}", peer);
                tokio::spawn(serve_connection(
                    stream,
                    inbound_tx.clone(),
                    accept_routes.clone(),
                    accept_writers.clone(),
                ));
            }
        });

        Ok(Self {
            inbound: inbound_rx,
            routes,
            writers,
            local_addr,
            accept_handle,
        })
    }

    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl Drop for TcpCoordinatorChannel {
    fn drop(&mut self) {
        self.accept_handle.abort();
    }
}

/// Serves one worker connection. The connection's outbound sender lives in
/// `routes` once the worker has named itself, so dropping the route lets the
/// writer drain and finish.
async fn serve_connection(
    stream: TcpStream,
    inbound_tx: mpsc::UnboundedSender<Envelope>,
    routes: Routes,
    writers: Writers,
) {
    let (read_half, write_half) = stream.into_split();
    let (out_tx, out_rx) = mpsc::unbounded_channel::<Envelope>();
    track_writer(&writers, tokio::spawn(write_loop(write_half, out_rx, "Worker")));
    let outbound = out_tx.downgrade();
    let mut unrouted = Some(out_tx);

    let mut reader = BufReader::new(read_half);
    let mut registered: Option<String> = None;
    loop {
        let envelope = match read_envelope(&mut reader).await {
            Ok(envelope) => envelope,
            Err(DistributedError::ConnectionClosed) => break,
            Err(err @ DistributedError::Deserialize { .. }) => {
                warn!("Dropping malformed envelope: {}", err);
                continue;
            }
            Err(err) => {
                warn!("Worker connection failed: {}", err);
                break;
            }
        };
        if let Some(node_id) = envelope.node_id.as_deref()
            && registered.as_deref() != Some(node_id)
        {
            let mut table = routes.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(previous) = registered.as_deref() {
                remove_own_route(&mut table, previous, &outbound);
            }
            if let Some(sender) = unrouted.take().or_else(|| outbound.upgrade()) {
                table.insert(node_id.to_owned(), sender);
            }
            registered = Some(node_id.to_owned());
        }
        if inbound_tx.send(envelope).is_err() {
            break;
        }
    }

    drop(unrouted);
    if let Some(node_id) = registered {
        let mut table = routes.lock().unwrap_or_else(PoisonError::into_inner);
        remove_own_route(&mut table, node_id.as_str(), &outbound);
        debug!("Worker {} disconnected", node_id);
    }
}

fn remove_own_route(
    table: &mut HashMap<String, mpsc::UnboundedSender<Envelope>>,
    node_id: &str,
    own: &mpsc::WeakUnboundedSender<Envelope>,
) {
    let Some(own) = own.upgrade() else {
        return;
    };
    if table
        .get(node_id)
        .is_some_and(|sender| sender.same_channel(&own))
    {
        table.remove(node_id);
    }
}

fn track_writer(writers: &Writers, handle: JoinHandle<()>) {
    let mut guard = writers.lock().unwrap_or_else(PoisonError::into_inner);
    guard.retain(|writer| !writer.is_finished());
    guard.push(handle);
}

/// Writes queued envelopes until every sender is gone, then shuts the write
/// side down so the peer sees end of stream.
async fn write_loop<W>(
    mut writer: W,
    mut outbound: mpsc::UnboundedReceiver<Envelope>,
    peer: &'static str,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(envelope) = outbound.recv().await {
        if let Err(err) = write_envelope(&mut writer, &envelope).await {
            debug!("{} connection write failed: {}", peer, err);
            return;
        }
    }
    if let Err(err) = writer.shutdown().await {
        debug!("{} connection shutdown failed: {}", peer, err);
    }
}

async fn flush_writers<I>(writers: I)
where
    I: IntoIterator<Item = JoinHandle<()>>,
{
    let deadline = Instant::now()
        .checked_add(CLOSE_TIMEOUT)
        .unwrap_or_else(Instant::now);
    for writer in writers {
        match tokio::time::timeout_at(deadline, writer).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => debug!("Connection writer ended abnormally: {}", err),
            Err(_elapsed) => {
                warn!("Timed out flushing queued envelopes");
                return;
            }
        }
    }
}

#[async_trait]
impl MessageChannel for TcpCoordinatorChannel {
    fn send(&self, envelope: Envelope) -> Result<(), DistributedError> {
        let node_id = envelope
            .node_id
            .as_deref()
            .ok_or(DistributedError::MissingNodeId)?;
        let sender = {
            let routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
            routes
                .get(node_id)
                .cloned()
                .ok_or_else(|| DistributedError::UnknownNode {
                    node_id: node_id.to_owned(),
                })?
        };
        sender
            .send(envelope)
            .map_err(|_err| DistributedError::ConnectionClosed)
    }

    async fn recv(&mut self) -> Result<Envelope, DistributedError> {
        self.inbound
            .recv()
            .await
            .ok_or(DistributedError::ChannelClosed)
    }

    /// Stops accepting workers, drops every route and waits for the
    /// per-connection writers to deliver what was already queued.
    async fn close(&mut self) {
        self.accept_handle.abort();
        let routes: Vec<_> = {
            let mut table = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
            table.drain().collect()
        };
        drop(routes);
        let writers = {
            let mut guard = self.writers.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *guard)
        };
        flush_writers(writers).await;
    }
}

/// Worker side of the TCP transport: one connection to the coordinator.
pub struct TcpWorkerChannel {
    inbound: mpsc::UnboundedReceiver<Envelope>,
    outbound: Option<mpsc::UnboundedSender<Envelope>>,
    writer_handle: Option<JoinHandle<()>>,
    reader_handle: JoinHandle<()>,
}

impl TcpWorkerChannel {
    /// Connects to the coordinator at `addr`.
    ///
    /// # Errors
    ///
    /// Returns an error when the connection cannot be established.
    pub async fn connect(addr: &str) -> Result<Self, DistributedError> {
        info!("Connecting to coordinator {}", addr);
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|err| DistributedError::Connection {
                addr: addr.to_owned(),
                source: err,
            })?;
        let (read_half, write_half) = stream.into_split();

        let (outbound, out_rx) = mpsc::unbounded_channel::<Envelope>();
        let writer_handle = tokio::spawn(write_loop(write_half, out_rx, "Coordinator"));

        let (inbound_tx, inbound) = mpsc::unbounded_channel::<Envelope>();
        let reader_handle = tokio::spawn(async move {
            let mut reader = BufReader::new(read_half);
            loop {
                match read_envelope(&mut reader).await {
                    Ok(envelope) => {
                        if inbound_tx.send(envelope).is_err() {
                            break;
                        }
                    }
                    Err(err @ DistributedError::Deserialize { .. }) => {
                        warn!("Dropping malformed envelope: {}", err);
                    }
                    Err(err) => {
                        debug!("Coordinator connection ended: {}", err);
                        break;
                    }
                }
            }
        });

        Ok(Self {
            inbound,
            outbound: Some(outbound),
            writer_handle: Some(writer_handle),
            reader_handle,
        })
    }
}

impl Drop for TcpWorkerChannel {
    fn drop(&mut self) {
        self.reader_handle.abort();
    }
}

#[async_trait]
impl MessageChannel for TcpWorkerChannel {
    fn send(&self, envelope: Envelope) -> Result<(), DistributedError> {
        self.outbound
            .as_ref()
            .ok_or(DistributedError::ConnectionClosed)?
            .send(envelope)
            .map_err(|_err| DistributedError::ConnectionClosed)
    }

    async fn recv(&mut self) -> Result<Envelope, DistributedError> {
        self.inbound
            .recv()
            .await
            .ok_or(DistributedError::ConnectionClosed)
    }

    /// Waits until the queued envelopes are written, then half-closes the
    /// connection.
    async fn close(&mut self) {
        drop(self.outbound.take());
        if let Some(writer) = self.writer_handle.take() {
            flush_writers([writer]).await;
        }
    }
}
