//! The single-consumer dispatch queue in front of [`Server`].
//!
//! Transports submit inbound items through a cloneable [`ServerHandle`].
//! One worker owns the [`Server`] and invokes the configured
//! [`CommandHandler`] for each item in arrival order, one at a time.
//! Between items it applies the outcomes sessions reported, ahead of any
//! item still queued.

use super::Server;
use crate::client::ClientRef;
use crate::error::{ServerError, ServerErrorKind};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// What a connection delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A raw message.
    Message(Vec<u8>),
    /// The connection closed.
    Closed,
}

/// One queued item.
#[derive(Debug, Clone)]
pub struct DispatchItem {
    /// Sender.
    pub client: ClientRef,
    /// Payload.
    pub inbound: Inbound,
}

/// Handles dispatched items with exclusive access to the server.
#[async_trait::async_trait]
pub trait CommandHandler: Send + Sync + 'static {
    /// Processes one item. Invocations never overlap.
    async fn handle(&self, server: &mut Server, client: &ClientRef, inbound: Inbound);
}

/// Cloneable submitter for the dispatch queue.
#[derive(Debug, Clone)]
pub struct ServerHandle {
    items: mpsc::Sender<DispatchItem>,
}

impl ServerHandle {
    /// Queues an item, waiting for room while the queue is full.
    #[instrument(skip(self, client, inbound), fields(client = %client.id()))]
    pub async fn submit(&self, client: ClientRef, inbound: Inbound) -> Result<(), ServerError> {
        self.items
            .send(DispatchItem { client, inbound })
            .await
            .map_err(|_| ServerError::new(ServerErrorKind::QueueClosed, "Dispatch queue is closed"))
    }

    /// Queues raw message bytes from `client`.
    pub async fn submit_message(&self, client: ClientRef, bytes: Vec<u8>) -> Result<(), ServerError> {
        self.submit(client, Inbound::Message(bytes)).await
    }
}

/// Owns the dispatch worker.
#[derive(Debug)]
pub struct Dispatcher {
    handle: ServerHandle,
    shutdown: CancellationToken,
    worker: JoinHandle<Server>,
}

impl Dispatcher {
    /// Starts the worker. The queue bound comes from the server's config.
    #[instrument(skip_all)]
    pub fn spawn(server: Server, handler: impl CommandHandler) -> Self {
        let capacity = (*server.config().dispatch_capacity()).max(1);
        let (items, inbox) = mpsc::channel(capacity);
        let shutdown = CancellationToken::new();
        let worker = tokio::spawn(run(server, handler, inbox, shutdown.clone()));
        info!(capacity, "Dispatch worker started");
        Self {
            handle: ServerHandle { items },
            shutdown,
            worker,
        }
    }

    /// Returns a submitter.
    pub fn handle(&self) -> ServerHandle {
        self.handle.clone()
    }

    /// Closes the queue, waits for already queued items to be handled and
    /// every session to be stopped, and returns the server.
    #[instrument(skip(self))]
    pub async fn shutdown(self) -> Result<Server, ServerError> {
        self.shutdown.cancel();
        drop(self.handle);
        self.worker
            .await
            .map_err(|e| ServerError::new(ServerErrorKind::WorkerFailed, e.to_string()))
    }
}

async fn run(
    mut server: Server,
    handler: impl CommandHandler,
    mut inbox: mpsc::Receiver<DispatchItem>,
    shutdown: CancellationToken,
) -> Server {
    let mut handled = 0u64;
    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            Some(outcome) = server.next_outcome() => server.apply_outcome(outcome).await,
            item = inbox.recv() => match item {
                Some(item) => {
                    handler.handle(&mut server, &item.client, item.inbound).await;
                    handled += 1;
                }
                None => break,
            },
        }
    }

    inbox.close();
    while let Some(item) = inbox.recv().await {
        server.apply_ready_outcomes().await;
        handler.handle(&mut server, &item.client, item.inbound).await;
        handled += 1;
    }
    server.stop_all_sessions();
    info!(handled, "Dispatch worker stopped");
    debug!(profiles = server.lobby().len(), "Server state returned");
    server
}
