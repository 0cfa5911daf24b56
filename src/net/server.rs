//! Accept loop and handler registry.
//!
//! # Responsibilities
//! - Spawn one independent [`ConnectionHandler`] per accepted connection
//! - Sample the current [`ConnectionSettings`] at accept time
//! - Track live handlers, purging finished ones on every accept
//! - Stop accepting on shutdown and abort whatever is still running

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::net::connection::{ConnectionHandler, ConnectionId, ConnectionSettings};
use crate::net::listener::{ConnectionPermit, Listener, ListenerError};
use crate::transport::HttpTransport;

const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Liveness bookkeeping for spawned handlers.
#[derive(Default)]
pub struct HandlerRegistry {
    live: Vec<(ConnectionId, JoinHandle<()>)>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: ConnectionId, handle: JoinHandle<()>) {
        self.live.push((id, handle));
    }

    /// Drop entries whose connection has ended; returns how many went.
    pub fn purge(&mut self) -> usize {
        let before = self.live.len();
        self.live.retain(|(_, handle)| !handle.is_finished());
        before - self.live.len()
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Cancel every handler still running.
    pub fn abort_all(&mut self) {
        for (id, handle) in self.live.drain(..) {
            if !handle.is_finished() {
                tracing::debug!(connection_id = %id, "Aborting connection");
                handle.abort();
            }
        }
    }
}

/// The relay: a listener, a transport, and the live connections between them.
pub struct HelperServer<T> {
    listener: Listener,
    transport: Arc<T>,
    settings: Arc<ArcSwap<ConnectionSettings>>,
    registry: HandlerRegistry,
}

impl<T: HttpTransport> HelperServer<T> {
    pub fn new(listener: Listener, transport: Arc<T>, settings: Arc<ArcSwap<ConnectionSettings>>) -> Self {
        Self {
            listener,
            transport,
            settings,
            registry: HandlerRegistry::new(),
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.listener.local_addr()
    }

    /// Handle for publishing new connection settings.
    pub fn settings(&self) -> Arc<ArcSwap<ConnectionSettings>> {
        self.settings.clone()
    }

    /// Accept connections until `shutdown` fires.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> Result<(), ListenerError> {
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!(live = self.registry.len(), "Shutdown requested, no longer accepting");
                    break;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer, permit)) => self.spawn(stream, peer, permit),
                    Err(ListenerError::Accept(e)) => {
                        tracing::warn!(error = %e, "Accept failed");
                        tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                    }
                    Err(e) => return Err(e),
                },
            }
        }

        self.registry.abort_all();
        Ok(())
    }

    fn spawn(&mut self, stream: TcpStream, peer: SocketAddr, permit: ConnectionPermit) {
        let purged = self.registry.purge();
        if purged > 0 {
            tracing::trace!(purged, live = self.registry.len(), "Purged finished handlers");
        }

        let id = ConnectionId::new();
        let settings = ConnectionSettings::clone(&self.settings.load());
        let handler = ConnectionHandler::new(id, stream, self.transport.clone(), settings);
        let span = tracing::info_span!("connection", id = %id, peer = %peer);

        let handle = tokio::spawn(
            async move {
                let _permit = permit;
                let outcome = handler.run().await;
                tracing::debug!(outcome = outcome.label(), "Connection closed");
            }
            .instrument(span),
        );
        self.registry.insert(id, handle);
    }
}
