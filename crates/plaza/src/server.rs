//! `PlazaServer` builder and accept loop.
//!
//! This is the entry point for running a Plaza presence server. It ties
//! together the layers: transport → protocol → registry → directory.

use std::sync::Arc;

use plaza_directory::{IdentityStore, RoomCatalog};
use plaza_protocol::JsonCodec;
use plaza_registry::SessionRegistry;
use plaza_transport::{Transport, WebSocketTransport};
use tokio::sync::Mutex;

use crate::handler::handle_connection;
use crate::validate::{AllowAll, MoveValidator};
use crate::PlazaError;

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks. The registry
/// is the only mutable piece; lock scopes stay short because outbound
/// delivery goes through per-connection channels, never network I/O under
/// the lock.
pub(crate) struct ServerState<I: IdentityStore, R: RoomCatalog, V: MoveValidator> {
    pub(crate) registry: Mutex<SessionRegistry>,
    pub(crate) identity: I,
    pub(crate) catalog: R,
    pub(crate) validator: V,
    pub(crate) codec: JsonCodec,
}

/// Builder for configuring and starting a Plaza server.
///
/// # Example
///
/// ```rust,ignore
/// use plaza::prelude::*;
///
/// let server = PlazaServer::builder()
///     .bind("0.0.0.0:8080")
///     .build(identity_store, room_catalog)
///     .await?;
/// server.run().await
/// ```
pub struct PlazaServerBuilder {
    bind_addr: String,
}

impl PlazaServerBuilder {
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Builds the server with the default [`AllowAll`] move validator.
    pub async fn build<I: IdentityStore, R: RoomCatalog>(
        self,
        identity: I,
        catalog: R,
    ) -> Result<PlazaServer<I, R, AllowAll>, PlazaError> {
        self.build_with_validator(identity, catalog, AllowAll).await
    }

    /// Builds the server with a custom move validator.
    pub async fn build_with_validator<I, R, V>(
        self,
        identity: I,
        catalog: R,
        validator: V,
    ) -> Result<PlazaServer<I, R, V>, PlazaError>
    where
        I: IdentityStore,
        R: RoomCatalog,
        V: MoveValidator,
    {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let state = Arc::new(ServerState {
            registry: Mutex::new(SessionRegistry::new()),
            identity,
            catalog,
            validator,
            codec: JsonCodec,
        });

        Ok(PlazaServer { transport, state })
    }
}

impl Default for PlazaServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running Plaza presence server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct PlazaServer<I: IdentityStore, R: RoomCatalog, V: MoveValidator> {
    transport: WebSocketTransport,
    state: Arc<ServerState<I, R, V>>,
}

impl<I, R, V> PlazaServer<I, R, V>
where
    I: IdentityStore,
    R: RoomCatalog,
    V: MoveValidator,
{
    /// Creates a new builder.
    pub fn builder() -> PlazaServerBuilder {
        PlazaServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    ///
    /// Needed when binding to port 0 to discover the OS-assigned port.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the server accept loop.
    ///
    /// Accepts incoming connections and spawns a handler task for each.
    /// Runs until the process is terminated.
    pub async fn run(mut self) -> Result<(), PlazaError> {
        tracing::info!("Plaza server running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
