//! `RollcallServer` builder and server loop.
//!
//! This is the entry point for running a Rollcall server. It ties together
//! all the layers: transport → protocol → session engine → record store,
//! plus the background rotation sweep.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rollcall_protocol::{Codec, JsonCodec};
use rollcall_session::{Authenticator, SessionConfig, SessionEngine};
use rollcall_store::RecordStore;
use rollcall_sweep::{SweepConfig, spawn_sweeper};
use rollcall_transport::{Transport, WebSocketTransport};

use crate::RollcallError;
use crate::config::ServerConfig;
use crate::handler::handle_connection;

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks. The engine
/// does its own locking, so nothing here needs a `Mutex`.
pub(crate) struct ServerState<A: Authenticator, S: RecordStore, C: Codec> {
    pub(crate) engine: SessionEngine<S>,
    pub(crate) auth: A,
    pub(crate) codec: C,
    pub(crate) idle_timeout: Duration,
}

/// Builder for configuring and starting a Rollcall server.
///
/// # Example
///
/// ```rust,ignore
/// use rollcall::prelude::*;
///
/// let server = RollcallServerBuilder::new()
///     .bind("0.0.0.0:8080")
///     .build(TeacherDirectory::new(), MemoryRecordStore::spawn())
///     .await?;
/// server.run().await
/// ```
pub struct RollcallServerBuilder {
    bind_addr: String,
    session_config: SessionConfig,
    sweep_config: SweepConfig,
    idle_timeout: Duration,
}

impl RollcallServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::from_config(&ServerConfig::default())
    }

    /// Creates a builder from a loaded [`ServerConfig`].
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            bind_addr: config.bind_addr.clone(),
            session_config: config.session.clone(),
            sweep_config: config.sweep.clone(),
            idle_timeout: config.idle_timeout,
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the session configuration.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Sets the rotation sweep configuration. `SweepConfig::default()`
    /// disables the sweep.
    pub fn sweep(mut self, config: SweepConfig) -> Self {
        self.sweep_config = config;
        self
    }

    /// Closes connections that stay silent longer than `timeout`.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Binds the listener and assembles the server.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build<A, S>(
        self,
        auth: A,
        store: S,
    ) -> Result<RollcallServer<A, S, JsonCodec>, RollcallError>
    where
        A: Authenticator,
        S: RecordStore,
    {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let state = Arc::new(ServerState {
            engine: SessionEngine::new(self.session_config, store),
            auth,
            codec: JsonCodec,
            idle_timeout: self.idle_timeout,
        });

        Ok(RollcallServer {
            transport,
            state,
            sweep_config: self.sweep_config,
        })
    }
}

impl Default for RollcallServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Rollcall server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct RollcallServer<A: Authenticator, S: RecordStore, C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<A, S, C>>,
    sweep_config: SweepConfig,
}

impl<A, S, C> RollcallServer<A, S, C>
where
    A: Authenticator,
    S: RecordStore,
    C: Codec,
{
    /// Creates a new builder.
    pub fn builder() -> RollcallServerBuilder {
        RollcallServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// The session engine every connection shares.
    pub fn engine(&self) -> &SessionEngine<S> {
        &self.state.engine
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), RollcallError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` resolves, then stops the sweep
    /// and the listener. Connections already being served finish on their
    /// own tasks.
    pub async fn run_until(
        mut self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), RollcallError> {
        let sweeper = self.sweep_config.interval.map(|_| {
            let state = Arc::clone(&self.state);
            spawn_sweeper(self.sweep_config.clone(), move || {
                let state = Arc::clone(&state);
                async move { state.engine.rotate_expired().await }
            })
        });

        tracing::info!(
            addr = ?self.transport.local_addr().ok(),
            scope = %self.state.engine.config().scope,
            "Rollcall server running"
        );

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.transport.accept() => match accepted {
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
                },
            }
        }

        if let Some(sweeper) = sweeper {
            let metrics = sweeper.stop().await;
            tracing::info!(
                sweeps = metrics.total_sweeps,
                rotated = metrics.total_rotated,
                "rotation sweep stopped"
            );
        }
        self.transport.shutdown().await?;
        tracing::info!("Rollcall server stopped");
        Ok(())
    }
}
