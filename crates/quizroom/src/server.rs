//! `QuizroomServer` builder and accept loop.
//!
//! This ties the layers together: transport → protocol → coordinator.
//! Each accepted connection gets its own handler task; an optional
//! background sweep reclaims rooms abandoned without clean leaves.

use std::sync::Arc;
use std::time::Duration;

use quizroom_protocol::{Codec, JsonCodec};
use quizroom_session::SessionCoordinator;
use quizroom_transport::{Transport, WebSocketTransport};

use crate::QuizroomError;
use crate::handler::handle_connection;

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) coordinator: SessionCoordinator,
    pub(crate) codec: C,
}

/// Builder for configuring and starting a Quizroom server.
///
/// # Example
///
/// ```rust,no_run
/// use quizroom::prelude::*;
/// use std::time::Duration;
///
/// # async fn run() -> Result<(), QuizroomError> {
/// let server = QuizroomServerBuilder::new()
///     .bind("0.0.0.0:8080")
///     .idle_room_timeout(Duration::from_secs(1800))
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct QuizroomServerBuilder {
    bind_addr: String,
    idle_room_timeout: Option<Duration>,
}

impl QuizroomServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            idle_room_timeout: None,
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Enables idle-room reclamation: rooms with no activity for this
    /// long are destroyed by a background sweep. Off by default;
    /// abandoned rooms then disappear only via the last-leaver rule.
    pub fn idle_room_timeout(mut self, timeout: Duration) -> Self {
        self.idle_room_timeout = Some(timeout);
        self
    }

    /// Builds the server. Uses `JsonCodec` over WebSocket.
    pub async fn build(self) -> Result<QuizroomServer<JsonCodec>, QuizroomError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let state = Arc::new(ServerState {
            coordinator: SessionCoordinator::new(),
            codec: JsonCodec,
        });

        Ok(QuizroomServer {
            transport,
            state,
            idle_room_timeout: self.idle_room_timeout,
        })
    }
}

impl Default for QuizroomServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running Quizroom server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct QuizroomServer<C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
    idle_room_timeout: Option<Duration>,
}

impl<C: Codec> QuizroomServer<C> {
    /// Creates a new builder.
    pub fn builder() -> QuizroomServerBuilder {
        QuizroomServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the server accept loop.
    ///
    /// Accepts incoming connections and spawns a handler task for each.
    /// Runs until the process is terminated.
    pub async fn run(mut self) -> Result<(), QuizroomError> {
        tracing::info!("Quizroom server running");

        if let Some(timeout) = self.idle_room_timeout {
            let state = Arc::clone(&self.state);
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(timeout);
                // The first tick fires immediately; skip it.
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    let reaped = state.coordinator.reap_idle(timeout).await;
                    if !reaped.is_empty() {
                        tracing::info!(count = reaped.len(), "reaped idle rooms");
                    }
                }
            });
        }

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
