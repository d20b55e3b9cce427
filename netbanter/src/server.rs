use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::api::router;
use crate::config::{ServerConfig, ServerConfigCli};
use crate::signal::shutdown_signal;
use crate::ws::ChatState;

pub struct BanterServer {
    pub state: Arc<ChatState>,
    pub cancel_token: CancellationToken,
    listener: TcpListener,
    shutdown_timeout: Duration,
}

/// Stops a running server from outside its task
#[derive(Debug, Clone)]
pub struct ServerHandle {
    cancel_token: CancellationToken,
}

impl ServerHandle {
    /// Stop accepting connections and close every session
    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }
}

impl BanterServer {
    pub async fn main(cli: ServerConfigCli) {
        match ServerConfig::new(&cli) {
            Ok(config) => {
                let _guard = match config.setup_tracing_subscriber() {
                    Ok(guard) => guard,
                    Err(e) => {
                        eprintln!("{}", e);
                        return;
                    }
                };
                match Self::setup(config).await {
                    Ok(server) => {
                        if let Err(e) = server.run().await {
                            tracing::error!("{}", e);
                        }
                    }
                    Err(e) => {
                        tracing::error!("{}", e);
                    }
                }
            }
            Err(e) => {
                eprintln!("{}", e);
            }
        }
    }

    /// Bind the listener. Failing to bind is the one fatal error.
    pub async fn setup(config: ServerConfig) -> crate::error::Result<Self> {
        tracing::debug!("Server is setting up");
        let cancel_token = CancellationToken::new();
        let state = Arc::new(ChatState::new(
            config.outbound_queue_capacity,
            config.max_frame_size,
            cancel_token.clone(),
        ));
        let listener = TcpListener::bind(config.bind).await?;
        Ok(Self {
            state,
            cancel_token,
            listener,
            shutdown_timeout: config.shutdown_timeout,
        })
    }

    pub fn local_addr(&self) -> crate::error::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            cancel_token: self.cancel_token.clone(),
        }
    }

    /// Accept connections until shutdown, then force-close every session and
    /// wait for them to finish, up to the configured timeout.
    pub async fn run(self) -> crate::error::Result<()> {
        tracing::debug!("Server is running");
        let BanterServer {
            state,
            cancel_token,
            listener,
            shutdown_timeout,
        } = self;
        let addr = listener.local_addr()?;
        let app = router(state.clone());
        tracing::info!("Server is listening on: {}", addr);

        let signal = {
            let cancel_token = cancel_token.clone();
            async move {
                shutdown_signal(cancel_token.clone()).await;
                // Upgraded connections are detached from the HTTP server,
                // so they are closed through their tokens.
                cancel_token.cancel();
            }
        };
        // Accept errors are logged by axum and the loop keeps going.
        if let Err(e) = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(signal)
        .await
        {
            tracing::error!("Server error: {}", e);
        }
        tracing::info!("Server shutdown signal received");
        cancel_token.cancel();

        state.tracker.close();
        if tokio::time::timeout(shutdown_timeout, state.tracker.wait())
            .await
            .is_err()
        {
            tracing::warn!(
                remaining = state.tracker.len(),
                "Timed out waiting for sessions to close"
            );
        }
        let participants = state.registry.count().await;
        tracing::info!(participants, "Server stopped");
        Ok(())
    }
}
