//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize logging from the environment or the configured level
//! - Bind the listener described by the server's configuration
//! - Start the accept loop in the background
//!
//! # Design Decisions
//! - Fail fast: a bind error is returned before anything runs
//! - The caller keeps the `Shutdown` and decides when to stop

use std::net::SocketAddr;

use tokio::task::JoinHandle;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;
use crate::http::HttpServer;
use crate::lifecycle::Shutdown;
use crate::net::{Listener, ListenerError};

/// Install the global tracing subscriber. `RUST_LOG` wins over the
/// configured level.
pub fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("hitch={}", config.log_level)));

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
    if installed.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}

/// A server whose accept loop is running in the background.
#[derive(Debug)]
pub struct RunningServer {
    local_addr: SocketAddr,
    server: HttpServer,
    handle: JoinHandle<Result<(), ListenerError>>,
}

impl RunningServer {
    /// Address actually bound, useful when the port was 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn server(&self) -> &HttpServer {
        &self.server
    }

    /// Wait for the accept loop to stop and in-flight lifecycles to drain.
    pub async fn wait(self) -> Result<(), ListenerError> {
        self.handle.await.map_err(ListenerError::Task)?
    }
}

/// Bind the configured listener and start serving.
pub async fn launch(server: HttpServer, shutdown: &Shutdown) -> Result<RunningServer, ListenerError> {
    let listener = Listener::bind(&server.config().listener).await?;
    let local_addr = listener.local_addr().map_err(ListenerError::Bind)?;

    let shutdown_rx = shutdown.subscribe();
    let handle = {
        let server = server.clone();
        tokio::spawn(async move { server.run(listener, shutdown_rx).await })
    };

    Ok(RunningServer {
        local_addr,
        server,
        handle,
    })
}
