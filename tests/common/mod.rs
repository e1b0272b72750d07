//! Shared utilities for integration tests.

use std::net::SocketAddr;

use hitch::config::ServerConfig;
use hitch::http::ResponderChain;
use hitch::lifecycle::{self, RunningServer};
use hitch::{HttpServer, Shutdown};

/// A server listening on an ephemeral loopback port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    running: RunningServer,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    #[allow(dead_code)]
    pub fn server(&self) -> &HttpServer {
        self.running.server()
    }

    /// Trigger shutdown and wait for in-flight connections to finish.
    pub async fn stop(self) {
        self.shutdown.trigger();
        self.running.wait().await.unwrap();
    }
}

/// Start a server with default settings apart from `tweak`.
pub async fn start_server<F>(responders: ResponderChain, tweak: F) -> TestServer
where
    F: FnOnce(&mut ServerConfig),
{
    let mut config = ServerConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    tweak(&mut config);

    let shutdown = Shutdown::new();
    let running = lifecycle::launch(HttpServer::new(config, responders), &shutdown)
        .await
        .unwrap();

    TestServer {
        addr: running.local_addr(),
        shutdown,
        running,
    }
}
