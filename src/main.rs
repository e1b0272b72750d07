//! hitch demo server.
//!
//! ```text
//!     Client ──▶ net::Listener ──▶ http::HttpServer ──▶ ResponderChain
//!                 (slots)           (head, dispatch,      │
//!                                    write, hijack)       ├─▶ routing::Router
//!                                                         │     /hello-world
//!                                                         │     /status
//!                                                         │     /ws ──▶ websocket::WebSocket
//!                                                         ├─▶ web::FileServer (--static)
//!                                                         └─▶ 404
//! ```

use std::path::PathBuf;

use clap::Parser;

use hitch::config::{load_config, validate_config, ConfigError, ServerConfig};
use hitch::http::{HandlerError, Request, ResponderChain, Response, StatusCode, SERVER_NAME};
use hitch::lifecycle::{self, Shutdown};
use hitch::net::ConnectionTracker;
use hitch::routing::{Params, Router};
use hitch::web::FileServer;
use hitch::websocket::{self, WebSocket};
use hitch::HttpServer;

#[derive(Debug, Parser)]
#[command(name = "hitch", version, about = "HTTP/1.1 server with WebSocket hijacking")]
struct Args {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on, overriding the configuration.
    #[arg(short, long)]
    bind: Option<String>,

    /// Maximum concurrent connection lifecycles.
    #[arg(long)]
    max_connections: Option<usize>,

    /// Directory to serve static files from. May be repeated.
    #[arg(long = "static", value_name = "DIR")]
    static_dirs: Vec<PathBuf>,

    /// File served for `/` from the static directories.
    #[arg(long, requires = "static_dirs")]
    index: Option<String>,
}

fn resolve_config(args: &Args) -> Result<ServerConfig, ConfigError> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };

    if let Some(bind) = &args.bind {
        config.listener.bind_address = bind.clone();
    }
    if let Some(max) = args.max_connections {
        config.listener.max_connections = max;
    }

    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

async fn hello_world(request: Request, _params: Params) -> Result<Response, HandlerError> {
    let params = request.query_params();
    let world = params
        .get("world")
        .and_then(|value| value.as_str())
        .unwrap_or("Earth");

    let mut response = Response::new().with_body(format!("hello from {}!", world));
    response.add_standard_headers();
    response.set_header("content-type", "text/plain; charset=utf-8");
    Ok(response)
}

fn status(tracker: &ConnectionTracker) -> Response {
    let body = serde_json::json!({
        "server": SERVER_NAME,
        "active_connections": tracker.active_count(),
        "peak_connections": tracker.peak_count(),
    });
    let mut response = Response::new().with_body(body.to_string());
    response.add_standard_headers();
    response.no_cache();
    response.set_header("content-type", "application/json");
    response
}

fn echo(session: &WebSocket) {
    session.on_start(|ws| async move {
        tracing::info!(protocol = ?ws.protocol(), "WebSocket session started");
    });
    session.on_message(|ws, message| async move {
        if let Err(e) = ws.send(&message).await {
            tracing::debug!(error = %e, "Echo failed");
        }
    });
    session.on_close(|_ws| async move {
        tracing::info!("WebSocket session closed");
    });
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = resolve_config(&args)?;

    lifecycle::init_tracing(&config.observability);

    tracing::info!("{} starting", SERVER_NAME);
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        header_read_secs = config.timeouts.header_read_secs,
        "Configuration loaded"
    );

    let tracker = ConnectionTracker::new();
    let ws_config = config.websocket.clone();

    let router = Router::new()
        .get("/hello-world", hello_world)
        .get("/status", {
            let tracker = tracker.clone();
            move |_request: Request, _params: Params| {
                let response = status(&tracker);
                async move { Ok::<_, HandlerError>(response) }
            }
        })
        .get("/ws", move |request: Request, _params: Params| {
            let ws_config = ws_config.clone();
            async move {
                match websocket::upgrade(&request, &ws_config) {
                    Some((response, session)) => {
                        echo(&session);
                        Ok::<_, HandlerError>(response)
                    }
                    None => Ok(Response::generic(
                        StatusCode::BAD_REQUEST,
                        Some("WebSocket upgrade required".to_string()),
                    )),
                }
            }
        });

    let mut responders = ResponderChain::new().with(router);
    if !args.static_dirs.is_empty() {
        let mut files = FileServer::new(&args.static_dirs);
        if let Some(index) = &args.index {
            files = files.with_index(index.clone());
        }
        tracing::info!(paths = ?files.base_paths(), "Serving static files");
        responders.push(files);
    }

    let shutdown = Shutdown::new();
    let server = HttpServer::with_tracker(config, responders, tracker);
    let running = lifecycle::launch(server, &shutdown).await?;
    tracing::info!(address = %running.local_addr(), "Listening for connections");

    lifecycle::shutdown_on_signal(&shutdown).await;
    running.wait().await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
