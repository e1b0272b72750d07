//! HTTP/1.1 server library with connection hijacking and WebSocket sessions.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod routing;
pub mod web;
pub mod websocket;

pub use config::ServerConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
