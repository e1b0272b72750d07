//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Accepted connection
//!     → codec.rs (request line + headers, per-line byte ceiling)
//!     → request.rs (lazy body, query helpers)
//!     → responder.rs (ordered chain, 404 fallback)
//!     → response.rs → codec.rs (serialize, content-length, connection: close)
//!     → close, or hand the connection to a hijack callback
//! ```

pub mod codec;
pub mod error;
pub mod header;
pub mod request;
pub mod responder;
pub mod response;
pub mod server;
pub mod status;

pub use error::{HandlerError, HttpError, MissingHeader, WriteError};
pub use header::{HeaderKind, HeaderStore};
pub use request::{BodyLimits, QueryValue, Request, RequestHead};
pub use responder::{Respond, Responder, ResponderChain};
pub use response::{Body, BodyPart, Response, SERVER_NAME};
pub use server::HttpServer;
pub use status::StatusCode;
