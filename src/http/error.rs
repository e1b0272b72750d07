//! Error types for the HTTP codec.

use thiserror::Error;

/// Boxed error returned by request handlers and deferred body parts.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Failures while reading a request off the wire.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("line exceeds {0} bytes")]
    LineTooLong(usize),

    #[error("connection closed before end of line")]
    UnexpectedEof,

    #[error("carriage return not followed by line feed")]
    MissingLf,

    #[error("malformed request line: {0:?}")]
    MalformedRequestLine(String),

    #[error("malformed header line: {0:?}")]
    MalformedHeader(String),

    #[error("invalid content-length: {0:?}")]
    InvalidContentLength(String),

    #[error("request body exceeds {0} bytes")]
    BodyTooLarge(usize),

    #[error("request body was already read")]
    BodyAlreadyRead,

    #[error("timed out reading request")]
    Timeout,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures while writing a response.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("deferred body part failed: {0}")]
    Producer(HandlerError),
}

/// Returned by a strict header lookup when the header is absent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("missing header: {0}")]
pub struct MissingHeader(pub String);
