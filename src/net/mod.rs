//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, slot request)
//!     → connection.rs (split into reader/writer, lifecycle tracking)
//!     → Hand off to HTTP layer once a slot is granted
//! ```
//!
//! # Design Decisions
//! - Backlog bounded at the socket; concurrency bounded by a semaphore
//! - Each lifecycle tracked with an RAII guard
//! - Connections are type-erased so tests can drive in-memory pipes

pub mod connection;
pub mod listener;

pub use connection::{BoxedReader, BoxedWriter, Connection, ConnectionId, ConnectionTracker};
pub use listener::{ConnectionPermit, Listener, ListenerError, SlotRequest};
