//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Init tracing → Bind listener → Spawn accept loop
//!
//! Shutdown (shutdown.rs):
//!     Trigger → Stop accepting → Wait for in-flight connections
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then logging, then the listener
//! - Hijacked connections are not tracked once handed off

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::{shutdown_on_signal, wait_for_signal};
pub use startup::{init_tracing, launch, RunningServer};
