//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Request (verb, path)
//!     → router.rs (routes for the verb, in registration order)
//!     → matcher.rs (compiled pattern vs path, captures)
//!     → handler(request, params) or decline
//! ```
//!
//! # Design Decisions
//! - Routes registered at startup, immutable at runtime
//! - Deterministic: same input always matches same route
//! - First match wins

pub mod matcher;
pub mod router;

pub use matcher::{Matcher, Params, PathPattern};
pub use router::Router;
