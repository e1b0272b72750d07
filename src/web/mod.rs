//! Ready-made responders.

pub mod file_server;

pub use file_server::{content_type_for, FileServer};
