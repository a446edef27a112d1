//! Landmark CLI library
//!
//! Everything the `landmark` binary uses, exposed for integration tests.

pub mod config;
pub mod error;
pub mod file_discovery;
pub mod orchestrators;
pub mod paths;
pub mod progress;
pub mod terminal;
