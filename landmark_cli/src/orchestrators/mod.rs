//! Command orchestrators
//!
//! Orchestrators sit between argument parsing and the core library.

pub mod identify_orchestrator;
