//! Tasklens - dry-run diagnostics for YAML taskfiles
//!
//! Tasklens compiles a taskfile the way a runner would, without executing
//! anything, and reports where every variable came from, how every template
//! expression evaluated step by step, and which call produced an anomalous
//! output.

// Public modules
pub mod cli;
pub mod config;
pub mod error;
pub mod runner;
pub mod template;
pub mod trace;

// Re-export commonly used types
pub use error::{LensError, Result};

/// Current version of Tasklens
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
