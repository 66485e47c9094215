//! Dry-run compilation
//!
//! This module walks the execution tree a real run would follow and feeds
//! every observation into the tracer, without executing anything.

pub mod compile;

pub use compile::Compiler;
