//! Template parsing and evaluation
//!
//! This module is the boundary between the tracer and the templating
//! language: an expression AST, a parser, a value model and an `Engine`
//! trait the analyzers delegate every evaluation to.

pub mod ast;
pub mod engine;
pub mod funcs;
pub mod parser;
pub mod value;

pub use engine::{render_or_placeholder, DataContext, Engine, Rendered, TemplateEngine};
pub use value::Value;
