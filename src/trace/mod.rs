//! Dry-run tracing and reporting
//!
//! The tracer records what a dry run observes (variable provenance,
//! rendered expressions, commands, dependencies), the analyzers reconstruct
//! how each value came to be, and the renderers turn the finalized report
//! into text or JSON.

pub mod diagnostics;
pub mod highlight;
pub mod model;
pub mod pipes;
pub mod render;
pub mod render_json;
pub mod steps;
pub mod tracer;

pub use model::{Origin, Report, VarObservation};
pub use render::{ColorChoice, RenderOptions, Style};
pub use tracer::Tracer;
