//! Machine-readable report rendering
//!
//! The model structs carry their own serialization attributes, so this is a
//! thin pretty-printing pass over `Report`. Optional fields that were never
//! set are omitted from the output rather than emitted as null.

use std::io::Write;

use crate::error::Result;
use crate::trace::model::Report;

/// Write the report as pretty-printed JSON followed by a newline.
pub fn render_json(w: &mut dyn Write, report: &Report) -> Result<()> {
    serde_json::to_writer_pretty(&mut *w, report)?;
    writeln!(w)?;
    Ok(())
}
