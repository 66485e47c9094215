//! Taskfile configuration handling

pub mod parse;
pub mod types;

pub use parse::{find_taskfile, find_taskfile_from, parse_taskfile, parse_taskfile_file};
pub use types::{Cmd, Dep, ForSpec, Task, TaskCall, Taskfile, VarMap, VarSpec};
