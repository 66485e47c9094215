//! Taskfile parsing and discovery

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::types::{Include, Taskfile, VarMap};
use crate::error::{ConfigError, ConfigResult, LensError};

/// Default taskfile names to search for, in priority order
const TASKFILE_NAMES: &[&str] = &[
    "tasklens.yml",
    "tasklens.yaml",
    "Taskfile.yml",
    "Taskfile.yaml",
];

/// Find the taskfile by searching current and parent directories
pub fn find_taskfile() -> ConfigResult<PathBuf> {
    let start = env::current_dir()
        .map_err(|e| ConfigError::Invalid(format!("failed to get current directory: {}", e)))?;
    find_taskfile_from(start)
}

/// Find the taskfile starting from a specific directory
pub fn find_taskfile_from(start_dir: PathBuf) -> ConfigResult<PathBuf> {
    let mut current_dir = start_dir;
    let mut searched = Vec::new();

    loop {
        for file_name in TASKFILE_NAMES {
            let candidate = current_dir.join(file_name);
            searched.push(candidate.display().to_string());
            if candidate.is_file() {
                return Ok(candidate);
            }
        }
        match current_dir.parent() {
            Some(parent) => current_dir = parent.to_path_buf(),
            None => return Err(ConfigError::NotFound(searched.join(", "))),
        }
    }
}

/// Parse a taskfile from a path
pub fn parse_taskfile_file(path: &Path) -> Result<Taskfile, LensError> {
    let contents = fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("failed to read {}: {}", path.display(), e)))?;
    parse_taskfile(&contents)
}

/// Parse a taskfile from a string
pub fn parse_taskfile(yaml: &str) -> Result<Taskfile, LensError> {
    let taskfile: Taskfile = serde_yaml::from_str(yaml)?;
    Ok(taskfile)
}

/// An include resolved to its parsed taskfile.
#[derive(Debug)]
pub struct ResolvedInclude {
    pub namespace: String,
    pub vars: VarMap,
    pub taskfile: Taskfile,
}

/// Load every include of `taskfile`, resolving paths against `base_dir`.
/// Results come back sorted by namespace so traces are deterministic.
pub fn resolve_includes(
    taskfile: &Taskfile,
    base_dir: &Path,
) -> Result<Vec<ResolvedInclude>, LensError> {
    let mut namespaces: Vec<&String> = taskfile.includes.keys().collect();
    namespaces.sort();

    let mut resolved = Vec::with_capacity(namespaces.len());
    for namespace in namespaces {
        let include = &taskfile.includes[namespace];
        let path = base_dir.join(include.taskfile_path());
        let contents = fs::read_to_string(&path).map_err(|e| ConfigError::IncludeFile {
            path: path.clone(),
            error: e.to_string(),
        })?;
        let included: Taskfile =
            serde_yaml::from_str(&contents).map_err(|e| ConfigError::IncludeFile {
                path: path.clone(),
                error: e.to_string(),
            })?;
        resolved.push(ResolvedInclude {
            namespace: namespace.clone(),
            vars: include_vars(include),
            taskfile: included,
        });
    }
    Ok(resolved)
}

fn include_vars(include: &Include) -> VarMap {
    include.vars().cloned().unwrap_or_default()
}
