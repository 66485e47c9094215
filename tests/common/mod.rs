//! Common test utilities

use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Create a temporary directory with a Taskfile.yml
pub fn create_test_taskfile(content: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("Taskfile.yml");
    fs::write(&path, content).unwrap();
    (temp_dir, path)
}

/// Write an extra file next to the taskfile (includes, dotenv files)
pub fn write_sibling(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}
