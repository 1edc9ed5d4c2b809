#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use colmap::mapping::{ColumnMapping, SourceColumn};
use tempfile::{TempDir, tempdir};

pub const ORDERS: &str = "sales.orders";

/// Columns of the `sales.orders` example table.
pub fn order_columns() -> Vec<SourceColumn> {
    vec![
        SourceColumn::new("id", "int"),
        SourceColumn::new("updated_at", "timestamp"),
    ]
}

pub fn mapping(source: &str, target: &str, transformation: &str) -> ColumnMapping {
    let mut mapping = ColumnMapping::direct(source);
    mapping.target = target.to_string();
    mapping.transformation = transformation.to_string();
    mapping
}

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Path of a file under the workspace without creating it.
    pub fn file(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.file(name);
        fs::write(&path, contents).expect("write temp file contents");
        path
    }

    pub fn read(&self, name: &str) -> String {
        fs::read_to_string(self.file(name)).expect("read temp file")
    }
}
