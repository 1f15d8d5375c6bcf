#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use sniffcast::{data::Value, pipeline::Row};
use tempfile::{TempDir, tempdir};

/// Absolute path to a fixture under `tests/data`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

/// Scratch directory removed on drop.
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

    /// Writes `contents` under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }

    /// Writes a one-resource descriptor declaring `fields` as `(name, type)`.
    pub fn write_descriptor(&self, name: &str, fields: &[(&str, &str)]) -> PathBuf {
        let mut yaml = String::from("resources:\n  - name: data\n    schema:\n      fields:\n");
        for (field, field_type) in fields {
            yaml.push_str(&format!(
                "        - name: {field}\n          type: {field_type}\n"
            ));
        }
        self.write(name, &yaml)
    }
}

/// Builds a row of raw string cells; `None` is an empty cell.
pub fn raw_row(cells: &[(&str, Option<&str>)]) -> Row {
    cells
        .iter()
        .map(|(name, value)| (name.to_string(), value.map(Value::from)))
        .collect::<IndexMap<_, _>>()
}
