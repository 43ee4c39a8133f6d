//! Loading of schema declaration sources and JSON payloads from disk.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::declaration::SchemaSource;
use crate::error::{MapError, SchemaError};

/// File extension of schema declaration sources.
pub const SOURCE_EXTENSION: &str = "dto";

/// Load a declaration source from a file path.
///
/// # Errors
///
/// Returns `SchemaError::FileNotFound` if the file doesn't exist,
/// or `SchemaError::InvalidSource` if it has no `schema` declaration.
pub fn load_source(path: &Path) -> Result<SchemaSource, SchemaError> {
    let content = read_file(path)?;
    Ok(SchemaSource::parse(content)?.with_path(path.to_path_buf()))
}

/// Load every `.dto` source under a file or directory, sorted by path.
pub fn load_sources(path: &Path) -> Result<Vec<SchemaSource>, SchemaError> {
    if !path.exists() {
        return Err(SchemaError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    collect_source_files(path)
        .iter()
        .map(|file| load_source(file))
        .collect()
}

/// Load a JSON payload from a file path.
///
/// # Errors
///
/// Returns `MapError::Schema` wrapping an IO error, or
/// `MapError::InvalidJson` if the file isn't valid JSON.
pub fn load_payload(path: &Path) -> Result<Value, MapError> {
    let content = read_file(path)?;
    load_payload_str(&content)
}

/// Load a JSON payload from a string.
pub fn load_payload_str(content: &str) -> Result<Value, MapError> {
    serde_json::from_str(content).map_err(|source| MapError::InvalidJson { source })
}

fn read_file(path: &Path) -> Result<String, SchemaError> {
    if !path.exists() {
        return Err(SchemaError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    std::fs::read_to_string(path).map_err(|source| SchemaError::ReadError {
        path: path.to_path_buf(),
        source,
    })
}

/// Collect `.dto` files: the path itself if it is one, or all files below a directory.
pub fn collect_source_files(path: &Path) -> Vec<PathBuf> {
    if path.is_file() {
        if is_source_file(path) {
            return vec![path.to_path_buf()];
        }
        return vec![];
    }

    let mut files = Vec::new();
    collect_files_recursive(path, &mut files);
    files.sort();
    files
}

fn is_source_file(path: &Path) -> bool {
    path.extension()
        .map(|e| e == SOURCE_EXTENSION)
        .unwrap_or(false)
}

fn collect_files_recursive(dir: &Path, files: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files_recursive(&path, files);
        } else if is_source_file(&path) {
            files.push(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    #[test]
    fn load_source_valid_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "/**\n * @property int $x\n */\nschema Point;").unwrap();

        let source = load_source(file.path()).unwrap();
        assert_eq!(source.id(), "Point");
        assert_eq!(source.path().map(PathBuf::as_path), Some(file.path()));
    }

    #[test]
    fn load_source_file_not_found() {
        let result = load_source(Path::new("/nonexistent/point.dto"));
        assert!(matches!(result, Err(SchemaError::FileNotFound { .. })));
    }

    #[test]
    fn load_source_without_header() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "/** @property int $x */").unwrap();

        let result = load_source(file.path());
        assert!(matches!(result, Err(SchemaError::InvalidSource { .. })));
    }

    #[test]
    fn load_sources_walks_directories() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("geo")).unwrap();
        fs::write(
            dir.path().join("geo/address.dto"),
            "namespace geo;\n/** @property string $street */\nschema Address;",
        )
        .unwrap();
        fs::write(dir.path().join("point.dto"), "/** @property int $x */\nschema Point;").unwrap();
        fs::write(dir.path().join("notes.txt"), "not a schema").unwrap();

        let sources = load_sources(dir.path()).unwrap();
        let ids: Vec<&str> = sources.iter().map(SchemaSource::id).collect();
        assert_eq!(ids, vec!["geo.Address", "Point"]);
    }

    #[test]
    fn load_payload_invalid_json() {
        let result = load_payload_str("not json");
        assert!(matches!(result, Err(MapError::InvalidJson { .. })));
    }

    #[test]
    fn load_payload_missing_file() {
        let result = load_payload(Path::new("/nonexistent/payload.json"));
        assert!(matches!(
            result,
            Err(MapError::Schema(SchemaError::FileNotFound { .. }))
        ));
    }
}
