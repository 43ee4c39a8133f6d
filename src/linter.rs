//! Schema linting - static analysis of `.dto` declaration sources.
//!
//! Checks source files for:
//! - Unreadable files and sources without a `schema` line
//! - Missing property declaration blocks
//! - Parents that do not resolve, and inheritance cycles
//! - Property types that are neither primitive nor a known schema

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::declaration::SchemaSource;
use crate::error::SchemaError;
use crate::loader::{collect_source_files, load_source};
use crate::registry::SchemaRegistry;
use crate::resolver::{resolve_aliases, resolve_name};
use crate::types::{is_primitive, COLLECTION_MARKER};

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A single diagnostic message from linting.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: String,
    pub file: PathBuf,
    /// Where in the source the issue is (e.g., "schema", "$addresses")
    pub location: String,
    pub message: String,
}

/// Result of linting a single file.
#[derive(Debug, Clone, Serialize)]
pub struct FileResult {
    pub file: PathBuf,
    pub status: FileStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

/// Status of a linted file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Ok,
    Error,
    Warning,
}

/// Result of linting a directory or set of files.
#[derive(Debug, Clone, Serialize)]
pub struct LintResult {
    pub path: PathBuf,
    pub files_checked: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub warnings: usize,
    pub results: Vec<FileResult>,
}

impl LintResult {
    /// Returns true if all files passed (no errors).
    pub fn is_ok(&self) -> bool {
        self.errors == 0
    }
}

/// Lint a file or directory.
///
/// If path is a directory, recursively finds all `.dto` files; names are
/// resolved against every source found there. If `strict` is true, warnings
/// are treated as errors.
pub fn lint(path: &Path, strict: bool) -> LintResult {
    let files = collect_source_files(path);
    let registry = registry_for(&files);
    let mut results = Vec::new();
    let mut total_errors = 0;
    let mut total_warnings = 0;

    for file in &files {
        let file_result = lint_with(file, path, &registry);
        total_errors += count(&file_result, Severity::Error);
        total_warnings += count(&file_result, Severity::Warning);
        results.push(file_result);
    }

    let failed = results
        .iter()
        .filter(|r| {
            if strict {
                r.status != FileStatus::Ok
            } else {
                r.status == FileStatus::Error
            }
        })
        .count();

    LintResult {
        path: path.to_path_buf(),
        files_checked: files.len(),
        passed: files.len() - failed,
        failed,
        errors: total_errors,
        warnings: total_warnings,
        results,
    }
}

/// Lint a single source file.
///
/// Names are resolved against the sources under `base_path` (or, if that is
/// a file, under its directory).
pub fn lint_file(file: &Path, base_path: &Path) -> FileResult {
    let root = if base_path.is_dir() {
        base_path
    } else {
        base_path.parent().unwrap_or(Path::new("."))
    };
    let registry = registry_for(&collect_source_files(root));
    lint_with(file, base_path, &registry)
}

fn registry_for(files: &[PathBuf]) -> SchemaRegistry {
    let registry = SchemaRegistry::new();
    for file in files {
        // Unloadable files are reported by their own lint pass.
        if let Ok(source) = load_source(file) {
            registry.register(source);
        }
    }
    registry
}

fn count(result: &FileResult, severity: Severity) -> usize {
    result
        .diagnostics
        .iter()
        .filter(|d| d.severity == severity)
        .count()
}

fn lint_with(file: &Path, base_path: &Path, registry: &SchemaRegistry) -> FileResult {
    let mut diagnostics = Vec::new();
    let display = file.strip_prefix(base_path).unwrap_or(file).to_path_buf();

    let source = match load_source(file) {
        Ok(source) => source,
        Err(e) => {
            diagnostics.push(Diagnostic {
                severity: Severity::Error,
                code: "E001".to_string(),
                file: file.to_path_buf(),
                location: "/".to_string(),
                message: e.to_string(),
            });
            return FileResult {
                file: display,
                status: FileStatus::Error,
                diagnostics,
            };
        }
    };

    if source.declaration_block().is_none() {
        diagnostics.push(Diagnostic {
            severity: Severity::Error,
            code: "E002".to_string(),
            file: file.to_path_buf(),
            location: "schema".to_string(),
            message: format!(
                "schema '{}' has no /** ... */ block before its `schema` line",
                source.id()
            ),
        });
    } else {
        check_hierarchy(&source, file, registry, &mut diagnostics);
        check_property_types(&source, file, registry, &mut diagnostics);
    }

    let has_errors = diagnostics.iter().any(|d| d.severity == Severity::Error);
    let has_warnings = diagnostics.iter().any(|d| d.severity == Severity::Warning);

    let status = if has_errors {
        FileStatus::Error
    } else if has_warnings {
        FileStatus::Warning
    } else {
        FileStatus::Ok
    };

    FileResult {
        file: display,
        status,
        diagnostics,
    }
}

/// Build the schema to surface parent resolution failures and cycles.
fn check_hierarchy(
    source: &SchemaSource,
    file: &Path,
    registry: &SchemaRegistry,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let message = match registry.get_or_build(source.id()) {
        Ok(_) => return,
        Err(SchemaError::SchemaNotFound { schema }) => {
            format!("parent schema '{}' cannot be resolved", schema)
        }
        Err(SchemaError::InvalidSource { message }) => message,
        // Another file with the same identifier is missing its block.
        Err(SchemaError::MissingSchemaDeclaration { schema }) => {
            format!("schema '{}' is declared without a block elsewhere", schema)
        }
        Err(e) => e.to_string(),
    };
    diagnostics.push(Diagnostic {
        severity: Severity::Error,
        code: "E003".to_string(),
        file: file.to_path_buf(),
        location: "schema".to_string(),
        message,
    });
}

fn check_property_types(
    source: &SchemaSource,
    file: &Path,
    registry: &SchemaRegistry,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let aliases = resolve_aliases(source);
    let is_schema = |candidate: &str| registry.contains(candidate);

    for property in source.properties().unwrap_or_default() {
        for alternative in property.raw_types.split('|').map(str::trim) {
            let name = alternative.replace(COLLECTION_MARKER, "");
            if name.is_empty() || is_primitive(&name) {
                continue;
            }
            let (resolved, known) = resolve_name(&name, &aliases, source.namespace(), &is_schema);
            if !known {
                diagnostics.push(Diagnostic {
                    severity: Severity::Warning,
                    code: "W001".to_string(),
                    file: file.to_path_buf(),
                    location: format!("${}", property.name),
                    message: format!(
                        "unknown type \"{}\": not a primitive or a known schema",
                        resolved
                    ),
                });
            }
        }
    }
}
