//! Error types for schema extraction and DTO mapping.

use std::path::PathBuf;
use thiserror::Error;

/// Errors while locating, reading or extracting a schema declaration.
#[derive(Debug, Error)]
pub enum SchemaError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Declaration errors (exit code 2)
    #[error("schema '{schema}' not found")]
    SchemaNotFound { schema: String },

    #[error("schema '{schema}' has no property declaration block")]
    MissingSchemaDeclaration { schema: String },

    #[error("invalid schema source: {message}")]
    InvalidSource { message: String },
}

impl SchemaError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            SchemaError::FileNotFound { .. } | SchemaError::ReadError { .. } => 3,
            _ => 2,
        }
    }
}

/// Errors while mapping input data onto a schema.
#[derive(Debug, Error)]
pub enum MapError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("missing value for property '{schema}::{property}'")]
    MissingValue { schema: String, property: String },

    #[error("unknown property '{key}' in schema '{schema}'")]
    UnknownProperty { schema: String, key: String },

    #[error(transparent)]
    UnexpectedType(#[from] UnexpectedType),

    #[error("cannot map {actual} onto schema '{schema}': expected an object")]
    NotAnObject { schema: String, actual: String },

    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },
}

impl MapError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            MapError::Schema(e) => e.exit_code(),
            MapError::InvalidJson { .. } => 2,
            _ => 1,
        }
    }
}

/// A value, raw or processed, that matches none of a property's declared types.
///
/// Carries the rendered raw and processed values so the diagnostic can be
/// printed without access to the failing property.
#[derive(Debug, Clone, Error)]
#[error(
    "invalid type: expected '{property}' to be {expectation}. Got `{raw}` ({raw_type}) -> `{processed}` ({processed_type}) instead",
    expectation = describe_expected(.expected)
)]
pub struct UnexpectedType {
    pub property: String,
    pub expected: Vec<String>,
    pub raw: String,
    pub raw_type: String,
    pub processed: String,
    pub processed_type: String,
}

fn describe_expected(expected: &[String]) -> String {
    let names = expected.join("', '");
    if expected.len() == 1 {
        format!("of type '{}'", names)
    } else {
        format!("one of these types: '{}'", names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unexpected(expected: &[&str]) -> UnexpectedType {
        UnexpectedType {
            property: "age".into(),
            expected: expected.iter().map(|s| s.to_string()).collect(),
            raw: "3.14".into(),
            raw_type: "float".into(),
            processed: "3.14".into(),
            processed_type: "float".into(),
        }
    }

    #[test]
    fn schema_error_exit_codes() {
        let err = SchemaError::FileNotFound {
            path: PathBuf::from("user.dto"),
        };
        assert_eq!(err.exit_code(), 3);

        let err = SchemaError::SchemaNotFound {
            schema: "app.User".into(),
        };
        assert_eq!(err.exit_code(), 2);

        let err = SchemaError::MissingSchemaDeclaration {
            schema: "app.User".into(),
        };
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn map_error_exit_codes() {
        let err = MapError::MissingValue {
            schema: "app.User".into(),
            property: "name".into(),
        };
        assert_eq!(err.exit_code(), 1);

        let err = MapError::from(SchemaError::FileNotFound {
            path: PathBuf::from("user.dto"),
        });
        assert_eq!(err.exit_code(), 3);

        let err = MapError::from(unexpected(&["int"]));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn unexpected_type_single_type_message() {
        let err = unexpected(&["int"]);
        assert_eq!(
            err.to_string(),
            "invalid type: expected 'age' to be of type 'int'. Got `3.14` (float) -> `3.14` (float) instead"
        );
    }

    #[test]
    fn unexpected_type_union_message() {
        let err = unexpected(&["int", "string"]);
        assert!(err
            .to_string()
            .contains("to be one of these types: 'int', 'string'."));
    }

    #[test]
    fn missing_value_display() {
        let err = MapError::MissingValue {
            schema: "app.User".into(),
            property: "name".into(),
        };
        assert_eq!(err.to_string(), "missing value for property 'app.User::name'");
    }
}
