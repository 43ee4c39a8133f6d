//! Parsing of schema declaration sources.
//!
//! A declaration source looks like:
//!
//! ```text
//! namespace app.users;
//!
//! import app.geo.Address;
//! import app.geo.Country as Nation;
//!
//! /**
//!  * @property string $name
//!  * @property-read int|null $age
//!  * @property Address[] $addresses
//!  */
//! schema User extends Person;
//! ```

use std::path::PathBuf;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::SchemaError;

/// Base type every schema implicitly extends; the ancestor walk stops here.
pub const ROOT_SCHEMA: &str = "Dto";

// - Start with "@property" or "@property-read"
// - Capture the union type, each alternative with a possible "[]" suffix
// - Capture the property name, "$foo" or "foo"
static RE_PROPERTY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"@property(?:-read)?\s+((?:[\w.]+(?:\[\])?\|?)+)\s+\$?(\w+)")
        .expect("property pattern is valid")
});

static RE_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^import\s+(\.?[\w.]+)(?:\s+as\s+(\w+))?\s*;").expect("import pattern is valid")
});

static RE_NAMESPACE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*namespace\s+([\w.]+)\s*;").expect("namespace pattern is valid")
});

static RE_SCHEMA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*schema\s+(\w+)(?:\s+extends\s+(\.?[\w.]+))?\s*[;{]?\s*$")
        .expect("schema pattern is valid")
});

/// An `import` statement: canonical path plus the short name it binds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    pub path: String,
    pub alias: String,
}

/// One `@property` line: name and raw union-type expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawProperty {
    pub name: String,
    pub raw_types: String,
}

/// A registered declaration source, header parsed eagerly.
#[derive(Debug, Clone)]
pub struct SchemaSource {
    id: String,
    name: String,
    namespace: String,
    parent: Option<String>,
    text: String,
    schema_line: usize,
    path: Option<PathBuf>,
}

impl SchemaSource {
    /// Parse the namespace and `schema` header of a declaration source.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::InvalidSource` if no `schema <Name>` line exists.
    pub fn parse(text: impl Into<String>) -> Result<Self, SchemaError> {
        let text = text.into();
        let header = RE_SCHEMA
            .captures(&text)
            .ok_or_else(|| SchemaError::InvalidSource {
                message: "missing `schema <Name>` declaration".to_string(),
            })?;

        let name = header[1].to_string();
        let parent = header.get(2).map(|m| m.as_str().to_string());
        let schema_line = header.get(0).map(|m| m.start()).unwrap_or(0);
        let namespace = RE_NAMESPACE
            .captures(&text[..schema_line])
            .map(|c| c[1].to_string())
            .unwrap_or_default();
        let id = qualify(&namespace, &name);

        Ok(Self {
            id,
            name,
            namespace,
            parent,
            text,
            schema_line,
            path: None,
        })
    }

    pub(crate) fn with_path(mut self, path: PathBuf) -> Self {
        self.path = Some(path);
        self
    }

    /// Fully-qualified schema identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Parent name as written after `extends`, if any.
    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    /// File the source was loaded from.
    pub fn path(&self) -> Option<&PathBuf> {
        self.path.as_ref()
    }

    /// Import statements, scanned line by line up to the first `/**`.
    pub fn imports(&self) -> Vec<Import> {
        let mut imports = Vec::new();
        for line in self.text.lines().map(str::trim) {
            if line.starts_with("/**") {
                break;
            }
            if let Some(caps) = RE_IMPORT.captures(line) {
                let path = caps[1].trim_start_matches('.').to_string();
                let alias = match caps.get(2) {
                    Some(alias) => alias.as_str().to_string(),
                    None => last_segment(&path).to_string(),
                };
                imports.push(Import { path, alias });
            }
        }
        imports
    }

    /// The `/** ... */` block directly preceding the `schema` line.
    pub fn declaration_block(&self) -> Option<&str> {
        let head = &self.text[..self.schema_line];
        let start = head.rfind("/**")?;
        let end = head[start..].find("*/")? + start + 2;
        if !head[end..].trim().is_empty() {
            return None;
        }
        Some(&head[start..end])
    }

    /// Properties declared in this source's own block, first occurrence kept.
    ///
    /// Returns `None` when the source has no declaration block.
    pub fn properties(&self) -> Option<Vec<RawProperty>> {
        let block = self.declaration_block()?;
        let mut properties: Vec<RawProperty> = Vec::new();
        for caps in RE_PROPERTY.captures_iter(block) {
            let name = &caps[2];
            if properties.iter().any(|p| p.name == name) {
                continue;
            }
            properties.push(RawProperty {
                name: name.to_string(),
                raw_types: caps[1].trim_end_matches('|').to_string(),
            });
        }
        Some(properties)
    }
}

/// Join a namespace and a short name into an identifier.
pub fn qualify(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", namespace, name)
    }
}

/// Last `.`-separated segment of a dotted path.
pub fn last_segment(path: &str) -> &str {
    path.rsplit('.').next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    const USER: &str = r#"
namespace app.users;

import app.geo.Address;
import app.geo.Country as Nation;

/**
 * A registered user.
 *
 * @property string $name
 * @property-read int|null $age
 * @property Address[]|null $addresses
 * @property Nation nationality
 * @property int $name
 */
schema User extends Person;
"#;

    #[test]
    fn parses_header() {
        let source = SchemaSource::parse(USER).unwrap();
        assert_eq!(source.id(), "app.users.User");
        assert_eq!(source.name(), "User");
        assert_eq!(source.namespace(), "app.users");
        assert_eq!(source.parent(), Some("Person"));
    }

    #[test]
    fn missing_schema_line_is_invalid() {
        let err = SchemaSource::parse("/** @property int $a */").unwrap_err();
        assert!(matches!(err, SchemaError::InvalidSource { .. }));
    }

    #[test]
    fn no_namespace_means_root() {
        let source = SchemaSource::parse("/** @property int $a */\nschema Point {").unwrap();
        assert_eq!(source.id(), "Point");
        assert_eq!(source.parent(), None);
    }

    #[test]
    fn parses_imports_with_and_without_alias() {
        let source = SchemaSource::parse(USER).unwrap();
        assert_eq!(
            source.imports(),
            vec![
                Import {
                    path: "app.geo.Address".into(),
                    alias: "Address".into()
                },
                Import {
                    path: "app.geo.Country".into(),
                    alias: "Nation".into()
                },
            ]
        );
    }

    #[test]
    fn imports_after_the_block_are_ignored() {
        let text = "/**\n * @property int $a\n */\nimport app.Late;\nschema A;";
        let source = SchemaSource::parse(text).unwrap();
        assert!(source.imports().is_empty());
    }

    #[test]
    fn parses_properties_in_order_keeping_first() {
        let source = SchemaSource::parse(USER).unwrap();
        let props = source.properties().unwrap();
        let pairs: Vec<(&str, &str)> = props
            .iter()
            .map(|p| (p.name.as_str(), p.raw_types.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("name", "string"),
                ("age", "int|null"),
                ("addresses", "Address[]|null"),
                ("nationality", "Nation"),
            ]
        );
    }

    #[test]
    fn block_must_precede_schema_line() {
        let text = "/**\n * @property int $a\n */\nconst X;\nschema A;";
        let source = SchemaSource::parse(text).unwrap();
        assert!(source.declaration_block().is_none());
        assert!(source.properties().is_none());
    }

    #[test]
    fn empty_block_declares_no_properties() {
        let source = SchemaSource::parse("/** */\nschema Empty;").unwrap();
        assert_eq!(source.properties(), Some(Vec::new()));
    }
}
