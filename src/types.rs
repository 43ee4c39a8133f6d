//! Core types for DTO schemas: mapping flags and declared property types.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

use serde::Serialize;
use serde_json::Value;

use crate::dto::DtoValue;

/// Scalar and pseudo type names understood without a schema.
pub const PRIMITIVE_TYPES: &[&str] = &[
    "bool", "boolean", "true", "false", "int", "integer", "float", "double", "string", "array",
    "iterable", "object", "mixed", "null",
];

/// Suffix marking a type alternative as "collection of".
pub const COLLECTION_MARKER: &str = "[]";

/// Returns true if `name` is a primitive type name (case-insensitive).
pub fn is_primitive(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    PRIMITIVE_TYPES.contains(&lower.as_str())
}

/// Returns the runtime shape of a JSON value for error messages.
pub fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Bitset controlling mapping behavior.
///
/// Flags combine with `|`; combining never removes behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Flags(u32);

impl Flags {
    pub const NONE: Flags = Flags(0);
    /// Tolerate missing keys by omitting the property.
    pub const PARTIAL: Flags = Flags(1);
    /// Do not fail on input keys no property consumes.
    pub const IGNORE_UNKNOWN_PROPERTIES: Flags = Flags(1 << 1);
    /// Input and output data use camelCase keys instead of snake_case.
    pub const CAMEL_CASE_ARRAY: Flags = Flags(1 << 2);
    /// The instance may be modified in place.
    pub const MUTABLE: Flags = Flags(1 << 3);

    pub const fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn without(self, other: Flags) -> Flags {
        Flags(self.0 & !other.0)
    }
}

impl BitOr for Flags {
    type Output = Flags;

    fn bitor(self, rhs: Flags) -> Flags {
        Flags(self.0 | rhs.0)
    }
}

impl BitOrAssign for Flags {
    fn bitor_assign(&mut self, rhs: Flags) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Flags {
    type Output = Flags;

    fn bitand(self, rhs: Flags) -> Flags {
        Flags(self.0 & rhs.0)
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = [
            (Flags::PARTIAL, "PARTIAL"),
            (Flags::IGNORE_UNKNOWN_PROPERTIES, "IGNORE_UNKNOWN_PROPERTIES"),
            (Flags::CAMEL_CASE_ARRAY, "CAMEL_CASE_ARRAY"),
            (Flags::MUTABLE, "MUTABLE"),
        ]
        .into_iter()
        .filter(|(flag, _)| self.contains(*flag))
        .map(|(_, name)| name)
        .collect();

        if names.is_empty() {
            write!(f, "NONE")
        } else {
            write!(f, "{}", names.join(" | "))
        }
    }
}

/// One branch of a declared union type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyType {
    /// Primitive name or fully-qualified schema identifier.
    pub name: String,
    /// The declared type applies to each element of an array.
    pub is_collection: bool,
    /// `name` identifies a registered schema.
    pub is_schema: bool,
}

impl PropertyType {
    pub fn primitive(name: impl Into<String>, is_collection: bool) -> Self {
        Self {
            name: name.into(),
            is_collection,
            is_schema: false,
        }
    }

    pub fn schema(name: impl Into<String>, is_collection: bool) -> Self {
        Self {
            name: name.into(),
            is_collection,
            is_schema: true,
        }
    }

    /// Name as written in diagnostics, with the collection marker restored.
    pub fn declared_name(&self) -> String {
        if self.is_collection {
            format!("{}{}", self.name, COLLECTION_MARKER)
        } else {
            self.name.clone()
        }
    }

    fn is_nullable(&self) -> bool {
        !self.is_collection && matches!(self.name.to_ascii_lowercase().as_str(), "null" | "mixed")
    }

    /// Whether a single (non-collection) value satisfies this type.
    fn matches_item(&self, value: &DtoValue) -> bool {
        match value {
            DtoValue::Dto(dto) if self.is_schema => dto.schema().is_a(&self.name),
            DtoValue::Dto(_) => self.name.eq_ignore_ascii_case("mixed"),
            DtoValue::Collection(_) => matches!(
                self.name.to_ascii_lowercase().as_str(),
                "array" | "iterable" | "mixed"
            ),
            DtoValue::Plain(plain) => !self.is_schema && primitive_matches(&self.name, plain),
        }
    }

    pub fn matches(&self, value: &DtoValue) -> bool {
        if !self.is_collection {
            return self.matches_item(value);
        }
        match value {
            DtoValue::Collection(items) => items.iter().all(|item| self.matches_item(item)),
            DtoValue::Plain(Value::Array(items)) => items
                .iter()
                .all(|item| self.matches_item(&DtoValue::Plain(item.clone()))),
            _ => false,
        }
    }
}

fn primitive_matches(name: &str, value: &Value) -> bool {
    match name.to_ascii_lowercase().as_str() {
        "mixed" => true,
        "null" => value.is_null(),
        "bool" | "boolean" => value.is_boolean(),
        "true" => value.as_bool() == Some(true),
        "false" => value.as_bool() == Some(false),
        "int" | "integer" => value.is_i64() || value.is_u64(),
        "float" | "double" => value.is_f64(),
        "string" => value.is_string(),
        "array" | "iterable" => value.is_array() || value.is_object(),
        "object" => value.is_object(),
        _ => false,
    }
}

/// Ordered union of type alternatives declared for one property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyTypes {
    types: Vec<PropertyType>,
    pub includes_null: bool,
    pub expects_schema: bool,
    pub expects_collection: bool,
}

impl PropertyTypes {
    /// Builds the set from its alternatives, in declaration order.
    ///
    /// Returns `None` for an empty list: a property always declares a type.
    pub fn new(types: Vec<PropertyType>) -> Option<Self> {
        if types.is_empty() {
            return None;
        }
        Some(Self {
            includes_null: types.iter().any(PropertyType::is_nullable),
            expects_schema: types.iter().any(|t| t.is_schema),
            expects_collection: types.iter().any(|t| t.is_collection),
            types,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &PropertyType> {
        self.types.iter()
    }

    /// Type names for error messages.
    pub fn declared_names(&self) -> Vec<String> {
        self.types.iter().map(PropertyType::declared_name).collect()
    }

    /// Whether any alternative accepts the processed value.
    pub fn matches(&self, value: &DtoValue) -> bool {
        self.types.iter().any(|t| t.matches(value))
    }

    /// First non-collection schema alternative.
    pub fn schema_type(&self) -> Option<&PropertyType> {
        self.types.iter().find(|t| t.is_schema && !t.is_collection)
    }

    /// First collection alternative whose element type is a schema.
    pub fn collection_schema_type(&self) -> Option<&PropertyType> {
        self.types.iter().find(|t| t.is_schema && t.is_collection)
    }

    /// Whether a non-collection alternative with this primitive name exists.
    pub fn has_primitive(&self, name: &str) -> bool {
        self.types
            .iter()
            .any(|t| !t.is_schema && !t.is_collection && t.name.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn plain(value: Value) -> DtoValue {
        DtoValue::Plain(value)
    }

    #[test]
    fn flags_combine_and_contain() {
        let flags = Flags::PARTIAL | Flags::CAMEL_CASE_ARRAY;
        assert!(flags.contains(Flags::PARTIAL));
        assert!(flags.contains(Flags::CAMEL_CASE_ARRAY));
        assert!(!flags.contains(Flags::MUTABLE));
        assert!(flags.contains(Flags::NONE));
        assert_eq!(flags.without(Flags::PARTIAL), Flags::CAMEL_CASE_ARRAY);
    }

    #[test]
    fn flags_display() {
        assert_eq!(Flags::NONE.to_string(), "NONE");
        assert_eq!(
            (Flags::PARTIAL | Flags::MUTABLE).to_string(),
            "PARTIAL | MUTABLE"
        );
    }

    #[test]
    fn primitive_names_are_case_insensitive() {
        assert!(is_primitive("int"));
        assert!(is_primitive("Bool"));
        assert!(!is_primitive("Address"));
    }

    #[test]
    fn value_type_names() {
        assert_eq!(value_type_name(&json!(3)), "int");
        assert_eq!(value_type_name(&json!(3.14)), "float");
        assert_eq!(value_type_name(&json!("x")), "string");
        assert_eq!(value_type_name(&json!(null)), "null");
    }

    #[test]
    fn empty_type_set_is_rejected() {
        assert!(PropertyTypes::new(Vec::new()).is_none());
    }

    #[test]
    fn derived_flags() {
        let types = PropertyTypes::new(vec![
            PropertyType::schema("app.Address", true),
            PropertyType::primitive("null", false),
        ])
        .unwrap();
        assert!(types.includes_null);
        assert!(types.expects_schema);
        assert!(types.expects_collection);
        assert_eq!(types.declared_names(), vec!["app.Address[]", "null"]);
    }

    #[test]
    fn union_matches_any_alternative() {
        let types = PropertyTypes::new(vec![
            PropertyType::primitive("int", false),
            PropertyType::primitive("string", false),
        ])
        .unwrap();
        assert!(types.matches(&plain(json!(5))));
        assert!(types.matches(&plain(json!("5"))));
        assert!(!types.matches(&plain(json!(3.14))));
        assert!(!types.matches(&plain(json!(null))));
    }

    #[test]
    fn collection_matches_each_element() {
        let types = PropertyTypes::new(vec![PropertyType::primitive("int", true)]).unwrap();
        assert!(types.matches(&DtoValue::Collection(vec![plain(json!(1)), plain(json!(2))])));
        assert!(types.matches(&DtoValue::Collection(Vec::new())));
        assert!(!types.matches(&DtoValue::Collection(vec![plain(json!("a"))])));
        assert!(!types.matches(&plain(json!("x"))));
    }
}
