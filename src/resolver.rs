//! Type resolution - turns raw union-type expressions into resolved type sets.
//!
//! Short names are disambiguated by the declaring source's import context,
//! in this order:
//!
//! | Step | Rule | Example (`namespace app.users`) |
//! |------|------|---------------------------------|
//! | 1 | Dotted name that is a known schema, used as-is | `app.geo.Address` |
//! | 2 | Import alias, replaced by its canonical path | `Nation` -> `app.geo.Country` |
//! | 3 | Known schema in the declaring namespace | `Person` -> `app.users.Person` |
//! | 4 | Anything else is a primitive name, verbatim | `int` |

use std::collections::HashMap;

use crate::declaration::{qualify, SchemaSource};
use crate::types::{PropertyType, PropertyTypes, COLLECTION_MARKER};

/// Short name -> canonical type identifier.
pub type AliasTable = HashMap<String, String>;

/// Build the alias table from a source's `import` statements.
///
/// A later import of the same alias replaces an earlier one.
pub fn resolve_aliases(source: &SchemaSource) -> AliasTable {
    source
        .imports()
        .into_iter()
        .map(|import| (import.alias, import.path))
        .collect()
}

/// Resolve one bare type name (collection marker already stripped).
///
/// `is_schema` answers whether an identifier names a registered schema.
/// Returns the canonical identifier and whether it is a schema.
pub fn resolve_name(
    name: &str,
    aliases: &AliasTable,
    namespace: &str,
    is_schema: &dyn Fn(&str) -> bool,
) -> (String, bool) {
    let rooted = name.strip_prefix('.');
    let bare = rooted.unwrap_or(name);

    if (rooted.is_some() || bare.contains('.')) && is_schema(bare) {
        return (bare.to_string(), true);
    }

    if let Some(canonical) = aliases.get(bare) {
        return (canonical.clone(), is_schema(canonical));
    }

    if rooted.is_none() {
        let candidate = qualify(namespace, bare);
        if is_schema(&candidate) {
            return (candidate, true);
        }
    }

    (bare.to_string(), false)
}

/// Resolve a raw union expression such as `Address[]|null`.
///
/// Returns `None` if the expression declares no alternative.
pub fn resolve_union(
    raw: &str,
    aliases: &AliasTable,
    namespace: &str,
    is_schema: &dyn Fn(&str) -> bool,
) -> Option<PropertyTypes> {
    let types = raw
        .split('|')
        .map(str::trim)
        .filter(|alternative| !alternative.is_empty())
        .map(|alternative| {
            let name = alternative.replace(COLLECTION_MARKER, "");
            let is_collection = name.len() != alternative.len();
            let (resolved, schema) = resolve_name(&name, aliases, namespace, is_schema);
            PropertyType {
                name: resolved,
                is_collection,
                is_schema: schema,
            }
        })
        .collect();

    PropertyTypes::new(types)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KNOWN: &[&str] = &[
        "app.geo.Address",
        "app.users.Person",
        "app.users.Address",
        "Point",
    ];

    fn known(id: &str) -> bool {
        KNOWN.contains(&id)
    }

    fn aliases() -> AliasTable {
        let source = SchemaSource::parse(
            "namespace app.users;\nimport app.geo.Address;\nimport app.geo.Country as Nation;\n/** */\nschema User;",
        )
        .unwrap();
        resolve_aliases(&source)
    }

    #[test]
    fn alias_table_uses_last_segment_or_alias() {
        let table = aliases();
        assert_eq!(table.get("Address").map(String::as_str), Some("app.geo.Address"));
        assert_eq!(table.get("Nation").map(String::as_str), Some("app.geo.Country"));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn fully_qualified_name_wins() {
        let (name, schema) = resolve_name("app.geo.Address", &aliases(), "app.users", &known);
        assert_eq!(name, "app.geo.Address");
        assert!(schema);
    }

    #[test]
    fn alias_beats_namespace() {
        // app.users.Address exists too, but the import takes precedence
        let (name, schema) = resolve_name("Address", &aliases(), "app.users", &known);
        assert_eq!(name, "app.geo.Address");
        assert!(schema);
    }

    #[test]
    fn alias_to_unknown_type_is_not_a_schema() {
        let (name, schema) = resolve_name("Nation", &aliases(), "app.users", &known);
        assert_eq!(name, "app.geo.Country");
        assert!(!schema);
    }

    #[test]
    fn namespace_fallback() {
        let (name, schema) = resolve_name("Person", &aliases(), "app.users", &known);
        assert_eq!(name, "app.users.Person");
        assert!(schema);
    }

    #[test]
    fn rooted_name_skips_namespace() {
        let (name, schema) = resolve_name(".Point", &aliases(), "app.users", &known);
        assert_eq!(name, "Point");
        assert!(schema);

        let (name, schema) = resolve_name("Point", &aliases(), "app.users", &known);
        assert_eq!(name, "Point");
        assert!(!schema);
    }

    #[test]
    fn primitive_is_verbatim() {
        let (name, schema) = resolve_name("int", &aliases(), "app.users", &known);
        assert_eq!(name, "int");
        assert!(!schema);
    }

    #[test]
    fn union_with_collection_marker() {
        let types = resolve_union("Address[]|Person|null", &aliases(), "app.users", &known).unwrap();
        let resolved: Vec<&PropertyType> = types.iter().collect();
        assert_eq!(resolved[0], &PropertyType::schema("app.geo.Address", true));
        assert_eq!(resolved[1], &PropertyType::schema("app.users.Person", false));
        assert_eq!(resolved[2], &PropertyType::primitive("null", false));
        assert!(types.includes_null);
        assert!(types.expects_collection);
        assert!(types.expects_schema);
    }

    #[test]
    fn empty_union_is_none() {
        assert!(resolve_union("", &aliases(), "app.users", &known).is_none());
    }
}
