//! Property mapping - binds input data to a schema's declared properties.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::case::{to_camel_case, to_snake_case};
use crate::error::MapError;
use crate::property::MappedProperty;
use crate::registry::{Schema, SchemaRegistry};
use crate::types::Flags;

/// Property name -> input key to read it from.
pub type Remap = HashMap<String, String>;

/// Map `data` onto `schema`.
///
/// Properties are visited in declaration order. A property missing from
/// `data` is skipped under `PARTIAL` (or mapped from `null` when it has an
/// override hook) and fails otherwise. Input keys left over after every
/// property has been mapped fail unless `IGNORE_UNKNOWN_PROPERTIES` is set.
///
/// # Errors
///
/// Returns `MapError::MissingValue`, `MapError::UnknownProperty`, or the
/// first validation error raised by a property.
pub fn map_properties(
    registry: &Arc<SchemaRegistry>,
    schema: &Schema,
    data: &Map<String, Value>,
    flags: Flags,
    remap: &Remap,
) -> Result<Vec<MappedProperty>, MapError> {
    let mut mapped = Vec::with_capacity(schema.properties().len());
    // Keys are taken out as they are consumed; each feeds one property.
    let mut remaining = data.clone();

    for property in schema.properties() {
        let candidate = remap.get(&property.name).unwrap_or(&property.name);
        let key = property_key_from_data(candidate, &remaining, flags);
        let hook = schema.hook(&property.name).cloned();

        let value = match remaining.shift_remove(&key) {
            Some(value) => value,
            None if hook.is_some() => Value::Null,
            None if flags.contains(Flags::PARTIAL) => {
                tracing::trace!(schema = schema.id(), property = %property.name, "skipping missing property");
                continue;
            }
            None => {
                return Err(MapError::MissingValue {
                    schema: schema.id().to_string(),
                    property: property.name.clone(),
                })
            }
        };

        tracing::trace!(schema = schema.id(), property = %property.name, key = %key, "mapping property");
        mapped.push(MappedProperty::create(
            registry,
            &property.name,
            value,
            Arc::clone(&property.types),
            flags,
            hook,
        )?);
    }

    if !flags.contains(Flags::IGNORE_UNKNOWN_PROPERTIES) {
        if let Some(key) = remaining.keys().next() {
            return Err(MapError::UnknownProperty {
                schema: schema.id().to_string(),
                key: key.clone(),
            });
        }
    }

    Ok(mapped)
}

/// Key under which `name` is looked up in `data`.
///
/// `name` itself if present, then whichever of its snake_case and camelCase
/// forms is present. When none is, the form the flags select: camelCase under
/// `CAMEL_CASE_ARRAY`, snake_case otherwise.
pub fn property_key_from_data(name: &str, data: &Map<String, Value>, flags: Flags) -> String {
    if data.contains_key(name) {
        return name.to_string();
    }
    let snake = to_snake_case(name);
    if data.contains_key(&snake) {
        return snake;
    }
    let camel = to_camel_case(name);
    if data.contains_key(&camel) || flags.contains(Flags::CAMEL_CASE_ARRAY) {
        return camel;
    }
    snake
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::DtoValue;
    use serde_json::json;

    fn registry() -> Arc<SchemaRegistry> {
        let registry = SchemaRegistry::new();
        registry
            .register_source(
                "/**\n * @property string $firstName\n * @property int|null $age\n */\nschema User;",
            )
            .unwrap();
        Arc::new(registry)
    }

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    fn map(
        registry: &Arc<SchemaRegistry>,
        data: Value,
        flags: Flags,
    ) -> Result<Vec<MappedProperty>, MapError> {
        registry.map("User", &object(data), flags, &Remap::new())
    }

    #[test]
    fn key_prefers_exact_match() {
        let data = object(json!({ "firstName": "a", "first_name": "b" }));
        assert_eq!(property_key_from_data("firstName", &data, Flags::NONE), "firstName");
    }

    #[test]
    fn key_falls_back_to_alternate_case() {
        let data = object(json!({}));
        assert_eq!(property_key_from_data("firstName", &data, Flags::NONE), "first_name");
        assert_eq!(
            property_key_from_data("first_name", &data, Flags::CAMEL_CASE_ARRAY),
            "firstName"
        );
    }

    #[test]
    fn key_finds_either_convention_regardless_of_flag() {
        let snake = object(json!({ "first_name": "a" }));
        assert_eq!(
            property_key_from_data("firstName", &snake, Flags::CAMEL_CASE_ARRAY),
            "first_name"
        );
        let camel = object(json!({ "firstName": "a" }));
        assert_eq!(property_key_from_data("first_name", &camel, Flags::NONE), "firstName");
    }

    #[test]
    fn maps_every_declared_property_in_order() {
        let registry = registry();
        let mapped = map(&registry, json!({ "first_name": "Ada", "age": 36 }), Flags::NONE).unwrap();
        let names: Vec<&str> = mapped.iter().map(MappedProperty::name).collect();
        assert_eq!(names, vec!["firstName", "age"]);
        assert_eq!(mapped[0].raw_value(), &json!("Ada"));
        assert_eq!(mapped[1].value().unwrap(), &DtoValue::Plain(json!(36)));
    }

    #[test]
    fn missing_value_fails_unless_partial() {
        let registry = registry();
        let err = map(&registry, json!({ "firstName": "Ada" }), Flags::NONE).unwrap_err();
        assert!(matches!(err, MapError::MissingValue { property, .. } if property == "age"));

        let mapped = map(&registry, json!({ "firstName": "Ada" }), Flags::PARTIAL).unwrap();
        assert_eq!(mapped.len(), 1);
    }

    #[test]
    fn unknown_key_reports_first_leftover() {
        let registry = registry();
        let data = json!({ "firstName": "Ada", "age": 1, "zeta": 1, "alpha": 2 });
        let err = map(&registry, data.clone(), Flags::NONE).unwrap_err();
        assert!(matches!(err, MapError::UnknownProperty { key, .. } if key == "zeta"));

        assert!(map(&registry, data, Flags::IGNORE_UNKNOWN_PROPERTIES).is_ok());
    }

    #[test]
    fn remap_reads_alternative_key() {
        let registry = registry();
        let remap = Remap::from([("firstName".to_string(), "givenName".to_string())]);
        let data = object(json!({ "given_name": "Ada", "age": null }));
        let mapped = registry.map("User", &data, Flags::NONE, &remap).unwrap();
        assert_eq!(mapped[0].raw_value(), &json!("Ada"));
    }

    #[test]
    fn consumed_key_is_not_read_twice() {
        let registry = registry();
        let remap = Remap::from([("age".to_string(), "firstName".to_string())]);
        let data = object(json!({ "firstName": "Ada" }));
        let err = registry.map("User", &data, Flags::NONE, &remap).unwrap_err();
        assert!(matches!(err, MapError::MissingValue { property, .. } if property == "age"));
    }

    #[test]
    fn hooked_property_may_be_absent() {
        let registry = registry();
        registry.register_hook("User", "age", |raw| match raw {
            Value::Null => json!(18),
            other => other.clone(),
        });
        let mapped = map(&registry, json!({ "firstName": "Ada" }), Flags::NONE).unwrap();
        assert_eq!(mapped[1].value().unwrap(), &DtoValue::Plain(json!(18)));
    }
}
