//! Value processing: turning a validated raw value into its typed form.

use std::sync::Arc;

use serde_json::{Map, Number, Value};

use crate::dto::{Dto, DtoValue};
use crate::error::MapError;
use crate::property::MappedProperty;
use crate::registry::SchemaRegistry;
use crate::types::{Flags, PropertyTypes};

/// Computes the processed value of a mapped property.
///
/// Called at most once per raw value; failures surface from
/// [`MappedProperty::value`] and from construction-time validation.
pub trait ValueProcessor: Send + Sync {
    fn process(
        &self,
        registry: &Arc<SchemaRegistry>,
        property: &MappedProperty,
    ) -> Result<DtoValue, MapError>;
}

/// Applies override hooks, builds nested DTOs and widens integers declared as floats.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultProcessor;

impl ValueProcessor for DefaultProcessor {
    fn process(
        &self,
        registry: &Arc<SchemaRegistry>,
        property: &MappedProperty,
    ) -> Result<DtoValue, MapError> {
        let raw = match property.hook() {
            Some(hook) => hook(property.raw_value()),
            None => property.raw_value().clone(),
        };
        process_value(registry, property.types(), raw, property.flags())
    }
}

/// Process `raw` against `types`.
///
/// Nested DTOs are built with the parent's `flags`.
pub fn process_value(
    registry: &Arc<SchemaRegistry>,
    types: &PropertyTypes,
    raw: Value,
    flags: Flags,
) -> Result<DtoValue, MapError> {
    match raw {
        Value::Array(items) if types.expects_collection => {
            let element = types.collection_schema_type();
            items
                .into_iter()
                .map(|item| match (element, item) {
                    (Some(schema), Value::Object(map)) => {
                        build_nested(registry, &schema.name, &map, flags)
                    }
                    (_, item) => Ok(DtoValue::Plain(item)),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(DtoValue::Collection)
        }
        Value::Object(map) => match types.schema_type() {
            Some(schema) => build_nested(registry, &schema.name, &map, flags),
            None => Ok(DtoValue::Plain(Value::Object(map))),
        },
        Value::Number(n) if n.is_i64() || n.is_u64() => Ok(DtoValue::Plain(widen(types, n))),
        other => Ok(DtoValue::Plain(other)),
    }
}

fn build_nested(
    registry: &Arc<SchemaRegistry>,
    id: &str,
    map: &Map<String, Value>,
    flags: Flags,
) -> Result<DtoValue, MapError> {
    Dto::from_map(registry, id, map, flags).map(DtoValue::Dto)
}

// An integer for a float-only property becomes a float.
fn widen(types: &PropertyTypes, n: Number) -> Value {
    let float_only = (types.has_primitive("float") || types.has_primitive("double"))
        && !types.has_primitive("int")
        && !types.has_primitive("integer");
    match n.as_f64().and_then(Number::from_f64) {
        Some(float) if float_only => Value::Number(float),
        _ => Value::Number(n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PropertyType;
    use serde_json::json;

    fn registry() -> Arc<SchemaRegistry> {
        let registry = SchemaRegistry::new();
        registry
            .register_source("/**\n * @property string $street\n */\nschema Address;")
            .unwrap();
        Arc::new(registry)
    }

    fn types(types: Vec<PropertyType>) -> PropertyTypes {
        PropertyTypes::new(types).unwrap()
    }

    #[test]
    fn widens_integer_for_float_only() {
        let registry = registry();
        let float = types(vec![PropertyType::primitive("float", false)]);
        let value = process_value(&registry, &float, json!(3), Flags::NONE).unwrap();
        assert_eq!(value, DtoValue::Plain(json!(3.0)));

        let both = types(vec![
            PropertyType::primitive("int", false),
            PropertyType::primitive("float", false),
        ]);
        let value = process_value(&registry, &both, json!(3), Flags::NONE).unwrap();
        assert_eq!(value, DtoValue::Plain(json!(3)));
    }

    #[test]
    fn keeps_strings_verbatim() {
        let registry = registry();
        let union = types(vec![
            PropertyType::primitive("int", false),
            PropertyType::primitive("string", false),
        ]);
        let value = process_value(&registry, &union, json!("5"), Flags::NONE).unwrap();
        assert_eq!(value, DtoValue::Plain(json!("5")));
    }

    #[test]
    fn builds_nested_dto_from_object() {
        let registry = registry();
        let address = types(vec![PropertyType::schema("Address", false)]);
        let value =
            process_value(&registry, &address, json!({ "street": "Main" }), Flags::NONE).unwrap();
        let dto = value.as_dto().unwrap();
        assert_eq!(dto.schema_id(), "Address");
        assert_eq!(dto.get("street").unwrap(), &DtoValue::Plain(json!("Main")));
    }

    #[test]
    fn builds_each_collection_element() {
        let registry = registry();
        let addresses = types(vec![PropertyType::schema("Address", true)]);
        let value = process_value(
            &registry,
            &addresses,
            json!([{ "street": "Main" }, { "street": "High" }]),
            Flags::NONE,
        )
        .unwrap();
        let items = value.as_collection().unwrap();
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|item| item.as_dto().is_some()));
    }

    #[test]
    fn nested_failure_propagates() {
        let registry = registry();
        let address = types(vec![PropertyType::schema("Address", false)]);
        let result = process_value(&registry, &address, json!({}), Flags::NONE);
        assert!(matches!(result, Err(MapError::MissingValue { .. })));
    }
}
