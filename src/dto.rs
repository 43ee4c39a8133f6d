//! DTO instances: an immutable view and a mutable builder over mapped properties.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::case::{to_alternate_case, to_snake_case};
use crate::error::MapError;
use crate::mapper::{map_properties, Remap};
use crate::property::MappedProperty;
use crate::registry::{Schema, SchemaRegistry};
use crate::types::{value_type_name, Flags};

/// A processed property value.
#[derive(Debug, Clone, PartialEq)]
pub enum DtoValue {
    /// Scalar or unstructured JSON, kept as given.
    Plain(Value),
    /// Nested DTO built from a structured map.
    Dto(Dto),
    /// Elements of a collection-typed property.
    Collection(Vec<DtoValue>),
}

impl DtoValue {
    pub fn is_null(&self) -> bool {
        matches!(self, DtoValue::Plain(Value::Null))
    }

    pub fn as_plain(&self) -> Option<&Value> {
        match self {
            DtoValue::Plain(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_dto(&self) -> Option<&Dto> {
        match self {
            DtoValue::Dto(dto) => Some(dto),
            _ => None,
        }
    }

    pub fn as_collection(&self) -> Option<&[DtoValue]> {
        match self {
            DtoValue::Collection(items) => Some(items),
            _ => None,
        }
    }

    /// Convert back to JSON, nested DTO keys in each DTO's own convention.
    pub fn to_value(&self) -> Result<Value, MapError> {
        match self {
            DtoValue::Plain(value) => Ok(value.clone()),
            DtoValue::Dto(dto) => dto.to_value(),
            DtoValue::Collection(items) => items
                .iter()
                .map(DtoValue::to_value)
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
        }
    }

    /// Convert back to JSON with every nested DTO key in one convention.
    pub(crate) fn to_value_cased(&self, camel: bool) -> Result<Value, MapError> {
        match self {
            DtoValue::Plain(value) => Ok(value.clone()),
            DtoValue::Dto(dto) => dto.to_value_cased(camel),
            DtoValue::Collection(items) => items
                .iter()
                .map(|item| item.to_value_cased(camel))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
        }
    }
}

/// Key a property is written under in output data.
pub(crate) fn data_key(name: &str, camel: bool) -> String {
    to_alternate_case(name, !camel)
}

/// Whether `candidate` names `property` in either convention.
pub(crate) fn names_property(property: &str, candidate: &str) -> bool {
    property == candidate || to_snake_case(property) == to_snake_case(candidate)
}

/// An immutable DTO instance.
///
/// Every manipulation returns a new instance; see [`MutableDto`] for in-place edits.
#[derive(Clone)]
pub struct Dto {
    registry: Arc<SchemaRegistry>,
    schema: Arc<Schema>,
    flags: Flags,
    properties: Vec<MappedProperty>,
}

impl Dto {
    /// Map a JSON object onto schema `id`.
    ///
    /// # Errors
    ///
    /// Returns `MapError::NotAnObject` if `data` is not an object, or any
    /// schema or mapping error.
    pub fn new(
        registry: &Arc<SchemaRegistry>,
        id: &str,
        data: &Value,
        flags: Flags,
    ) -> Result<Self, MapError> {
        match data {
            Value::Object(map) => Self::from_map(registry, id, map, flags),
            other => Err(MapError::NotAnObject {
                schema: id.to_string(),
                actual: value_type_name(other).to_string(),
            }),
        }
    }

    pub fn from_map(
        registry: &Arc<SchemaRegistry>,
        id: &str,
        data: &Map<String, Value>,
        flags: Flags,
    ) -> Result<Self, MapError> {
        Self::with_remap(registry, id, data, flags, &Remap::new())
    }

    /// Map `data` reading properties from the keys named in `remap`.
    pub fn with_remap(
        registry: &Arc<SchemaRegistry>,
        id: &str,
        data: &Map<String, Value>,
        flags: Flags,
        remap: &Remap,
    ) -> Result<Self, MapError> {
        let schema = registry.get_or_build(id)?;
        let flags = flags.without(Flags::MUTABLE);
        let properties = map_properties(registry, &schema, data, flags, remap)?;
        Ok(Self {
            registry: Arc::clone(registry),
            schema,
            flags,
            properties,
        })
    }

    pub fn schema_id(&self) -> &str {
        self.schema.id()
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn is_mutable(&self) -> bool {
        self.flags.contains(Flags::MUTABLE)
    }

    /// Names of the mapped properties, in declaration order.
    pub fn property_names(&self) -> Vec<&str> {
        self.properties.iter().map(MappedProperty::name).collect()
    }

    pub fn properties(&self) -> &[MappedProperty] {
        &self.properties
    }

    /// Look up a mapped property by name, in either naming convention.
    pub fn property(&self, name: &str) -> Option<&MappedProperty> {
        self.properties
            .iter()
            .find(|p| p.name() == name)
            .or_else(|| self.properties.iter().find(|p| names_property(p.name(), name)))
    }

    pub fn has(&self, name: &str) -> bool {
        self.property(name).is_some()
    }

    /// Processed value of a property.
    ///
    /// # Errors
    ///
    /// Returns `MapError::UnknownProperty` if the property is not mapped.
    pub fn get(&self, name: &str) -> Result<&DtoValue, MapError> {
        self.property(name)
            .ok_or_else(|| MapError::UnknownProperty {
                schema: self.schema_id().to_string(),
                key: name.to_string(),
            })?
            .value()
    }

    /// The processed values as a JSON object.
    ///
    /// Keys are snake_case, or camelCase under `CAMEL_CASE_ARRAY`.
    pub fn to_value(&self) -> Result<Value, MapError> {
        self.to_value_cased(self.flags.contains(Flags::CAMEL_CASE_ARRAY))
    }

    pub(crate) fn to_value_cased(&self, camel: bool) -> Result<Value, MapError> {
        let mut map = Map::new();
        for property in &self.properties {
            let value = property.value()?.to_value_cased(camel)?;
            map.insert(data_key(property.name(), camel), value);
        }
        Ok(Value::Object(map))
    }

    /// Continue editing this instance in place.
    pub fn into_mutable(self) -> MutableDto {
        MutableDto::from(self)
    }

    pub(crate) fn with_flags(mut self, flags: Flags) -> Self {
        self.flags = flags;
        self
    }

    pub(crate) fn properties_mut(&mut self) -> &mut Vec<MappedProperty> {
        &mut self.properties
    }
}

impl PartialEq for Dto {
    fn eq(&self, other: &Self) -> bool {
        self.schema_id() == other.schema_id()
            && matches!((self.to_value(), other.to_value()), (Ok(a), Ok(b)) if a == b)
    }
}

impl fmt::Debug for Dto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dto")
            .field("schema", &self.schema_id())
            .field("flags", &self.flags)
            .field("properties", &self.properties)
            .finish()
    }
}

impl Serialize for Dto {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value()
            .map_err(<S::Error as serde::ser::Error>::custom)?
            .serialize(serializer)
    }
}

/// A DTO that is edited in place.
///
/// Reads go through [`Dto`] via `Deref`; [`MutableDto::freeze`] turns it
/// back into an immutable instance.
#[derive(Debug, Clone, PartialEq)]
pub struct MutableDto(Dto);

impl MutableDto {
    /// Map a JSON object onto schema `id` as a mutable instance.
    pub fn new(
        registry: &Arc<SchemaRegistry>,
        id: &str,
        data: &Value,
        flags: Flags,
    ) -> Result<Self, MapError> {
        Dto::new(registry, id, data, flags).map(Self::from)
    }

    /// Stop editing; the returned instance drops the `MUTABLE` flag.
    pub fn freeze(self) -> Dto {
        let flags = self.0.flags.without(Flags::MUTABLE);
        self.0.with_flags(flags)
    }

    /// Set one property from a raw value, re-validating it.
    ///
    /// An undeclared name fails with `MapError::UnknownProperty` unless
    /// `IGNORE_UNKNOWN_PROPERTIES` is set. On failure nothing changes.
    pub fn set(&mut self, name: &str, value: Value) -> Result<&mut Self, MapError> {
        let flags = self.0.flags;
        if let Some(index) = self
            .0
            .properties
            .iter()
            .position(|p| names_property(p.name(), name))
        {
            self.0.properties[index].set_value(value, flags)?;
            return Ok(self);
        }

        let Some(declared) = self
            .0
            .schema
            .properties()
            .iter()
            .find(|p| names_property(&p.name, name))
        else {
            if flags.contains(Flags::IGNORE_UNKNOWN_PROPERTIES) {
                return Ok(self);
            }
            return Err(MapError::UnknownProperty {
                schema: self.0.schema_id().to_string(),
                key: name.to_string(),
            });
        };

        let property = MappedProperty::create(
            &self.0.registry,
            &declared.name,
            value,
            Arc::clone(&declared.types),
            flags,
            self.0.schema.hook(&declared.name).cloned(),
        )?;
        property.value()?.to_value()?;
        let declared_name = declared.name.clone();
        self.insert_in_declaration_order(declared_name, property);
        Ok(self)
    }

    fn insert_in_declaration_order(&mut self, name: String, property: MappedProperty) {
        let order: Vec<&str> = self.0.schema.property_names();
        let rank = |n: &str| order.iter().position(|o| *o == n).unwrap_or(usize::MAX);
        let target = rank(&name);
        let index = self
            .0
            .properties
            .iter()
            .position(|p| rank(p.name()) > target)
            .unwrap_or(self.0.properties.len());
        self.0.properties.insert(index, property);
    }

    pub(crate) fn replace(&mut self, dto: Dto) {
        let flags = dto.flags | Flags::MUTABLE;
        self.0 = dto.with_flags(flags);
    }

    pub(crate) fn inner_mut(&mut self) -> &mut Dto {
        &mut self.0
    }
}

impl From<Dto> for MutableDto {
    fn from(dto: Dto) -> Self {
        let flags = dto.flags | Flags::MUTABLE;
        MutableDto(dto.with_flags(flags))
    }
}

impl Deref for MutableDto {
    type Target = Dto;

    fn deref(&self) -> &Dto {
        &self.0
    }
}

impl Serialize for MutableDto {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}
