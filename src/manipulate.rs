//! Derived views of DTO data: merge, subsets and scoped mutation.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::case::convert_keys;
use crate::dto::{data_key, names_property, Dto, MutableDto};
use crate::error::MapError;
use crate::registry::{Schema, SchemaRegistry};
use crate::types::{value_type_name, Flags};

impl Dto {
    /// Deep-overlay `data` onto this instance's values and map the result.
    ///
    /// Keys of `data` may use either naming convention. Objects merge
    /// recursively; any other value replaces what it overlays. The new
    /// instance carries the combined flags.
    pub fn merge(&self, data: &Value, flags: Flags) -> Result<Dto, MapError> {
        let merged_flags = self.flags() | flags;
        let merged = merged_value(self, data, merged_flags)?;
        Dto::new(self.registry(), self.schema_id(), &merged, merged_flags)
    }

    /// A new instance holding only the named properties.
    ///
    /// The new instance is built from the processed values with `PARTIAL` set.
    pub fn only(&self, names: &[&str], flags: Flags) -> Result<Dto, MapError> {
        let merged_flags = self.flags() | flags | Flags::PARTIAL;
        let camel = merged_flags.contains(Flags::CAMEL_CASE_ARRAY);
        let mut data = Map::new();
        for property in self.properties() {
            if names.iter().any(|n| names_property(property.name(), n)) {
                let value = property.value()?.to_value_cased(camel)?;
                data.insert(data_key(property.name(), camel), value);
            }
        }
        Dto::from_map(self.registry(), self.schema_id(), &data, merged_flags)
    }

    /// A new instance without the named properties.
    pub fn except(&self, names: &[&str], flags: Flags) -> Result<Dto, MapError> {
        let keep = kept_names(self, names);
        let keep: Vec<&str> = keep.iter().map(String::as_str).collect();
        self.only(&keep, flags)
    }

    /// Run `f` against a mutable copy and return the frozen result.
    ///
    /// The returned instance is immutable again; `self` is unchanged.
    pub fn mutate<F>(&self, f: F) -> Result<Dto, MapError>
    where
        F: FnOnce(&mut MutableDto) -> Result<(), MapError>,
    {
        let mut mutable = self.clone().into_mutable();
        f(&mut mutable)?;
        Ok(mutable.freeze())
    }
}

impl MutableDto {
    /// Deep-overlay `data` in place, re-mapping every property.
    ///
    /// On failure the instance is left as it was.
    pub fn merge(&mut self, data: &Value, flags: Flags) -> Result<&mut Self, MapError> {
        let merged_flags = self.flags() | flags;
        let merged = merged_value(self, data, merged_flags)?;
        let dto = Dto::new(self.registry(), self.schema_id(), &merged, merged_flags)?;
        // Nested values are processed lazily; surface their errors now.
        dto.to_value()?;
        self.replace(dto);
        Ok(self)
    }

    /// Drop every property not named, in place.
    ///
    /// The combined flags, including `PARTIAL`, stay on the instance so later
    /// merges tolerate the removed properties.
    pub fn only(&mut self, names: &[&str], flags: Flags) -> &mut Self {
        let merged_flags = self.flags() | flags | Flags::PARTIAL;
        let inner = self.inner_mut();
        inner
            .properties_mut()
            .retain(|p| names.iter().any(|n| names_property(p.name(), n)));
        let dto = inner.clone().with_flags(merged_flags);
        self.replace(dto);
        self
    }

    /// Drop the named properties, in place.
    pub fn except(&mut self, names: &[&str], flags: Flags) -> &mut Self {
        let keep = kept_names(self, names);
        let keep: Vec<&str> = keep.iter().map(String::as_str).collect();
        self.only(&keep, flags)
    }

    /// Run `f` against this instance; it stays mutable afterwards.
    pub fn mutate<F>(&mut self, f: F) -> Result<&mut Self, MapError>
    where
        F: FnOnce(&mut MutableDto) -> Result<(), MapError>,
    {
        f(self)?;
        Ok(self)
    }
}

fn kept_names(dto: &Dto, excluded: &[&str]) -> Vec<String> {
    dto.property_names()
        .into_iter()
        .filter(|name| !excluded.iter().any(|e| names_property(name, e)))
        .map(String::from)
        .collect()
}

/// Current values overlaid with `data`, keys in the `flags` convention.
fn merged_value(dto: &Dto, data: &Value, flags: Flags) -> Result<Value, MapError> {
    let camel = flags.contains(Flags::CAMEL_CASE_ARRAY);
    let mut base = dto.to_value_cased(camel)?;
    let patch = normalize_keys(dto.registry(), dto.schema(), data, camel)?;
    overlay(&mut base, patch);
    Ok(base)
}

/// Rewrite the keys of `data` into the data convention, descending into
/// values of schema-typed properties.
fn normalize_keys(
    registry: &Arc<SchemaRegistry>,
    schema: &Schema,
    data: &Value,
    camel: bool,
) -> Result<Value, MapError> {
    let Value::Object(map) = data else {
        return Err(MapError::NotAnObject {
            schema: schema.id().to_string(),
            actual: value_type_name(data).to_string(),
        });
    };

    let mut normalized = Map::new();
    for (key, value) in map {
        let declared = schema
            .properties()
            .iter()
            .find(|p| names_property(&p.name, key));
        let Some(declared) = declared else {
            normalized.insert(data_key(key, camel), convert_keys(value, !camel));
            continue;
        };

        let types = &declared.types;
        let value = match (value, types.schema_type(), types.collection_schema_type()) {
            (Value::Object(_), Some(nested), _) => {
                let nested = registry.get_or_build(&nested.name)?;
                normalize_keys(registry, &nested, value, camel)?
            }
            (Value::Array(items), _, Some(nested)) => {
                let nested = registry.get_or_build(&nested.name)?;
                Value::Array(
                    items
                        .iter()
                        .map(|item| match item {
                            Value::Object(_) => normalize_keys(registry, &nested, item, camel),
                            other => Ok(other.clone()),
                        })
                        .collect::<Result<Vec<_>, _>>()?,
                )
            }
            _ => value.clone(),
        };
        normalized.insert(data_key(&declared.name, camel), value);
    }
    Ok(Value::Object(normalized))
}

/// Recursively overlay `patch` onto `base`: objects merge, anything else replaces.
fn overlay(base: &mut Value, patch: Value) {
    match (base, patch) {
        (Value::Object(base), Value::Object(patch)) => {
            for (key, value) in patch {
                match base.get_mut(&key) {
                    Some(existing) => overlay(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, patch) => *base = patch,
    }
}
