//! Mapped properties: one declared property bound to one raw input value.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde_json::Value;

use crate::dto::DtoValue;
use crate::error::{MapError, UnexpectedType};
use crate::registry::{Hook, SchemaRegistry};
use crate::types::{value_type_name, Flags, PropertyTypes};

/// A property of one DTO instance.
///
/// Validated on construction. The processed value is computed on first
/// access and memoized until [`MappedProperty::set_value`] replaces the raw value.
#[derive(Clone)]
pub struct MappedProperty {
    name: String,
    types: Arc<PropertyTypes>,
    raw: Value,
    flags: Flags,
    hook: Option<Hook>,
    registry: Arc<SchemaRegistry>,
    processed: OnceCell<DtoValue>,
}

impl MappedProperty {
    /// Create a property and validate its raw value.
    ///
    /// # Errors
    ///
    /// Returns `MapError::UnexpectedType` if the value matches no declared type,
    /// or any error raised while processing it.
    pub fn create(
        registry: &Arc<SchemaRegistry>,
        name: &str,
        raw: Value,
        types: Arc<PropertyTypes>,
        flags: Flags,
        hook: Option<Hook>,
    ) -> Result<Self, MapError> {
        let property = Self {
            name: name.to_string(),
            types,
            raw,
            flags,
            hook,
            registry: Arc::clone(registry),
            processed: OnceCell::new(),
        };
        property.validate()?;
        Ok(property)
    }

    /// Check the raw value against the declared types.
    ///
    /// Structured maps for schema types, `null` for nullable types, arrays for
    /// collection types and hooked properties are accepted without processing;
    /// anything else must process into a value matching a declared type.
    pub fn validate(&self) -> Result<(), MapError> {
        let types = &self.types;
        if (types.expects_schema && self.raw.is_object())
            || (self.raw.is_null() && types.includes_null)
            || (types.expects_collection && self.raw.is_array())
            || self.hook.is_some()
        {
            return Ok(());
        }

        let processed = self.value()?;
        if types.matches(processed) {
            Ok(())
        } else {
            Err(self.unexpected(processed).into())
        }
    }

    /// The processed value, computed once and memoized.
    ///
    /// # Errors
    ///
    /// Returns `MapError::UnexpectedType` if processing yields `null` for a
    /// non-nullable property, or the processor's own error.
    pub fn value(&self) -> Result<&DtoValue, MapError> {
        if let Some(value) = self.processed.get() {
            return Ok(value);
        }

        let processed = self.registry.processor().process(&self.registry, self)?;
        if processed.is_null() && !self.types.includes_null {
            return Err(self.unexpected(&processed).into());
        }
        Ok(self.processed.get_or_init(|| processed))
    }

    /// Replace the raw value and re-validate.
    ///
    /// The new value is processed in full, nested schemas included; on
    /// failure the property keeps its previous value.
    pub fn set_value(&mut self, raw: Value, flags: Flags) -> Result<(), MapError> {
        let candidate = Self::create(
            &self.registry,
            &self.name,
            raw,
            Arc::clone(&self.types),
            flags,
            self.hook.clone(),
        )?;
        candidate.value()?.to_value()?;
        *self = candidate;
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn types(&self) -> &PropertyTypes {
        &self.types
    }

    pub fn raw_value(&self) -> &Value {
        &self.raw
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn hook(&self) -> Option<&Hook> {
        self.hook.as_ref()
    }

    pub fn has_hook(&self) -> bool {
        self.hook.is_some()
    }

    /// Whether the processed value has been computed.
    pub fn is_processed(&self) -> bool {
        self.processed.get().is_some()
    }

    fn unexpected(&self, processed: &DtoValue) -> UnexpectedType {
        let (raw, raw_type) = describe_value(&self.raw);
        let (processed, processed_type) = match processed {
            DtoValue::Plain(value) => describe_value(value),
            DtoValue::Dto(dto) => (dto.schema_id().to_string(), "object".to_string()),
            DtoValue::Collection(_) => ("array".to_string(), "array".to_string()),
        };
        UnexpectedType {
            property: self.name.clone(),
            expected: self.types.declared_names(),
            raw,
            raw_type,
            processed,
            processed_type,
        }
    }
}

fn describe_value(value: &Value) -> (String, String) {
    let shown = match value {
        Value::Null | Value::Array(_) | Value::Object(_) => value_type_name(value).to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    (shown, value_type_name(value).to_string())
}

impl fmt::Debug for MappedProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappedProperty")
            .field("name", &self.name)
            .field("types", &self.types.declared_names())
            .field("raw", &self.raw)
            .field("flags", &self.flags)
            .field("has_hook", &self.hook.is_some())
            .field("processed", &self.processed.get())
            .finish()
    }
}
