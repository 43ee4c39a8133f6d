//! Schema registry: declaration sources, override hooks and the built-schema cache.
//!
//! A schema is built at most once per registry from its declaration source
//! and the sources of its ancestors, then shared read-only by every mapping.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::{Map, Value};

use crate::declaration::{SchemaSource, ROOT_SCHEMA};
use crate::dto::{Dto, MutableDto};
use crate::error::{MapError, SchemaError};
use crate::loader::{load_source, load_sources};
use crate::mapper::{map_properties, Remap};
use crate::processor::{DefaultProcessor, ValueProcessor};
use crate::property::MappedProperty;
use crate::resolver::{resolve_aliases, resolve_name, resolve_union, AliasTable};
use crate::types::{Flags, PropertyTypes};

/// Per-property override hook.
///
/// Receives the raw input value (`null` when the key is absent) and returns
/// the value to process in its place.
pub type Hook = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// A declared property with its resolved types.
#[derive(Debug, Clone)]
pub struct SchemaProperty {
    pub name: String,
    pub raw_types: String,
    /// Schema whose declaration block introduced the property.
    pub declared_in: String,
    pub types: Arc<PropertyTypes>,
}

/// A built schema: ordered properties (own and inherited) plus hooks.
pub struct Schema {
    id: String,
    namespace: String,
    ancestors: Vec<String>,
    aliases: AliasTable,
    properties: Vec<SchemaProperty>,
    hooks: HashMap<String, Hook>,
}

impl Schema {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Ancestor identifiers, closest first, excluding the root base type.
    pub fn ancestors(&self) -> &[String] {
        &self.ancestors
    }

    /// Import aliases of the schema's own source.
    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    pub fn properties(&self) -> &[SchemaProperty] {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&SchemaProperty> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn property_names(&self) -> Vec<&str> {
        self.properties.iter().map(|p| p.name.as_str()).collect()
    }

    /// Property name -> raw union-type expression, in declaration order.
    pub fn raw_properties(&self) -> Vec<(&str, &str)> {
        self.properties
            .iter()
            .map(|p| (p.name.as_str(), p.raw_types.as_str()))
            .collect()
    }

    pub fn hook(&self, property: &str) -> Option<&Hook> {
        self.hooks.get(property)
    }

    /// Whether this schema is `id` or inherits from it.
    pub fn is_a(&self, id: &str) -> bool {
        self.id == id || self.ancestors.iter().any(|a| a == id)
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut hooks: Vec<&String> = self.hooks.keys().collect();
        hooks.sort();
        f.debug_struct("Schema")
            .field("id", &self.id)
            .field("ancestors", &self.ancestors)
            .field("properties", &self.properties)
            .field("hooks", &hooks)
            .finish()
    }
}

/// Registry of schema sources and built schemas.
///
/// Share it as `Arc<SchemaRegistry>`: DTO instances keep a handle to build
/// nested DTOs on demand. Register every source and hook before the first
/// mapping; built schemas are never invalidated.
pub struct SchemaRegistry {
    sources: RwLock<HashMap<String, Arc<SchemaSource>>>,
    hooks: RwLock<HashMap<String, HashMap<String, Hook>>>,
    schemas: RwLock<HashMap<String, Arc<Schema>>>,
    processor: Arc<dyn ValueProcessor>,
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaRegistry {
    /// Create an empty registry using the default value processor.
    pub fn new() -> Self {
        Self::with_processor(DefaultProcessor)
    }

    /// Create an empty registry with a custom value processor.
    pub fn with_processor(processor: impl ValueProcessor + 'static) -> Self {
        Self {
            sources: RwLock::new(HashMap::new()),
            hooks: RwLock::new(HashMap::new()),
            schemas: RwLock::new(HashMap::new()),
            processor: Arc::new(processor),
        }
    }

    /// Register a parsed source. Returns its schema identifier.
    pub fn register(&self, source: SchemaSource) -> String {
        let id = source.id().to_string();
        if self.is_built(&id) {
            tracing::warn!(schema = %id, "schema already built; new source is ignored by the cache");
        }
        self.sources
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), Arc::new(source));
        id
    }

    /// Parse and register a declaration source. Returns its schema identifier.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::InvalidSource` if the source has no `schema` line.
    pub fn register_source(&self, text: &str) -> Result<String, SchemaError> {
        Ok(self.register(SchemaSource::parse(text)?))
    }

    /// Load and register a single `.dto` file.
    pub fn load_file(&self, path: &Path) -> Result<String, SchemaError> {
        Ok(self.register(load_source(path)?))
    }

    /// Load and register every `.dto` file under `path`.
    pub fn load_dir(&self, path: &Path) -> Result<Vec<String>, SchemaError> {
        let ids: Vec<String> = load_sources(path)?
            .into_iter()
            .map(|source| self.register(source))
            .collect();
        tracing::debug!(path = %path.display(), count = ids.len(), "loaded schema sources");
        Ok(ids)
    }

    /// Register an override hook for `property` on `schema` and its descendants.
    pub fn register_hook<F>(&self, schema: &str, property: &str, hook: F)
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        self.hooks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(schema.to_string())
            .or_default()
            .insert(property.to_string(), Arc::new(hook));
    }

    /// Whether a source is registered under `id`.
    pub fn contains(&self, id: &str) -> bool {
        self.sources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }

    /// Registered schema identifiers, sorted.
    pub fn schema_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .sources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    pub fn source(&self, id: &str) -> Option<Arc<SchemaSource>> {
        self.sources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    pub fn processor(&self) -> &dyn ValueProcessor {
        self.processor.as_ref()
    }

    fn is_built(&self, id: &str) -> bool {
        self.schemas
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }

    /// Fetch the built schema for `id`, building and caching it on first use.
    ///
    /// Concurrent first calls may each build; the first insert wins and every
    /// caller receives that instance.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::SchemaNotFound` if `id` (or an ancestor) is not
    /// registered, `SchemaError::MissingSchemaDeclaration` if the schema has no
    /// declaration block, or `SchemaError::InvalidSource` on an inheritance cycle.
    pub fn get_or_build(&self, id: &str) -> Result<Arc<Schema>, SchemaError> {
        if let Some(schema) = self
            .schemas
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
        {
            return Ok(Arc::clone(schema));
        }

        let built = Arc::new(self.build(id)?);
        let mut schemas = self.schemas.write().unwrap_or_else(PoisonError::into_inner);
        let schema = schemas.entry(id.to_string()).or_insert_with(|| {
            tracing::debug!(
                schema = %id,
                properties = built.properties.len(),
                ancestors = built.ancestors.len(),
                "built schema"
            );
            Arc::clone(&built)
        });
        if !Arc::ptr_eq(schema, &built) {
            tracing::debug!(schema = %id, "schema built concurrently; keeping first instance");
        }
        Ok(Arc::clone(schema))
    }

    /// Property names of `id`, own and inherited, in declaration order.
    pub fn property_names(&self, id: &str) -> Result<Vec<String>, SchemaError> {
        let schema = self.get_or_build(id)?;
        Ok(schema.property_names().into_iter().map(String::from).collect())
    }

    /// Property name -> raw union-type expression for `id`.
    pub fn raw_properties(&self, id: &str) -> Result<Vec<(String, String)>, SchemaError> {
        let schema = self.get_or_build(id)?;
        Ok(schema
            .raw_properties()
            .into_iter()
            .map(|(name, raw)| (name.to_string(), raw.to_string()))
            .collect())
    }

    fn hooks_for(&self, id: &str) -> Vec<(String, Hook)> {
        self.hooks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .map(|hooks| {
                hooks
                    .iter()
                    .map(|(name, hook)| (name.clone(), Arc::clone(hook)))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn build(&self, id: &str) -> Result<Schema, SchemaError> {
        let missing = || SchemaError::SchemaNotFound {
            schema: id.to_string(),
        };
        let source = self.source(id).ok_or_else(missing)?;
        if source.declaration_block().is_none() {
            return Err(SchemaError::MissingSchemaDeclaration {
                schema: id.to_string(),
            });
        }

        let is_schema = |candidate: &str| self.contains(candidate);
        let namespace = source.namespace().to_string();
        let own_aliases = resolve_aliases(&source);
        let mut ancestors: Vec<String> = Vec::new();
        let mut properties: Vec<SchemaProperty> = Vec::new();
        let mut hooks: HashMap<String, Hook> = HashMap::new();
        let mut seen: HashSet<String> = HashSet::from([id.to_string()]);
        let mut current = source;
        let mut aliases = own_aliases.clone();

        loop {
            // Ancestors without a block contribute no properties.
            for raw in current.properties().unwrap_or_default() {
                if properties.iter().any(|p| p.name == raw.name) {
                    continue;
                }
                let types = resolve_union(&raw.raw_types, &aliases, current.namespace(), &is_schema)
                    .ok_or_else(|| SchemaError::InvalidSource {
                        message: format!("property '{}' in '{}' declares no type", raw.name, current.id()),
                    })?;
                properties.push(SchemaProperty {
                    name: raw.name,
                    raw_types: raw.raw_types,
                    declared_in: current.id().to_string(),
                    types: Arc::new(types),
                });
            }

            for (name, hook) in self.hooks_for(current.id()) {
                hooks.entry(name).or_insert(hook);
            }

            let Some(parent) = current.parent() else {
                break;
            };
            if parent.trim_start_matches('.') == ROOT_SCHEMA {
                break;
            }

            let (parent_id, known) = resolve_name(parent, &aliases, current.namespace(), &is_schema);
            if !known {
                return Err(SchemaError::SchemaNotFound { schema: parent_id });
            }
            if !seen.insert(parent_id.clone()) {
                return Err(SchemaError::InvalidSource {
                    message: format!("inheritance cycle through '{}'", parent_id),
                });
            }

            let next = self
                .source(&parent_id)
                .ok_or_else(|| SchemaError::SchemaNotFound {
                    schema: parent_id.clone(),
                })?;
            ancestors.push(parent_id);
            aliases = resolve_aliases(&next);
            current = next;
        }

        Ok(Schema {
            id: id.to_string(),
            namespace,
            ancestors,
            aliases: own_aliases,
            properties,
            hooks,
        })
    }
}

impl SchemaRegistry {
    /// Map `data` onto schema `id`, returning one property per mapped name.
    ///
    /// `remap` names an alternative input key for a property.
    pub fn map(
        self: &Arc<Self>,
        id: &str,
        data: &Map<String, Value>,
        flags: Flags,
        remap: &Remap,
    ) -> Result<Vec<MappedProperty>, MapError> {
        let schema = self.get_or_build(id)?;
        map_properties(self, &schema, data, flags, remap)
    }

    /// Construct an immutable DTO of schema `id`.
    pub fn dto(self: &Arc<Self>, id: &str, data: &Value, flags: Flags) -> Result<Dto, MapError> {
        Dto::new(self, id, data, flags)
    }

    /// Construct a mutable DTO of schema `id`.
    pub fn dto_mut(
        self: &Arc<Self>,
        id: &str,
        data: &Value,
        flags: Flags,
    ) -> Result<MutableDto, MapError> {
        MutableDto::new(self, id, data, flags)
    }
}

impl fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("sources", &self.schema_ids())
            .finish_non_exhaustive()
    }
}
