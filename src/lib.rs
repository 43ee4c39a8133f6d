//! DTO Schema Mapper
//!
//! Maps untyped JSON payloads onto declared, strongly-typed DTO schemas.
//!
//! A schema is declared as source text: a `/** ... */` block of `@property`
//! lines directly preceding a `schema <Name> [extends <Parent>]` line. The
//! registry extracts and caches each schema's properties (own and inherited),
//! resolves their union types against the source's `namespace` and `import`
//! statements, and maps JSON objects onto them.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use dto_schema::{DtoValue, Flags, SchemaRegistry};
//! use serde_json::json;
//!
//! let registry = SchemaRegistry::new();
//! registry
//!     .register_source(
//!         "namespace app;
//!          /**
//!           * @property string $street
//!           * @property string $city
//!           */
//!          schema Address;",
//!     )
//!     .unwrap();
//! registry
//!     .register_source(
//!         "namespace app;
//!          /**
//!           * @property string $firstName
//!           * @property int|null $age
//!           * @property Address $homeAddress
//!           */
//!          schema User;",
//!     )
//!     .unwrap();
//! let registry = Arc::new(registry);
//!
//! let user = registry
//!     .dto(
//!         "app.User",
//!         &json!({
//!             "first_name": "Ada",
//!             "age": null,
//!             "home_address": { "street": "Main", "city": "X" }
//!         }),
//!         Flags::NONE,
//!     )
//!     .unwrap();
//!
//! assert_eq!(user.get("firstName").unwrap(), &DtoValue::Plain(json!("Ada")));
//! let address = user.get("homeAddress").unwrap().as_dto().unwrap();
//! assert_eq!(address.schema_id(), "app.Address");
//!
//! // Manipulation returns new instances
//! let moved = user
//!     .merge(&json!({ "homeAddress": { "city": "Y" } }), Flags::NONE)
//!     .unwrap();
//! assert_eq!(moved.to_value().unwrap()["home_address"]["street"], "Main");
//! assert_eq!(moved.to_value().unwrap()["home_address"]["city"], "Y");
//! ```
//!
//! # Flags
//!
//! | Flag | Effect |
//! |------|--------|
//! | `PARTIAL` | Missing keys omit the property instead of failing |
//! | `IGNORE_UNKNOWN_PROPERTIES` | Unconsumed input keys are tolerated |
//! | `CAMEL_CASE_ARRAY` | Data keys are camelCase instead of snake_case |
//! | `MUTABLE` | Instance is edited in place ([`MutableDto`]) |
//!
//! # Type Names
//!
//! Primitive alternatives: `bool`, `boolean`, `true`, `false`, `int`,
//! `integer`, `float`, `double`, `string`, `array`, `iterable`, `object`,
//! `mixed`, `null`. A `[]` suffix declares a collection of that type. Any
//! other name is resolved as a schema.

mod case;
mod declaration;
mod dto;
mod error;
mod linter;
mod loader;
mod manipulate;
mod mapper;
mod processor;
mod property;
mod registry;
mod resolver;
mod types;

pub use case::{convert_keys, to_alternate_case, to_camel_case, to_snake_case};
pub use declaration::{Import, RawProperty, SchemaSource, ROOT_SCHEMA};
pub use dto::{Dto, DtoValue, MutableDto};
pub use error::{MapError, SchemaError, UnexpectedType};
pub use linter::{lint, lint_file, Diagnostic, FileResult, FileStatus, LintResult, Severity};
pub use loader::{load_payload, load_payload_str, load_source, load_sources};
pub use mapper::{map_properties, property_key_from_data, Remap};
pub use processor::{process_value, DefaultProcessor, ValueProcessor};
pub use property::MappedProperty;
pub use registry::{Hook, Schema, SchemaProperty, SchemaRegistry};
pub use resolver::{resolve_aliases, resolve_name, resolve_union, AliasTable};
pub use types::{is_primitive, value_type_name, Flags, PropertyType, PropertyTypes};
