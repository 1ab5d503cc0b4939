//! # octofhir-validator
//!
//! A runtime validator for HL7 FHIR R4 resources. Registered
//! StructureDefinitions, ValueSets, and CodeSystems are compiled once into an
//! executable [`compiler::CompiledValidator`] tree; documents are then
//! checked against that tree by an async tree-walking [`runtime`] without
//! ever re-parsing the defining resources.
//!
//! The pipeline: [`registry`] deduplicates incoming definitions by canonical
//! URL, [`deps`] extracts the reference graph between them, [`toposort`]
//! orders (and reports cycles in) that graph, [`intermediate`] flattens each
//! StructureDefinition's `snapshot.element` list into a tree, and
//! [`compiler`] lowers that tree into the executable form. [`hierarchy`]
//! answers `is-a`/descendant queries over CodeSystem concepts, and
//! [`catalog`] plugs in validators for external code systems the registry
//! never sees directly (BCP-47, UCUM). [`loader`] acquires resources from
//! disk or a package cache; [`validator`] is the facade tying all of the
//! above together behind `load_files`/`load_packages`/`validate`.
//!
//! ```rust,no_run
//! # async fn example() -> octofhir_validator::error::Result<()> {
//! use octofhir_validator::validator::{new_validator, ValidationOptions};
//!
//! let mut validator = new_validator(None);
//! validator.load_files(&["fixtures/r4-core".into()]).await?;
//!
//! let outcome = validator
//!     .validate(serde_json::json!({"resourceType": "Patient"}), ValidationOptions::default())
//!     .await?;
//! assert!(outcome.success || !outcome.errors.is_empty());
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "disk-cache")]
pub mod cache;
pub mod catalog;
pub mod cli;
pub mod compiler;
pub mod core;
pub mod deps;
pub mod error;
pub mod hierarchy;
pub mod intermediate;
pub mod loader;
pub mod model;
pub mod registry;
pub mod runtime;
pub mod toposort;
pub mod validator;

pub use error::{FhirSchemaError, Result};
pub use validator::{new_validator, Document, ValidationOptions, ValidationOutcome, Validator};
