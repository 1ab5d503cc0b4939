//! The public facade: owns the registry, the loader, and the frozen
//! compiled-schema snapshot produced by the most recent `load_*` call.

use crate::catalog::BuiltinCatalog;
use crate::compiler::fhirpath::ConstraintEvaluator;
use crate::compiler::{CompiledSchemas, CompiledValidator, Compiler};
use crate::core::ValidatorConfig;
use crate::error::{FhirSchemaError, Result, ValidationIssue};
use crate::loader::{FileLoader, ResourceLoader};
use crate::registry::ResourceRegistry;
use crate::runtime::{self, ValidationContext};
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// A document to validate: a parsed JSON value, a raw string (tried as a file
/// path first, then parsed as JSON), or an explicit file path.
pub enum Document {
    Value(Value),
    Str(String),
    Path(PathBuf),
}

impl From<Value> for Document {
    fn from(v: Value) -> Self {
        Document::Value(v)
    }
}

impl From<&str> for Document {
    fn from(s: &str) -> Self {
        Document::Str(s.to_string())
    }
}

impl From<String> for Document {
    fn from(s: String) -> Self {
        Document::Str(s)
    }
}

impl From<PathBuf> for Document {
    fn from(p: PathBuf) -> Self {
        Document::Path(p)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ValidationOptions {
    pub profiles: Vec<String>,
    pub ignore_self_declared_profiles: bool,
    pub ignore_unknown_schemas: bool,
}

#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    pub success: bool,
    pub errors: Vec<String>,
    pub data: Option<Value>,
}

pub struct Validator {
    registry: ResourceRegistry,
    loader: Box<dyn ResourceLoader>,
    compiled: CompiledSchemas,
    catalog: BuiltinCatalog,
    constraint_evaluator: Option<ConstraintEvaluator>,
    config: ValidatorConfig,
}

/// Constructs an empty validator with a pluggable resource loader; `None`
/// defaults to a plain filesystem loader (no package resolution). Starts with
/// an empty compiled index, so validating before any `load_*` call resolves
/// every profile as unknown rather than vacuously succeeding.
pub fn new_validator(loader: Option<Box<dyn ResourceLoader>>) -> Validator {
    Validator {
        registry: ResourceRegistry::new(),
        loader: loader.unwrap_or_else(|| Box::new(FileLoader::new())),
        compiled: CompiledSchemas::empty(),
        catalog: BuiltinCatalog::with_defaults(),
        constraint_evaluator: None,
        config: ValidatorConfig::default(),
    }
}

impl Validator {
    pub fn with_config(mut self, config: ValidatorConfig) -> Self {
        self.config = config;
        self
    }

    pub async fn load_packages(&mut self, ids: &[String]) -> Result<()> {
        let files = self.loader.load_packages(ids).await?;
        self.registry.register_all(files);
        self.recompile();
        Ok(())
    }

    pub async fn load_files(&mut self, paths: &[PathBuf]) -> Result<()> {
        let files = self.loader.load_files(paths).await?;
        self.registry.register_all(files);
        self.recompile();
        Ok(())
    }

    fn recompile(&mut self) {
        tracing::info!(resources = self.registry.len(), "recompiling schema index");

        #[cfg(feature = "disk-cache")]
        if let Some(compiled) = self.load_from_disk_cache() {
            self.constraint_evaluator = Some(ConstraintEvaluator::from_registry(&self.registry));
            self.compiled = compiled;
            return;
        }

        let compiled = Compiler::new(&self.registry).compile_all();
        for cycle in &compiled.cycles {
            tracing::warn!(?cycle, "dependency cycle detected; participating URLs resolve permissively");
        }

        #[cfg(feature = "disk-cache")]
        self.store_to_disk_cache(&compiled);

        self.constraint_evaluator = Some(ConstraintEvaluator::from_registry(&self.registry));
        self.compiled = compiled;
    }

    #[cfg(feature = "disk-cache")]
    fn load_from_disk_cache(&self) -> Option<CompiledSchemas> {
        let dir = self.config.cache_dir.as_deref()?;
        let key = crate::cache::cache_key(&self.registry);
        let cached = crate::cache::load(Path::new(dir), &key, self.config.cache_config.ttl)?;
        tracing::debug!(key, "loaded compiled schema index from disk cache");
        Some(cached)
    }

    #[cfg(feature = "disk-cache")]
    fn store_to_disk_cache(&self, compiled: &CompiledSchemas) {
        let Some(dir) = self.config.cache_dir.as_deref() else {
            return;
        };
        let key = crate::cache::cache_key(&self.registry);
        if let Err(err) = crate::cache::store(Path::new(dir), &key, compiled) {
            tracing::warn!(error = %err, "failed to persist compiled schema index to disk cache");
        }
    }

    /// True iff a compiled validator exists for this canonical URL or name.
    pub fn recognizes(&self, canonical_url_or_name: &str) -> bool {
        self.compiled.index.get(canonical_url_or_name).is_some()
    }

    /// A one-line summary of a compiled validator's shape, for CLI inspection.
    pub fn describe(&self, canonical_url_or_name: &str) -> Option<String> {
        let validator = self.compiled.index.get(canonical_url_or_name)?;
        Some(describe_validator(&validator))
    }

    pub async fn validate(&self, document: impl Into<Document>, options: ValidationOptions) -> Result<ValidationOutcome> {
        let resolved = resolve_document(document.into())?;
        let compiled = &self.compiled;

        let mut profiles: Vec<String> = options.profiles.clone();
        if !options.ignore_self_declared_profiles {
            if let Some(declared) = resolved.get("meta").and_then(|m| m.get("profile")).and_then(|p| p.as_array()) {
                for p in declared {
                    if let Some(p) = p.as_str() {
                        profiles.push(p.to_string());
                    }
                }
            }
        }
        if let Some(url) = resolved.get("url").and_then(|u| u.as_str()) {
            profiles.push(url.to_string());
        }

        let mut issues: Vec<ValidationIssue> = Vec::new();
        let ctx = ValidationContext {
            index: &compiled.index,
            hierarchies: &compiled.hierarchies,
            catalog: &self.catalog,
            constraint_evaluator: self.constraint_evaluator.as_ref(),
        };

        for profile in &profiles {
            if self.recognizes(profile) {
                let validator = compiled.index.resolve(profile);
                runtime::validate(&validator, &resolved, String::new(), &resolved, &ctx, &mut issues).await;
            } else if !options.ignore_unknown_schemas {
                issues.push(ValidationIssue::new(crate::error::ValidationIssueKind::UnknownProfile, "", format!("Could not find schema for {profile}")));
            }
        }

        let errors: BTreeSet<String> = issues.iter().map(|i| format!("{}: {}", i.path, i.message)).collect();
        let errors: Vec<String> = errors.into_iter().collect();
        let success = errors.is_empty();
        Ok(ValidationOutcome { success, errors, data: Some(resolved) })
    }
}

fn resolve_document(document: Document) -> Result<Value> {
    match document {
        Document::Value(v) => Ok(v),
        Document::Path(path) => read_and_parse(&path),
        Document::Str(s) => {
            let path = Path::new(&s);
            if path.is_file() {
                read_and_parse(path)
            } else {
                Ok(serde_json::from_str(&s).unwrap_or(Value::String(s)))
            }
        }
    }
}

fn read_and_parse(path: &Path) -> Result<Value> {
    let contents = std::fs::read_to_string(path).map_err(FhirSchemaError::from)?;
    serde_json::from_str(&contents).map_err(FhirSchemaError::from)
}

fn describe_validator(validator: &CompiledValidator) -> String {
    match validator {
        CompiledValidator::Any => "Any (unresolved or permissive)".to_string(),
        CompiledValidator::Never => "Never".to_string(),
        CompiledValidator::Boolean => "Boolean".to_string(),
        CompiledValidator::Integer { .. } => "Integer".to_string(),
        CompiledValidator::Number { .. } => "Number".to_string(),
        CompiledValidator::String { pattern, .. } => match pattern {
            Some(p) => format!("String matching `{p}`"),
            None => "String".to_string(),
        },
        CompiledValidator::Literal(v) => format!("Literal({v})"),
        CompiledValidator::Enum(codes) => format!("Enum with {} code(s)", codes.len()),
        CompiledValidator::Array { item, min, max } => {
            format!("Array[{min}..{}] of {}", if *max == crate::model::UNBOUNDED { "*".to_string() } else { max.to_string() }, describe_validator(item))
        }
        CompiledValidator::Optional(inner) => format!("Optional({})", describe_validator(inner)),
        CompiledValidator::Object { fields } => format!("Object with {} field(s)", fields.len()),
        CompiledValidator::Union(variants) => format!("Union of {} variant(s)", variants.len()),
        CompiledValidator::Intersection(parts) => format!("Intersection of {} part(s)", parts.len()),
        CompiledValidator::Refined(inner, refinements) => format!("{} refined by {} rule(s)", describe_validator(inner), refinements.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unrecognized_profile_reports_unknown_schema() {
        let validator = new_validator(None);
        let outcome = validator
            .validate(
                serde_json::json!({"resourceType": "Patient"}),
                ValidationOptions { profiles: vec!["http://example.org/missing".to_string()], ..Default::default() },
            )
            .await
            .unwrap();
        assert!(!outcome.success);
        assert!(outcome.errors[0].contains("Could not find schema"));
    }

    #[tokio::test]
    async fn ignoring_unknown_schemas_suppresses_the_issue() {
        let validator = new_validator(None);
        let outcome = validator
            .validate(
                serde_json::json!({"resourceType": "Patient"}),
                ValidationOptions {
                    profiles: vec!["http://example.org/missing".to_string()],
                    ignore_unknown_schemas: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(outcome.success);
    }

    /// A plain `#[test]` driving the async facade through `tokio_test::block_on`,
    /// for call sites that can't take on a `#[tokio::test]` runtime themselves.
    #[test]
    fn block_on_reaches_the_same_outcome_as_tokio_test() {
        let validator = new_validator(None);
        let outcome = tokio_test::block_on(validator.validate(serde_json::json!({"resourceType": "Patient"}), ValidationOptions::default()));
        assert!(outcome.unwrap().success);
    }
}
