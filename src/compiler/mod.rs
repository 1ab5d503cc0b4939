//! Schema Compiler: turns a dependency-ordered set of registered
//! resources into a [`CompiledValidator`] per canonical URL.

mod codesystem;
pub mod fhirpath;
pub mod refinement;
mod structure;
mod valueset;

pub use refinement::Refinement;

use crate::deps::dependencies_of;
use crate::hierarchy::ConceptHierarchy;
use crate::intermediate::build_intermediate_tree;
use crate::model::ResourceType;
use crate::registry::ResourceRegistry;
use crate::toposort::topo_sort;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// The executable form a compiled StructureDefinition, ValueSet, or
/// CodeSystem reduces to. Validation is a single recursive match over this
/// type; nothing downstream inspects raw JSON schemas again. Serializable so
/// the `disk-cache` feature can persist a compiled index between runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CompiledValidator {
    /// Accepts anything; used for unresolved or cyclic dependencies.
    Any,
    /// Rejects everything; used for `Never`-kind StructureDefinitions such as
    /// abstract base types with no snapshot of their own.
    Never,
    String {
        pattern: Option<String>,
        min_length: Option<usize>,
        max_length: Option<usize>,
    },
    Number {
        min: Option<f64>,
        max: Option<f64>,
    },
    Integer {
        min: Option<i64>,
        max: Option<i64>,
    },
    Boolean,
    Literal(Value),
    Enum(BTreeSet<String>),
    Array {
        item: Box<CompiledValidator>,
        min: u32,
        max: u32,
    },
    Optional(Box<CompiledValidator>),
    Object {
        fields: HashMap<String, CompiledValidator>,
    },
    Union(Vec<CompiledValidator>),
    Intersection(Vec<CompiledValidator>),
    Refined(Box<CompiledValidator>, Vec<Refinement>),
}

/// Accumulating by-URL map of compiled validators, shared across the whole
/// compilation pass. Resolving a URL not yet compiled (a forward reference
/// broken by a cycle) yields [`CompiledValidator::Any`] rather than blocking.
#[derive(Debug, Default)]
pub struct SchemaIndex {
    entries: DashMap<String, Arc<CompiledValidator>>,
}

impl SchemaIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, url: impl Into<String>, validator: CompiledValidator) {
        self.entries.insert(url.into(), Arc::new(validator));
    }

    pub fn resolve(&self, url: &str) -> Arc<CompiledValidator> {
        self.entries.get(url).map(|v| v.clone()).unwrap_or_else(|| Arc::new(CompiledValidator::Any))
    }

    pub fn get(&self, url: &str) -> Option<Arc<CompiledValidator>> {
        self.entries.get(url).map(|v| v.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn urls(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.key().clone()).collect()
    }
}

/// Everything produced by one compilation pass: the compiled schemas, the
/// concept hierarchies registered for filter refinements, and any dependency
/// cycles detected along the way (diagnostic, not fatal).
pub struct CompiledSchemas {
    pub index: Arc<SchemaIndex>,
    pub hierarchies: HashMap<String, ConceptHierarchy>,
    pub cycles: Vec<Vec<String>>,
}

impl CompiledSchemas {
    /// The state of a validator that hasn't loaded any resources yet: an
    /// empty index, so every profile resolution falls through to an
    /// `UnknownProfile` issue instead of a premature always-succeeds result.
    pub fn empty() -> Self {
        Self { index: Arc::new(SchemaIndex::new()), hierarchies: HashMap::new(), cycles: Vec::new() }
    }
}

pub struct Compiler<'a> {
    registry: &'a ResourceRegistry,
}

impl<'a> Compiler<'a> {
    pub fn new(registry: &'a ResourceRegistry) -> Self {
        Self { registry }
    }

    /// Runs the full Dependency Analyzer → Topological Sorter → Intermediate
    /// Form Builder → Schema Compiler → Concept Hierarchy Engine pipeline
    /// over every resource currently in the registry.
    pub fn compile_all(&self) -> CompiledSchemas {
        let mut deps_map = HashMap::new();
        for file in self.registry.iter() {
            deps_map.insert(file.url.clone(), dependencies_of(file).into_iter().collect::<Vec<_>>());
        }

        let result = topo_sort(&deps_map);
        let index = Arc::new(SchemaIndex::new());
        let mut hierarchies: HashMap<String, ConceptHierarchy> = HashMap::new();

        for url in &result.sorted {
            let Some(file) = self.registry.get(url) else {
                continue;
            };

            match file.resource_type {
                ResourceType::StructureDefinition => {
                    match build_intermediate_tree(&file.body, url) {
                        Ok(root) => {
                            let validator = structure::compile_structure_definition(&root, file.kind, &index);
                            index.insert(url.clone(), validator);
                        }
                        Err(err) => {
                            tracing::warn!(url, error = %err, "structure definition compiled as permissive fallback");
                            index.insert(url.clone(), CompiledValidator::Any);
                        }
                    }
                }
                ResourceType::ValueSet => {
                    let validator = valueset::compile_value_set(&file.body, &hierarchies, &index);
                    index.insert(url.clone(), validator);
                }
                ResourceType::CodeSystem => {
                    if file.body.get("content").and_then(|c| c.as_str()).unwrap_or("complete") == "complete" {
                        hierarchies.insert(url.clone(), ConceptHierarchy::from_code_system(url, &file.body));
                    }
                    match codesystem::compile_code_system(url, &file.body) {
                        Some(validator) => index.insert(url.clone(), validator),
                        None => tracing::debug!(url, "code system contributes no compiled validator"),
                    }
                }
                ResourceType::ConceptMap
                | ResourceType::StructureMap
                | ResourceType::ImplementationGuide
                | ResourceType::Other => {
                    // No compiled validator: these kinds participate in the
                    // dependency graph (for ordering/diagnostics) but are
                    // never referenced from a `CompiledValidator` tree.
                }
            }
        }

        CompiledSchemas { index, hierarchies, cycles: result.cycles }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ResourceFile, ResourceStatus, ResourceType as RT, StructureKind};
    use std::path::PathBuf;

    fn file(url: &str, rtype: RT, body: Value) -> ResourceFile {
        ResourceFile {
            file_path: PathBuf::from(format!("{url}.json")),
            resource_type: rtype,
            url: url.to_string(),
            name: None,
            kind: if rtype == RT::StructureDefinition { Some(StructureKind::Resource) } else { None },
            base_definition: None,
            date: None,
            status: ResourceStatus::Active,
            experimental: false,
            body,
        }
    }

    /// Depth-first search for the `Object` layer through the
    /// `Intersection`/`Refined` wrapping a resource-kind definition picks up
    /// (the `resourceType` intersection, the root's `NonEmptyObject` refinement).
    fn find_field<'a>(validator: &'a CompiledValidator, name: &str) -> Option<&'a CompiledValidator> {
        match validator {
            CompiledValidator::Object { fields } => fields.get(name).or_else(|| fields.values().find_map(|v| find_field(v, name))),
            CompiledValidator::Intersection(parts) | CompiledValidator::Union(parts) => parts.iter().find_map(|p| find_field(p, name)),
            CompiledValidator::Refined(inner, _) | CompiledValidator::Optional(inner) => find_field(inner, name),
            CompiledValidator::Array { item, .. } => find_field(item, name),
            _ => None,
        }
    }

    #[test]
    fn compiles_simple_structure_definition() {
        let mut registry = ResourceRegistry::new();
        registry.register(file(
            "http://example.org/StructureDefinition/Minimal",
            RT::StructureDefinition,
            serde_json::json!({
                "type": "Minimal",
                "snapshot": {
                    "element": [
                        {"id": "Minimal", "path": "Minimal", "min": 0, "max": "1"},
                        {"id": "Minimal.name", "path": "Minimal.name", "min": 1, "max": "1", "type": [{"code": "string"}]},
                    ]
                }
            }),
        ));

        let compiled = Compiler::new(&registry).compile_all();
        let validator = compiled.index.resolve("http://example.org/StructureDefinition/Minimal");
        assert!(find_field(&validator, "name").is_some(), "expected a `name` field somewhere in {validator:?}");
    }

    #[test]
    fn code_system_compiles_to_enum_and_registers_hierarchy() {
        let mut registry = ResourceRegistry::new();
        registry.register(file(
            "http://example.org/CodeSystem/animals",
            RT::CodeSystem,
            serde_json::json!({"content": "complete", "concept": [{"code": "cat"}, {"code": "dog"}]}),
        ));

        let compiled = Compiler::new(&registry).compile_all();
        assert!(compiled.hierarchies.contains_key("http://example.org/CodeSystem/animals"));
        match compiled.index.resolve("http://example.org/CodeSystem/animals").as_ref() {
            CompiledValidator::Enum(codes) => {
                assert!(codes.contains("cat") && codes.contains("dog"));
            }
            other => panic!("expected Enum, got {other:?}"),
        }
    }

    #[test]
    fn unresolved_dependency_falls_back_to_any() {
        let compiled = Compiler::new(&ResourceRegistry::new()).compile_all();
        assert!(matches!(compiled.index.resolve("http://nowhere").as_ref(), CompiledValidator::Any));
    }
}
