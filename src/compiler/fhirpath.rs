//! FHIRPath constraint evaluation, backed by the `octofhir-fhirpath` engine
//! through the `octofhir-fhir-model` `FhirPathEvaluator`/`ModelProvider`
//! contracts shared across the OctoFHIR ecosystem.
//!
//! The runtime only needs the subset of model reflection required to
//! evaluate boolean invariants over a JSON tree; it already owns a complete
//! compiled type model (the [`crate::compiler::CompiledValidator`] map), so
//! [`RegistryModelProvider`] answers type questions from that map rather
//! than duplicating FHIR's base type hierarchy.

use crate::model::ResourceType;
use crate::registry::ResourceRegistry;
use async_trait::async_trait;
use octofhir_fhir_model::{FhirPathConstraint, FhirVersion as ModelFhirVersion, ModelProvider};
use serde_json::Value;
use std::sync::Arc;

/// Minimal `ModelProvider` backed by the resources already registered for
/// compilation. Reflection calls the runtime never exercises (navigation
/// path validation, reference resolution, primitive-extension boxing) return
/// conservative defaults instead of panicking.
#[derive(Debug)]
pub struct RegistryModelProvider {
    resource_types: Vec<String>,
}

impl RegistryModelProvider {
    pub fn new(registry: &ResourceRegistry) -> Self {
        let resource_types = registry
            .iter()
            .filter(|f| {
                f.resource_type == ResourceType::StructureDefinition
                    && f.kind == Some(crate::model::StructureKind::Resource)
            })
            .filter_map(|f| f.name.clone())
            .collect();
        Self { resource_types }
    }
}

#[async_trait]
impl ModelProvider for RegistryModelProvider {
    fn fhir_version(&self) -> ModelFhirVersion {
        ModelFhirVersion::R4
    }

    async fn is_resource_type(&self, type_name: &str) -> bool {
        self.resource_types.iter().any(|t| t == type_name)
    }

    async fn get_base_type(&self, _type_name: &str) -> Option<String> {
        None
    }
}

/// Evaluates `Refinement::FhirPath` constraints against a runtime document.
/// Any evaluation error is treated as a pass: a constraint this
/// engine cannot check must never produce a false positive.
pub struct ConstraintEvaluator {
    evaluator: Arc<dyn octofhir_fhir_model::FhirPathEvaluator>,
}

impl ConstraintEvaluator {
    pub fn new(evaluator: Arc<dyn octofhir_fhir_model::FhirPathEvaluator>) -> Self {
        Self { evaluator }
    }

    pub fn from_registry(registry: &ResourceRegistry) -> Self {
        let provider: Arc<dyn ModelProvider> = Arc::new(RegistryModelProvider::new(registry));
        let evaluator = octofhir_fhirpath::FhirPathEvaluator::new(provider);
        Self::new(Arc::new(evaluator))
    }

    pub async fn passes(&self, key: &str, human: &str, expression: &str, node: &Value) -> bool {
        let constraint = FhirPathConstraint::new(key.to_string(), human.to_string(), expression.to_string());
        match self.evaluator.validate_constraints(node, std::slice::from_ref(&constraint)).await {
            Ok(result) => result.is_valid,
            Err(err) => {
                tracing::debug!(%key, %expression, error = %err, "fhirpath constraint evaluation failed, treating as pass");
                true
            }
        }
    }
}
