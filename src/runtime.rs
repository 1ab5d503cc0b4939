//! Validator Runtime: an async tree-walking evaluator over a
//! [`CompiledValidator`], producing a flat list of [`ValidationIssue`]s.
//! Every branch is "uniformly awaitable" — even the purely structural
//! matches go through the same `async fn` so a `Refinement::FhirPath` deep in
//! the tree never needs a separate sync/async split.

use crate::catalog::BuiltinCatalog;
use crate::compiler::fhirpath::ConstraintEvaluator;
use crate::compiler::refinement::{FilterOp, Refinement};
use crate::compiler::{CompiledValidator, SchemaIndex};
use crate::error::{ValidationIssue, ValidationIssueKind};
use crate::hierarchy::ConceptHierarchy;
use crate::model::UNBOUNDED;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use std::collections::HashMap;

pub struct ValidationContext<'a> {
    pub index: &'a SchemaIndex,
    pub hierarchies: &'a HashMap<String, ConceptHierarchy>,
    pub catalog: &'a BuiltinCatalog,
    pub constraint_evaluator: Option<&'a ConstraintEvaluator>,
}

/// Validates `node` against `validator`, appending any findings to `issues`.
/// Boxed because the structural variants (`Object`, `Array`, `Refined`, ...)
/// recurse into this same function from inside an `async move` block.
pub fn validate<'a>(
    validator: &'a CompiledValidator,
    node: &'a Value,
    path: String,
    root: &'a Value,
    ctx: &'a ValidationContext<'a>,
    issues: &'a mut Vec<ValidationIssue>,
) -> BoxFuture<'a, ()> {
    async move {
        match validator {
            CompiledValidator::Any => {}

            CompiledValidator::Never => {
                issues.push(ValidationIssue::new(ValidationIssueKind::TypeMismatch, path, "no value permitted here"));
            }

            CompiledValidator::Boolean => {
                if !node.is_boolean() {
                    issues.push(type_mismatch(&path, "boolean", node));
                }
            }

            CompiledValidator::Integer { min, max } => match node.as_i64() {
                Some(n) => {
                    if min.is_some_and(|m| n < m) || max.is_some_and(|m| n > m) {
                        issues.push(ValidationIssue::new(ValidationIssueKind::BoundaryViolation, path, format!("{n} is out of range")));
                    }
                }
                None => issues.push(type_mismatch(&path, "integer", node)),
            },

            CompiledValidator::Number { min, max } => match node.as_f64() {
                Some(n) => {
                    if min.is_some_and(|m| n < m) || max.is_some_and(|m| n > m) {
                        issues.push(ValidationIssue::new(ValidationIssueKind::BoundaryViolation, path, format!("{n} is out of range")));
                    }
                }
                None => issues.push(type_mismatch(&path, "number", node)),
            },

            CompiledValidator::String { pattern, min_length, max_length } => match node.as_str() {
                Some(s) => {
                    if min_length.is_some_and(|m| s.len() < m) || max_length.is_some_and(|m| s.len() > m) {
                        issues.push(ValidationIssue::new(ValidationIssueKind::LengthViolation, path.clone(), format!("`{s}` has invalid length")));
                    }
                    if let Some(p) = pattern {
                        if let Ok(re) = regex::Regex::new(p) {
                            if !re.is_match(s) {
                                issues.push(ValidationIssue::new(ValidationIssueKind::RegexViolation, path, format!("`{s}` does not match `{p}`")));
                            }
                        }
                    }
                }
                None => issues.push(type_mismatch(&path, "string", node)),
            },

            CompiledValidator::Literal(expected) => {
                if node != expected {
                    issues.push(ValidationIssue::new(ValidationIssueKind::PatternViolation, path, "literal value mismatch"));
                }
            }

            CompiledValidator::Enum(allowed) => match node.as_str() {
                Some(s) if allowed.contains(s) => {}
                Some(s) => issues.push(ValidationIssue::new(ValidationIssueKind::EnumViolation, path, format!("`{s}` is not a recognized code"))),
                None => issues.push(type_mismatch(&path, "code", node)),
            },

            CompiledValidator::Array { item, min, max } => match node.as_array() {
                Some(items) => {
                    let len = items.len() as u32;
                    if len < *min || (*max != UNBOUNDED && len > *max) {
                        issues.push(ValidationIssue::new(
                            ValidationIssueKind::CardinalityViolation,
                            path.clone(),
                            format!("expected {}..{} items, found {len}", min, if *max == UNBOUNDED { "*".to_string() } else { max.to_string() }),
                        ));
                    }
                    for (i, v) in items.iter().enumerate() {
                        validate(item, v, format!("{path}[{i}]"), root, ctx, issues).await;
                    }
                }
                None => issues.push(type_mismatch(&path, "array", node)),
            },

            CompiledValidator::Optional(inner) => {
                if !node.is_null() {
                    validate(inner, node, path, root, ctx, issues).await;
                }
            }

            CompiledValidator::Object { fields } => match node.as_object() {
                Some(obj) => {
                    for (name, sub) in fields {
                        let child = obj.get(name).cloned().unwrap_or(Value::Null);
                        validate(sub, &child, format!("{path}.{name}"), root, ctx, issues).await;
                    }
                }
                None => issues.push(type_mismatch(&path, "object", node)),
            },

            CompiledValidator::Union(variants) => {
                let mut best: Option<Vec<ValidationIssue>> = None;
                let mut matched = false;
                for v in variants {
                    let mut sub_issues = Vec::new();
                    validate(v, node, path.clone(), root, ctx, &mut sub_issues).await;
                    if sub_issues.is_empty() {
                        matched = true;
                        break;
                    }
                    if best.as_ref().is_none_or(|b| sub_issues.len() < b.len()) {
                        best = Some(sub_issues);
                    }
                }
                if !matched {
                    issues.push(ValidationIssue::new(ValidationIssueKind::ChoiceOfTypeAmbiguity, path, "value matches no declared type"));
                    issues.extend(best.unwrap_or_default());
                }
            }

            CompiledValidator::Intersection(parts) => {
                for p in parts {
                    validate(p, node, path.clone(), root, ctx, issues).await;
                }
            }

            CompiledValidator::Refined(inner, refinements) => {
                validate(inner, node, path.clone(), root, ctx, issues).await;
                for refinement in refinements {
                    apply_refinement(refinement, node, &path, root, ctx, issues).await;
                }
            }
        }
    }
    .boxed()
}

fn type_mismatch(path: &str, expected: &str, node: &Value) -> ValidationIssue {
    ValidationIssue::new(ValidationIssueKind::TypeMismatch, path, format!("expected {expected}, found {}", kind_of(node)))
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// True when `path` names an array element (`...foo[3]`) rather than a
/// direct field (`...foo`). `NonEmptyObject` tolerates `{}` at array
/// positions (an empty repeating element is still a placeholder slot) but
/// rejects it everywhere else.
fn is_array_position(path: &str) -> bool {
    path.ends_with(']')
}

/// Resolves the string `node` is compared against for one filter refinement:
/// the node's own code when `property` names the code itself, otherwise the
/// string form of that property on the matching concept (`None` if the
/// concept or property isn't found).
fn filter_target<'a>(property: &str, code: &'a str, hierarchy: Option<&ConceptHierarchy>) -> Option<String> {
    if property == "code" || property == "concept" {
        return Some(code.to_string());
    }
    hierarchy?.find(code)?.properties.get(property).map(|v| v.as_string())
}

/// Evaluates one ValueSet filter predicate. `hierarchy` is `None` when the
/// referenced CodeSystem has no materialized concept tree (e.g. `content =
/// not-present`), in which case every predicate degrades to its conservative
/// single-value form so an unanalyzable system never causes a spurious
/// failure.
fn filter_accepts(op: FilterOp, target: &str, value: &str, hierarchy: Option<&ConceptHierarchy>) -> bool {
    match op {
        FilterOp::Equals => target == value,
        FilterOp::Regex => regex::Regex::new(value).map(|re| re.is_match(target)).unwrap_or(true),
        FilterOp::In => value.split(',').map(str::trim).any(|c| c == target),
        FilterOp::NotIn => !value.split(',').map(str::trim).any(|c| c == target),
        FilterOp::IsA => target == value || hierarchy.is_some_and(|h| h.descendants(value).iter().any(|d| d == target)),
        FilterOp::IsNotA => !filter_accepts(FilterOp::IsA, target, value, hierarchy),
        FilterOp::DescendantOf => match hierarchy {
            Some(h) => h.descendants(value).iter().any(|d| d == target),
            None => target != value,
        },
        FilterOp::Generalizes => target == value || hierarchy.is_some_and(|h| h.ancestors(value).iter().any(|a| a == target)),
    }
}

async fn apply_refinement(
    refinement: &Refinement,
    node: &Value,
    path: &str,
    root: &Value,
    ctx: &ValidationContext<'_>,
    issues: &mut Vec<ValidationIssue>,
) {
    match refinement {
        Refinement::FhirPath { key, expression, message } => {
            if let Some(evaluator) = ctx.constraint_evaluator {
                if !evaluator.passes(key, message, expression, node).await {
                    issues.push(ValidationIssue::new(ValidationIssueKind::FhirPathConstraint, path, message.clone()));
                }
            }
        }

        Refinement::AtMostOneOfPrefix(prefix) => {
            if let Some(obj) = node.as_object() {
                let present: Vec<&String> = obj.keys().filter(|k| k.starts_with(prefix.as_str())).collect();
                if present.len() > 1 {
                    issues.push(ValidationIssue::new(
                        ValidationIssueKind::ChoiceOfTypeAmbiguity,
                        path,
                        format!("only one of {present:?} may be present"),
                    ));
                }
            }
        }

        Refinement::NonEmptyObject => {
            if node.as_object().is_some_and(|obj| obj.is_empty()) && !is_array_position(path) {
                issues.push(ValidationIssue::new(ValidationIssueKind::MissingRequiredField, path, "element must have a value or children"));
            }
        }

        Refinement::ExactValue { value } => {
            if node != value {
                issues.push(ValidationIssue::new(ValidationIssueKind::PatternViolation, path, format!("value does not match fixed value {value}")));
            }
        }

        Refinement::Slicing { rules, slices, .. } => {
            if let Some(arr) = node.as_array() {
                let mut counts = vec![0u32; slices.len()];
                for (i, item) in arr.iter().enumerate() {
                    let mut matched = None;
                    for (si, slice) in slices.iter().enumerate() {
                        let mut probe = Vec::new();
                        validate(&slice.validator, item, format!("{path}[{i}]"), root, ctx, &mut probe).await;
                        if probe.is_empty() {
                            matched = Some(si);
                            break;
                        }
                    }
                    match matched {
                        Some(si) => counts[si] += 1,
                        None if *rules == crate::model::SlicingRules::Closed => {
                            issues.push(ValidationIssue::new(ValidationIssueKind::SliceUnmatched, format!("{path}[{i}]"), "element matches no defined slice"));
                        }
                        None => {}
                    }
                }
                for (slice, count) in slices.iter().zip(counts) {
                    if count < slice.min {
                        issues.push(ValidationIssue::new(
                            ValidationIssueKind::SliceUnmatched,
                            path,
                            format!("slice '{}' requires at least {} match(es), found {count}", slice.name, slice.min),
                        ));
                    } else if slice.max != UNBOUNDED && count > slice.max {
                        issues.push(ValidationIssue::new(
                            ValidationIssueKind::CardinalityViolation,
                            path,
                            format!("slice '{}' allows at most {} match(es), found {count}", slice.name, slice.max),
                        ));
                    }
                }
            }
        }

        Refinement::Filter { op, value, property, code_system_url } => {
            let Some(code) = node.as_str() else { return };
            let hierarchy = ctx.hierarchies.get(code_system_url);
            let Some(target) = filter_target(property, code, hierarchy) else {
                // The concept (or its property) isn't in the hierarchy;
                // never a false positive for an unanalyzable system.
                return;
            };
            if !filter_accepts(*op, &target, value, hierarchy) {
                issues.push(ValidationIssue::new(
                    ValidationIssueKind::EnumViolation,
                    path,
                    format!("`{code}` does not satisfy filter {property} {op:?} {value} on {code_system_url}"),
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::SchemaIndex;
    use std::collections::BTreeSet;

    fn empty_ctx<'a>(index: &'a SchemaIndex, hierarchies: &'a HashMap<String, ConceptHierarchy>, catalog: &'a BuiltinCatalog) -> ValidationContext<'a> {
        ValidationContext { index, hierarchies, catalog, constraint_evaluator: None }
    }

    #[tokio::test]
    async fn boolean_mismatch_is_reported() {
        let index = SchemaIndex::new();
        let hierarchies = HashMap::new();
        let catalog = BuiltinCatalog::new();
        let ctx = empty_ctx(&index, &hierarchies, &catalog);
        let root = serde_json::json!("not a bool");
        let mut issues = Vec::new();
        validate(&CompiledValidator::Boolean, &root, "x".to_string(), &root, &ctx, &mut issues).await;
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, ValidationIssueKind::TypeMismatch);
    }

    #[tokio::test]
    async fn enum_accepts_known_code_rejects_unknown() {
        let index = SchemaIndex::new();
        let hierarchies = HashMap::new();
        let catalog = BuiltinCatalog::new();
        let ctx = empty_ctx(&index, &hierarchies, &catalog);
        let allowed: BTreeSet<String> = ["male", "female"].into_iter().map(String::from).collect();
        let validator = CompiledValidator::Enum(allowed);

        let root = serde_json::json!("male");
        let mut issues = Vec::new();
        validate(&validator, &root, "gender".to_string(), &root, &ctx, &mut issues).await;
        assert!(issues.is_empty());

        let root = serde_json::json!("unknown-value");
        let mut issues = Vec::new();
        validate(&validator, &root, "gender".to_string(), &root, &ctx, &mut issues).await;
        assert_eq!(issues[0].kind, ValidationIssueKind::EnumViolation);
    }

    #[tokio::test]
    async fn object_reports_missing_required_field() {
        let index = SchemaIndex::new();
        let hierarchies = HashMap::new();
        let catalog = BuiltinCatalog::new();
        let ctx = empty_ctx(&index, &hierarchies, &catalog);
        let mut fields = HashMap::new();
        fields.insert("name".to_string(), CompiledValidator::String { pattern: None, min_length: None, max_length: None });
        let validator = CompiledValidator::Object { fields };

        let root = serde_json::json!({});
        let mut issues = Vec::new();
        validate(&validator, &root, "root".to_string(), &root, &ctx, &mut issues).await;
        assert_eq!(issues[0].kind, ValidationIssueKind::TypeMismatch);
    }
}
