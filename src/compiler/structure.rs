//! Lowers an [`IntermediateElement`] tree into a [`CompiledValidator`].
//! One call compiles exactly one StructureDefinition; nested element
//! types that resolve to another canonical URL are looked up lazily through
//! the shared [`SchemaIndex`] rather than inlined, so recursive structures
//! (e.g. `Extension.extension`) terminate.

use super::refinement::{Refinement, SliceDefinition};
use super::{CompiledValidator, SchemaIndex};
use crate::deps::normalize_type_url;
use crate::model::{IntermediateElement, StructureKind};
use std::collections::HashMap;

/// Regexes mirror the `FHIR-primitive-type` `pattern` extension values from
/// the base specification; see design notes for the subset implemented.
fn primitive_regex(code: &str) -> Option<&'static str> {
    match code {
        "code" => Some(r"^[^\s]+(\s[^\s]+)*$"),
        "id" => Some(r"^[A-Za-z0-9\-\.]{1,64}$"),
        "oid" => Some(r"^urn:oid:[0-2](\.(0|[1-9][0-9]*))+$"),
        "uuid" => Some(r"^urn:uuid:[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$"),
        "date" => Some(r"^-?[0-9]{4}(-(0[1-9]|1[0-2])(-(0[0-9]|[1-2][0-9]|3[0-1]))?)?$"),
        "dateTime" => Some(
            r"^-?[0-9]{4}(-(0[1-9]|1[0-2])(-(0[0-9]|[1-2][0-9]|3[0-1])(T([01][0-9]|2[0-3]):[0-5][0-9]:([0-5][0-9]|60)(\.[0-9]+)?(Z|(\+|-)((0[0-9]|1[0-3]):[0-5][0-9]|14:00))?)?)?)?$",
        ),
        "time" => Some(r"^([01][0-9]|2[0-3]):[0-5][0-9]:([0-5][0-9]|60)(\.[0-9]+)?$"),
        "instant" => Some(
            r"^[0-9]{4}-(0[1-9]|1[0-2])-(0[0-9]|[1-2][0-9]|3[0-1])T([01][0-9]|2[0-3]):[0-5][0-9]:([0-5][0-9]|60)(\.[0-9]+)?(Z|(\+|-)((0[0-9]|1[0-3]):[0-5][0-9]|14:00))$",
        ),
        _ => None,
    }
}

fn primitive_validator(code: &str) -> Option<CompiledValidator> {
    let pattern = primitive_regex(code).map(|p| p.to_string());
    match code {
        "boolean" => Some(CompiledValidator::Boolean),
        "integer" | "positiveInt" | "unsignedInt" => Some(CompiledValidator::Integer { min: None, max: None }),
        "decimal" => Some(CompiledValidator::Number { min: None, max: None }),
        "string" | "code" | "uri" | "url" | "canonical" | "oid" | "id" | "markdown" | "base64Binary" | "instant"
        | "date" | "dateTime" | "time" | "uuid" | "xhtml" => {
            Some(CompiledValidator::String { pattern, min_length: None, max_length: None })
        }
        _ => None,
    }
}

/// Compiles one StructureDefinition's root element into a validator. `index`
/// is queried for element types that resolve elsewhere and is *not* written
/// to here; the caller inserts the result once the whole tree is built so
/// that a definition never observes its own half-built entry.
///
/// A `kind = resource` definition is additionally intersected with
/// `Object{resourceType: Optional(String)}`, so the same validator accepts a
/// standalone resource document or the same shape nested inside a
/// `Reference`.
pub fn compile_structure_definition(root: &IntermediateElement, kind: Option<StructureKind>, index: &SchemaIndex) -> CompiledValidator {
    let validator = compile_element(root, index);
    if kind == Some(StructureKind::Resource) {
        let mut fields = HashMap::new();
        fields.insert(
            "resourceType".to_string(),
            CompiledValidator::Optional(Box::new(CompiledValidator::String { pattern: None, min_length: None, max_length: None })),
        );
        CompiledValidator::Intersection(vec![validator, CompiledValidator::Object { fields }])
    } else {
        validator
    }
}

fn compile_element(el: &IntermediateElement, index: &SchemaIndex) -> CompiledValidator {
    let v0 = compile_leaf(el, index);

    let mut base = if !el.children.is_empty() {
        let object = compile_object(el, index);
        let combined = CompiledValidator::Intersection(vec![v0, object]);
        CompiledValidator::Refined(Box::new(combined), vec![Refinement::NonEmptyObject])
    } else {
        v0
    };

    base = if el.is_repeating() {
        CompiledValidator::Array { item: Box::new(base), min: el.min, max: el.max }
    } else {
        base
    };

    base = if !el.is_required() && !el.is_repeating() {
        CompiledValidator::Optional(Box::new(base))
    } else {
        base
    };

    wrap_refinements(el, base, index)
}

fn compile_leaf(el: &IntermediateElement, index: &SchemaIndex) -> CompiledValidator {
    if let Some(v) = primitive_validator(&el.element_type) {
        return v;
    }
    index.resolve(&normalize_type_url(&el.element_type)).as_ref().clone()
}

/// A non-choice child becomes one `fields` entry keyed by its own name. A
/// `value[x]` child instead contributes one optional entry per declared type
/// (`valueString`, `valueBoolean`, ...), keyed by the concrete field name a
/// document actually uses, plus an `AtMostOneOfPrefix` refinement on the
/// whole object so at most one of those entries may be present at once.
fn compile_object(el: &IntermediateElement, index: &SchemaIndex) -> CompiledValidator {
    let mut fields = HashMap::new();
    let mut choice_prefixes = Vec::new();
    for child in &el.children {
        if child.is_choice_of_type() {
            let prefix = child.field_name.trim_end_matches("[x]").to_string();
            for t in &child.types {
                let field_name = format!("{prefix}{}", capitalize(t));
                let value = primitive_validator(t).unwrap_or_else(|| index.resolve(&normalize_type_url(t)).as_ref().clone());
                fields.insert(field_name, CompiledValidator::Optional(Box::new(value)));
            }
            choice_prefixes.push(prefix);
        } else {
            fields.insert(child.field_name.clone(), compile_element(child, index));
        }
    }
    let object = CompiledValidator::Object { fields };
    if choice_prefixes.is_empty() {
        object
    } else {
        let refinements = choice_prefixes.into_iter().map(Refinement::AtMostOneOfPrefix).collect();
        CompiledValidator::Refined(Box::new(object), refinements)
    }
}

fn capitalize(s: &str) -> String {
    let mut c = s.chars();
    match c.next() {
        Some(first) => first.to_uppercase().collect::<String>() + c.as_str(),
        None => String::new(),
    }
}

fn wrap_refinements(el: &IntermediateElement, base: CompiledValidator, index: &SchemaIndex) -> CompiledValidator {
    let mut refinements = Vec::new();

    for constraint in &el.constraints {
        refinements.push(Refinement::FhirPath {
            key: constraint.key.clone(),
            expression: constraint.expression.clone(),
            message: constraint.human.clone(),
        });
    }

    if let Some(fixed) = &el.fixed {
        refinements.push(Refinement::ExactValue { value: fixed.clone() });
    }

    if let Some(slicing) = &el.slicing {
        let slices = slicing
            .slices
            .iter()
            .map(|s| SliceDefinition {
                name: s.slice_name.clone().unwrap_or_default(),
                validator: Box::new(compile_element(s, index)),
                min: s.min,
                max: s.max,
            })
            .collect();
        refinements.push(Refinement::Slicing {
            discriminators: slicing.discriminators.clone(),
            rules: slicing.rules,
            slices,
        });
    }

    if refinements.is_empty() {
        base
    } else {
        CompiledValidator::Refined(Box::new(base), refinements)
    }
}
