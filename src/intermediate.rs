//! Lowers a StructureDefinition's flat `snapshot.element[]` list into a tree
//! of [`IntermediateElement`]s.

use crate::error::{CompileError, CompileErrorKind};
use crate::model::{
    Binding, Constraint, Discriminator, DiscriminatorType, IntermediateElement, Slicing,
    SlicingRules,
};
use serde_json::Value;
use std::collections::HashMap;

const BASE_ELEMENT_TYPE: &str = "Element";

pub fn build_intermediate_tree(sd: &Value, self_url: &str) -> Result<IntermediateElement, CompileError> {
    let type_name = sd
        .get("type")
        .and_then(|t| t.as_str())
        .ok_or_else(|| {
            CompileError::new(CompileErrorKind::MalformedDefinition, "StructureDefinition missing `type`")
                .with_url(self_url)
        })?;

    let elements = sd
        .get("snapshot")
        .and_then(|s| s.get("element"))
        .and_then(|e| e.as_array())
        .cloned()
        .unwrap_or_default();

    if elements.is_empty() {
        return Err(
            CompileError::new(CompileErrorKind::MalformedDefinition, "StructureDefinition has no snapshot elements")
                .with_url(self_url),
        );
    }

    let constraint_pool = build_constraint_pool(&elements);

    let mut nodes: HashMap<String, IntermediateElement> = HashMap::new();
    let mut child_order: HashMap<String, Vec<String>> = HashMap::new();
    let mut slice_order: HashMap<String, Vec<String>> = HashMap::new();
    let mut root_id = None;

    for el in &elements {
        let Some(id) = el.get("id").and_then(|v| v.as_str()).map(|s| s.to_string()) else {
            continue;
        };
        let path = el
            .get("path")
            .and_then(|v| v.as_str())
            .unwrap_or(&id)
            .to_string();

        if id == type_name {
            root_id = Some(id.clone());
        }

        let node = lower_element(&id, &path, el, &constraint_pool);

        if let Some(slice_name) = &node.slice_name {
            let parent_id = strip_slice_suffix(&id, slice_name);
            slice_order.entry(parent_id).or_default().push(id.clone());
        } else if id != type_name {
            let parent_id = strip_last_segment(&id);
            child_order.entry(parent_id).or_default().push(id.clone());
        }

        nodes.insert(id, node);
    }

    let root_id = root_id.ok_or_else(|| {
        CompileError::new(
            CompileErrorKind::MalformedDefinition,
            format!("no snapshot element with id matching root type `{type_name}`"),
        )
        .with_url(self_url)
    })?;

    assemble(&root_id, &mut nodes, &child_order, &slice_order, self_url)
}

fn lower_element(id: &str, path: &str, el: &Value, constraint_pool: &HashMap<String, Constraint>) -> IntermediateElement {
    let mut node = IntermediateElement::new(id, path);

    if let Some(slice_name) = el.get("sliceName").and_then(|v| v.as_str()) {
        node.slice_name = Some(slice_name.to_string());
    }

    let min = el.get("min").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
    let max = match el.get("max").and_then(|v| v.as_str()) {
        Some("*") => crate::model::UNBOUNDED,
        Some(n) => n.parse().unwrap_or(1),
        None => 1,
    };
    node.min = min;
    node.max = max;

    if let Some(types) = el.get("type").and_then(|v| v.as_array()) {
        let codes: Vec<String> = types
            .iter()
            .filter_map(|t| t.get("code").and_then(|c| c.as_str()).map(|s| s.to_string()))
            .collect();
        node.types = codes.clone();
        node.element_type = match codes.as_slice() {
            [single] => single.clone(),
            _ => "choice-of-type".to_string(),
        };
    }

    node.max_length = el.get("maxLength").and_then(|v| v.as_u64()).map(|n| n as usize);

    for prefix in ["pattern", "fixed", "minValue", "maxValue", "defaultValue"] {
        if let Some(v) = first_choice_value(el, prefix) {
            match prefix {
                "pattern" => node.pattern = Some(v),
                "fixed" => node.fixed = Some(v),
                "minValue" => node.min_value = Some(v),
                "maxValue" => node.max_value = Some(v),
                "defaultValue" => node.default_value = Some(v),
                _ => unreachable!(),
            }
        }
    }

    if let Some(binding) = el.get("binding") {
        let strength = binding.get("strength").and_then(|s| s.as_str());
        if strength == Some("required") {
            if let Some(vs) = binding.get("valueSet").and_then(|v| v.as_str()) {
                node.binding = Some(Binding {
                    strength: "required".to_string(),
                    value_set: vs.to_string(),
                });
            }
        }
    }

    node.constraints = collect_constraints(el, constraint_pool);

    if let Some(slicing) = el.get("slicing") {
        let rules = slicing
            .get("rules")
            .and_then(|r| r.as_str())
            .map(SlicingRules::from_str)
            .unwrap_or(SlicingRules::Open);
        let mut s = Slicing::new(rules);
        s.ordered = slicing.get("ordered").and_then(|o| o.as_bool()).unwrap_or(false);
        if let Some(discs) = slicing.get("discriminator").and_then(|d| d.as_array()) {
            for d in discs {
                let dtype = d
                    .get("type")
                    .and_then(|t| t.as_str())
                    .map(DiscriminatorType::from_str)
                    .unwrap_or(DiscriminatorType::Value);
                let path = d.get("path").and_then(|p| p.as_str()).unwrap_or("").to_string();
                s.discriminators.push(Discriminator { discriminator_type: dtype, path });
            }
        }
        node.slicing = Some(s);
    }

    node
}

/// Scans the element's own keys for any starting with `prefix` (choice-type
/// value extraction, e.g. `patternString`, `fixedCodeableConcept`).
fn first_choice_value(el: &Value, prefix: &str) -> Option<Value> {
    let obj = el.as_object()?;
    obj.iter()
        .find(|(k, _)| k.starts_with(prefix) && k.len() > prefix.len())
        .map(|(_, v)| v.clone())
}

fn build_constraint_pool(elements: &[Value]) -> HashMap<String, Constraint> {
    let mut pool = HashMap::new();
    for el in elements {
        if let Some(constraints) = el.get("constraint").and_then(|c| c.as_array()) {
            for c in constraints {
                if let Some(key) = c.get("key").and_then(|k| k.as_str()) {
                    if let Some(constraint) = parse_constraint(c) {
                        pool.insert(key.to_string(), constraint);
                    }
                }
            }
        }
    }
    pool
}

fn parse_constraint(c: &Value) -> Option<Constraint> {
    let key = c.get("key")?.as_str()?.to_string();
    let severity = c.get("severity").and_then(|s| s.as_str()).unwrap_or("error").to_string();
    let expression = c.get("expression").and_then(|e| e.as_str())?.to_string();
    let human = c.get("human").and_then(|h| h.as_str()).unwrap_or("").to_string();
    let source = c.get("source").and_then(|s| s.as_str()).map(|s| s.to_string());
    Some(Constraint { key, severity, expression, human, source })
}

fn collect_constraints(el: &Value, pool: &HashMap<String, Constraint>) -> Vec<Constraint> {
    let mut out: Vec<Constraint> = Vec::new();
    let mut seen = std::collections::HashSet::new();

    if let Some(constraints) = el.get("constraint").and_then(|c| c.as_array()) {
        for c in constraints {
            if let Some(constraint) = parse_constraint(c) {
                push_unique(&mut out, &mut seen, constraint);
            }
        }
    }

    if let Some(conditions) = el.get("condition").and_then(|c| c.as_array()) {
        for key in conditions {
            if let Some(key) = key.as_str() {
                if let Some(constraint) = pool.get(key) {
                    push_unique(&mut out, &mut seen, constraint.clone());
                }
                // Referenced-but-missing constraints are silently dropped
                // (see design notes: constraint source attribution).
            }
        }
    }

    out.retain(|c| c.severity == "error");
    out.retain(|c| c.source.as_deref() != Some(&format!("http://hl7.org/fhir/StructureDefinition/{BASE_ELEMENT_TYPE}")));
    out
}

fn push_unique(out: &mut Vec<Constraint>, seen: &mut std::collections::HashSet<String>, c: Constraint) {
    let dedup_key = format!("{}|{}|{}", c.expression, c.human, c.key);
    if seen.insert(dedup_key) {
        out.push(c);
    }
}

fn strip_last_segment(id: &str) -> String {
    match id.rfind('.') {
        Some(idx) => id[..idx].to_string(),
        None => id.to_string(),
    }
}

fn strip_slice_suffix(id: &str, slice_name: &str) -> String {
    let suffix = format!(":{slice_name}");
    id.strip_suffix(&suffix).unwrap_or(id).to_string()
}

fn assemble(
    id: &str,
    nodes: &mut HashMap<String, IntermediateElement>,
    child_order: &HashMap<String, Vec<String>>,
    slice_order: &HashMap<String, Vec<String>>,
    self_url: &str,
) -> Result<IntermediateElement, CompileError> {
    let mut node = nodes
        .remove(id)
        .ok_or_else(|| CompileError::new(CompileErrorKind::OrphanElement, format!("missing node `{id}`")).with_url(self_url))?;

    if let Some(slice_ids) = slice_order.get(id) {
        let slicing = node.slicing.get_or_insert_with(|| Slicing::new(SlicingRules::Open));
        for sid in slice_ids {
            let slice_node = assemble(sid, nodes, child_order, slice_order, self_url)?;
            slicing.slices.push(slice_node);
        }
    }

    if let Some(child_ids) = child_order.get(id) {
        for cid in child_ids {
            let child_node = assemble(cid, nodes, child_order, slice_order, self_url)?;
            node.children.push(child_node);
        }
    }

    Ok(node)
}
