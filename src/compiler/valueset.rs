//! Lowers `ValueSet.compose` into a [`CompiledValidator`], preferring a
//! concrete [`CompiledValidator::Enum`] when the composition can be fully
//! expanded at compile time, and falling back to a `Filter`-refined
//! validator answered by the Concept Hierarchy Engine or Built-in Catalog
//! otherwise.

use super::refinement::{FilterOp, Refinement};
use super::{CompiledValidator, SchemaIndex};
use crate::hierarchy::ConceptHierarchy;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};

fn permissive_default() -> CompiledValidator {
    CompiledValidator::String { pattern: None, min_length: Some(1), max_length: None }
}

pub fn compile_value_set(body: &Value, hierarchies: &HashMap<String, ConceptHierarchy>, index: &SchemaIndex) -> CompiledValidator {
    let Some(compose) = body.get("compose") else {
        return permissive_default();
    };

    let mut codes = BTreeSet::new();
    let mut filters = Vec::new();
    let mut fully_enumerable = true;

    if let Some(includes) = compose.get("include").and_then(|i| i.as_array()) {
        if includes.is_empty() {
            tracing::warn!("ValueSet.compose.include is empty; compiling as Never");
            return CompiledValidator::Never;
        }
        for include in includes {
            if !expand_include(include, hierarchies, &mut codes) {
                fully_enumerable = false;
                filters.extend(parse_filters(include));
            }
        }
    } else {
        tracing::warn!("ValueSet.compose.include is missing; compiling as Never");
        return CompiledValidator::Never;
    }

    if let Some(excludes) = compose.get("exclude").and_then(|e| e.as_array()) {
        let mut excluded = BTreeSet::new();
        for exclude in excludes {
            expand_include(exclude, hierarchies, &mut excluded);
        }
        for c in &excluded {
            codes.remove(c);
        }
    }

    if fully_enumerable && !codes.is_empty() {
        CompiledValidator::Enum(codes)
    } else if !filters.is_empty() {
        let base = filtered_include_base(compose, index);
        CompiledValidator::Refined(Box::new(base), filters)
    } else {
        permissive_default()
    }
}

/// Attempts to expand one `compose.include[]`/`exclude[]` entry into concrete
/// codes. Returns `false` when the entry can't be fully enumerated (no
/// matching hierarchy, or a `filter[]` present) so the caller falls back to a
/// runtime `Filter` refinement.
fn expand_include(include: &Value, hierarchies: &HashMap<String, ConceptHierarchy>, out: &mut BTreeSet<String>) -> bool {
    if include.get("filter").and_then(|f| f.as_array()).is_some_and(|a| !a.is_empty()) {
        return false;
    }

    if let Some(concepts) = include.get("concept").and_then(|c| c.as_array()) {
        for c in concepts {
            if let Some(code) = c.get("code").and_then(|v| v.as_str()) {
                out.insert(code.to_string());
            }
        }
        return true;
    }

    let Some(system) = include.get("system").and_then(|s| s.as_str()) else {
        return false;
    };
    match hierarchies.get(system) {
        Some(hierarchy) => {
            out.extend(hierarchy.all_codes());
            true
        }
        None => false,
    }
}

/// Parses one include/exclude entry's `filter[]` array into `Refinement`s.
/// Unsupported `op` codes are dropped silently (permissive, per the spec).
fn parse_filters(include: &Value) -> Vec<Refinement> {
    let Some(system) = include.get("system").and_then(|s| s.as_str()) else {
        return Vec::new();
    };
    let Some(filters) = include.get("filter").and_then(|f| f.as_array()) else {
        return Vec::new();
    };

    filters
        .iter()
        .filter_map(|f| {
            let property = f.get("property").and_then(|p| p.as_str())?.to_string();
            let op = f.get("op").and_then(|o| o.as_str()).and_then(FilterOp::from_code)?;
            let value = f.get("value").and_then(|v| v.as_str())?.to_string();
            Some(Refinement::Filter { op, value, property, code_system_url: system.to_string() })
        })
        .collect()
}

/// The base validator a filter-refined include is layered over: the
/// compiled validator of the first filtered include's system, or a
/// permissive default when that system hasn't been compiled.
fn filtered_include_base(compose: &Value, index: &SchemaIndex) -> CompiledValidator {
    let system = compose
        .get("include")
        .and_then(|i| i.as_array())
        .and_then(|incs| {
            incs.iter().find(|inc| inc.get("filter").and_then(|f| f.as_array()).is_some_and(|a| !a.is_empty()))
        })
        .and_then(|inc| inc.get("system"))
        .and_then(|s| s.as_str());

    match system.and_then(|s| index.get(s)) {
        Some(validator) => (*validator).clone(),
        None => permissive_default(),
    }
}
