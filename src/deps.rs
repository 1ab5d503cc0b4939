//! Dependency extraction from parsed resource bodies.

use crate::model::{ResourceFile, ResourceType};
use std::collections::BTreeSet;

const FHIR_BASE: &str = "http://hl7.org/fhir/StructureDefinition/";

/// Returns the deduplicated, sorted set of canonical URLs `file` depends on.
pub fn dependencies_of(file: &ResourceFile) -> BTreeSet<String> {
    match file.resource_type {
        ResourceType::StructureDefinition => structure_definition_deps(file),
        ResourceType::ValueSet => value_set_deps(file),
        ResourceType::CodeSystem => code_system_deps(file),
        ResourceType::ConceptMap => concept_map_deps(file),
        ResourceType::StructureMap => structure_map_deps(file),
        ResourceType::ImplementationGuide => implementation_guide_deps(file),
        ResourceType::Other => BTreeSet::new(),
    }
}

/// Bare type codes (`"string"`, `"Patient"`, ...) are rewritten into the
/// canonical base StructureDefinition namespace; anything already a URL
/// passes through unchanged.
pub fn normalize_type_url(code: &str) -> String {
    if code.contains("://") || code.starts_with("urn:") {
        code.to_string()
    } else {
        format!("{FHIR_BASE}{code}")
    }
}

fn structure_definition_deps(file: &ResourceFile) -> BTreeSet<String> {
    let mut deps = BTreeSet::new();
    let self_url = file.url.as_str();

    if let Some(base) = &file.base_definition {
        if base != self_url {
            deps.insert(base.clone());
        }
    }

    let Some(elements) = file
        .body
        .get("snapshot")
        .and_then(|s| s.get("element"))
        .and_then(|e| e.as_array())
    else {
        return deps;
    };

    for el in elements {
        if let Some(types) = el.get("type").and_then(|t| t.as_array()) {
            for t in types {
                if let Some(code) = t.get("code").and_then(|c| c.as_str()) {
                    let url = normalize_type_url(code);
                    if url != self_url {
                        deps.insert(url);
                    }
                }
                for key in ["profile", "targetProfile"] {
                    if let Some(profiles) = t.get(key).and_then(|p| p.as_array()) {
                        for p in profiles {
                            if let Some(p) = p.as_str() {
                                if p != self_url {
                                    deps.insert(p.to_string());
                                }
                            }
                        }
                    }
                }
            }
        }

        if let Some(constraints) = el.get("constraint").and_then(|c| c.as_array()) {
            for c in constraints {
                if let Some(source) = c.get("source").and_then(|s| s.as_str()) {
                    if source != self_url {
                        deps.insert(source.to_string());
                    }
                }
            }
        }

        if let Some(binding) = el.get("binding") {
            let strength = binding.get("strength").and_then(|s| s.as_str());
            if strength == Some("required") {
                if let Some(vs) = binding.get("valueSet").and_then(|v| v.as_str()) {
                    deps.insert(vs.to_string());
                }
            }
        }
    }

    deps
}

fn value_set_deps(file: &ResourceFile) -> BTreeSet<String> {
    let mut deps = BTreeSet::new();
    let Some(compose) = file.body.get("compose") else {
        return deps;
    };
    for key in ["include", "exclude"] {
        let Some(entries) = compose.get(key).and_then(|e| e.as_array()) else {
            continue;
        };
        for entry in entries {
            if let Some(vs) = entry.get("valueSet").and_then(|v| v.as_array()) {
                for v in vs {
                    if let Some(v) = v.as_str() {
                        deps.insert(v.to_string());
                    }
                }
            }
            if let Some(system) = entry.get("system").and_then(|s| s.as_str()) {
                deps.insert(system.to_string());
            }
        }
    }
    deps
}

fn code_system_deps(file: &ResourceFile) -> BTreeSet<String> {
    let mut deps = BTreeSet::new();
    if let Some(supplements) = file.body.get("supplements").and_then(|v| v.as_str()) {
        deps.insert(supplements.to_string());
    }
    deps
}

fn concept_map_deps(file: &ResourceFile) -> BTreeSet<String> {
    let mut deps = BTreeSet::new();
    for key in ["sourceString", "targetString"] {
        if let Some(v) = file.body.get(key).and_then(|v| v.as_str()) {
            deps.insert(v.to_string());
        }
    }
    if let Some(groups) = file.body.get("group").and_then(|g| g.as_array()) {
        for g in groups {
            for key in ["source", "target"] {
                if let Some(v) = g.get(key).and_then(|v| v.as_str()) {
                    deps.insert(v.to_string());
                }
            }
            if let Some(elements) = g.get("element").and_then(|e| e.as_array()) {
                for el in elements {
                    if let Some(targets) = el.get("target").and_then(|t| t.as_array()) {
                        for t in targets {
                            if let Some(depends) = t.get("dependsOn").and_then(|d| d.as_array()) {
                                for d in depends {
                                    if let Some(sys) = d.get("system").and_then(|s| s.as_str()) {
                                        deps.insert(sys.to_string());
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    }
    deps
}

fn structure_map_deps(file: &ResourceFile) -> BTreeSet<String> {
    let mut deps = BTreeSet::new();
    if let Some(structures) = file.body.get("structure").and_then(|s| s.as_array()) {
        for s in structures {
            if let Some(url) = s.get("url").and_then(|u| u.as_str()) {
                deps.insert(url.to_string());
            }
        }
    }
    if let Some(imports) = file.body.get("import").and_then(|i| i.as_array()) {
        for i in imports {
            if let Some(url) = i.as_str() {
                deps.insert(url.to_string());
            }
        }
    }
    deps
}

fn implementation_guide_deps(file: &ResourceFile) -> BTreeSet<String> {
    let mut deps = BTreeSet::new();
    if let Some(dep) = file.body.get("dependsOn").and_then(|d| d.as_array()) {
        for d in dep {
            if let Some(uri) = d.get("uri").and_then(|u| u.as_str()) {
                deps.insert(uri.to_string());
            }
        }
    }
    if let Some(globals) = file.body.get("global").and_then(|g| g.as_array()) {
        for g in globals {
            if let Some(profile) = g.get("profile").and_then(|p| p.as_str()) {
                deps.insert(profile.to_string());
            }
        }
    }
    deps
}
