//! Concept Hierarchy Engine: materializes a CodeSystem's concept
//! forest and answers ancestor/descendant/property-lookup queries used by
//! ValueSet filter refinements.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum PropertyValue {
    Code(String),
    String(String),
    Boolean(bool),
    Integer(i64),
    Decimal(f64),
    Coding(Value),
}

impl PropertyValue {
    /// String form used when a filter refinement compares this property's
    /// value against a filter's `value`/`in`/`is-a` argument.
    pub fn as_string(&self) -> String {
        match self {
            Self::Code(s) | Self::String(s) => s.clone(),
            Self::Boolean(b) => b.to_string(),
            Self::Integer(i) => i.to_string(),
            Self::Decimal(d) => d.to_string(),
            Self::Coding(v) => v.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConceptNode {
    pub code: String,
    pub properties: HashMap<String, PropertyValue>,
    pub descendants: Vec<ConceptNode>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConceptHierarchy {
    pub url: String,
    pub roots: Vec<ConceptNode>,
}

impl ConceptHierarchy {
    /// Build a hierarchy from a parsed CodeSystem body's `concept[]` array.
    pub fn from_code_system(url: &str, body: &Value) -> Self {
        let roots = body
            .get("concept")
            .and_then(|c| c.as_array())
            .map(|arr| arr.iter().map(parse_concept).collect())
            .unwrap_or_default();
        Self { url: url.to_string(), roots }
    }

    /// All codes appearing anywhere in the forest, for `Enum` compilation.
    pub fn all_codes(&self) -> Vec<String> {
        let mut out = Vec::new();
        for root in &self.roots {
            collect_codes(root, &mut out);
        }
        out
    }

    pub fn find(&self, code: &str) -> Option<&ConceptNode> {
        self.roots.iter().find_map(|r| find_in(r, code))
    }

    /// Strict descendants of `code`, DFS order; empty if not found.
    pub fn descendants(&self, code: &str) -> Vec<String> {
        match self.find(code) {
            Some(node) => {
                let mut out = Vec::new();
                for d in &node.descendants {
                    collect_codes(d, &mut out);
                }
                out
            }
            None => Vec::new(),
        }
    }

    /// Root-to-parent path to `code`, root-first; empty if `code` is a root
    /// or not found.
    pub fn ancestors(&self, code: &str) -> Vec<String> {
        for root in &self.roots {
            let mut path = Vec::new();
            if path_to(root, code, &mut path) {
                path.pop(); // drop `code` itself
                return path;
            }
        }
        Vec::new()
    }
}

fn parse_concept(v: &Value) -> ConceptNode {
    let code = v.get("code").and_then(|c| c.as_str()).unwrap_or("").to_string();
    let mut properties = HashMap::new();
    if let Some(props) = v.get("property").and_then(|p| p.as_array()) {
        for p in props {
            let Some(pcode) = p.get("code").and_then(|c| c.as_str()) else {
                continue;
            };
            if let Some(value) = parse_property_value(p) {
                properties.insert(pcode.to_string(), value);
            }
        }
    }
    let descendants = v
        .get("concept")
        .and_then(|c| c.as_array())
        .map(|arr| arr.iter().map(parse_concept).collect())
        .unwrap_or_default();
    ConceptNode { code, properties, descendants }
}

fn parse_property_value(p: &Value) -> Option<PropertyValue> {
    if let Some(s) = p.get("valueCode").and_then(|v| v.as_str()) {
        return Some(PropertyValue::Code(s.to_string()));
    }
    if let Some(s) = p.get("valueString").and_then(|v| v.as_str()) {
        return Some(PropertyValue::String(s.to_string()));
    }
    if let Some(b) = p.get("valueBoolean").and_then(|v| v.as_bool()) {
        return Some(PropertyValue::Boolean(b));
    }
    if let Some(i) = p.get("valueInteger").and_then(|v| v.as_i64()) {
        return Some(PropertyValue::Integer(i));
    }
    if let Some(d) = p.get("valueDecimal").and_then(|v| v.as_f64()) {
        return Some(PropertyValue::Decimal(d));
    }
    if let Some(c) = p.get("valueCoding") {
        return Some(PropertyValue::Coding(c.clone()));
    }
    None
}

fn collect_codes(node: &ConceptNode, out: &mut Vec<String>) {
    out.push(node.code.clone());
    for d in &node.descendants {
        collect_codes(d, out);
    }
}

fn find_in<'a>(node: &'a ConceptNode, code: &str) -> Option<&'a ConceptNode> {
    if node.code == code {
        return Some(node);
    }
    node.descendants.iter().find_map(|d| find_in(d, code))
}

fn path_to(node: &ConceptNode, code: &str, path: &mut Vec<String>) -> bool {
    path.push(node.code.clone());
    if node.code == code {
        return true;
    }
    for d in &node.descendants {
        if path_to(d, code, path) {
            return true;
        }
    }
    path.pop();
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ConceptHierarchy {
        let body = serde_json::json!({
            "concept": [
                {"code": "human", "concept": [
                    {"code": "child", "concept": [
                        {"code": "boy"},
                        {"code": "girl"}
                    ]},
                    {"code": "adult", "concept": [
                        {"code": "man"},
                        {"code": "woman"}
                    ]}
                ]}
            ]
        });
        ConceptHierarchy::from_code_system("http://example.org/cs", &body)
    }

    #[test]
    fn descendants_exclude_self() {
        let h = sample();
        let mut d = h.descendants("human");
        d.sort();
        assert_eq!(d, vec!["adult", "boy", "child", "girl", "man", "woman"]);
    }

    #[test]
    fn ancestors_are_root_first() {
        let h = sample();
        assert_eq!(h.ancestors("boy"), vec!["human", "child"]);
        assert!(h.ancestors("human").is_empty());
    }

    #[test]
    fn find_missing_returns_none() {
        let h = sample();
        assert!(h.find("machine").is_none());
    }
}
