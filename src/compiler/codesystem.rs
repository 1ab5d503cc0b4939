//! Lowers a CodeSystem into a [`CompiledValidator`]. A `complete`-content
//! system compiles to a concrete `Enum`; `fragment`/`example`/`not-present`
//! systems compile to a permissive non-empty string, since their code lists
//! are known to be incomplete; `supplement` and anything unrecognized
//! contribute no validator at all.

use super::CompiledValidator;

/// Returns `None` when `url` contributes no compiled validator (`supplement`
/// content, or a `content` code this engine doesn't recognize).
pub fn compile_code_system(url: &str, body: &serde_json::Value) -> Option<CompiledValidator> {
    let content = body.get("content").and_then(|c| c.as_str()).unwrap_or("complete");
    match content {
        "complete" => {
            let hierarchy = crate::hierarchy::ConceptHierarchy::from_code_system(url, body);
            Some(CompiledValidator::Enum(hierarchy.all_codes().into_iter().collect()))
        }
        "example" | "not-present" | "fragment" => {
            Some(CompiledValidator::String { pattern: None, min_length: Some(1), max_length: None })
        }
        "supplement" => None,
        other => {
            tracing::warn!(url, content = other, "unrecognized CodeSystem content code; contributing no validator");
            None
        }
    }
}
