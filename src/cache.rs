//! Disk-backed persistence for a compiled schema index, enabled by the
//! `disk-cache` feature. A cache entry is keyed by a content hash of the
//! registry it was compiled from, so a stale entry is simply never found
//! rather than needing an explicit invalidation pass.

use crate::compiler::{CompiledSchemas, CompiledValidator, SchemaIndex};
use crate::hierarchy::ConceptHierarchy;
use crate::registry::ResourceRegistry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Serialize, Deserialize)]
struct CachedSchemas {
    compiled_at: DateTime<Utc>,
    entries: HashMap<String, CompiledValidator>,
    hierarchies: HashMap<String, ConceptHierarchy>,
    cycles: Vec<Vec<String>>,
}

/// A stable hash of every registered resource's URL and body, sorted by URL
/// so registration order never affects the key.
pub fn cache_key(registry: &ResourceRegistry) -> String {
    let mut files: Vec<_> = registry.iter().collect();
    files.sort_by(|a, b| a.url.cmp(&b.url));

    let mut hasher = Sha256::new();
    for file in files {
        hasher.update(file.url.as_bytes());
        hasher.update([0]);
        hasher.update(file.body.to_string().as_bytes());
        hasher.update([0]);
    }
    format!("{:x}", hasher.finalize())
}

fn cache_path(dir: &Path, key: &str) -> std::path::PathBuf {
    dir.join(format!("{key}.schemabin"))
}

/// Loads a previously stored compiled index for `key`, if present, readable,
/// and younger than `ttl`. An expired, corrupt, or missing entry is treated
/// as a cache miss, never an error: the caller always has the option of
/// recompiling from source.
pub fn load(dir: &Path, key: &str, ttl: Duration) -> Option<CompiledSchemas> {
    let bytes = std::fs::read(cache_path(dir, key)).ok()?;
    let (cached, _): (CachedSchemas, usize) = bincode::serde::decode_from_slice(&bytes, bincode::config::standard()).ok()?;

    let age = Utc::now().signed_duration_since(cached.compiled_at).to_std().unwrap_or(Duration::ZERO);
    if age > ttl {
        return None;
    }

    let index = SchemaIndex::new();
    for (url, validator) in cached.entries {
        index.insert(url, validator);
    }

    Some(CompiledSchemas { index: Arc::new(index), hierarchies: cached.hierarchies, cycles: cached.cycles })
}

/// Persists `schemas` under `key`, creating `dir` if needed.
pub fn store(dir: &Path, key: &str, schemas: &CompiledSchemas) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    let entries = schemas
        .index
        .urls()
        .into_iter()
        .filter_map(|url| schemas.index.get(&url).map(|v| (url, (*v).clone())))
        .collect();
    let cached = CachedSchemas { compiled_at: Utc::now(), entries, hierarchies: schemas.hierarchies.clone(), cycles: schemas.cycles.clone() };

    let bytes = bincode::serde::encode_to_vec(&cached, bincode::config::standard())
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    std::fs::write(cache_path(dir, key), bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ResourceFile, ResourceStatus, ResourceType, StructureKind};
    use std::path::PathBuf;

    fn file(url: &str) -> ResourceFile {
        ResourceFile {
            file_path: PathBuf::from(format!("{url}.json")),
            resource_type: ResourceType::StructureDefinition,
            url: url.to_string(),
            name: None,
            kind: Some(StructureKind::Resource),
            base_definition: None,
            date: None,
            status: ResourceStatus::Active,
            experimental: false,
            body: serde_json::json!({
                "type": "Minimal",
                "snapshot": {"element": [{"id": "Minimal", "path": "Minimal", "min": 0, "max": "1"}]}
            }),
        }
    }

    #[test]
    fn cache_key_is_stable_across_registration_order() {
        let mut r1 = ResourceRegistry::new();
        r1.register(file("http://x/A"));
        r1.register(file("http://x/B"));

        let mut r2 = ResourceRegistry::new();
        r2.register(file("http://x/B"));
        r2.register(file("http://x/A"));

        assert_eq!(cache_key(&r1), cache_key(&r2));
    }

    #[test]
    fn cache_key_changes_with_content() {
        let mut r1 = ResourceRegistry::new();
        r1.register(file("http://x/A"));

        let mut r2 = ResourceRegistry::new();
        let mut b = file("http://x/A");
        b.body["extra"] = serde_json::json!(true);
        r2.register(b);

        assert_ne!(cache_key(&r1), cache_key(&r2));
    }

    #[test]
    fn round_trips_through_disk() {
        let mut registry = ResourceRegistry::new();
        registry.register(file("http://x/A"));
        let compiled = crate::compiler::Compiler::new(&registry).compile_all();
        let key = cache_key(&registry);

        let dir = tempfile::tempdir().unwrap();
        store(dir.path(), &key, &compiled).unwrap();
        let reloaded = load(dir.path(), &key, Duration::from_secs(3600)).expect("cache entry should round-trip");

        assert!(reloaded.index.get("http://x/A").is_some());
    }

    #[test]
    fn missing_entry_is_a_clean_miss() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(dir.path(), "nonexistent", Duration::from_secs(3600)).is_none());
    }

    #[test]
    fn expired_entry_is_a_clean_miss() {
        let mut registry = ResourceRegistry::new();
        registry.register(file("http://x/A"));
        let compiled = crate::compiler::Compiler::new(&registry).compile_all();
        let key = cache_key(&registry);

        let dir = tempfile::tempdir().unwrap();
        store(dir.path(), &key, &compiled).unwrap();
        assert!(load(dir.path(), &key, Duration::from_secs(0)).is_none());
    }
}
