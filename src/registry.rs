//! Deduplicating registry of [`ResourceFile`]s, keyed by canonical URL.
//!
//! Mirrors the dedupe cascade used by the package registry: prefer active,
//! then non-experimental, then most recent `date`, then a stable tiebreak.

use crate::model::{ResourceFile, ResourceStatus};
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct ResourceRegistry {
    by_url: HashMap<String, ResourceFile>,
    /// URLs dropped by the dedupe cascade, kept for diagnostics.
    shadowed: Vec<String>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource file, resolving any collision with an
    /// already-registered resource at the same URL via the dedupe cascade.
    pub fn register(&mut self, candidate: ResourceFile) {
        match self.by_url.remove(&candidate.url) {
            None => {
                self.by_url.insert(candidate.url.clone(), candidate);
            }
            Some(existing) => {
                let url = candidate.url.clone();
                let winner = Self::pick(existing, candidate);
                self.by_url.insert(url, winner);
            }
        }
    }

    pub fn register_all(&mut self, candidates: impl IntoIterator<Item = ResourceFile>) {
        for c in candidates {
            self.register(c);
        }
    }

    fn pick(a: ResourceFile, b: ResourceFile) -> ResourceFile {
        // Step 1: prefer active, else tolerate non-retired.
        if (a.status == ResourceStatus::Active) != (b.status == ResourceStatus::Active) {
            return if a.status == ResourceStatus::Active { a } else { b };
        }
        let a_ok = a.status != ResourceStatus::Retired;
        let b_ok = b.status != ResourceStatus::Retired;
        if a_ok != b_ok {
            return if a_ok { a } else { b };
        }

        // Step 2: prefer non-experimental.
        if a.experimental != b.experimental {
            return if !a.experimental { a } else { b };
        }

        // Step 3: greatest date, lexicographically.
        match (&a.date, &b.date) {
            (Some(da), Some(db)) if da != db => {
                if da > db {
                    return a;
                } else {
                    return b;
                }
            }
            _ => {}
        }

        // Step 4: stable tiebreak on file path.
        if a.file_path <= b.file_path { a } else { b }
    }

    pub fn get(&self, url: &str) -> Option<&ResourceFile> {
        self.by_url.get(url)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceFile> {
        self.by_url.values()
    }

    pub fn len(&self) -> usize {
        self.by_url.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_url.is_empty()
    }

    pub fn urls(&self) -> impl Iterator<Item = &str> {
        self.by_url.keys().map(|s| s.as_str())
    }

    pub fn shadowed(&self) -> &[String] {
        &self.shadowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn file(url: &str, status: ResourceStatus, experimental: bool, date: Option<&str>, path: &str) -> ResourceFile {
        ResourceFile {
            file_path: PathBuf::from(path),
            resource_type: crate::model::ResourceType::StructureDefinition,
            url: url.to_string(),
            name: None,
            kind: None,
            base_definition: None,
            date: date.map(|s| s.to_string()),
            status,
            experimental,
            body: serde_json::json!({}),
        }
    }

    #[test]
    fn prefers_active_over_draft() {
        let mut reg = ResourceRegistry::new();
        reg.register(file("http://x/A", ResourceStatus::Draft, false, None, "a.json"));
        reg.register(file("http://x/A", ResourceStatus::Active, false, None, "b.json"));
        assert_eq!(reg.get("http://x/A").unwrap().file_path, PathBuf::from("b.json"));
    }

    #[test]
    fn prefers_latest_date_when_tied() {
        let mut reg = ResourceRegistry::new();
        reg.register(file("http://x/A", ResourceStatus::Active, false, Some("2020-01-01"), "old.json"));
        reg.register(file("http://x/A", ResourceStatus::Active, false, Some("2022-01-01"), "new.json"));
        assert_eq!(reg.get("http://x/A").unwrap().file_path, PathBuf::from("new.json"));
    }

    #[test]
    fn dedup_is_order_independent() {
        let a = file("http://x/A", ResourceStatus::Active, false, Some("2022-01-01"), "new.json");
        let b = file("http://x/A", ResourceStatus::Draft, true, Some("2023-01-01"), "other.json");

        let mut r1 = ResourceRegistry::new();
        r1.register(a.clone());
        r1.register(b.clone());

        let mut r2 = ResourceRegistry::new();
        r2.register(b);
        r2.register(a);

        assert_eq!(r1.get("http://x/A").unwrap().file_path, r2.get("http://x/A").unwrap().file_path);
    }
}
