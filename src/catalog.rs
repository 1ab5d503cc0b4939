//! Built-in Catalog: pluggable external-vocabulary validators keyed by
//! canonical system URL, consulted by `Refinement::Filter` when a required
//! binding or ValueSet filter can't be fully expanded at compile time.

use async_trait::async_trait;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;

#[async_trait]
pub trait ExternalSystemValidator: Send + Sync + std::fmt::Debug {
    fn system_url(&self) -> &str;
    async fn contains(&self, code: &str) -> bool;
}

/// Validates codes of an external system against a fixed regular expression,
/// for systems whose grammar (rather than membership list) defines validity —
/// e.g. UCUM units, which have no enumerable concept list.
#[derive(Debug)]
pub struct PatternSystemValidator {
    system_url: String,
    pattern: Regex,
}

impl PatternSystemValidator {
    pub fn new(system_url: impl Into<String>, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self { system_url: system_url.into(), pattern: Regex::new(pattern)? })
    }
}

#[async_trait]
impl ExternalSystemValidator for PatternSystemValidator {
    fn system_url(&self) -> &str {
        &self.system_url
    }

    async fn contains(&self, code: &str) -> bool {
        self.pattern.is_match(code)
    }
}

#[derive(Debug, Default)]
pub struct BuiltinCatalog {
    validators: HashMap<String, Arc<dyn ExternalSystemValidator>>,
}

impl BuiltinCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// The vocabularies recognized out of the box: BCP-47 language tags and
    /// UCUM units, the two external systems referenced from the base FHIR
    /// resource and datatype definitions themselves (`Resource.language`,
    /// `Quantity.code`).
    pub fn with_defaults() -> Self {
        let mut catalog = Self::new();
        if let Ok(v) = PatternSystemValidator::new("urn:ietf:bcp:47", r"^[A-Za-z]{2,8}(-[A-Za-z0-9]{1,8})*$") {
            catalog.register(v);
        }
        if let Ok(v) = PatternSystemValidator::new("http://unitsofmeasure.org", r"^\S+$") {
            catalog.register(v);
        }
        catalog
    }

    pub fn register(&mut self, validator: impl ExternalSystemValidator + 'static) {
        self.validators.insert(validator.system_url().to_string(), Arc::new(validator));
    }

    pub fn has(&self, system_url: &str) -> bool {
        self.validators.contains_key(system_url)
    }

    pub async fn contains(&self, system_url: &str, code: &str) -> bool {
        match self.validators.get(system_url) {
            Some(v) => v.contains(code).await,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bcp47_pattern_matches_common_tags() {
        let catalog = BuiltinCatalog::with_defaults();
        assert!(catalog.contains("urn:ietf:bcp:47", "en-US").await);
        assert!(!catalog.contains("urn:ietf:bcp:47", "").await);
    }

    #[tokio::test]
    async fn unregistered_system_reports_unknown() {
        let catalog = BuiltinCatalog::new();
        assert!(!catalog.has("http://loinc.org"));
    }
}
