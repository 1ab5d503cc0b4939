use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level configuration for a `Validator` instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorConfig {
    pub fhir_version: FhirVersion,
    pub cache_config: CacheConfig,
    pub performance_config: PerformanceConfig,
    /// Package cache directory override. Falls back to `FHIR_CACHE_DIR` then
    /// `$HOME/.fhir/packages` when absent.
    pub cache_dir: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum FhirVersion {
    #[serde(rename = "4.0.1")]
    R4,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Capacity hint for the in-flight compiled-validator map while compiling.
    pub validator_map_size: usize,
    pub ttl: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceConfig {
    pub max_concurrent_validations: usize,
    pub validation_timeout: Duration,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            fhir_version: FhirVersion::R4,
            cache_config: CacheConfig::default(),
            performance_config: PerformanceConfig::default(),
            cache_dir: None,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            validator_map_size: 2000,
            ttl: Duration::from_secs(3600),
        }
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            max_concurrent_validations: num_cpus::get() * 2,
            validation_timeout: Duration::from_secs(10),
        }
    }
}

impl ValidatorConfig {
    pub fn with_cache_config(mut self, cache_config: CacheConfig) -> Self {
        self.cache_config = cache_config;
        self
    }

    pub fn with_performance_config(mut self, performance_config: PerformanceConfig) -> Self {
        self.performance_config = performance_config;
        self
    }

    pub fn with_cache_dir(mut self, dir: impl Into<String>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }
}

impl CacheConfig {
    pub fn aggressive() -> Self {
        Self {
            validator_map_size: 20_000,
            ttl: Duration::from_secs(86_400),
        }
    }

    pub fn minimal() -> Self {
        Self {
            validator_map_size: 100,
            ttl: Duration::from_secs(600),
        }
    }
}

impl std::fmt::Display for FhirVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FhirVersion::R4 => write!(f, "4.0.1"),
        }
    }
}

impl FhirVersion {
    pub fn package_name(&self) -> &'static str {
        match self {
            FhirVersion::R4 => "hl7.fhir.r4.core",
        }
    }

    pub fn package_version(&self) -> &'static str {
        match self {
            FhirVersion::R4 => "4.0.1",
        }
    }
}
