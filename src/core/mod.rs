mod config;

pub use config::{CacheConfig, FhirVersion, PerformanceConfig, ValidatorConfig};
