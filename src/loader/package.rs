//! Package-cache-backed [`ResourceLoader`], grounded on
//! `octofhir-canonical-manager`'s install/search API. Resolves `latest` to
//! whatever the canonical manager already considers current and leaves the
//! on-disk cache layout (`$HOME/.fhir/packages` or `FHIR_CACHE_DIR`) to it.

use super::{split_package_id, ResourceLoader};
use crate::error::{LoaderError, LoaderErrorKind, Result};
use crate::model::ResourceFile;
use async_trait::async_trait;
use octofhir_canonical_manager::CanonicalManager;
use std::path::PathBuf;

const TRACKED_RESOURCE_TYPES: &[&str] =
    &["StructureDefinition", "ValueSet", "CodeSystem", "ConceptMap", "StructureMap", "ImplementationGuide"];

pub struct PackageLoader {
    manager: CanonicalManager,
}

impl PackageLoader {
    /// Builds the canonical manager from its own layered config (`fcm.toml`,
    /// then environment, per `FcmConfig::load` — this is how `FHIR_CACHE_DIR`
    /// reaches the package cache without this crate touching the path
    /// directly).
    pub async fn new() -> Result<Self> {
        let config = octofhir_canonical_manager::config::FcmConfig::load()
            .await
            .map_err(|e| LoaderError::new(LoaderErrorKind::DownloadFailed, format!("failed to load canonical manager config: {e}")))?;
        let manager = CanonicalManager::new(config)
            .await
            .map_err(|e| LoaderError::new(LoaderErrorKind::DownloadFailed, format!("failed to initialize canonical manager: {e}")))?;
        Ok(Self { manager })
    }

    /// Same as [`Self::new`], but pins the package cache to `cache_dir` (or,
    /// when `None`, to `FHIR_CACHE_DIR` then `~/.fhir/packages`) for the
    /// duration of the process by setting the environment variable
    /// `FcmConfig::load` itself reads.
    pub async fn with_cache_dir(cache_dir: Option<&str>) -> Result<Self> {
        let resolved = match cache_dir {
            Some(dir) => PathBuf::from(dir),
            None => std::env::var_os("FHIR_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".fhir").join("packages")),
        };
        // SAFETY: called during application startup, before other threads
        // would be reading this process's environment concurrently.
        unsafe { std::env::set_var("FHIR_CACHE_DIR", resolved) };
        Self::new().await
    }
}

#[async_trait]
impl ResourceLoader for PackageLoader {
    async fn load_files(&mut self, paths: &[PathBuf]) -> Result<Vec<ResourceFile>> {
        super::FileLoader::new().load_files(paths).await
    }

    async fn load_packages(&mut self, ids: &[String]) -> Result<Vec<ResourceFile>> {
        let mut out = Vec::new();
        for id in ids {
            let (name, version) = split_package_id(id);
            self.manager
                .install_package(name, version)
                .await
                .map_err(|e| LoaderError::new(LoaderErrorKind::DownloadFailed, format!("failed to install {name}!{version}: {e}")).with_url(name))?;

            for resource_type in TRACKED_RESOURCE_TYPES {
                let search = self
                    .manager
                    .search()
                    .await
                    .resource_type(resource_type)
                    .execute()
                    .await
                    .map_err(|e| LoaderError::new(LoaderErrorKind::CacheCorrupt, format!("search failed for {resource_type} in {name}!{version}: {e}")))?;

                for resource_match in search.resources {
                    let synthetic_path = PathBuf::from(format!("{name}!{version}/{resource_type}"));
                    if let Some(file) = ResourceFile::from_json(synthetic_path, resource_match.resource.content) {
                        out.push(file);
                    }
                }
            }
        }
        Ok(out)
    }
}
