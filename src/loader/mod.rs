//! Resource acquisition, modeled behind a trait so package download can be
//! substituted independently of the compiler. [`FileLoader`] covers
//! local files/directories; [`PackageLoader`] (submodule) wraps
//! `octofhir-canonical-manager` for `name[!version]` package ids.

mod package;

pub use package::PackageLoader;

use crate::error::{LoaderError, LoaderErrorKind, Result};
use crate::model::ResourceFile;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

#[async_trait]
pub trait ResourceLoader: Send + Sync {
    /// Registers local files, or every `*.json` under a directory.
    async fn load_files(&mut self, paths: &[PathBuf]) -> Result<Vec<ResourceFile>>;

    /// Fetches (or reuses a cached copy of) each package id, `<name>` or
    /// `<name>!<version>`, and returns every resource it (transitively)
    /// contributes.
    async fn load_packages(&mut self, ids: &[String]) -> Result<Vec<ResourceFile>>;
}

/// Loads resources straight from the filesystem: no package resolution, no
/// caching, used directly by `load_files` and as the base the package loader
/// delegates to once it has materialized a package's files on disk.
#[derive(Debug, Default)]
pub struct FileLoader;

impl FileLoader {
    pub fn new() -> Self {
        Self
    }

    pub fn load_path(path: &Path) -> Result<Vec<ResourceFile>> {
        let mut out = Vec::new();
        if path.is_dir() {
            for entry in std::fs::read_dir(path)? {
                let entry = entry?;
                let entry_path = entry.path();
                if entry_path.is_dir() {
                    out.extend(Self::load_path(&entry_path)?);
                } else if entry_path.extension().is_some_and(|e| e == "json") {
                    out.extend(Self::load_file(&entry_path)?);
                }
            }
        } else {
            out.extend(Self::load_file(path)?);
        }
        Ok(out)
    }

    fn load_file(path: &Path) -> Result<Vec<ResourceFile>> {
        let contents = std::fs::read_to_string(path)?;
        let body: serde_json::Value = serde_json::from_str(&contents).map_err(|e| {
            LoaderError::new(LoaderErrorKind::JsonParseError, format!("failed to parse {}", path.display())).with_source(e)
        })?;
        Ok(ResourceFile::from_json(path.to_path_buf(), body).into_iter().collect())
    }
}

#[async_trait]
impl ResourceLoader for FileLoader {
    async fn load_files(&mut self, paths: &[PathBuf]) -> Result<Vec<ResourceFile>> {
        let mut out = Vec::new();
        for path in paths {
            out.extend(Self::load_path(path)?);
        }
        Ok(out)
    }

    async fn load_packages(&mut self, ids: &[String]) -> Result<Vec<ResourceFile>> {
        Err(LoaderError::new(
            LoaderErrorKind::PackageNotFound,
            format!("FileLoader cannot resolve packages: {ids:?} (use PackageLoader)"),
        )
        .into())
    }
}

/// Splits a `<name>` or `<name>!<version>` package id.
pub fn split_package_id(id: &str) -> (&str, &str) {
    match id.split_once('!') {
        Some((name, version)) => (name, version),
        None => (id, "latest"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_versioned_id() {
        assert_eq!(split_package_id("hl7.fhir.r4.core!4.0.1"), ("hl7.fhir.r4.core", "4.0.1"));
        assert_eq!(split_package_id("hl7.fhir.r4.core"), ("hl7.fhir.r4.core", "latest"));
    }
}
