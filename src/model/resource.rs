use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The FHIR resource kinds the registry understands. Anything else is
/// registered but contributes no compiled validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    StructureDefinition,
    ValueSet,
    CodeSystem,
    ConceptMap,
    StructureMap,
    ImplementationGuide,
    Other,
}

impl ResourceType {
    pub fn from_str(s: &str) -> Self {
        match s {
            "StructureDefinition" => Self::StructureDefinition,
            "ValueSet" => Self::ValueSet,
            "CodeSystem" => Self::CodeSystem,
            "ConceptMap" => Self::ConceptMap,
            "StructureMap" => Self::StructureMap,
            "ImplementationGuide" => Self::ImplementationGuide,
            _ => Self::Other,
        }
    }

    /// Ordering used by the by-kind stabilizer comparator.
    pub fn sort_rank(&self) -> u8 {
        match self {
            Self::ImplementationGuide => 0,
            Self::StructureDefinition => 1,
            Self::ValueSet => 2,
            Self::CodeSystem => 3,
            Self::ConceptMap => 4,
            Self::StructureMap => 5,
            Self::Other => 6,
        }
    }
}

/// The `kind` field of a StructureDefinition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StructureKind {
    PrimitiveType,
    ComplexType,
    Resource,
    Logical,
}

impl StructureKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "primitive-type" => Some(Self::PrimitiveType),
            "complex-type" => Some(Self::ComplexType),
            "resource" => Some(Self::Resource),
            "logical" => Some(Self::Logical),
            _ => None,
        }
    }

    /// Ordering used within StructureDefinition by the by-kind comparator.
    pub fn sort_rank(&self) -> u8 {
        match self {
            Self::Resource => 0,
            Self::ComplexType => 1,
            Self::PrimitiveType => 2,
            Self::Logical => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceStatus {
    Active,
    Draft,
    Retired,
    Unknown,
}

impl ResourceStatus {
    pub fn from_str(s: &str) -> Self {
        match s {
            "active" => Self::Active,
            "draft" => Self::Draft,
            "retired" => Self::Retired,
            _ => Self::Unknown,
        }
    }
}

/// One on-disk JSON definition discovered by a loader, before parsing its
/// full body. This is the registry's unit of deduplication.
#[derive(Debug, Clone)]
pub struct ResourceFile {
    pub file_path: PathBuf,
    pub resource_type: ResourceType,
    pub url: String,
    pub name: Option<String>,
    pub kind: Option<StructureKind>,
    pub base_definition: Option<String>,
    pub date: Option<String>,
    pub status: ResourceStatus,
    pub experimental: bool,
    /// The fully parsed JSON body, kept alongside the descriptor so the
    /// registry need not re-read the file during compilation.
    pub body: serde_json::Value,
}

impl ResourceFile {
    /// Parse a `ResourceFile` descriptor out of a raw JSON document read from
    /// `file_path`. Resources lacking a `url` are rejected: the dependency
    /// graph is keyed entirely on canonical URLs.
    pub fn from_json(file_path: PathBuf, body: serde_json::Value) -> Option<Self> {
        let resource_type = ResourceType::from_str(body.get("resourceType")?.as_str()?);
        let url = body
            .get("url")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("urn:uuid:{}", uuid::Uuid::new_v4()));
        if url::Url::parse(&url).is_err() {
            tracing::warn!(url, path = %file_path.display(), "resource url is not a well-formed URI; dependency resolution may be unreliable");
        }

        let name = body
            .get("name")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());
        let kind = body
            .get("kind")
            .and_then(|v| v.as_str())
            .and_then(StructureKind::from_str);
        let base_definition = body
            .get("baseDefinition")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());
        let date = body
            .get("date")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());
        let status = body
            .get("status")
            .and_then(|v| v.as_str())
            .map(ResourceStatus::from_str)
            .unwrap_or(ResourceStatus::Unknown);
        let experimental = body
            .get("experimental")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        Some(Self {
            file_path,
            resource_type,
            url,
            name,
            kind,
            base_definition,
            date,
            status,
            experimental,
            body,
        })
    }
}
