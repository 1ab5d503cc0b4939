use thiserror::Error;

/// Top-level error type returned by every fallible public entry point.
#[derive(Error, Debug)]
pub enum FhirSchemaError {
    #[error("compile error: {message}")]
    Compile { message: String },

    #[error("validation error: {message}")]
    Validation { message: String },

    #[error("load error: {message}")]
    Load { message: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

/// Errors raised while lowering a StructureDefinition/ValueSet/CodeSystem into
/// its intermediate or compiled form. These never abort a whole compilation:
/// the compiler logs them and substitutes a permissive validator.
#[derive(Error, Debug)]
#[error("compile error: {message}")]
pub struct CompileError {
    pub message: String,
    pub kind: CompileErrorKind,
    pub url: Option<String>,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileErrorKind {
    MalformedDefinition,
    OrphanElement,
    UnsupportedKind,
    UnresolvedDependency,
    CyclicDependency,
}

impl CompileError {
    pub fn new(kind: CompileErrorKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind,
            url: None,
            source: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

/// A single finding produced while validating a document. Unlike
/// `CompileError`, these never propagate as `Err`; they accumulate in a
/// `ValidationResult`.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{kind:?} at {path}: {message}")]
pub struct ValidationIssue {
    pub path: String,
    pub message: String,
    pub kind: ValidationIssueKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationIssueKind {
    TypeMismatch,
    CardinalityViolation,
    MissingRequiredField,
    ExtraUnknownField,
    PatternViolation,
    RegexViolation,
    LengthViolation,
    BoundaryViolation,
    EnumViolation,
    ChoiceOfTypeAmbiguity,
    SliceUnmatched,
    FhirPathConstraint,
    UnknownProfile,
}

impl ValidationIssue {
    pub fn new(kind: ValidationIssueKind, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            kind,
        }
    }
}

/// Errors raised while acquiring package/file resources, prior to compilation.
#[derive(Error, Debug)]
#[error("load error: {message}")]
pub struct LoaderError {
    pub message: String,
    pub kind: LoaderErrorKind,
    pub url: Option<String>,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderErrorKind {
    PackageNotFound,
    DownloadFailed,
    CacheCorrupt,
    JsonParseError,
}

impl LoaderError {
    pub fn new(kind: LoaderErrorKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind,
            url: None,
            source: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl From<LoaderError> for FhirSchemaError {
    fn from(e: LoaderError) -> Self {
        FhirSchemaError::Load { message: e.to_string() }
    }
}

impl From<CompileError> for FhirSchemaError {
    fn from(e: CompileError) -> Self {
        FhirSchemaError::Compile { message: e.to_string() }
    }
}

pub type Result<T> = std::result::Result<T, FhirSchemaError>;
