use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Sentinel used by `IntermediateElement::max` to mean `*` (unbounded).
pub const UNBOUNDED: u32 = u32::MAX;

/// One node of the tree produced by lowering a StructureDefinition's flat
/// `snapshot.element` list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntermediateElement {
    pub id: String,
    pub path: String,
    pub field_name: String,
    pub slice_name: Option<String>,

    pub min: u32,
    pub max: u32,

    /// Single type code, or `"choice-of-type"` when `types.len() != 1`.
    pub element_type: String,
    pub types: Vec<String>,

    pub max_length: Option<usize>,
    pub pattern: Option<serde_json::Value>,
    pub fixed: Option<serde_json::Value>,
    pub min_value: Option<serde_json::Value>,
    pub max_value: Option<serde_json::Value>,
    pub default_value: Option<serde_json::Value>,

    pub binding: Option<Binding>,
    pub constraints: Vec<Constraint>,
    pub slicing: Option<Slicing>,

    pub children: Vec<IntermediateElement>,
}

impl IntermediateElement {
    pub fn new(id: impl Into<String>, path: impl Into<String>) -> Self {
        let path = path.into();
        let field_name = path.rsplit('.').next().unwrap_or(&path).to_string();
        Self {
            id: id.into(),
            path,
            field_name,
            slice_name: None,
            min: 0,
            max: 1,
            element_type: "Any".to_string(),
            types: Vec::new(),
            max_length: None,
            pattern: None,
            fixed: None,
            min_value: None,
            max_value: None,
            default_value: None,
            binding: None,
            constraints: Vec::new(),
            slicing: None,
            children: Vec::new(),
        }
    }

    pub fn is_choice_of_type(&self) -> bool {
        self.field_name.ends_with("[x]")
    }

    pub fn is_repeating(&self) -> bool {
        self.max > 1
    }

    pub fn is_required(&self) -> bool {
        self.min > 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Binding {
    pub strength: String,
    pub value_set: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Constraint {
    pub key: String,
    pub severity: String,
    pub expression: String,
    pub human: String,
    pub source: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlicingRules {
    Closed,
    Open,
    OpenAtEnd,
}

impl SlicingRules {
    pub fn from_str(s: &str) -> Self {
        match s {
            "closed" => Self::Closed,
            // `openAtEnd` is treated identically to `open` (see design notes).
            _ => Self::Open,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscriminatorType {
    Value,
    Exists,
    Pattern,
    Type,
    Profile,
}

impl DiscriminatorType {
    pub fn from_str(s: &str) -> Self {
        match s {
            "value" => Self::Value,
            "exists" => Self::Exists,
            "pattern" => Self::Pattern,
            "type" => Self::Type,
            "profile" => Self::Profile,
            _ => Self::Value,
        }
    }

    /// `type`/`profile` discriminators are not implemented; slices relying on
    /// them alone are skipped by the matcher.
    pub fn is_supported(&self) -> bool {
        matches!(self, Self::Value | Self::Exists | Self::Pattern)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Discriminator {
    pub discriminator_type: DiscriminatorType,
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slicing {
    pub discriminators: Vec<Discriminator>,
    pub ordered: bool,
    pub rules: SlicingRules,
    pub slices: Vec<IntermediateElement>,
}

impl Slicing {
    pub fn new(rules: SlicingRules) -> Self {
        Self {
            discriminators: Vec::new(),
            ordered: false,
            rules,
            slices: Vec::new(),
        }
    }
}

/// Extra per-element extension metadata carried through compilation for
/// diagnostics only (e.g. the regex extension on a primitive `.value`).
pub type ExtensionBag = HashMap<String, serde_json::Value>;
