//! The closed catalog of refinements a [`super::CompiledValidator::Refined`]
//! node may carry. Refinements express checks that don't fit the
//! structural type lattice: cross-field invariants, slice discrimination,
//! exact-value equality, and external vocabulary membership.

use crate::model::{Discriminator, SlicingRules};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Refinement {
    /// A `snapshot.element[].constraint[]` invariant, evaluated with the node
    /// itself as the FHIRPath evaluation context.
    FhirPath { key: String, expression: String, message: String },

    /// Choice-of-type cardinality: at most one of the fields sharing `prefix`
    /// (the `[x]`-stripped field name) may be present.
    AtMostOneOfPrefix(String),

    /// The object must have at least one populated field besides `id` and
    /// `extension` (FHIR's "an element SHALL have a value or children" rule).
    NonEmptyObject,

    /// The node itself must deep-equal `value` (a `fixed[x]` constraint).
    ExactValue { value: Value },

    /// Discriminator-based slice matching against an array field.
    Slicing {
        discriminators: Vec<Discriminator>,
        rules: SlicingRules,
        slices: Vec<SliceDefinition>,
    },

    /// Required-binding membership check against an external code system,
    /// answered by the Built-in Catalog.
    Filter {
        op: FilterOp,
        value: String,
        property: String,
        code_system_url: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOp {
    Equals,
    Regex,
    In,
    NotIn,
    IsA,
    IsNotA,
    DescendantOf,
    Generalizes,
}

impl FilterOp {
    /// Maps a `ValueSet.compose.include.filter[].op` code to its operator.
    /// `None` for anything outside the supported catalog, so the caller can
    /// drop the filter entry (unsupported operators are permissive, per the
    /// filter compilation rules).
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "=" => Some(Self::Equals),
            "regex" => Some(Self::Regex),
            "in" => Some(Self::In),
            "not-in" => Some(Self::NotIn),
            "is-a" => Some(Self::IsA),
            "is-not-a" => Some(Self::IsNotA),
            "descendent-of" => Some(Self::DescendantOf),
            "generalizes" => Some(Self::Generalizes),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SliceDefinition {
    pub name: String,
    pub validator: Box<super::CompiledValidator>,
    pub min: u32,
    pub max: u32,
}
