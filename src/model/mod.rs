mod element;
mod resource;

pub use element::{
    Binding, Constraint, Discriminator, DiscriminatorType, IntermediateElement, Slicing,
    SlicingRules, UNBOUNDED,
};
pub use resource::{ResourceFile, ResourceStatus, ResourceType, StructureKind};
