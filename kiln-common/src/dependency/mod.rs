// kiln-common/src/dependency/mod.rs
pub mod definition;
pub mod requirement;
pub mod resolver;

pub use definition::{DependencyKind, DependencySpec, DependencyTarget, RuntimeSpec};
pub use requirement::{Probe, Requirement, RequirementOutcome};
pub use resolver::{resolve, ResolvedPlan};
