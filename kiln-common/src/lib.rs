// kiln-common/src/lib.rs
pub mod config;
pub mod dependency;
pub mod error;
pub mod formulary;
pub mod model;

// Re-export key types
pub use config::Config;
pub use dependency::{DependencyKind, DependencySpec, DependencyTarget, Requirement};
pub use error::{KilnError, Result};
pub use formulary::Formulary;
pub use model::{BuildOptionSet, HostFacts, Recipe};
