// kiln-common/src/model/mod.rs
pub mod host;
pub mod options;
pub mod recipe;

// Re-export
pub use host::{HostFacts, PlatformCondition};
pub use options::{BuildOptionSet, OptionGate, OptionSpec};
pub use recipe::{
    CommandTemplate, EnvSetting, FileSection, GeneratedFile, PatchSpec, Recipe, Substitution,
};
