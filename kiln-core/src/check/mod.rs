// kiln-core/src/check/mod.rs
pub mod probe;
pub mod requirements;

pub use probe::{HostProbe, SystemProbe};
pub use requirements::{check_all, check_requirement, RequirementReport};
