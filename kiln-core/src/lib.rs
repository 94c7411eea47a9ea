// kiln-core/src/lib.rs

pub mod build;
pub mod check;

pub use build::devtools::detect_host_facts;
pub use build::{BuildTool, RecipeRunner, RunReport, RunState, SystemBuildTool};
pub use check::{check_all, HostProbe, RequirementReport, SystemProbe};
