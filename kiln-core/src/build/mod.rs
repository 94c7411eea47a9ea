// kiln-core/src/build/mod.rs
// Source preparation and the recipe build state machine.

pub mod devtools;
pub mod env;
pub mod inreplace;
pub mod patch;
pub mod receipt;
pub mod runner;
pub mod template;
pub mod tool;

pub use env::BuildEnvironment;
pub use receipt::{read_receipt, write_receipt, InstallReceipt};
pub use runner::{RecipeRunner, RunReport, RunState};
pub use template::TemplateContext;
pub use tool::{BuildTool, Invocation, SystemBuildTool, ToolOutput};
