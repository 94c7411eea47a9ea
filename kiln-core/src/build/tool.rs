// kiln-core/src/build/tool.rs
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use kiln_aio::process::run_command_sync;
use kiln_common::error::{KilnError, Result};
use tracing::debug;

/// A fully expanded command: what actually gets spawned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: HashMap<String, String>,
}

impl Invocation {
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.command_line())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code; `None` when the process was killed by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    pub fn status_string(&self) -> String {
        self.status
            .map_or_else(|| "signal".to_string(), |code| format!("status {code}"))
    }
}

/// Runs build and test commands. The exit code is the only success signal.
pub trait BuildTool {
    /// `Err` means the program could not be run at all.
    fn invoke(&self, invocation: &Invocation) -> Result<ToolOutput>;
}

/// Spawns real processes with the sanitized build environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBuildTool;

impl BuildTool for SystemBuildTool {
    fn invoke(&self, invocation: &Invocation) -> Result<ToolOutput> {
        // Resolve against the build PATH, not ours.
        let program = match invocation.env.get("PATH") {
            Some(path) if !invocation.program.contains('/') => {
                which::which_in(&invocation.program, Some(path), &invocation.cwd)
                    .map_err(|e| {
                        KilnError::CommandExecError(format!(
                            "'{}' not found on build PATH: {e}",
                            invocation.program
                        ))
                    })?
                    .to_string_lossy()
                    .into_owned()
            }
            _ => invocation.program.clone(),
        };
        debug!(
            "Running '{}' in {}",
            invocation.command_line(),
            invocation.cwd.display()
        );
        let output = run_command_sync(
            &program,
            &invocation.args,
            Some(invocation.cwd.clone()),
            Some(&invocation.env),
        )?;
        Ok(ToolOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn invocation(program: &str, args: &[&str]) -> Invocation {
        let mut env = HashMap::new();
        env.insert("PATH".to_string(), "/usr/bin:/bin".to_string());
        Invocation {
            program: program.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            cwd: std::env::temp_dir(),
            env,
        }
    }

    #[test]
    fn exit_code_is_reported() {
        let ok = SystemBuildTool.invoke(&invocation("true", &[])).unwrap();
        assert!(ok.success());
        let bad = SystemBuildTool.invoke(&invocation("false", &[])).unwrap();
        assert!(!bad.success());
        assert_eq!(bad.status, Some(1));
    }

    #[test]
    fn output_is_captured() {
        let out = SystemBuildTool
            .invoke(&invocation("sh", &["-c", "echo built; echo warn >&2"]))
            .unwrap();
        assert_eq!(out.stdout.trim(), "built");
        assert_eq!(out.stderr.trim(), "warn");
    }

    #[test]
    fn missing_program_is_an_error() {
        let result = SystemBuildTool.invoke(&invocation("kiln-definitely-missing", &[]));
        assert!(matches!(result, Err(KilnError::CommandExecError(_))));
    }
}
