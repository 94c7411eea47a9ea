// kiln-aio/src/process.rs
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::{Command, Output as StdOutput, Stdio};
use std::sync::Arc;
use std::time::Duration;

use kiln_common::error::{KilnError, Result};
use tracing::{debug, error, warn};
use wait_timeout::ChildExt;

/// Runs an external command to completion and captures its output.
pub fn run_command_sync(
    command: &str,
    args: &[String],
    cwd: Option<PathBuf>,
    envs: Option<&HashMap<String, String>>,
) -> Result<StdOutput> {
    debug!(
        "Sync Running command: {} {:?} (cwd: {:?}, envs: {:?})",
        command,
        args,
        cwd,
        envs.map(|e| e.keys().collect::<Vec<_>>())
    );
    let mut cmd = Command::new(command);
    cmd.args(args);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    if let Some(env_map) = envs {
        cmd.env_clear();
        cmd.envs(env_map);
    }
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.stdin(Stdio::null());

    match cmd.output() {
        Ok(output) => {
            if !output.status.success() {
                debug!("Sync Command failed with status: {}", output.status);
                let stdout = String::from_utf8_lossy(&output.stdout);
                let stderr = String::from_utf8_lossy(&output.stderr);
                if !stdout.trim().is_empty() {
                    debug!("Stdout:\n{}", stdout.trim());
                }
                if !stderr.trim().is_empty() {
                    debug!("Stderr:\n{}", stderr.trim());
                }
            } else {
                debug!("Sync Command finished successfully.");
            }
            Ok(output)
        }
        Err(e) => {
            error!("Sync Failed to execute command: {}", e);
            Err(KilnError::Io(Arc::new(e)))
        }
    }
}

/// Runs a command with output discarded and reports whether it exited 0
/// within `timeout`. A command still running at the deadline is killed and
/// reported as `Ok(false)`. Spawn failures are returned as errors.
pub fn run_quietly_with_timeout(
    command: &str,
    args: &[String],
    envs: Option<&HashMap<String, String>>,
    timeout: Duration,
) -> Result<bool> {
    debug!(
        "Probing: {} {:?} (timeout {:?})",
        command, args, timeout
    );
    let mut cmd = Command::new(command);
    cmd.args(args);
    if let Some(env_map) = envs {
        cmd.env_clear();
        cmd.envs(env_map);
    }
    cmd.stdout(Stdio::null());
    cmd.stderr(Stdio::null());
    cmd.stdin(Stdio::null());

    let mut child = cmd
        .spawn()
        .map_err(|e| KilnError::CommandExecError(format!("Failed to spawn '{command}': {e}")))?;

    match child.wait_timeout(timeout)? {
        Some(status) => {
            if !status.success() {
                debug!("Probe '{}' exited with {}", command, status);
            }
            Ok(status.success())
        }
        None => {
            warn!(
                "Probe '{}' did not finish within {:?}; killing it",
                command, timeout
            );
            let _ = child.kill();
            let _ = child.wait();
            Ok(false)
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn quiet_probe_reports_exit_status() {
        let timeout = Duration::from_secs(5);
        assert!(run_quietly_with_timeout("true", &[], None, timeout).unwrap());
        assert!(!run_quietly_with_timeout("false", &[], None, timeout).unwrap());
    }

    #[test]
    fn quiet_probe_times_out() {
        let ok = run_quietly_with_timeout(
            "sleep",
            &["5".to_string()],
            None,
            Duration::from_millis(100),
        )
        .unwrap();
        assert!(!ok);
    }

    #[test]
    fn missing_program_is_an_error() {
        let result = run_quietly_with_timeout(
            "kiln-definitely-not-a-program",
            &[],
            None,
            Duration::from_secs(1),
        );
        assert!(matches!(result, Err(KilnError::CommandExecError(_))));
    }

    #[test]
    fn sync_run_captures_output() {
        let output = run_command_sync("echo", &["hello".to_string()], None, None).unwrap();
        assert!(output.status.success());
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "hello");
    }
}
