// kiln-core/src/check/probe.rs
use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use kiln_aio::process::run_quietly_with_timeout;
use kiln_common::config::Config;
use kiln_common::error::{KilnError, Result};
use tracing::debug;

use crate::build::env::BuildEnvironment;

/// The primitive host queries requirement probes are made of.
///
/// `user_paths` selects the invoking user's PATH instead of the sanitized
/// build PATH. Errors mean the probe mechanism itself broke; they are
/// never a "no" answer.
pub trait HostProbe {
    fn find_executable(&self, name: &str, user_paths: bool) -> Result<Option<PathBuf>>;
    fn command_succeeds(&self, program: &str, args: &[String], user_paths: bool) -> Result<bool>;
    fn path_exists(&self, path: &Path) -> Result<bool>;
    fn home_dir(&self) -> PathBuf;
}

#[derive(Debug, Clone)]
pub struct SystemProbe {
    build_path: OsString,
    user_path: Option<OsString>,
    home: PathBuf,
    timeout: Duration,
}

impl SystemProbe {
    pub fn new(config: &Config) -> Self {
        Self {
            build_path: OsString::from(BuildEnvironment::base_path(config)),
            user_path: env::var_os("PATH"),
            home: config.home_dir(),
            timeout: config.probe_timeout,
        }
    }

    fn search_path(&self, user_paths: bool) -> &OsString {
        match (&self.user_path, user_paths) {
            (Some(path), true) => path,
            _ => &self.build_path,
        }
    }
}

impl HostProbe for SystemProbe {
    fn find_executable(&self, name: &str, user_paths: bool) -> Result<Option<PathBuf>> {
        match which::which_in(name, Some(self.search_path(user_paths)), &self.home) {
            Ok(path) => {
                debug!("Found '{}' at {}", name, path.display());
                Ok(Some(path))
            }
            Err(which::Error::CannotFindBinaryPath) => Ok(None),
            Err(e) => Err(KilnError::ProbeError(format!(
                "Lookup of '{name}' failed: {e}"
            ))),
        }
    }

    fn command_succeeds(&self, program: &str, args: &[String], user_paths: bool) -> Result<bool> {
        // A program that is not there cannot succeed; that is an answer, not a fault.
        let Some(resolved) = self.find_executable(program, user_paths)? else {
            debug!("'{program}' is not on PATH; treating command as failed");
            return Ok(false);
        };
        run_quietly_with_timeout(&resolved.to_string_lossy(), args, None, self.timeout)
    }

    fn path_exists(&self, path: &Path) -> Result<bool> {
        path.try_exists().map_err(|e| {
            KilnError::ProbeError(format!("Cannot stat {}: {e}", path.display()))
        })
    }

    fn home_dir(&self) -> PathBuf {
        self.home.clone()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn probe() -> SystemProbe {
        SystemProbe::new(&Config::with_root("/nonexistent/kiln"))
    }

    #[test]
    fn finds_system_shell_on_build_path() {
        let found = probe().find_executable("sh", false).unwrap();
        assert!(found.is_some());
        assert!(probe()
            .find_executable("kiln-definitely-missing", false)
            .unwrap()
            .is_none());
    }

    #[test]
    fn missing_program_fails_without_error() {
        assert!(!probe()
            .command_succeeds("kiln-definitely-missing", &[], false)
            .unwrap());
        assert!(probe().command_succeeds("true", &[], false).unwrap());
    }

    #[test]
    fn path_existence() {
        let dir = tempfile::tempdir().unwrap();
        assert!(probe().path_exists(dir.path()).unwrap());
        assert!(!probe().path_exists(&dir.path().join("site.cfg")).unwrap());
    }
}
