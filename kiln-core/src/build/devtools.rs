// kiln-core/src/build/devtools.rs
//! Host toolchain discovery: compilers, the macOS SDK and command line tools.

use std::env;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use kiln_common::config::Config;
use kiln_common::error::{KilnError, Result};
use kiln_common::model::HostFacts;
use tracing::debug;

const CLT_DEFAULT_PATH: &str = "/Library/Developer/CommandLineTools";

pub fn find_compiler(name: &str) -> Result<PathBuf> {
    let env_var_name = match name {
        "cc" => "CC",
        "c++" | "cxx" => "CXX",
        _ => "",
    };
    if !env_var_name.is_empty() {
        if let Ok(compiler_path) = env::var(env_var_name) {
            let path = PathBuf::from(compiler_path);
            if path.is_file() {
                debug!(
                    "Using compiler from env var {}: {}",
                    env_var_name,
                    path.display()
                );
                return Ok(path);
            }
            debug!(
                "Env var {} points to non-existent file: {}",
                env_var_name,
                path.display()
            );
        }
    }

    if cfg!(target_os = "macos") {
        debug!("Attempting to find '{name}' using xcrun");
        match Command::new("xcrun")
            .arg("--find")
            .arg(name)
            .stderr(Stdio::piped())
            .output()
        {
            Ok(out) if out.status.success() => {
                let path = PathBuf::from(String::from_utf8_lossy(&out.stdout).trim());
                if path.is_file() {
                    debug!("Found compiler via xcrun: {}", path.display());
                    return Ok(path);
                }
                debug!("xcrun returned an unusable path for '{name}': {}", path.display());
            }
            Ok(out) => {
                let stderr = String::from_utf8_lossy(&out.stderr);
                debug!("xcrun failed to find '{}': {}", name, stderr.trim());
            }
            Err(e) => debug!("Failed to execute xcrun: {e}. Falling back to PATH search."),
        }
    }

    debug!("Falling back to searching PATH for '{name}'");
    which::which(name).map_err(|e| {
        KilnError::BuildEnvError(format!("Failed to find compiler '{name}' on PATH: {e}"))
    })
}

/// Asks `xcrun` for the active SDK. Only meaningful on macOS.
pub fn find_sdk_path() -> Result<PathBuf> {
    if !cfg!(target_os = "macos") {
        return Err(KilnError::BuildEnvError(
            "No macOS SDK on this platform".to_string(),
        ));
    }
    debug!("Attempting to find macOS SDK path using xcrun");
    let out = Command::new("xcrun")
        .arg("--show-sdk-path")
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| {
            KilnError::BuildEnvError(format!(
                "Failed to execute 'xcrun --show-sdk-path': {e}. Is Xcode or Command Line Tools installed?"
            ))
        })?;
    if !out.status.success() {
        let stderr = String::from_utf8_lossy(&out.stderr);
        return Err(KilnError::BuildEnvError(format!(
            "xcrun failed to find SDK path: {}",
            stderr.trim()
        )));
    }
    let path_str = String::from_utf8_lossy(&out.stdout).trim().to_string();
    if path_str.is_empty() || path_str == "/" {
        return Err(KilnError::BuildEnvError(
            "xcrun returned empty or invalid SDK path".to_string(),
        ));
    }
    let sdk_path = PathBuf::from(path_str);
    if !sdk_path.exists() {
        return Err(KilnError::BuildEnvError(format!(
            "SDK path reported by xcrun does not exist: {}",
            sdk_path.display()
        )));
    }
    debug!("Found SDK path: {}", sdk_path.display());
    Ok(sdk_path)
}

/// True when the standalone command line tools are installed.
///
/// `xcode-select -p` pointing at a full Xcode.app does not count: Xcode-only
/// hosts keep system headers inside the SDK, which is what the
/// `clt_missing` substitutions exist for.
pub fn clt_installed() -> bool {
    if !cfg!(target_os = "macos") {
        return false;
    }
    match Command::new("xcode-select")
        .arg("-p")
        .stderr(Stdio::null())
        .output()
    {
        Ok(out) if out.status.success() => {
            let selected = String::from_utf8_lossy(&out.stdout).trim().to_string();
            debug!("xcode-select reports developer dir: {selected}");
            selected == CLT_DEFAULT_PATH || Path::new(CLT_DEFAULT_PATH).join("usr/bin").is_dir()
        }
        Ok(_) | Err(_) => Path::new(CLT_DEFAULT_PATH).join("usr/bin").is_dir(),
    }
}

/// Collects [`HostFacts`] once per invocation.
pub fn detect_host_facts(config: &Config) -> HostFacts {
    let mut host = HostFacts::new(config.kiln_root());
    if host.is_macos() {
        host.clt_installed = clt_installed();
        host.sdk_path = match find_sdk_path() {
            Ok(path) => Some(path),
            Err(e) => {
                debug!("No SDK path available: {e}");
                None
            }
        };
    }
    debug!(
        "Host facts: os={} arch={} clt_installed={} sdk={:?}",
        host.os, host.arch, host.clt_installed, host.sdk_path
    );
    host
}
