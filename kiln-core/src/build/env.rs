// kiln-core/src/build/env.rs
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

use kiln_common::config::Config;
use kiln_common::model::HostFacts;
use tracing::{debug, warn};

use super::devtools;

// Passed through from the user's environment; everything else is dropped.
// PATH is rebuilt, never inherited.
const ENV_VARS_TO_KEEP: &[&str] = &[
    "USER", "LOGNAME", "HOME", "TMPDIR", "TERM", "SHELL", "LANG", "LC_ALL", "LC_CTYPE",
    "DISPLAY", "XAUTHORITY", "TZ",
];

const SYSTEM_PATH_DIRS: &[&str] = &["/usr/bin", "/bin", "/usr/sbin", "/sbin"];

/// The sanitized environment build and test commands run in.
#[derive(Debug, Clone)]
pub struct BuildEnvironment {
    vars: HashMap<String, String>,
    path_dirs: Vec<PathBuf>,
}

impl BuildEnvironment {
    /// PATH used before any dependency is known: the kiln bin dir, then system dirs.
    pub fn base_path(config: &Config) -> String {
        join_paths(&base_path_dirs(config))
    }

    /// Builds the environment for one recipe.
    ///
    /// `dependency_prefixes` are the opt paths of the plan's packages, in plan
    /// order; the first one wins on PATH.
    pub fn new(config: &Config, host: &HostFacts, dependency_prefixes: &[PathBuf]) -> Self {
        let mut vars: HashMap<String, String> = env::vars()
            .filter(|(key, _)| ENV_VARS_TO_KEEP.contains(&key.as_str()))
            .collect();
        debug!("Kept {} variables from the calling environment", vars.len());

        let mut path_dirs = Vec::new();
        let mut cppflags = Vec::new();
        let mut ldflags = Vec::new();
        let mut pkg_config = Vec::new();

        for prefix in dependency_prefixes {
            if !prefix.exists() {
                warn!(
                    "Dependency prefix {} does not exist; is it installed?",
                    prefix.display()
                );
                continue;
            }
            push_unique(&mut path_dirs, prefix.join("bin"));
            push_if_dir(&mut cppflags, prefix.join("include"), "-I");
            push_if_dir(&mut ldflags, prefix.join("lib"), "-L");
            let pc_dir = prefix.join("lib/pkgconfig");
            if pc_dir.is_dir() {
                pkg_config.push(pc_dir.to_string_lossy().into_owned());
            }
        }
        for dir in base_path_dirs(config) {
            push_unique(&mut path_dirs, dir);
        }

        let kiln_root = config.kiln_root();
        push_if_dir(&mut cppflags, kiln_root.join("include"), "-I");
        push_if_dir(&mut ldflags, kiln_root.join("lib"), "-L");

        if let Some(sdk) = &host.sdk_path {
            vars.insert("SDKROOT".to_string(), sdk.to_string_lossy().into_owned());
        }
        for (var, name) in [("CC", "cc"), ("CXX", "c++")] {
            match devtools::find_compiler(name) {
                Ok(path) => {
                    vars.insert(var.to_string(), path.to_string_lossy().into_owned());
                }
                Err(e) => debug!("Leaving {var} unset: {e}"),
            }
        }
        if !cppflags.is_empty() {
            vars.insert("CPPFLAGS".to_string(), cppflags.join(" "));
        }
        if !ldflags.is_empty() {
            vars.insert("LDFLAGS".to_string(), ldflags.join(" "));
        }
        if !pkg_config.is_empty() {
            vars.insert("PKG_CONFIG_PATH".to_string(), pkg_config.join(":"));
        }
        vars.insert("PATH".to_string(), join_paths(&path_dirs));
        debug!("Build PATH: {}", vars["PATH"]);

        Self { vars, path_dirs }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        if key == "PATH" {
            self.path_dirs = env::split_paths(&value).collect();
        }
        debug!("Build env {}={}", key, value);
        self.vars.insert(key, value);
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn vars(&self) -> &HashMap<String, String> {
        &self.vars
    }

    pub fn path_dirs(&self) -> &[PathBuf] {
        &self.path_dirs
    }
}

fn base_path_dirs(config: &Config) -> Vec<PathBuf> {
    std::iter::once(config.bin_dir())
        .chain(SYSTEM_PATH_DIRS.iter().map(PathBuf::from))
        .collect()
}

fn join_paths(dirs: &[PathBuf]) -> String {
    dirs.iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(":")
}

fn push_unique(dirs: &mut Vec<PathBuf>, dir: PathBuf) {
    if !dirs.contains(&dir) {
        dirs.push(dir);
    }
}

fn push_if_dir(flags: &mut Vec<String>, dir: PathBuf, flag: &str) {
    if Path::new(&dir).is_dir() {
        flags.push(format!("{flag}{}", dir.display()));
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn dependency_bins_precede_system_dirs() {
        let root = tempfile::tempdir().unwrap();
        let config = Config::with_root(root.path());
        let openblas = config.recipe_opt_path("homebrew/science/openblas");
        fs::create_dir_all(openblas.join("bin")).unwrap();
        fs::create_dir_all(openblas.join("lib")).unwrap();
        let missing = config.recipe_opt_path("suite-sparse");

        let env = BuildEnvironment::new(
            &config,
            &HostFacts::new(root.path()),
            &[openblas.clone(), missing],
        );
        assert_eq!(env.path_dirs()[0], openblas.join("bin"));
        assert_eq!(env.path_dirs()[1], config.bin_dir());
        assert!(env.path_dirs().contains(&PathBuf::from("/usr/bin")));
        assert_eq!(
            env.get("LDFLAGS"),
            Some(format!("-L{}", openblas.join("lib").display()).as_str())
        );
        assert!(env.get("CPPFLAGS").is_none());
    }

    #[test]
    fn base_path_starts_with_kiln_bin() {
        let config = Config::with_root("/opt/kiln");
        assert_eq!(
            BuildEnvironment::base_path(&config),
            "/opt/kiln/bin:/usr/bin:/bin:/usr/sbin:/sbin"
        );
    }

    #[test]
    fn set_overrides() {
        let config = Config::with_root("/opt/kiln");
        let mut env = BuildEnvironment::new(&config, &HostFacts::new("/opt/kiln"), &[]);
        env.set("BLAS", "/opt/kiln/opt/openblas/lib/libopenblas.dylib");
        assert_eq!(
            env.get("BLAS"),
            Some("/opt/kiln/opt/openblas/lib/libopenblas.dylib")
        );
    }
}
