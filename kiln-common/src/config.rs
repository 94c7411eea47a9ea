// kiln-common/src/config.rs
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::UserDirs;
use tracing::debug;

use super::error::Result;

// Fallback when neither KILN_PREFIX nor HOMEBREW_PREFIX is set.
const DEFAULT_FALLBACK_KILN_ROOT: &str = "/opt/homebrew";
const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone)]
pub struct Config {
    pub kiln_root: PathBuf,
    /// Upper bound for each requirement probe process.
    pub probe_timeout: Duration,
    /// Extra directories searched for `<name>.json` recipes, in order.
    pub recipe_paths: Vec<PathBuf>,
    /// Skip recipe self-tests (`KILN_NO_TEST=1`).
    pub skip_tests: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        debug!("Loading kiln configuration");

        let kiln_root_str = env::var("KILN_PREFIX")
            .ok()
            .filter(|s| !s.is_empty())
            .or_else(|| env::var("HOMEBREW_PREFIX").ok().filter(|s| !s.is_empty()))
            .unwrap_or_else(|| {
                debug!(
                    "KILN_PREFIX/HOMEBREW_PREFIX not set or empty, falling back to default: {}",
                    DEFAULT_FALLBACK_KILN_ROOT
                );
                DEFAULT_FALLBACK_KILN_ROOT.to_string()
            });
        let kiln_root = PathBuf::from(&kiln_root_str);
        debug!("Effective KILN_ROOT set to: {}", kiln_root.display());

        let probe_timeout_secs = env::var("KILN_PROBE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_PROBE_TIMEOUT_SECS);

        let recipe_paths = env::var_os("KILN_RECIPE_PATH")
            .map(|raw| env::split_paths(&raw).collect())
            .unwrap_or_default();

        let skip_tests = env::var("KILN_NO_TEST").is_ok_and(|v| v == "1");

        debug!("Configuration loaded successfully.");
        Ok(Self {
            kiln_root,
            probe_timeout: Duration::from_secs(probe_timeout_secs),
            recipe_paths,
            skip_tests,
        })
    }

    /// Configuration rooted at an explicit prefix, ignoring the environment.
    pub fn with_root(kiln_root: impl Into<PathBuf>) -> Self {
        Self {
            kiln_root: kiln_root.into(),
            probe_timeout: Duration::from_secs(DEFAULT_PROBE_TIMEOUT_SECS),
            recipe_paths: Vec::new(),
            skip_tests: false,
        }
    }

    pub fn kiln_root(&self) -> &Path {
        &self.kiln_root
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.kiln_root.join("bin")
    }

    pub fn cellar_dir(&self) -> PathBuf {
        self.kiln_root.join("Cellar")
    }

    pub fn opt_dir(&self) -> PathBuf {
        self.kiln_root.join("opt")
    }

    pub fn recipes_dir(&self) -> PathBuf {
        self.kiln_root.join("Library/Recipes")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.kiln_root.join("kiln_cache")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.kiln_root.join("kiln_logs")
    }

    pub fn tmp_dir(&self) -> PathBuf {
        self.kiln_root.join("tmp")
    }

    pub fn recipe_cellar_dir(&self, recipe_name: &str) -> PathBuf {
        self.cellar_dir().join(recipe_name)
    }

    pub fn recipe_keg_path(&self, recipe_name: &str, version_str: &str) -> PathBuf {
        self.recipe_cellar_dir(recipe_name).join(version_str)
    }

    pub fn recipe_opt_path(&self, recipe_name: &str) -> PathBuf {
        // Taps are addressed as user/repo/name; the opt link only uses the last part.
        let short_name = recipe_name.rsplit('/').next().unwrap_or(recipe_name);
        self.opt_dir().join(short_name)
    }

    pub fn home_dir(&self) -> PathBuf {
        UserDirs::new().map_or_else(|| PathBuf::from("/"), |ud| ud.home_dir().to_path_buf())
    }
}

pub fn load_config() -> Result<Config> {
    Config::load()
}
