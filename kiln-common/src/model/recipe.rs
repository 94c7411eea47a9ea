// kiln-common/src/model/recipe.rs
use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::host::PlatformCondition;
use super::options::{OptionGate, OptionSpec};
use crate::dependency::{DependencyKind, DependencySpec, DependencyTarget};
use crate::error::{KilnError, Result};

/// A literal edit of an upstream file (`inreplace`). Every occurrence of
/// `pattern` is replaced; a missing pattern is configuration drift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Substitution {
    /// Path relative to the source root.
    pub file: String,
    pub pattern: String,
    pub replacement: String,
    #[serde(default)]
    pub when: OptionGate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<PlatformCondition>,
}

/// An inline unified diff applied with `patch -p<strip>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchSpec {
    #[serde(default = "default_strip")]
    pub strip: u32,
    pub diff: String,
    #[serde(default)]
    pub when: OptionGate,
}

fn default_strip() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSection {
    #[serde(default)]
    pub when: OptionGate,
    pub content: String,
}

/// A file written into the source tree before building, assembled from the
/// sections whose gates are open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedFile {
    pub path: String,
    pub sections: Vec<FileSection>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvSetting {
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub when: OptionGate,
}

/// One build-tool invocation. Args and program may contain placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandTemplate {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandTemplate {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

/// Declarative description of how to build one package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub homepage: Option<String>,
    pub url: String,
    /// `sha1:<hex>` or `sha256:<hex>`; bare hex is taken as sha256.
    #[serde(default)]
    pub checksum: String,
    #[serde(default)]
    pub head: Option<String>,
    #[serde(default)]
    pub options: Vec<OptionSpec>,
    /// Groups of flags of which at most one may be selected.
    #[serde(default)]
    pub exclusive_options: Vec<Vec<String>>,
    #[serde(default)]
    pub dependencies: Vec<DependencySpec>,
    #[serde(default)]
    pub substitutions: Vec<Substitution>,
    #[serde(default)]
    pub patches: Vec<PatchSpec>,
    #[serde(default)]
    pub files: Vec<GeneratedFile>,
    #[serde(default)]
    pub env: Vec<EnvSetting>,
    pub build: Vec<CommandTemplate>,
    #[serde(default)]
    pub test: Vec<CommandTemplate>,
    #[serde(default)]
    pub caveats: Option<String>,
}

impl Recipe {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let recipe: Recipe = serde_json::from_str(raw)?;
        recipe.validate()?;
        Ok(recipe)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        debug!("Loading recipe from {}", path.display());
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Explicit options followed by the ones implied by optional and
    /// recommended dependencies, without duplicates.
    pub fn declared_options(&self) -> Vec<OptionSpec> {
        let mut seen = HashSet::new();
        let mut declared = Vec::new();
        let implicit = self
            .dependencies
            .iter()
            .filter_map(DependencySpec::implicit_option);
        for option in self.options.iter().cloned().chain(implicit) {
            if seen.insert(option.name.clone()) {
                declared.push(option);
            }
        }
        declared
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| KilnError::InvalidRecipe(self.name.clone(), msg);

        if self.name.trim().is_empty() {
            return Err(invalid("name is empty".to_string()));
        }
        if self.build.is_empty() {
            return Err(invalid("no build commands declared".to_string()));
        }

        // Runtimes imply a requirement named after themselves, so they share
        // the namespace with declared requirements.
        let mut requirement_names = HashSet::new();
        for spec in &self.dependencies {
            match &spec.kind {
                DependencyKind::Optional(flag) | DependencyKind::BuildOnly(Some(flag))
                    if flag.trim().is_empty() =>
                {
                    return Err(invalid(format!(
                        "dependency '{}' has no enabling option",
                        spec.name()
                    )));
                }
                _ => {}
            }
            if let OptionGate::IfOption(flag) | OptionGate::UnlessOption(flag) = &spec.when {
                if flag.trim().is_empty() {
                    return Err(invalid(format!(
                        "dependency '{}' is gated on an empty option",
                        spec.name()
                    )));
                }
            }
            let checked_name = match &spec.target {
                DependencyTarget::Requirement(req) => req.name.as_str(),
                DependencyTarget::Runtime(runtime) => runtime.name.as_str(),
                DependencyTarget::Package(_) => continue,
            };
            if !requirement_names.insert(checked_name) {
                return Err(invalid(format!(
                    "requirement '{checked_name}' is declared more than once"
                )));
            }
        }

        let declared: HashSet<String> = self
            .declared_options()
            .into_iter()
            .map(|o| o.name)
            .collect();
        for group in &self.exclusive_options {
            for flag in group {
                if !declared.contains(flag) {
                    return Err(invalid(format!(
                        "exclusive option group references undeclared option '{flag}'"
                    )));
                }
            }
        }
        Ok(())
    }
}
