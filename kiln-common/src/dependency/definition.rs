// kiln-common/src/dependency/definition.rs
use std::fmt;

use serde::{Deserialize, Serialize};

use super::requirement::{Probe, Requirement};
use crate::model::host::{HostFacts, PlatformCondition};
use crate::model::options::{BuildOptionSet, OptionGate, OptionSpec};

/// How a dependency is gated on the option set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    /// Always enabled.
    #[default]
    Required,
    /// Enabled unless `without-<name>` was passed.
    Recommended,
    /// Enabled only when the named flag was passed.
    Optional(String),
    /// Needed only while building; optionally gated on a flag.
    BuildOnly(Option<String>),
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Required => write!(f, "required"),
            Self::Recommended => write!(f, "recommended"),
            Self::Optional(flag) => write!(f, "optional ({flag})"),
            Self::BuildOnly(None) => write!(f, "build"),
            Self::BuildOnly(Some(flag)) => write!(f, "build ({flag})"),
        }
    }
}

/// A language runtime the package is built against, once per selected runtime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuntimeSpec {
    pub name: String,
    /// Executable used for `{python}` style placeholders.
    pub program: String,
}

impl RuntimeSpec {
    pub fn new(name: impl Into<String>, program: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
        }
    }

    /// A selected runtime must have its interpreter on PATH.
    pub fn requirement(&self) -> Requirement {
        Requirement::new(
            self.name.clone(),
            true,
            format!("{} was not found on PATH.", self.program),
            Probe::AnyExecutable(vec![self.program.clone()]),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyTarget {
    /// Another recipe, expected to be installed under `opt/<name>`.
    Package(String),
    Requirement(Requirement),
    Runtime(RuntimeSpec),
}

impl DependencyTarget {
    pub fn name(&self) -> &str {
        match self {
            Self::Package(name) => name,
            Self::Requirement(req) => &req.name,
            Self::Runtime(rt) => &rt.name,
        }
    }

    /// Name used for implicit `without-<name>` options; taps are stripped.
    pub fn short_name(&self) -> String {
        let name = self.name();
        name.rsplit('/').next().unwrap_or(name).to_lowercase()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencySpec {
    #[serde(flatten)]
    pub target: DependencyTarget,
    #[serde(default)]
    pub kind: DependencyKind,
    /// Extra option gate on top of the one implied by `kind`, e.g. a module
    /// needed only while its runtime is selected.
    #[serde(default)]
    pub when: OptionGate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<PlatformCondition>,
}

impl DependencySpec {
    pub fn new(target: DependencyTarget, kind: DependencyKind) -> Self {
        Self {
            target,
            kind,
            when: OptionGate::Always,
            platform: None,
        }
    }

    pub fn package(name: impl Into<String>, kind: DependencyKind) -> Self {
        Self::new(DependencyTarget::Package(name.into()), kind)
    }

    pub fn requirement(requirement: Requirement, kind: DependencyKind) -> Self {
        Self::new(DependencyTarget::Requirement(requirement), kind)
    }

    pub fn runtime(runtime: RuntimeSpec, kind: DependencyKind) -> Self {
        Self::new(DependencyTarget::Runtime(runtime), kind)
    }

    pub fn gated(mut self, gate: OptionGate) -> Self {
        self.when = gate;
        self
    }

    pub fn on_platform(mut self, condition: PlatformCondition) -> Self {
        self.platform = Some(condition);
        self
    }

    pub fn name(&self) -> &str {
        self.target.name()
    }

    pub fn enabled_when(&self, options: &BuildOptionSet) -> bool {
        let kind_open = match &self.kind {
            DependencyKind::Required | DependencyKind::BuildOnly(None) => true,
            DependencyKind::Recommended => !options.without(&self.target.short_name()),
            DependencyKind::Optional(flag) | DependencyKind::BuildOnly(Some(flag)) => {
                options.contains(flag)
            }
        };
        kind_open && self.when.is_open(options)
    }

    pub fn platform_holds(&self, host: &HostFacts) -> bool {
        self.platform.as_ref().is_none_or(|c| c.holds(host))
    }

    /// The option this spec implicitly declares, if any.
    pub fn implicit_option(&self) -> Option<OptionSpec> {
        match &self.kind {
            DependencyKind::Recommended => Some(OptionSpec::new(
                format!("without-{}", self.target.short_name()),
                format!("Build without {} support", self.name()),
            )),
            DependencyKind::Optional(flag) | DependencyKind::BuildOnly(Some(flag)) => Some(
                OptionSpec::new(flag.clone(), format!("Build with {} support", self.name())),
            ),
            _ => None,
        }
    }
}
