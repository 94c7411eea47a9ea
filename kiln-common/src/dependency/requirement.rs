// kiln-common/src/dependency/requirement.rs
use std::fmt;

use serde::{Deserialize, Serialize};

/// How a requirement decides whether the host satisfies it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Probe {
    /// At least one of the named executables resolves on PATH.
    AnyExecutable(Vec<String>),
    /// Every command (program followed by its args) exits 0.
    AllCommandsSucceed(Vec<Vec<String>>),
    /// The path does not exist. A leading `~/` is the user's home.
    PathAbsent(String),
    PathPresent(String),
    All(Vec<Probe>),
    Any(Vec<Probe>),
}

impl fmt::Display for Probe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AnyExecutable(names) => write!(f, "which {}", names.join(" | ")),
            Self::AllCommandsSucceed(cmds) => {
                let rendered: Vec<String> = cmds.iter().map(|c| c.join(" ")).collect();
                write!(f, "{}", rendered.join(" && "))
            }
            Self::PathAbsent(p) => write!(f, "! -e {p}"),
            Self::PathPresent(p) => write!(f, "-e {p}"),
            Self::All(probes) => {
                let rendered: Vec<String> = probes.iter().map(ToString::to_string).collect();
                write!(f, "({})", rendered.join(" && "))
            }
            Self::Any(probes) => {
                let rendered: Vec<String> = probes.iter().map(ToString::to_string).collect();
                write!(f, "({})", rendered.join(" || "))
            }
        }
    }
}

/// A named precondition on the build host.
///
/// The configuration is immutable; whether it is satisfied is decided by
/// running [`Probe`] at build time and is never stored here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Requirement {
    pub name: String,
    #[serde(default)]
    pub fatal: bool,
    pub message: String,
    pub probe: Probe,
    /// Probe with the user's own PATH instead of the sanitized build PATH.
    #[serde(default)]
    pub user_paths: bool,
}

impl Requirement {
    pub fn new(
        name: impl Into<String>,
        fatal: bool,
        message: impl Into<String>,
        probe: Probe,
    ) -> Self {
        Self {
            name: name.into(),
            fatal,
            message: message.into(),
            probe,
            user_paths: false,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.fatal
    }

    pub fn describe(&self) -> &str {
        &self.message
    }

    /// Classifies a probe result.
    pub fn outcome(&self, satisfied: bool) -> RequirementOutcome {
        match (satisfied, self.fatal) {
            (true, _) => RequirementOutcome::Satisfied,
            (false, true) => RequirementOutcome::Fatal(self.message.clone()),
            (false, false) => RequirementOutcome::Advisory(self.message.clone()),
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.fatal { "fatal" } else { "advisory" };
        write!(f, "{} ({kind}): {}", self.name, self.probe)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequirementOutcome {
    Satisfied,
    Fatal(String),
    Advisory(String),
}

impl RequirementOutcome {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, Self::Satisfied)
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }
}
