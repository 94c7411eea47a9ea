// kiln-common/src/model/host.rs
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Toolchain facts about the host, collected once per invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostFacts {
    pub os: String,
    pub arch: String,
    /// Xcode command line tools are installed (always false off macOS).
    pub clt_installed: bool,
    /// macOS SDK root, if one could be located.
    pub sdk_path: Option<PathBuf>,
    pub kiln_prefix: PathBuf,
}

impl HostFacts {
    pub fn new(kiln_prefix: impl Into<PathBuf>) -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            clt_installed: false,
            sdk_path: None,
            kiln_prefix: kiln_prefix.into(),
        }
    }

    pub fn is_macos(&self) -> bool {
        self.os == "macos"
    }
}

/// A predicate over [`HostFacts`]. The command line tools conditions only
/// hold on macOS.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformCondition {
    CltInstalled,
    CltMissing,
    Os(String),
}

impl PlatformCondition {
    pub fn holds(&self, host: &HostFacts) -> bool {
        match self {
            Self::CltInstalled => host.is_macos() && host.clt_installed,
            Self::CltMissing => host.is_macos() && !host.clt_installed,
            Self::Os(os) => host.os == *os,
        }
    }
}
