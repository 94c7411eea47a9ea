// kiln-core/src/build/receipt.rs
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use kiln_aio::json_io::{read_json_sync, write_json_sync};
use kiln_common::error::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const RECEIPT_FILE_NAME: &str = "INSTALL_RECEIPT.json";

/// Written into the keg once the build has succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallReceipt {
    pub name: String,
    pub version: String,
    pub options: Vec<String>,
    pub variants: Vec<String>,
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub advisories: Vec<String>,
    pub built_at: DateTime<Utc>,
}

pub fn receipt_path(keg_path: &Path) -> PathBuf {
    keg_path.join(RECEIPT_FILE_NAME)
}

pub fn write_receipt(keg_path: &Path, receipt: &InstallReceipt) -> Result<()> {
    let path = receipt_path(keg_path);
    debug!("Writing install receipt to {}", path.display());
    write_json_sync(&path, receipt)
}

pub fn read_receipt(keg_path: &Path) -> Result<InstallReceipt> {
    read_json_sync(&receipt_path(keg_path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receipt_survives_disk() {
        let keg = tempfile::tempdir().unwrap();
        let receipt = InstallReceipt {
            name: "numpy".into(),
            version: "1.7.1".into(),
            options: vec!["with-openblas".into()],
            variants: vec!["python".into()],
            dependencies: vec!["nose".into(), "homebrew/science/openblas".into()],
            advisories: Vec::new(),
            built_at: Utc::now(),
        };
        write_receipt(keg.path(), &receipt).unwrap();
        assert!(keg.path().join("INSTALL_RECEIPT.json").is_file());
        assert_eq!(read_receipt(keg.path()).unwrap(), receipt);
    }
}
