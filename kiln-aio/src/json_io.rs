// kiln-aio/src/json_io.rs
use std::io::Write;
use std::path::Path;

use kiln_common::error::{KilnError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

/// Writes `data` as pretty JSON, replacing `path` atomically.
pub fn write_json_sync<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    debug!("Sync Writing JSON to: {}", path.display());
    let parent = path.parent().ok_or_else(|| {
        KilnError::IoError(format!("No parent directory for {}", path.display()))
    })?;
    std::fs::create_dir_all(parent)?;

    let json_bytes = serde_json::to_vec_pretty(data)?;
    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(&json_bytes)?;
    temp.write_all(b"\n")?;
    temp.persist(path).map_err(|e| {
        KilnError::IoError(format!("Failed to persist {}: {}", path.display(), e.error))
    })?;
    Ok(())
}

pub fn read_json_sync<T: DeserializeOwned>(path: &Path) -> Result<T> {
    debug!("Sync Reading JSON from: {}", path.display());
    let file = std::fs::File::open(path)?;
    let reader = std::io::BufReader::new(file);
    Ok(serde_json::from_reader(reader)?)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn write_then_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/receipt.json");
        let mut data = BTreeMap::new();
        data.insert("name".to_string(), "numpy".to_string());
        write_json_sync(&path, &data).unwrap();
        let back: BTreeMap<String, String> = read_json_sync(&path).unwrap();
        assert_eq!(back, data);
    }
}
