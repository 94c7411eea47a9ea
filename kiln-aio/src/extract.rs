// kiln-aio/src/extract.rs
// Handles source archive extraction.

use std::fs;
use std::io::{Cursor, Read};
use std::path::{Component, Path, PathBuf};

use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use kiln_common::error::{KilnError, Result};
use tracing::{debug, error};
use xz2::read::XzDecoder;
use zip::ZipArchive;

/// Extracts `archive_path` into `target_dir` and returns the source root: the
/// single top-level directory if the archive has exactly one, otherwise
/// `target_dir` itself.
pub fn extract_source_archive(archive_path: &Path, target_dir: &Path) -> Result<PathBuf> {
    let file_name = archive_path
        .file_name()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    debug!(
        "Extracting archive '{}' to '{}'",
        archive_path.display(),
        target_dir.display()
    );
    fs::create_dir_all(target_dir)?;
    let bytes = fs::read(archive_path)?;

    if file_name.ends_with(".zip") {
        extract_zip(&bytes, target_dir, archive_path)?;
    } else if file_name.ends_with(".tar.gz") || file_name.ends_with(".tgz") {
        extract_tar(GzDecoder::new(&bytes[..]), target_dir, archive_path)?;
    } else if file_name.ends_with(".tar.bz2")
        || file_name.ends_with(".tbz")
        || file_name.ends_with(".tbz2")
    {
        extract_tar(BzDecoder::new(&bytes[..]), target_dir, archive_path)?;
    } else if file_name.ends_with(".tar.xz") || file_name.ends_with(".txz") {
        extract_tar(XzDecoder::new(&bytes[..]), target_dir, archive_path)?;
    } else if file_name.ends_with(".tar") {
        extract_tar(&bytes[..], target_dir, archive_path)?;
    } else {
        return Err(KilnError::Generic(format!(
            "Unsupported archive type: '{file_name}'"
        )));
    }

    determine_source_root(target_dir)
}

/// Async wrapper; extraction itself runs on the blocking pool.
pub async fn extract_source_archive_async(
    archive_path: &Path,
    target_dir: &Path,
) -> Result<PathBuf> {
    let archive_path = archive_path.to_path_buf();
    let target_dir = target_dir.to_path_buf();
    tokio::task::spawn_blocking(move || extract_source_archive(&archive_path, &target_dir))
        .await
        .map_err(|e| KilnError::Generic(format!("JoinError in archive extraction: {e}")))?
}

fn safe_join(target_dir: &Path, entry_path: &Path, archive: &Path) -> Result<Option<PathBuf>> {
    let mut target_path = target_dir.to_path_buf();
    let mut pushed = false;
    for comp in entry_path.components() {
        match comp {
            Component::Normal(p) => {
                target_path.push(p);
                pushed = true;
            }
            Component::CurDir => {}
            _ => {
                error!(
                    "Disallowed/unsafe component {:?} in path {} within {}",
                    comp,
                    entry_path.display(),
                    archive.display()
                );
                return Err(KilnError::Generic(format!(
                    "Unsafe path component in {}",
                    entry_path.display()
                )));
            }
        }
    }
    Ok(pushed.then_some(target_path))
}

fn extract_tar<R: Read>(reader: R, target_dir: &Path, archive: &Path) -> Result<()> {
    let mut tar = tar::Archive::new(reader);
    let entries = tar.entries().map_err(|e| {
        KilnError::Generic(format!("Failed to read TAR {}: {e}", archive.display()))
    })?;
    for entry in entries {
        let mut entry = entry.map_err(|e| {
            KilnError::Generic(format!("Error reading TAR entry from {}: {e}", archive.display()))
        })?;
        let entry_path = entry
            .path()
            .map_err(|e| KilnError::Generic(format!("Invalid path in TAR entry: {e}")))?
            .into_owned();
        if safe_join(target_dir, &entry_path, archive)?.is_none() {
            continue;
        }
        entry.unpack_in(target_dir).map_err(|e| {
            KilnError::Generic(format!(
                "Failed to unpack TAR entry {}: {e}",
                entry_path.display()
            ))
        })?;
    }
    debug!("Finished TAR extraction for {}", archive.display());
    Ok(())
}

fn extract_zip(bytes: &[u8], target_dir: &Path, archive: &Path) -> Result<()> {
    let mut zip = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| KilnError::Generic(format!("Failed to open ZIP: {e}")))?;
    for i in 0..zip.len() {
        let mut file = zip
            .by_index(i)
            .map_err(|e| KilnError::Generic(format!("Failed to access ZIP entry: {e}")))?;
        let entry_path = PathBuf::from(file.name());
        let Some(outpath) = safe_join(target_dir, &entry_path, archive)? else {
            continue;
        };
        if file.is_dir() {
            fs::create_dir_all(&outpath)?;
            continue;
        }
        if let Some(parent) = outpath.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut outfile = fs::File::create(&outpath)?;
        std::io::copy(&mut file, &mut outfile)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = file.unix_mode() {
                fs::set_permissions(&outpath, fs::Permissions::from_mode(mode))?;
            }
        }
    }
    debug!("Finished ZIP extraction for {}", archive.display());
    Ok(())
}

fn determine_source_root(target_dir: &Path) -> Result<PathBuf> {
    let mut subdirs = Vec::new();
    let mut has_files = false;
    for entry in fs::read_dir(target_dir)?.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') {
            continue;
        }
        let path = entry.path();
        if path.is_dir() {
            subdirs.push(path);
        } else {
            has_files = true;
        }
    }

    if subdirs.len() == 1 && !has_files {
        debug!("Source root is single subdirectory: {}", subdirs[0].display());
        Ok(subdirs.remove(0))
    } else {
        debug!("Source root is the extraction directory: {}", target_dir.display());
        Ok(target_dir.to_path_buf())
    }
}
