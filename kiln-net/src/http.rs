use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use kiln_aio::checksum::{verify_checksum_async, Checksum};
use kiln_common::config::Config;
use kiln_common::error::{KilnError, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{Client, StatusCode};
use tokio::fs::File as TokioFile;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::validation::{file_name_from_url, validate_url};

const DOWNLOAD_TIMEOUT_SECS: u64 = 300;
const CONNECT_TIMEOUT_SECS: u64 = 30;
const USER_AGENT_STRING: &str = "kiln recipe runner (Rust; +https://github.com/alexykn/sps)";

/// Downloads a recipe's source archive into the cache and verifies it.
///
/// A cached copy is reused only if it still matches `checksum`; otherwise it
/// is removed and fetched again. An empty checksum skips verification with a
/// warning.
pub async fn fetch_source_archive(
    recipe_name: &str,
    url: &str,
    checksum: &str,
    config: &Config,
) -> Result<PathBuf> {
    let expected = if checksum.trim().is_empty() {
        None
    } else {
        Some(Checksum::parse(checksum)?)
    };
    let filename = file_name_from_url(url).unwrap_or_else(|| format!("{recipe_name}-download"));
    let cache_path = config.cache_dir().join(&filename);
    debug!(
        "Preparing to fetch source for '{}' from {} into {}",
        recipe_name,
        url,
        cache_path.display()
    );

    if cache_path.is_file() {
        match &expected {
            Some(sum) => match verify_checksum_async(&cache_path, sum).await {
                Ok(()) => {
                    debug!("Using valid cached file: {}", cache_path.display());
                    return Ok(cache_path);
                }
                Err(e) => {
                    debug!(
                        "Cached file checksum mismatch ({}): {}. Redownloading.",
                        cache_path.display(),
                        e
                    );
                    if let Err(remove_err) = fs::remove_file(&cache_path) {
                        debug!(
                            "Failed to remove corrupted cached file {}: {}",
                            cache_path.display(),
                            remove_err
                        );
                    }
                }
            },
            None => {
                debug!(
                    "Using cached file (no checksum provided): {}",
                    cache_path.display()
                );
                return Ok(cache_path);
            }
        }
    }

    fs::create_dir_all(config.cache_dir()).map_err(|e| {
        KilnError::IoError(format!(
            "Failed to create cache directory {}: {}",
            config.cache_dir().display(),
            e
        ))
    })?;
    validate_url(url)?;

    let client = build_http_client()?;
    download_and_verify(&client, url, &cache_path, expected.as_ref())
        .await
        .map_err(|e| match e {
            KilnError::ChecksumError(_) | KilnError::DownloadError(..) => e,
            other => KilnError::DownloadError(
                recipe_name.to_string(),
                url.to_string(),
                other.to_string(),
            ),
        })
}

fn build_http_client() -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_STRING));
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    Client::builder()
        .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .default_headers(headers)
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(|e| KilnError::HttpError(format!("Failed to build HTTP client: {e}")))
}

async fn download_and_verify(
    client: &Client,
    url: &str,
    final_path: &Path,
    expected: Option<&Checksum>,
) -> Result<PathBuf> {
    let temp_filename = format!(
        ".{}.download",
        final_path.file_name().unwrap_or_default().to_string_lossy()
    );
    let temp_path = final_path.with_file_name(temp_filename);
    debug!("Downloading to temporary path: {}", temp_path.display());
    if temp_path.exists() {
        if let Err(e) = fs::remove_file(&temp_path) {
            warn!(
                "Could not remove existing temporary file {}: {}",
                temp_path.display(),
                e
            );
        }
    }

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| KilnError::HttpError(format!("HTTP request failed for {url}: {e}")))?;
    let status = response.status();
    debug!("Received HTTP status: {} for {}", status, url);

    if !status.is_success() {
        let name = final_path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        return match status {
            StatusCode::NOT_FOUND => Err(KilnError::DownloadError(
                name,
                url.to_string(),
                "Resource not found (404)".to_string(),
            )),
            StatusCode::FORBIDDEN => Err(KilnError::DownloadError(
                name,
                url.to_string(),
                "Access forbidden (403)".to_string(),
            )),
            _ => Err(KilnError::HttpError(format!(
                "HTTP error {status} for URL {url}"
            ))),
        };
    }

    let content = response
        .bytes()
        .await
        .map_err(|e| KilnError::HttpError(format!("Failed to read response body bytes: {e}")))?;
    let mut temp_file = TokioFile::create(&temp_path).await?;
    temp_file.write_all(&content).await?;
    temp_file.flush().await?;
    drop(temp_file);

    match expected {
        Some(sum) => {
            if let Err(e) = verify_checksum_async(&temp_path, sum).await {
                let _ = fs::remove_file(&temp_path);
                return Err(e);
            }
            debug!("Checksum verified for {}", temp_path.display());
        }
        None => warn!(
            "Skipping checksum verification for {} - none provided.",
            temp_path.display()
        ),
    }

    fs::rename(&temp_path, final_path).map_err(|e| {
        KilnError::IoError(format!(
            "Failed to move temp file {} to {}: {}",
            temp_path.display(),
            final_path.display(),
            e
        ))
    })?;
    debug!("Moved verified file to {}", final_path.display());
    Ok(final_path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cached_archive_with_matching_checksum_is_reused() {
        let root = tempfile::tempdir().unwrap();
        let config = Config::with_root(root.path());
        fs::create_dir_all(config.cache_dir()).unwrap();
        fs::write(config.cache_dir().join("demo-1.0.tar.gz"), b"abc").unwrap();

        // Plain http would be rejected; reaching Ok proves the cache short-circuit.
        let path = fetch_source_archive(
            "demo",
            "http://example.invalid/demo-1.0.tar.gz",
            "sha1:a9993e364706816aba3e25717850c26c9cd0d89d",
            &config,
        )
        .await
        .unwrap();
        assert_eq!(path, config.cache_dir().join("demo-1.0.tar.gz"));
    }

    #[tokio::test]
    async fn insecure_url_is_rejected_before_download() {
        let root = tempfile::tempdir().unwrap();
        let config = Config::with_root(root.path());
        let result = fetch_source_archive(
            "demo",
            "http://example.invalid/demo-1.0.tar.gz",
            "",
            &config,
        )
        .await;
        assert!(matches!(result, Err(KilnError::ValidationError(_))));
    }
}
