// kiln-aio/src/checksum.rs
use std::fmt;
use std::path::Path;

use kiln_common::error::{KilnError, Result};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Sha1,
    Sha256,
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sha1 => write!(f, "SHA1"),
            Self::Sha256 => write!(f, "SHA256"),
        }
    }
}

/// A parsed `sha1:<hex>` / `sha256:<hex>` checksum. Bare hex is sha256.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checksum {
    pub algorithm: Algorithm,
    pub hex: String,
}

impl Checksum {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let (algorithm, hex) = match raw.split_once(':') {
            Some(("sha1", hex)) => (Algorithm::Sha1, hex),
            Some(("sha256", hex)) => (Algorithm::Sha256, hex),
            Some((other, _)) => {
                return Err(KilnError::ChecksumError(format!(
                    "Unsupported checksum algorithm '{other}'"
                )))
            }
            None => (Algorithm::Sha256, raw),
        };
        let expected_len = match algorithm {
            Algorithm::Sha1 => 40,
            Algorithm::Sha256 => 64,
        };
        if hex.len() != expected_len || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(KilnError::ChecksumError(format!(
                "Malformed {algorithm} checksum '{hex}'"
            )));
        }
        Ok(Self {
            algorithm,
            hex: hex.to_ascii_lowercase(),
        })
    }

    fn matches(&self, actual: &str) -> bool {
        actual.eq_ignore_ascii_case(&self.hex)
    }
}

fn mismatch(path: &Path, expected: &Checksum, actual: &str) -> KilnError {
    KilnError::ChecksumError(format!(
        "Checksum mismatch for {}: expected {} {}, got {}",
        path.display(),
        expected.algorithm,
        expected.hex,
        actual
    ))
}

fn hash_bytes_hex(algorithm: Algorithm, reader: &mut impl std::io::Read) -> Result<(String, u64)> {
    match algorithm {
        Algorithm::Sha1 => {
            let mut hasher = Sha1::new();
            let n = std::io::copy(reader, &mut hasher)?;
            Ok((hex::encode(hasher.finalize()), n))
        }
        Algorithm::Sha256 => {
            let mut hasher = Sha256::new();
            let n = std::io::copy(reader, &mut hasher)?;
            Ok((hex::encode(hasher.finalize()), n))
        }
    }
}

pub fn verify_checksum_sync(path: &Path, expected: &Checksum) -> Result<()> {
    debug!("Sync Verifying checksum for: {}", path.display());
    let std_file = std::fs::File::open(path)?;
    let mut std_reader = std::io::BufReader::new(std_file);
    let (actual, bytes_read) = hash_bytes_hex(expected.algorithm, &mut std_reader)?;

    debug!(
        "Sync Calculated {}: {} ({} bytes read)",
        expected.algorithm, actual, bytes_read
    );
    debug!("Expected {}:   {}", expected.algorithm, expected.hex);

    if expected.matches(&actual) {
        Ok(())
    } else {
        Err(mismatch(path, expected, &actual))
    }
}

/// Asynchronously verifies a file. Reads asynchronously, hashes synchronously.
pub async fn verify_checksum_async(path: &Path, expected: &Checksum) -> Result<()> {
    debug!("Async Verifying checksum for: {}", path.display());
    let mut file = File::open(path).await?;
    let mut contents = Vec::new();
    file.read_to_end(&mut contents).await?;

    let (actual, bytes_read) = hash_bytes_hex(expected.algorithm, &mut &contents[..])?;
    debug!(
        "Async Calculated {}: {} ({} bytes read)",
        expected.algorithm, actual, bytes_read
    );

    if expected.matches(&actual) {
        Ok(())
    } else {
        Err(mismatch(path, expected, &actual))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    // printf 'abc' | shasum -a 1 / -a 256
    const ABC_SHA1: &str = "a9993e364706816aba3e25717850c26c9cd0d89d";
    const ABC_SHA256: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";

    fn abc_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"abc").unwrap();
        file
    }

    #[test]
    fn parses_prefixed_and_bare() {
        let sha1 = Checksum::parse(&format!("sha1:{ABC_SHA1}")).unwrap();
        assert_eq!(sha1.algorithm, Algorithm::Sha1);
        let bare = Checksum::parse(ABC_SHA256).unwrap();
        assert_eq!(bare.algorithm, Algorithm::Sha256);
        assert!(Checksum::parse("md5:abc").is_err());
        assert!(Checksum::parse("sha1:1234").is_err());
    }

    #[test]
    fn verifies_both_algorithms() {
        let file = abc_file();
        verify_checksum_sync(file.path(), &Checksum::parse(&format!("sha1:{ABC_SHA1}")).unwrap())
            .unwrap();
        verify_checksum_sync(file.path(), &Checksum::parse(ABC_SHA256).unwrap()).unwrap();
    }

    #[test]
    fn mismatch_is_reported() {
        let file = abc_file();
        let wrong = Checksum::parse(&"0".repeat(64)).unwrap();
        assert!(matches!(
            verify_checksum_sync(file.path(), &wrong),
            Err(KilnError::ChecksumError(_))
        ));
    }

    #[tokio::test]
    async fn async_verification_matches_sync() {
        let file = abc_file();
        verify_checksum_async(file.path(), &Checksum::parse(&format!("sha1:{ABC_SHA1}")).unwrap())
            .await
            .unwrap();
    }
}
