//! Content fingerprints for change detection.
//!
//! A [`Fingerprint`] is the full SHA-256 of a file's bytes, hex encoded. It is
//! used as a change detector only: two fingerprints differ exactly when the
//! content that produced them differs.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Length of a hex-encoded fingerprint.
pub const FINGERPRINT_HEX_LEN: usize = 64;

/// A full 64-character SHA-256 digest of some content.
///
/// # Format
///
/// The digest is a lowercase hexadecimal string, which is also the file name
/// of a dependency record.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Fingerprint(pub String);

impl Fingerprint {
  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl std::fmt::Display for Fingerprint {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("not a fingerprint: {0:?}")]
pub struct InvalidFingerprint(pub String);

impl FromStr for Fingerprint {
  type Err = InvalidFingerprint;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let is_lower_hex = s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
    if s.len() != FINGERPRINT_HEX_LEN || !is_lower_hex {
      return Err(InvalidFingerprint(s.to_string()));
    }
    Ok(Fingerprint(s.to_string()))
  }
}

/// Error while fingerprinting a file.
#[derive(Debug, thiserror::Error)]
#[error("failed to read {path}: {source}")]
pub struct HashError {
  pub path: PathBuf,
  #[source]
  pub source: io::Error,
}

impl HashError {
  pub fn is_not_found(&self) -> bool {
    self.source.kind() == io::ErrorKind::NotFound
  }
}

/// Fingerprint a file's contents.
///
/// Fails if the file cannot be opened or read. Empty files are fine and always
/// produce the digest of empty input.
pub fn fingerprint_file(path: &Path) -> Result<Fingerprint, HashError> {
  let to_error = |source| HashError {
    path: path.to_path_buf(),
    source,
  };

  let mut file = fs::File::open(path).map_err(to_error)?;
  let mut hasher = Sha256::new();
  let mut buffer = [0u8; 8192];

  loop {
    let bytes_read = file.read(&mut buffer).map_err(to_error)?;
    if bytes_read == 0 {
      break;
    }
    hasher.update(&buffer[..bytes_read]);
  }

  Ok(Fingerprint(hex::encode(hasher.finalize())))
}

/// Fingerprint arbitrary bytes.
pub fn fingerprint_bytes(data: &[u8]) -> Fingerprint {
  Fingerprint(hex::encode(Sha256::digest(data)))
}
