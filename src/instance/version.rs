//! Content-hash versions for optimistic concurrency on form instances.
//!
//! A version is the base64 encoding of the first 8 bytes of the SHA-256 of
//! the instance's stored JSON. Equal content always yields an equal version,
//! so a caller can hand back the version it read and have a mismatch detected
//! before any work is done.
//!
//! ```rust
//! use tenant_workflow::instance::InstanceVersion;
//!
//! let version = InstanceVersion::from_content(br#"{"id":"1","status":"draft"}"#);
//! let etag = version.to_etag();
//! assert_eq!(InstanceVersion::parse_etag(&etag).unwrap(), version);
//! ```

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Opaque instance version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceVersion {
    opaque: String,
}

impl InstanceVersion {
    pub fn from_content(content: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(content);
        let hash = hasher.finalize();
        Self {
            opaque: BASE64.encode(&hash[..8]),
        }
    }

    /// Version of a stored JSON record.
    pub fn from_value(value: &Value) -> Self {
        // Serializing a Value cannot fail
        Self::from_content(value.to_string().as_bytes())
    }

    /// Wrap a version string produced elsewhere.
    pub fn from_hash(hash: impl AsRef<str>) -> Self {
        Self {
            opaque: hash.as_ref().to_string(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.opaque
    }

    /// Weak ETag form, e.g. `W/"abc123"`.
    pub fn to_etag(&self) -> String {
        format!("W/\"{}\"", self.opaque)
    }

    /// Parse a weak or strong ETag.
    pub fn parse_etag(etag: &str) -> Result<Self, VersionError> {
        let trimmed = etag.trim();
        let quoted = trimmed.strip_prefix("W/").unwrap_or(trimmed);
        let opaque = quoted
            .strip_prefix('"')
            .and_then(|rest| rest.strip_suffix('"'))
            .filter(|inner| !inner.is_empty())
            .ok_or_else(|| VersionError::InvalidEtagFormat(etag.to_string()))?;
        Ok(Self::from_hash(opaque))
    }
}

impl fmt::Display for InstanceVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.opaque)
    }
}

impl FromStr for InstanceVersion {
    type Err = VersionError;

    fn from_str(version: &str) -> Result<Self, Self::Err> {
        let trimmed = version.trim();
        if trimmed.is_empty() {
            return Err(VersionError::ParseError(
                "Version string cannot be empty".to_string(),
            ));
        }
        Ok(Self::from_hash(trimmed))
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("Invalid ETag format: {0}")]
    InvalidEtagFormat(String),

    #[error("Failed to parse version: {0}")]
    ParseError(String),
}
