//! Package manifest reading
//!
//! Reads `package.json` from a package directory and extracts the name and
//! version used for tarball naming, commit/tag defaults, and cache cleanup.

use crate::core::error::PublishError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

/// Manifest file name expected in the package directory
const MANIFEST_FILE: &str = "package.json";

/// Name and version of the package being published
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInfo {
    pub name: String,
    pub version: String,
}

impl PackageInfo {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

/// Raw manifest shape; only the fields the publisher consumes
#[derive(Debug, Deserialize)]
struct RawManifest {
    name: Option<String>,
    version: Option<String>,
}

/// Read and validate the package manifest in `package_dir`.
///
/// The version must parse as SemVer, matching what the package manager
/// itself enforces at publish time.
///
/// # Errors
///
/// Returns a manifest error if the file is missing, unparseable, lacks a
/// name or version, or carries a non-SemVer version.
pub async fn read_package_info(package_dir: &Path) -> Result<PackageInfo, PublishError> {
    let path = package_dir.join(MANIFEST_FILE);

    let content = fs::read_to_string(&path)
        .await
        .map_err(|source| PublishError::ManifestRead {
            path: path.clone(),
            source,
        })?;

    let raw: RawManifest =
        serde_json::from_str(&content).map_err(|source| PublishError::ManifestParse {
            path: path.clone(),
            source,
        })?;

    let name = raw.name.ok_or(PublishError::ManifestField {
        path: path.clone(),
        field: "name",
    })?;
    let version = raw.version.ok_or(PublishError::ManifestField {
        path: path.clone(),
        field: "version",
    })?;

    if semver::Version::parse(&version).is_err() {
        return Err(PublishError::InvalidVersion { version });
    }

    Ok(PackageInfo { name, version })
}
