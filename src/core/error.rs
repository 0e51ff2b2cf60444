//! Error handling for the publish workflow
//!
//! This module provides the error taxonomy for publishing a package into a
//! git repository, using the thiserror crate for ergonomic error handling.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for publish operations
#[derive(Error, Debug)]
pub enum PublishError {
    // Manifest / configuration errors
    #[error("failed to read package manifest at {path}")]
    ManifestRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse package manifest at {path}")]
    ManifestParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("package manifest at {path} is missing a {field} field")]
    ManifestField { path: PathBuf, field: &'static str },

    #[error("package version '{version}' is not a valid SemVer version")]
    InvalidVersion { version: String },

    // External tool failures
    #[error("failed to launch '{program}'")]
    CommandSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program} {args}' exited with {status}")]
    CommandFailed {
        program: String,
        args: String,
        status: std::process::ExitStatus,
    },

    // Archive errors
    #[error("failed to extract archive {archive}")]
    Unpack {
        archive: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Filesystem errors (scratch handling, message files)
    #[error("filesystem operation failed on {path}")]
    Fs {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Prepublish hook errors
    #[error("prepublish hook failed")]
    Hook {
        #[source]
        source: anyhow::Error,
    },
}

impl PublishError {
    /// Check whether this error came from an external tool invocation
    pub fn is_tool_failure(&self) -> bool {
        matches!(self, Self::CommandSpawn { .. } | Self::CommandFailed { .. })
    }

    /// Get error code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::ManifestRead { .. } => "MANIFEST_READ",
            Self::ManifestParse { .. } => "MANIFEST_PARSE",
            Self::ManifestField { .. } => "MANIFEST_FIELD",
            Self::InvalidVersion { .. } => "INVALID_VERSION",
            Self::CommandSpawn { .. } => "COMMAND_SPAWN",
            Self::CommandFailed { .. } => "COMMAND_FAILED",
            Self::Unpack { .. } => "UNPACK_FAILED",
            Self::Fs { .. } => "FS_FAILED",
            Self::Hook { .. } => "HOOK_FAILED",
        }
    }

    pub(crate) fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Fs {
            path: path.into(),
            source,
        }
    }
}
