//! MHS-prefixed error types with structured error codes.
//!
//! Every error that escapes the check pipeline maps to the UNKNOWN plugin
//! state; probe-detected problems are diagnostics, not errors.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, MhsError>;

/// Top-level error type for Mount Health Sentinel.
#[derive(Debug, Error)]
pub enum MhsError {
    #[error("[MHS-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[MHS-1002] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[MHS-1101] unsupported platform: {details}")]
    UnsupportedPlatform { details: String },

    #[error("[MHS-2001] mount table unreadable at {path}: {details}")]
    TableRead { path: PathBuf, details: String },

    #[error("[MHS-2002] mount table parse failure: {details}")]
    TableParse { details: String },

    #[error("[MHS-2101] no mount points to check: {details}")]
    NoTargets { details: String },

    #[error("[MHS-3001] probe spawn failure for `{command}`: {details}")]
    ProbeSpawn { command: String, details: String },

    #[error("[MHS-3002] probe monitoring failure: {details}")]
    ProbeWait { details: String },

    #[error("[MHS-3101] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[MHS-3201] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },
}

impl MhsError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "MHS-1001",
            Self::ConfigParse { .. } => "MHS-1002",
            Self::UnsupportedPlatform { .. } => "MHS-1101",
            Self::TableRead { .. } => "MHS-2001",
            Self::TableParse { .. } => "MHS-2002",
            Self::NoTargets { .. } => "MHS-2101",
            Self::ProbeSpawn { .. } => "MHS-3001",
            Self::ProbeWait { .. } => "MHS-3002",
            Self::Io { .. } => "MHS-3101",
            Self::Serialization { .. } => "MHS-3201",
        }
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Convenience constructor for unreadable table files.
    #[must_use]
    pub fn table_read(path: impl AsRef<Path>, source: &std::io::Error) -> Self {
        Self::TableRead {
            path: path.as_ref().to_path_buf(),
            details: source.to_string(),
        }
    }
}

impl From<serde_json::Error> for MhsError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for MhsError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
