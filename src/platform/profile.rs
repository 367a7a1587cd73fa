//! Per-OS platform profiles: table locations, column layouts, noauto
//! markers, and the commands used when a platform has no live mount table.
//!
//! All OS differences are carried as data in one `PlatformProfile` value
//! selected at startup; check logic never branches on the operating system.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{MhsError, Result};
use crate::tables::row::ColumnSchema;

/// Operating-system flavor a profile is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsFlavor {
    Linux,
    FreeBsd,
    Solaris,
    MacOs,
}

/// Where the live mount table comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiveTableSource {
    /// A kernel-maintained table file, e.g. `/proc/mounts`.
    File(PathBuf),
    /// No table file exists; run the mount-listing command and normalize
    /// its output instead.
    MountCommand,
}

/// Marker files identifying a container context that virtualizes mounts.
///
/// The context is detected when `present` exists and `absent` does not
/// (an OpenVZ guest has `/proc/vz` but not the host-only `/proc/bc`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerProbe {
    pub present: PathBuf,
    pub absent: PathBuf,
}

/// Pseudo-filesystem a live table depends on, with the one-shot command
/// used to bring it back when missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PseudoFs {
    pub path: PathBuf,
    pub mount_argv: Vec<String>,
}

/// One platform's constants, selected once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformProfile {
    pub flavor: OsFlavor,
    pub fstab_path: PathBuf,
    pub live_table: LiveTableSource,
    /// Column layout of the static config table.
    pub config_schema: ColumnSchema,
    /// Column layout of the live table file (unused for `MountCommand`).
    pub live_schema: ColumnSchema,
    /// Option token that marks an entry as not auto-mounted.
    pub noauto_option: String,
    /// Mount-listing command for platforms without a live table file.
    pub mount_list_argv: Vec<String>,
    /// Pseudo-filesystem backing the live table, if any.
    pub pseudo_fs: Option<PseudoFs>,
    /// Container detection markers, if the platform has virtualized-mount
    /// containers worth recognizing.
    pub container_probe: Option<ContainerProbe>,
}

impl PlatformProfile {
    #[must_use]
    pub fn linux() -> Self {
        Self {
            flavor: OsFlavor::Linux,
            fstab_path: PathBuf::from("/etc/fstab"),
            live_table: LiveTableSource::File(PathBuf::from("/proc/mounts")),
            config_schema: ColumnSchema::LINUX,
            live_schema: ColumnSchema::LINUX,
            noauto_option: "noauto".to_string(),
            mount_list_argv: vec!["mount".to_string()],
            pseudo_fs: Some(PseudoFs {
                path: PathBuf::from("/proc"),
                mount_argv: ["mount", "-t", "proc", "proc", "/proc"]
                    .iter()
                    .map(ToString::to_string)
                    .collect(),
            }),
            container_probe: Some(ContainerProbe {
                present: PathBuf::from("/proc/vz"),
                absent: PathBuf::from("/proc/bc"),
            }),
        }
    }

    #[must_use]
    pub fn freebsd() -> Self {
        Self {
            flavor: OsFlavor::FreeBsd,
            fstab_path: PathBuf::from("/etc/fstab"),
            live_table: LiveTableSource::MountCommand,
            config_schema: ColumnSchema::LINUX,
            live_schema: ColumnSchema::LINUX,
            noauto_option: "noauto".to_string(),
            mount_list_argv: vec!["mount".to_string(), "-p".to_string()],
            pseudo_fs: None,
            container_probe: None,
        }
    }

    #[must_use]
    pub fn solaris() -> Self {
        Self {
            flavor: OsFlavor::Solaris,
            fstab_path: PathBuf::from("/etc/vfstab"),
            live_table: LiveTableSource::File(PathBuf::from("/etc/mnttab")),
            config_schema: ColumnSchema::SOLARIS_VFSTAB,
            live_schema: ColumnSchema::LINUX,
            noauto_option: "no".to_string(),
            mount_list_argv: vec!["mount".to_string()],
            pseudo_fs: None,
            container_probe: None,
        }
    }

    #[must_use]
    pub fn macos() -> Self {
        Self {
            flavor: OsFlavor::MacOs,
            fstab_path: PathBuf::from("/etc/fstab"),
            live_table: LiveTableSource::MountCommand,
            config_schema: ColumnSchema::LINUX,
            live_schema: ColumnSchema::LINUX,
            noauto_option: "noauto".to_string(),
            mount_list_argv: vec!["mount".to_string()],
            pseudo_fs: None,
            container_probe: None,
        }
    }

    /// Profile for a named flavor.
    #[must_use]
    pub fn for_flavor(flavor: OsFlavor) -> Self {
        match flavor {
            OsFlavor::Linux => Self::linux(),
            OsFlavor::FreeBsd => Self::freebsd(),
            OsFlavor::Solaris => Self::solaris(),
            OsFlavor::MacOs => Self::macos(),
        }
    }

    /// Whether the current process runs inside a container context that
    /// virtualizes mounts (fstab membership is meaningless there).
    #[must_use]
    pub fn in_virtualized_container(&self) -> bool {
        self.container_probe.as_ref().is_some_and(|probe| {
            Path::new(&probe.present).exists() && !Path::new(&probe.absent).exists()
        })
    }
}

/// Detect the profile for the running operating system.
pub fn detect_profile() -> Result<PlatformProfile> {
    match std::env::consts::OS {
        "linux" => Ok(PlatformProfile::linux()),
        "freebsd" => Ok(PlatformProfile::freebsd()),
        "solaris" | "illumos" => Ok(PlatformProfile::solaris()),
        "macos" => Ok(PlatformProfile::macos()),
        other => Err(MhsError::UnsupportedPlatform {
            details: format!("no platform profile for OS `{other}`"),
        }),
    }
}
