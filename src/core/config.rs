//! Configuration model: TOML file layered under CLI flags, platform-profile
//! defaults, threshold clamping.

#![allow(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{MhsError, Result};
use crate::platform::profile::{LiveTableSource, PlatformProfile};
use crate::tables::row::ColumnSchema;

/// Full check configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct CheckConfig {
    pub thresholds: ThresholdConfig,
    pub selector: SelectorConfig,
    pub probe: ProbeConfig,
    pub tables: TableConfig,
    pub behavior: BehaviorConfig,
}

/// Probe latency thresholds in seconds.
///
/// `stale_secs` is the probe deadline; `warning_secs` is clamped to
/// `critical_secs` so a warning can never outrank a critical.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ThresholdConfig {
    pub warning_secs: f64,
    pub critical_secs: f64,
    pub stale_secs: f64,
}

/// Target auto-discovery behavior.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SelectorConfig {
    /// Derive targets from the config table instead of explicit arguments.
    pub autoselect: bool,
    /// Treat an empty auto-discovered target set as OK rather than UNKNOWN.
    pub tolerate_empty: bool,
    /// Regex excluding matching mount points from auto-discovery.
    pub exclude_pattern: Option<String>,
    /// Exclude rows carrying the platform's noauto marker.
    pub exclude_noauto: bool,
    /// Filesystem types eligible for auto-discovery.
    pub fs_types: Vec<String>,
}

/// Probe dispatch settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProbeConfig {
    /// Space-query command; the mount point is appended as the last argument.
    pub space_argv: Vec<String>,
    /// Extra arguments passed through to the space-query command.
    pub extra_args: Vec<String>,
    /// Poll interval while waiting on an outstanding probe.
    pub poll_interval_ms: u64,
    /// Run the create-verify-remove write test per target.
    pub writetest: bool,
}

/// Overrides for table locations and column layout; unset fields fall back
/// to the platform profile.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct TableConfig {
    pub fstab_path: Option<PathBuf>,
    pub live_table_path: Option<PathBuf>,
    pub fs_type_col: Option<usize>,
    pub mount_point_col: Option<usize>,
    pub options_col: Option<usize>,
}

/// Check-pipeline switches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Accept a symbolic link where a live mount is expected.
    pub accept_symlinks: bool,
    /// Skip the fstab-membership stage entirely.
    pub skip_fstab_check: bool,
    /// Echo per-stage progress to stderr.
    pub verbose: bool,
    /// JSONL event-log destination; unset disables file logging.
    pub log_path: Option<PathBuf>,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            warning_secs: 2.0,
            critical_secs: 3.0,
            stale_secs: 5.0,
        }
    }
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            autoselect: false,
            tolerate_empty: false,
            exclude_pattern: None,
            exclude_noauto: false,
            fs_types: default_fs_types(),
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            space_argv: vec!["df".to_string(), "-P".to_string(), "-k".to_string()],
            extra_args: Vec::new(),
            poll_interval_ms: 100,
            writetest: false,
        }
    }
}

/// Filesystem types eligible for auto-discovery, network types first.
#[must_use]
pub fn default_fs_types() -> Vec<String> {
    [
        "nfs", "nfs4", "cifs", "smbfs", "davfs", "fuse", "glusterfs", "ocfs2", "lustre", "ceph",
        "ufs", "zfs", "btrfs", "ext2", "ext3", "ext4", "xfs", "auto",
    ]
    .iter()
    .map(ToString::to_string)
    .collect()
}

impl ThresholdConfig {
    /// Validate and clamp: thresholds must be positive, and warning must
    /// not exceed critical.
    pub fn normalized(&self) -> Result<Self> {
        if self.warning_secs <= 0.0 || self.critical_secs <= 0.0 || self.stale_secs <= 0.0 {
            return Err(MhsError::InvalidConfig {
                details: format!(
                    "thresholds must be positive (warn={}, crit={}, stale={})",
                    self.warning_secs, self.critical_secs, self.stale_secs
                ),
            });
        }
        Ok(Self {
            warning_secs: self.warning_secs.min(self.critical_secs),
            critical_secs: self.critical_secs,
            stale_secs: self.stale_secs,
        })
    }
}

impl CheckConfig {
    /// Load from a TOML file, or defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            None => Ok(Self::default()),
            Some(file) => {
                let raw =
                    fs::read_to_string(file).map_err(|source| MhsError::io(file, source))?;
                Ok(toml::from_str(&raw)?)
            }
        }
    }

    /// Apply table overrides onto a platform profile.
    #[must_use]
    pub fn resolved_profile(&self, base: &PlatformProfile) -> PlatformProfile {
        let mut profile = base.clone();
        if let Some(path) = &self.tables.fstab_path {
            profile.fstab_path.clone_from(path);
        }
        if let Some(path) = &self.tables.live_table_path {
            profile.live_table = LiveTableSource::File(path.clone());
        }
        profile.config_schema = ColumnSchema {
            fs_type_col: self
                .tables
                .fs_type_col
                .unwrap_or(profile.config_schema.fs_type_col),
            mount_point_col: self
                .tables
                .mount_point_col
                .unwrap_or(profile.config_schema.mount_point_col),
            options_col: self
                .tables
                .options_col
                .unwrap_or(profile.config_schema.options_col),
        };
        profile
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_sane() {
        let config = CheckConfig::default();
        assert!(!config.selector.autoselect);
        assert!(!config.probe.writetest);
        assert_eq!(config.probe.space_argv[0], "df");
        assert!(config.selector.fs_types.contains(&"nfs".to_string()));
        assert!(config.selector.fs_types.contains(&"zfs".to_string()));
    }

    #[test]
    fn thresholds_clamp_warning_to_critical() {
        let thresholds = ThresholdConfig {
            warning_secs: 10.0,
            critical_secs: 3.0,
            stale_secs: 5.0,
        };
        let normalized = thresholds.normalized().expect("positive thresholds");
        assert!((normalized.warning_secs - 3.0).abs() < f64::EPSILON);
        assert!((normalized.critical_secs - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn non_positive_thresholds_are_rejected() {
        let thresholds = ThresholdConfig {
            warning_secs: 0.0,
            critical_secs: 3.0,
            stale_secs: 5.0,
        };
        let err = thresholds.normalized().expect_err("zero warning rejected");
        assert_eq!(err.code(), "MHS-1001");
    }

    #[test]
    fn load_from_toml_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp config");
        write!(
            file,
            "[thresholds]\nwarning_secs = 1.5\ncritical_secs = 4.0\n\n\
             [selector]\nautoselect = true\nexclude_noauto = true\n"
        )
        .expect("write config");

        let config = CheckConfig::load(Some(file.path())).expect("config should load");
        assert!((config.thresholds.warning_secs - 1.5).abs() < f64::EPSILON);
        assert!(config.selector.autoselect);
        assert!(config.selector.exclude_noauto);
        // Unset sections keep defaults.
        assert_eq!(config.probe.poll_interval_ms, 100);
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().expect("temp config");
        write!(file, "= broken").expect("write config");
        let err = CheckConfig::load(Some(file.path())).expect_err("parse should fail");
        assert_eq!(err.code(), "MHS-1002");
    }

    #[test]
    fn table_overrides_apply_to_profile() {
        let mut config = CheckConfig::default();
        config.tables.fstab_path = Some(PathBuf::from("/tmp/fstab.test"));
        config.tables.live_table_path = Some(PathBuf::from("/tmp/mtab.test"));
        config.tables.fs_type_col = Some(4);

        let profile = config.resolved_profile(&PlatformProfile::linux());
        assert_eq!(profile.fstab_path, PathBuf::from("/tmp/fstab.test"));
        assert_eq!(
            profile.live_table,
            LiveTableSource::File(PathBuf::from("/tmp/mtab.test"))
        );
        assert_eq!(profile.config_schema.fs_type_col, 4);
        assert_eq!(profile.config_schema.mount_point_col, 2);
    }
}
