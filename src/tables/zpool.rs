//! Synthetic config-table rows for ZFS pool datasets.
//!
//! Pool datasets mount without fstab entries, so fstab-membership checks
//! would flag every one of them as undeclared. When the pool manager binary
//! is present, qualifying datasets are appended to the config table as
//! synthetic rows before any filtering happens.

#![allow(missing_docs)]

use std::env;
use std::path::Path;
use std::process::Command;

use crate::core::errors::{MhsError, Result};
use crate::tables::row::{MountTable, MountTableRow, contains_mount_point, normalize_mount_point};

/// Properties queried per dataset, in `zfs list -H -o` column order.
const DATASET_PROPS: &str = "name,mountpoint,canmount,readonly,zoned";

/// One dataset's mount-relevant properties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetProps {
    pub name: String,
    pub mountpoint: String,
    pub canmount: String,
    pub readonly: String,
    pub zoned: String,
}

/// Whether the `zfs` binary is on PATH.
#[must_use]
pub fn pool_manager_present() -> bool {
    let Some(path_var) = env::var_os("PATH") else {
        return false;
    };
    env::split_paths(&path_var).any(|dir| dir.join("zfs").is_file())
}

/// Append synthetic rows for qualifying datasets to `table`.
///
/// A no-op when the pool manager is absent. A failing `zfs list` is an
/// error so the caller can record the degradation instead of silently
/// checking an incomplete table.
pub fn extend_with_datasets(table: &mut MountTable) -> Result<()> {
    if !pool_manager_present() {
        return Ok(());
    }
    let raw = run_zfs_list()?;
    let datasets = parse_dataset_listing(&raw);
    let synthetic = synthesize_rows(&datasets, table, |path| path.exists());
    table.extend(synthetic);
    Ok(())
}

fn run_zfs_list() -> Result<String> {
    let output = Command::new("zfs")
        .args(["list", "-H", "-t", "filesystem", "-o", DATASET_PROPS])
        .output()
        .map_err(|source| MhsError::ProbeSpawn {
            command: "zfs list".to_string(),
            details: source.to_string(),
        })?;
    if !output.status.success() {
        return Err(MhsError::TableParse {
            details: format!(
                "zfs list exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Parse `zfs list -H` output (tab-separated, one dataset per line).
#[must_use]
pub fn parse_dataset_listing(raw: &str) -> Vec<DatasetProps> {
    raw.lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 5 {
                return None;
            }
            Some(DatasetProps {
                name: fields[0].to_string(),
                mountpoint: fields[1].to_string(),
                canmount: fields[2].to_string(),
                readonly: fields[3].to_string(),
                zoned: fields[4].to_string(),
            })
        })
        .collect()
}

/// Build synthetic rows for datasets that qualify.
///
/// Excluded: legacy/none mountpoints, `canmount=off`, datasets delegated to
/// a zone/jail, mount paths absent on disk, and mount points already present
/// in the table.
pub fn synthesize_rows(
    datasets: &[DatasetProps],
    existing: &[MountTableRow],
    path_exists: impl Fn(&Path) -> bool,
) -> Vec<MountTableRow> {
    let mut rows = Vec::new();
    for dataset in datasets {
        if !dataset.mountpoint.starts_with('/') {
            // "legacy", "none", or "-": not mounted by the pool manager.
            continue;
        }
        if dataset.canmount.eq_ignore_ascii_case("off") {
            continue;
        }
        if dataset.zoned.eq_ignore_ascii_case("on") {
            continue;
        }
        if !path_exists(Path::new(&dataset.mountpoint)) {
            continue;
        }
        let mount_point = normalize_mount_point(&dataset.mountpoint);
        if contains_mount_point(existing, &mount_point) || rows_contain(&rows, &mount_point) {
            continue;
        }
        let access = if dataset.readonly.eq_ignore_ascii_case("on") {
            "ro"
        } else {
            "rw"
        };
        rows.push(MountTableRow {
            device: dataset.name.clone(),
            mount_point,
            fs_type: "zfs".to_string(),
            options: vec![access.to_string()],
        });
    }
    rows
}

fn rows_contain(rows: &[MountTableRow], mount_point: &str) -> bool {
    rows.iter().any(|row| row.mount_point == mount_point)
}
