//! Mount table rows and the configurable column schema.
//!
//! Static config tables (fstab/vfstab) and live tables (/proc/mounts,
//! `mount` output) put the filesystem type, mount point, and options in
//! different columns depending on the operating system. The schema makes
//! those positions data instead of per-OS branches; indices are 1-based to
//! match the column numbering of the usual text-table tooling.

#![allow(missing_docs)]

use serde::{Deserialize, Serialize};

/// One entry from a static or live mount table.
///
/// `mount_point` is stored with any trailing slash removed. Mount points are
/// not guaranteed unique by either source; lookups return the first match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountTableRow {
    pub device: String,
    pub mount_point: String,
    pub fs_type: String,
    pub options: Vec<String>,
}

impl MountTableRow {
    /// Whether the row's options contain `needle` (exact token match).
    #[must_use]
    pub fn has_option(&self, needle: &str) -> bool {
        self.options.iter().any(|opt| opt == needle)
    }
}

/// Ordered sequence of mount table rows.
pub type MountTable = Vec<MountTableRow>;

/// 1-based column positions for type, mount point, and options.
///
/// The device is column 1 on every supported table format and is not
/// configurable. An out-of-range index produces an empty field rather than
/// a parse failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub fs_type_col: usize,
    pub mount_point_col: usize,
    pub options_col: usize,
}

impl ColumnSchema {
    /// Linux fstab/mtab layout: `device mountpoint type options ...`.
    pub const LINUX: Self = Self {
        fs_type_col: 3,
        mount_point_col: 2,
        options_col: 4,
    };

    /// Solaris vfstab layout: `device fsck mountpoint type pass auto options`.
    pub const SOLARIS_VFSTAB: Self = Self {
        fs_type_col: 4,
        mount_point_col: 3,
        options_col: 7,
    };
}

impl Default for ColumnSchema {
    fn default() -> Self {
        Self::LINUX
    }
}

/// Strip a trailing slash from a mount point, leaving `/` itself intact.
#[must_use]
pub fn normalize_mount_point(raw: &str) -> String {
    if raw.len() > 1 {
        raw.strip_suffix('/').unwrap_or(raw).to_string()
    } else {
        raw.to_string()
    }
}

/// Parse one table line under the given schema.
///
/// Returns `None` for blank lines and `#` comments. Missing columns yield
/// empty fields so a short line never poisons the rest of the table.
#[must_use]
pub fn parse_line(line: &str, schema: ColumnSchema) -> Option<MountTableRow> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }

    let fields: Vec<&str> = trimmed.split_whitespace().collect();
    let column = |index: usize| -> &str {
        if index == 0 {
            return "";
        }
        fields.get(index - 1).copied().unwrap_or("")
    };

    let options = column(schema.options_col)
        .split(',')
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect();

    Some(MountTableRow {
        device: column(1).to_string(),
        mount_point: normalize_mount_point(column(schema.mount_point_col)),
        fs_type: column(schema.fs_type_col).to_ascii_lowercase(),
        options,
    })
}

/// First row whose mount point equals `mount_point`.
///
/// First-match semantics are deliberate: duplicate mount points exist in the
/// wild (bind mounts, overlays) and every platform resolves them the same way.
#[must_use]
pub fn find_by_mount_point<'a>(
    table: &'a [MountTableRow],
    mount_point: &str,
) -> Option<&'a MountTableRow> {
    table.iter().find(|row| row.mount_point == mount_point)
}

/// Whether `path` exists in the table as a mount point.
#[must_use]
pub fn contains_mount_point(table: &[MountTableRow], mount_point: &str) -> bool {
    find_by_mount_point(table, mount_point).is_some()
}
