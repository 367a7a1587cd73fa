//! Target selection: explicit mount-point arguments or filtered
//! auto-discovery from the config table.

#![allow(missing_docs)]

use regex::Regex;

use crate::core::config::SelectorConfig;
use crate::core::errors::{MhsError, Result};
use crate::tables::row::{MountTableRow, normalize_mount_point};

/// Build the target set from explicit mount-point arguments.
///
/// Paths must be absolute; order is preserved, trailing slashes stripped,
/// duplicates removed.
pub fn explicit_targets(paths: &[String]) -> Result<Vec<String>> {
    let mut targets = Vec::with_capacity(paths.len());
    for path in paths {
        if !path.starts_with('/') {
            return Err(MhsError::InvalidConfig {
                details: format!("mount point `{path}` is not an absolute path"),
            });
        }
        push_unique(&mut targets, normalize_mount_point(path));
    }
    Ok(targets)
}

/// Auto-discover targets from the config table.
///
/// Rows pass when their filesystem type is in the allow-list, their mount
/// point does not match the exclusion pattern, and (when requested) their
/// options do not carry the platform's noauto marker.
pub fn autoselect_targets(
    table: &[MountTableRow],
    selector: &SelectorConfig,
    noauto_option: &str,
) -> Result<Vec<String>> {
    let exclude = selector
        .exclude_pattern
        .as_deref()
        .map(Regex::new)
        .transpose()
        .map_err(|source| MhsError::InvalidConfig {
            details: format!("bad exclusion pattern: {source}"),
        })?;

    let mut targets = Vec::new();
    for row in table {
        if !fs_type_allowed(&row.fs_type, &selector.fs_types) {
            continue;
        }
        if let Some(pattern) = &exclude
            && pattern.is_match(&row.mount_point)
        {
            continue;
        }
        if selector.exclude_noauto && row.has_option(noauto_option) {
            continue;
        }
        push_unique(&mut targets, normalize_mount_point(&row.mount_point));
    }
    Ok(targets)
}

/// Exact allow-list match, plus dotted subtype matching (`fuse.sshfs`
/// qualifies when `fuse` is allowed).
fn fs_type_allowed(fs_type: &str, allowed: &[String]) -> bool {
    if allowed.iter().any(|entry| entry == fs_type) {
        return true;
    }
    fs_type
        .split_once('.')
        .is_some_and(|(base, _)| allowed.iter().any(|entry| entry == base))
}

fn push_unique(targets: &mut Vec<String>, candidate: String) {
    if !targets.contains(&candidate) {
        targets.push(candidate);
    }
}
