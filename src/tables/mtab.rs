//! Live mount-table reader.
//!
//! Two strategies, selected by the platform profile:
//! 1. Parse a kernel-maintained table file (`/proc/mounts`, `/etc/mnttab`).
//! 2. No such file exists (BSDs, macOS): run the mount-listing command,
//!    normalize each `dev on /mnt type nfs (…)` line to
//!    `device mountpoint fstype`, and park the result in a transient
//!    scratch file whose lifetime is tied to the returned guard.
//!
//! A missing pseudo-filesystem behind strategy 1 is remounted once,
//! best-effort, with a diagnostic recorded either way.

#![allow(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use rand::Rng;

use crate::core::errors::{MhsError, Result};
use crate::platform::profile::{LiveTableSource, PlatformProfile};
use crate::tables::row::{ColumnSchema, MountTable, parse_line};

/// Column layout of a normalized mount-command listing: `device mountpoint
/// fstype`, with no options column (index 0 resolves to an empty field).
const NORMALIZED_SCHEMA: ColumnSchema = ColumnSchema {
    fs_type_col: 3,
    mount_point_col: 2,
    options_col: 0,
};

/// Transient scratch file owned by one live-table read.
///
/// Dropping the guard removes the file, so the scratch table cannot leak
/// across runs regardless of which exit path the run takes.
#[derive(Debug)]
pub struct ScratchTable {
    path: PathBuf,
}

impl ScratchTable {
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchTable {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// Result of one live-table read.
#[derive(Debug)]
pub struct LiveTableRead {
    pub rows: MountTable,
    /// Degradation notes (missing pseudo-filesystem, remount attempts).
    pub diagnostics: Vec<String>,
    /// Scratch file backing a mount-command read, if one was produced.
    pub scratch: Option<ScratchTable>,
}

/// Read the live mount table for the given profile.
pub fn read(profile: &PlatformProfile) -> Result<LiveTableRead> {
    match &profile.live_table {
        LiveTableSource::File(path) => read_table_file(profile, path),
        LiveTableSource::MountCommand => read_from_mount_command(profile),
    }
}

fn read_table_file(profile: &PlatformProfile, path: &Path) -> Result<LiveTableRead> {
    let mut diagnostics = Vec::new();

    if let Some(pseudo) = &profile.pseudo_fs
        && !pseudo.path.exists()
    {
        let outcome = remount_pseudo_fs(&pseudo.mount_argv);
        diagnostics.push(format!(
            "live table backing filesystem {} was missing; remount {}",
            pseudo.path.display(),
            if outcome { "succeeded" } else { "failed" }
        ));
    }

    let raw = fs::read_to_string(path).map_err(|source| MhsError::table_read(path, &source))?;
    Ok(LiveTableRead {
        rows: parse_table_text(&raw, profile.live_schema),
        diagnostics,
        scratch: None,
    })
}

fn remount_pseudo_fs(argv: &[String]) -> bool {
    let Some((program, args)) = argv.split_first() else {
        return false;
    };
    Command::new(program)
        .args(args)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|status| status.success())
}

fn read_from_mount_command(profile: &PlatformProfile) -> Result<LiveTableRead> {
    let Some((program, args)) = profile.mount_list_argv.split_first() else {
        return Err(MhsError::InvalidConfig {
            details: "platform profile has an empty mount-listing command".to_string(),
        });
    };
    let output = Command::new(program)
        .args(args)
        .stderr(Stdio::null())
        .output()
        .map_err(|source| MhsError::ProbeSpawn {
            command: profile.mount_list_argv.join(" "),
            details: source.to_string(),
        })?;
    if !output.status.success() {
        return Err(MhsError::TableParse {
            details: format!("mount listing exited with {}", output.status),
        });
    }

    let normalized = normalize_listing(&String::from_utf8_lossy(&output.stdout));
    let scratch = write_scratch(&normalized)?;
    Ok(LiveTableRead {
        rows: parse_table_text(&normalized, NORMALIZED_SCHEMA),
        diagnostics: Vec::new(),
        scratch: Some(scratch),
    })
}

fn write_scratch(contents: &str) -> Result<ScratchTable> {
    let path = std::env::temp_dir().join(format!(
        "mhs_livetable_{}_{:08x}",
        std::process::id(),
        rand::rng().random::<u32>()
    ));
    fs::write(&path, contents).map_err(|source| MhsError::io(&path, source))?;
    Ok(ScratchTable { path })
}

/// Parse raw table text into rows.
#[must_use]
pub fn parse_table_text(raw: &str, schema: ColumnSchema) -> MountTable {
    raw.lines()
        .filter_map(|line| parse_line(line, schema))
        .collect()
}

/// Normalize mount-listing output to `device mountpoint fstype` lines.
#[must_use]
pub fn normalize_listing(raw: &str) -> String {
    let mut out = String::new();
    for line in raw.lines() {
        if let Some(normalized) = normalize_mount_line(line) {
            out.push_str(&normalized);
            out.push('\n');
        }
    }
    out
}

/// Normalize one mount-listing line.
///
/// Handles both decorations in the wild:
/// - `dev on /mnt type nfs (rw,relatime)` (Linux, Solaris-style)
/// - `dev on /mnt (ufs, local, soft-updates)` (BSD, macOS)
#[must_use]
pub fn normalize_mount_line(line: &str) -> Option<String> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 4 || tokens[1] != "on" {
        return None;
    }
    let device = tokens[0];
    let mount_point = tokens[2];
    let fs_type = if tokens[3] == "type" {
        *tokens.get(4)?
    } else {
        tokens[3]
            .trim_start_matches('(')
            .trim_end_matches(')')
            .trim_end_matches(',')
    };
    if fs_type.is_empty() {
        return None;
    }
    Some(format!("{device} {mount_point} {fs_type}"))
}
