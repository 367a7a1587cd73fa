//! Probe actions: the space query and the write test.
//!
//! Both actions run as child processes of the executor. The space query is
//! an external command (default `df -P -k`) with caller-supplied passthrough
//! arguments; the write test re-invokes this binary with a hidden flag so
//! the potentially blocking create/verify/remove sits in a killable child.

#![allow(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::Utc;
use rand::Rng;

use crate::core::config::ProbeConfig;
use crate::core::errors::{MhsError, Result};

/// Bytes written to a marker file; verification checks the length back.
const MARKER_PAYLOAD: &[u8] = b"mhs write test\n";

/// Hidden flag the executor dispatches write tests through.
pub const WRITE_PROBE_FLAG: &str = "--write-probe";

/// Build the space-query command for a mount point.
pub fn space_probe_command(probe: &ProbeConfig, mount_point: &str) -> Result<Command> {
    let Some((program, args)) = probe.space_argv.split_first() else {
        return Err(MhsError::InvalidConfig {
            details: "space probe command is empty".to_string(),
        });
    };
    let mut command = Command::new(program);
    command.args(args);
    command.args(&probe.extra_args);
    command.arg(mount_point);
    Ok(command)
}

/// Build the out-of-process write-test command for a marker path.
pub fn write_probe_command(marker: &Path) -> Result<Command> {
    let exe = std::env::current_exe().map_err(|source| MhsError::ProbeSpawn {
        command: WRITE_PROBE_FLAG.to_string(),
        details: format!("cannot resolve current executable: {source}"),
    })?;
    let mut command = Command::new(exe);
    command.arg(WRITE_PROBE_FLAG);
    command.arg(marker);
    Ok(command)
}

/// Unique marker path under `mount_point` for one write test.
///
/// Embeds host identity, a UTC timestamp, the process id, and two
/// independently drawn random components so concurrent runs on shared
/// storage cannot collide.
#[must_use]
pub fn marker_path(mount_point: &str) -> PathBuf {
    let mut rng = rand::rng();
    let first: u32 = rng.random();
    let second: u32 = rng.random();
    Path::new(mount_point).join(format!(
        ".mhs_write_test.{}.{}.{}.{first:08x}{second:08x}",
        hostname(),
        Utc::now().format("%Y%m%dT%H%M%S"),
        std::process::id(),
    ))
}

/// Create, verify, and remove a marker file.
///
/// This is the body of the hidden probe mode: it runs inside the probe
/// child, so a hang here is reclaimed by the executor. Removal is part of
/// the probed action itself — a marker left behind by a killed child is an
/// accepted residue of the timeout, not cleaned up by the parent.
pub fn execute_write_marker(marker: &Path) -> Result<()> {
    fs::write(marker, MARKER_PAYLOAD).map_err(|source| MhsError::io(marker, source))?;

    let metadata = fs::metadata(marker).map_err(|source| MhsError::io(marker, source))?;
    if metadata.len() != MARKER_PAYLOAD.len() as u64 {
        // Remove the bad marker before reporting; the mount accepted the
        // create but lost the data.
        let _ = fs::remove_file(marker);
        return Err(MhsError::Io {
            path: marker.to_path_buf(),
            source: std::io::Error::other("marker length mismatch after write"),
        });
    }

    fs::remove_file(marker).map_err(|source| MhsError::io(marker, source))
}

#[cfg(unix)]
fn hostname() -> String {
    nix::unistd::gethostname().map_or_else(
        |_| "localhost".to_string(),
        |name| name.to_string_lossy().into_owned(),
    )
}

#[cfg(not(unix))]
fn hostname() -> String {
    "localhost".to_string()
}
