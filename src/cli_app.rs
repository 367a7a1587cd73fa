//! Top-level CLI definition and dispatch.
//!
//! One invocation is one check cycle; the exit status is the plugin
//! severity. The hidden `--write-probe` flag is the child half of the
//! out-of-process write test and is never passed by operators.

use std::path::PathBuf;

use clap::Parser;

use mount_health_sentinel::check::engine::run_check;
use mount_health_sentinel::check::report::Severity;
use mount_health_sentinel::core::config::CheckConfig;
use mount_health_sentinel::core::errors::MhsError;
use mount_health_sentinel::logger::jsonl::EventLog;
use mount_health_sentinel::platform::profile::detect_profile;
use mount_health_sentinel::probe::actions;

/// Mount Health Sentinel — health checks for network filesystem mounts.
#[derive(Debug, Parser)]
#[command(
    name = "mhs",
    author,
    version,
    about = "Mount Health Sentinel - network mount point health checks",
    long_about = None
)]
pub struct Cli {
    /// Mount points to check (absolute paths).
    #[arg(value_name = "MOUNTPOINT", conflicts_with = "autoselect")]
    mountpoints: Vec<String>,
    /// Auto-discover targets from the config table.
    #[arg(short, long)]
    autoselect: bool,
    /// With --autoselect, report OK when discovery finds nothing.
    #[arg(long, requires = "autoselect")]
    allow_empty: bool,
    /// Exclude auto-discovered mount points matching this regex.
    #[arg(short, long, value_name = "PATTERN", requires = "autoselect")]
    exclude: Option<String>,
    /// Exclude noauto entries from auto-discovery.
    #[arg(short = 'N', long, requires = "autoselect")]
    exclude_noauto: bool,
    /// Warning threshold in seconds.
    #[arg(short, long, value_name = "SECONDS")]
    warning: Option<f64>,
    /// Critical threshold in seconds.
    #[arg(short, long, value_name = "SECONDS")]
    critical: Option<f64>,
    /// Seconds before an unresponsive probe counts as stale.
    #[arg(short = 'o', long, value_name = "SECONDS")]
    stale: Option<f64>,
    /// Run a create-verify-remove write test on each target.
    #[arg(short = 'W', long)]
    writetest: bool,
    /// Accept a symbolic link in place of a live mount.
    #[arg(short = 'L', long)]
    accept_symlinks: bool,
    /// Skip the fstab membership check.
    #[arg(short, long)]
    ignore_fstab: bool,
    /// Config table path override.
    #[arg(long, value_name = "PATH")]
    fstab: Option<PathBuf>,
    /// Live mount table path override.
    #[arg(long, value_name = "PATH")]
    mtab: Option<PathBuf>,
    /// 1-based filesystem-type column override.
    #[arg(long, value_name = "N")]
    fs_type_col: Option<usize>,
    /// 1-based mount-point column override.
    #[arg(long, value_name = "N")]
    mount_point_col: Option<usize>,
    /// 1-based options column override.
    #[arg(long, value_name = "N")]
    options_col: Option<usize>,
    /// Extra argument passed through to the space-query command (repeatable).
    #[arg(long = "df-arg", value_name = "ARG", allow_hyphen_values = true)]
    df_args: Vec<String>,
    /// TOML configuration file.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Echo per-stage progress to stderr.
    #[arg(short, long)]
    verbose: bool,
    /// JSONL event log destination.
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
    /// Create, verify, and remove a write-test marker (probe child).
    #[arg(long = "write-probe", value_name = "PATH", hide = true, exclusive = true)]
    write_probe: Option<PathBuf>,
}

impl Cli {
    /// Layer CLI flags over the file-backed configuration.
    fn to_config(&self) -> Result<CheckConfig, MhsError> {
        let mut config = CheckConfig::load(self.config.as_deref())?;

        config.selector.autoselect |= self.autoselect;
        config.selector.tolerate_empty |= self.allow_empty;
        if self.exclude.is_some() {
            config.selector.exclude_pattern.clone_from(&self.exclude);
        }
        config.selector.exclude_noauto |= self.exclude_noauto;

        if let Some(secs) = self.warning {
            config.thresholds.warning_secs = secs;
        }
        if let Some(secs) = self.critical {
            config.thresholds.critical_secs = secs;
        }
        if let Some(secs) = self.stale {
            config.thresholds.stale_secs = secs;
        }

        config.probe.writetest |= self.writetest;
        config.probe.extra_args.extend(self.df_args.iter().cloned());

        config.behavior.accept_symlinks |= self.accept_symlinks;
        config.behavior.skip_fstab_check |= self.ignore_fstab;
        config.behavior.verbose |= self.verbose;
        if self.log_file.is_some() {
            config.behavior.log_path.clone_from(&self.log_file);
        }

        if self.fstab.is_some() {
            config.tables.fstab_path.clone_from(&self.fstab);
        }
        if self.mtab.is_some() {
            config.tables.live_table_path.clone_from(&self.mtab);
        }
        if self.fs_type_col.is_some() {
            config.tables.fs_type_col = self.fs_type_col;
        }
        if self.mount_point_col.is_some() {
            config.tables.mount_point_col = self.mount_point_col;
        }
        if self.options_col.is_some() {
            config.tables.options_col = self.options_col;
        }

        Ok(config)
    }
}

/// Execute the parsed invocation; returns the process exit code.
pub fn run(cli: &Cli) -> i32 {
    if let Some(marker) = &cli.write_probe {
        return match actions::execute_write_marker(marker) {
            Ok(()) => 0,
            Err(error) => {
                eprintln!("mhs --write-probe: {error}");
                1
            }
        };
    }

    let config = match cli.to_config() {
        Ok(config) => config,
        Err(error) => return unknown(&error.to_string()),
    };
    let profile = match detect_profile() {
        Ok(profile) => profile,
        Err(error) => return unknown(&error.to_string()),
    };
    let log = EventLog::new(config.behavior.log_path.clone());

    match run_check(&config, &profile, &cli.mountpoints, &log) {
        Ok(report) => {
            println!("{}", report.render());
            report.exit_code()
        }
        Err(error) => unknown(&error.to_string()),
    }
}

fn unknown(message: &str) -> i32 {
    println!("{}: {message}", Severity::Unknown);
    Severity::Unknown.exit_code()
}
