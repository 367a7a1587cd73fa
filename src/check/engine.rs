//! One check run: read both tables, select targets, drive the per-target
//! pipeline, and finalize the report.
//!
//! The engine owns every run-scoped resource. The live-table scratch file
//! is a drop guard held on this stack frame, so it is released on normal
//! completion, early UNKNOWN exits, and read failures alike.

#![allow(missing_docs)]

use std::time::Duration;

use crate::check::pipeline::{StageContext, check_target};
use crate::check::report::CheckReport;
use crate::check::selector;
use crate::core::config::CheckConfig;
use crate::core::errors::{MhsError, Result};
use crate::logger::jsonl::{EventLog, EventType, LogEntry, LogSeverity};
use crate::platform::profile::PlatformProfile;
use crate::probe::executor::ProbeExecutor;
use crate::tables::row::MountTable;
use crate::tables::{fstab, mtab, zpool};

/// Run one check cycle.
///
/// `explicit` carries the caller's mount-point arguments; it is ignored when
/// auto-discovery is enabled. Errors map to the UNKNOWN plugin state.
pub fn run_check(
    config: &CheckConfig,
    base_profile: &PlatformProfile,
    explicit: &[String],
    log: &EventLog,
) -> Result<CheckReport> {
    let thresholds = config.thresholds.normalized()?;
    let profile = config.resolved_profile(base_profile);

    let config_table = read_config_table(config, &profile, log)?;

    // The scratch guard must outlive the pipeline; dropping `live` at the
    // end of this function removes any transient file on every exit path
    // from here on.
    let live = mtab::read(&profile)?;

    let targets = if config.selector.autoselect {
        selector::autoselect_targets(&config_table, &config.selector, &profile.noauto_option)?
    } else {
        selector::explicit_targets(explicit)?
    };

    if targets.is_empty() {
        if config.selector.autoselect && config.selector.tolerate_empty {
            let mut report = CheckReport::new(Vec::new());
            for diagnostic in &live.diagnostics {
                report.note(diagnostic.clone());
            }
            report.note("no external mounts were found");
            return Ok(report);
        }
        return Err(MhsError::NoTargets {
            details: if config.selector.autoselect {
                "auto-discovery matched no config table rows".to_string()
            } else {
                "no mount points given".to_string()
            },
        });
    }

    log.record(
        &LogEntry::new(EventType::CheckStart, LogSeverity::Info)
            .details(format!("checking {} mount point(s)", targets.len())),
    );

    let mut report = CheckReport::new(targets.clone());
    for diagnostic in &live.diagnostics {
        report.note(diagnostic.clone());
        log.record(
            &LogEntry::new(EventType::TableDegraded, LogSeverity::Warning)
                .details(diagnostic.clone()),
        );
    }

    let ctx = StageContext {
        config,
        thresholds,
        profile: &profile,
        config_table: &config_table,
        live_table: &live.rows,
        autoselected: config.selector.autoselect,
        executor: ProbeExecutor::new(Duration::from_millis(config.probe.poll_interval_ms.max(1))),
        log,
    };

    for target in &targets {
        check_target(&ctx, target, &mut report);
    }

    log.record(
        &LogEntry::new(EventType::CheckComplete, LogSeverity::Info)
            .details(report.severity().to_string()),
    );
    Ok(report)
}

/// Read the static config table and append synthetic pool rows.
///
/// An unreadable table is fatal whenever some consumer needs membership
/// data; under tolerant auto-discovery it degrades to an empty table.
fn read_config_table(
    config: &CheckConfig,
    profile: &PlatformProfile,
    log: &EventLog,
) -> Result<MountTable> {
    let mut table = match fstab::read(&profile.fstab_path, profile.config_schema) {
        Ok(table) => table,
        Err(error) => {
            let tolerated = if config.selector.autoselect {
                config.selector.tolerate_empty
            } else {
                config.behavior.skip_fstab_check
            };
            if !tolerated {
                return Err(error);
            }
            log.record(
                &LogEntry::new(EventType::TableDegraded, LogSeverity::Warning)
                    .details(format!("config table unavailable: {error}")),
            );
            MountTable::new()
        }
    };

    if let Err(error) = zpool::extend_with_datasets(&mut table) {
        log.record(
            &LogEntry::new(EventType::TableDegraded, LogSeverity::Warning)
                .details(format!("pool dataset listing failed: {error}")),
        );
    }
    Ok(table)
}
