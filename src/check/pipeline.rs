//! Per-target check pipeline: the five aggregation stages.
//!
//! Stages run in fixed order and never short-circuit on failure —
//! diagnostics accumulate and severity is a running maximum. The only
//! inter-stage dependency is that the existence check requires a naturally
//! completed responsiveness probe (a timed-out probe leaves filesystem
//! state unverifiable).

#![allow(missing_docs)]

use std::path::Path;
use std::time::Duration;

use crate::check::report::{CheckReport, MetricSample, Severity};
use crate::core::config::{CheckConfig, ThresholdConfig};
use crate::logger::jsonl::{EventLog, EventType, LogEntry, LogSeverity};
use crate::platform::profile::PlatformProfile;
use crate::probe::actions;
use crate::probe::executor::{ProbeExecutor, ProbeOutcome};
use crate::tables::row::{MountTableRow, contains_mount_point, find_by_mount_point};

/// Which probe a latency grade belongs to; controls the metric label and
/// diagnostic wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProbeKind {
    Read,
    Write,
}

impl ProbeKind {
    fn metric_label(self, target: &str) -> String {
        match self {
            Self::Read => target.to_string(),
            Self::Write => format!("{target}_write"),
        }
    }

    const fn subject(self) -> &'static str {
        match self {
            Self::Read => "",
            Self::Write => " write test",
        }
    }
}

/// Everything one target evaluation needs, borrowed for the run.
pub struct StageContext<'a> {
    pub config: &'a CheckConfig,
    pub thresholds: ThresholdConfig,
    pub profile: &'a PlatformProfile,
    pub config_table: &'a [MountTableRow],
    pub live_table: &'a [MountTableRow],
    /// Targets came from auto-discovery; fstab membership is axiomatic.
    pub autoselected: bool,
    pub executor: ProbeExecutor,
    pub log: &'a EventLog,
}

impl StageContext<'_> {
    fn stale_deadline(&self) -> Duration {
        Duration::from_secs_f64(self.thresholds.stale_secs)
    }

    /// Progress line on stderr when running verbose; stdout stays reserved
    /// for the plugin output line.
    fn trace(&self, message: &str) {
        if self.config.behavior.verbose {
            eprintln!("mhs: {message}");
        }
    }
}

/// Evaluate one mount point through all five stages.
pub fn check_target(ctx: &StageContext<'_>, target: &str, report: &mut CheckReport) {
    ctx.trace(&format!("checking {target}"));
    check_fstab_membership(ctx, target, report);
    check_live_mount(ctx, target, report);
    let probe_completed = probe_responsiveness(ctx, target, report);
    if probe_completed {
        check_directory(ctx, target, report);
    }
    if ctx.config.probe.writetest {
        probe_writability(ctx, target, report);
    }
}

/// Stage 1: the target must be declared in the static config table.
///
/// Skipped when targets were auto-discovered (membership is how they got
/// here), when fstab checking is disabled, or inside a container context
/// that virtualizes mounts.
fn check_fstab_membership(ctx: &StageContext<'_>, target: &str, report: &mut CheckReport) {
    if ctx.autoselected
        || ctx.config.behavior.skip_fstab_check
        || ctx.profile.in_virtualized_container()
    {
        ctx.trace(&format!("{target}: fstab check skipped"));
        return;
    }
    if contains_mount_point(ctx.config_table, target) {
        ctx.trace(&format!("{target}: declared in the config table"));
        return;
    }
    report.fail(
        Severity::Critical,
        format!("{target} is not in {}", ctx.profile.fstab_path.display()),
    );
    ctx.log.record(
        &LogEntry::new(EventType::FstabMissing, LogSeverity::Critical).mount(target),
    );
}

/// Stage 2: the target must appear in the live mount table, unless the
/// symlink escape hatch is enabled and the path is a symbolic link.
fn check_live_mount(ctx: &StageContext<'_>, target: &str, report: &mut CheckReport) {
    if contains_mount_point(ctx.live_table, target) {
        ctx.trace(&format!("{target}: mounted"));
        return;
    }
    if ctx.config.behavior.accept_symlinks && is_symlink(target) {
        ctx.trace(&format!("{target}: symbolic link accepted in place of a mount"));
        return;
    }
    report.fail(Severity::Critical, format!("{target} is not mounted"));
    ctx.log
        .record(&LogEntry::new(EventType::MountMissing, LogSeverity::Critical).mount(target));
}

fn is_symlink(target: &str) -> bool {
    std::fs::symlink_metadata(target).is_ok_and(|meta| meta.file_type().is_symlink())
}

/// Stage 3: bounded space-query probe with graduated severity.
///
/// Returns whether the probe completed naturally; stage 4 is gated on it.
fn probe_responsiveness(ctx: &StageContext<'_>, target: &str, report: &mut CheckReport) -> bool {
    let mut command = match actions::space_probe_command(&ctx.config.probe, target) {
        Ok(command) => command,
        Err(error) => {
            report.fail(
                Severity::Critical,
                format!("{target} space probe could not be built: {error}"),
            );
            return false;
        }
    };

    match ctx.executor.run(&mut command, ctx.stale_deadline()) {
        Ok(outcome) => {
            ctx.trace(&format!(
                "{target}: space probe {} in {}s",
                if outcome.completed { "finished" } else { "timed out" },
                outcome.elapsed_secs
            ));
            grade_latency(ctx, target, ProbeKind::Read, &outcome, report);
            outcome.completed
        }
        Err(error) => {
            report.fail(
                Severity::Critical,
                format!("{target} space probe failed to start: {error}"),
            );
            ctx.log.record(
                &LogEntry::new(EventType::Error, LogSeverity::Critical)
                    .mount(target)
                    .details(error.to_string()),
            );
            false
        }
    }
}

/// Stage 4: the target path must be a directory.
fn check_directory(ctx: &StageContext<'_>, target: &str, report: &mut CheckReport) {
    if Path::new(target).is_dir() {
        ctx.trace(&format!("{target}: directory present"));
        return;
    }
    report.fail(Severity::Critical, format!("{target} is not a directory"));
    ctx.log.record(
        &LogEntry::new(EventType::DirectoryMissing, LogSeverity::Critical).mount(target),
    );
}

/// Stage 5: optional create-verify-remove write test.
///
/// In auto mode a config row mounted `ro` fails without touching the
/// filesystem. Otherwise the test runs out-of-process under the same
/// graduated thresholds as the read probe, with its own metric label.
fn probe_writability(ctx: &StageContext<'_>, target: &str, report: &mut CheckReport) {
    if ctx.autoselected
        && let Some(row) = find_by_mount_point(ctx.config_table, target)
        && row.has_option("ro")
    {
        report.fail(
            Severity::Critical,
            format!("{target} filesystem was mounted RO"),
        );
        ctx.log.record(
            &LogEntry::new(EventType::WriteTestFailed, LogSeverity::Critical)
                .mount(target)
                .details("mounted read-only"),
        );
        return;
    }

    let marker = actions::marker_path(target);
    let mut command = match actions::write_probe_command(&marker) {
        Ok(command) => command,
        Err(error) => {
            report.fail(
                Severity::Critical,
                format!("{target} write test could not be dispatched: {error}"),
            );
            return;
        }
    };

    match ctx.executor.run(&mut command, ctx.stale_deadline()) {
        Ok(outcome) => {
            ctx.trace(&format!(
                "{target}: write test {} in {}s",
                if outcome.completed { "finished" } else { "timed out" },
                outcome.elapsed_secs
            ));
            grade_latency(ctx, target, ProbeKind::Write, &outcome, report);
            if outcome.completed && !outcome.exit_ok {
                report.fail(Severity::Critical, format!("{target} write test failed"));
                ctx.log.record(
                    &LogEntry::new(EventType::WriteTestFailed, LogSeverity::Critical)
                        .mount(target),
                );
            }
        }
        Err(error) => {
            report.fail(
                Severity::Critical,
                format!("{target} write test failed to start: {error}"),
            );
            ctx.log.record(
                &LogEntry::new(EventType::Error, LogSeverity::Critical)
                    .mount(target)
                    .details(error.to_string()),
            );
        }
    }
}

/// Graduated latency grading shared by both probes.
///
/// Precedence: stale beats critical beats warning, and an executor-level
/// timeout is always stale regardless of the compared elapsed value. The
/// metric records the same elapsed measurement the comparisons used.
fn grade_latency(
    ctx: &StageContext<'_>,
    target: &str,
    kind: ProbeKind,
    outcome: &ProbeOutcome,
    report: &mut CheckReport,
) {
    let thresholds = &ctx.thresholds;
    report.add_metric(MetricSample {
        label: kind.metric_label(target),
        value_secs: outcome.elapsed_secs,
        warn_secs: thresholds.warning_secs,
        crit_secs: thresholds.critical_secs,
        min_secs: 0.0,
        max_secs: thresholds.stale_secs,
    });

    let subject = kind.subject();
    if outcome.timed_out || outcome.elapsed_secs > thresholds.stale_secs {
        report.fail(
            Severity::Critical,
            format!(
                "{target}{subject} did not respond in {} sec. Seems to be stale.",
                thresholds.stale_secs
            ),
        );
        ctx.log.record(
            &LogEntry::new(EventType::ProbeTimeout, LogSeverity::Critical)
                .mount(target)
                .timing(outcome.elapsed_secs, thresholds.stale_secs),
        );
    } else if outcome.elapsed_secs > thresholds.critical_secs {
        report.fail(
            Severity::Critical,
            format!(
                "{target}{subject} exceeded the critical threshold ({}s > {}s)",
                outcome.elapsed_secs, thresholds.critical_secs
            ),
        );
        ctx.log.record(
            &LogEntry::new(EventType::ThresholdBreach, LogSeverity::Critical)
                .mount(target)
                .timing(outcome.elapsed_secs, thresholds.critical_secs),
        );
    } else if outcome.elapsed_secs > thresholds.warning_secs {
        report.fail(
            Severity::Warning,
            format!(
                "{target}{subject} exceeded the warning threshold ({}s > {}s)",
                outcome.elapsed_secs, thresholds.warning_secs
            ),
        );
        ctx.log.record(
            &LogEntry::new(EventType::ThresholdBreach, LogSeverity::Warning)
                .mount(target)
                .timing(outcome.elapsed_secs, thresholds.warning_secs),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::CheckConfig;
    use crate::platform::profile::PlatformProfile;
    use crate::tables::row::MountTableRow;
    use std::time::Duration;

    fn row(mount_point: &str, fs_type: &str, options: &[&str]) -> MountTableRow {
        MountTableRow {
            device: "dev".to_string(),
            mount_point: mount_point.to_string(),
            fs_type: fs_type.to_string(),
            options: options.iter().map(ToString::to_string).collect(),
        }
    }

    fn test_profile() -> PlatformProfile {
        let mut profile = PlatformProfile::linux();
        // No container markers in the test environment's control.
        profile.container_probe = None;
        profile
    }

    struct Fixture {
        config: CheckConfig,
        profile: PlatformProfile,
        config_table: Vec<MountTableRow>,
        live_table: Vec<MountTableRow>,
        autoselected: bool,
        log: EventLog,
    }

    impl Fixture {
        fn new(target: &str) -> Self {
            let mut config = CheckConfig::default();
            // `true` completes instantly and ignores its arguments, so the
            // responsiveness probe passes without touching real mounts.
            config.probe.space_argv = vec!["true".to_string()];
            Self {
                config,
                profile: test_profile(),
                config_table: vec![row(target, "nfs", &["rw"])],
                live_table: vec![row(target, "nfs", &["rw"])],
                autoselected: false,
                log: EventLog::disabled(),
            }
        }

        fn ctx(&self) -> StageContext<'_> {
            StageContext {
                config: &self.config,
                thresholds: self.config.thresholds.normalized().expect("thresholds"),
                profile: &self.profile,
                config_table: &self.config_table,
                live_table: &self.live_table,
                autoselected: self.autoselected,
                executor: ProbeExecutor::new(Duration::from_millis(10)),
                log: &self.log,
            }
        }
    }

    #[test]
    fn healthy_directory_target_is_ok() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().to_string_lossy().into_owned();
        let fixture = Fixture::new(&target);

        let mut report = CheckReport::new(vec![target.clone()]);
        check_target(&fixture.ctx(), &target, &mut report);

        assert_eq!(report.severity(), Severity::Ok, "{:?}", report.diagnostics());
        assert_eq!(report.metrics().len(), 1);
        assert_eq!(report.metrics()[0].label, target);
    }

    #[test]
    fn missing_fstab_row_is_critical() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().to_string_lossy().into_owned();
        let mut fixture = Fixture::new(&target);
        fixture.config_table.clear();

        let mut report = CheckReport::new(vec![target.clone()]);
        check_target(&fixture.ctx(), &target, &mut report);

        assert_eq!(report.severity(), Severity::Critical);
        assert!(report.diagnostics()[0].contains("is not in"));
    }

    #[test]
    fn fstab_stage_skipped_when_disabled() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().to_string_lossy().into_owned();
        let mut fixture = Fixture::new(&target);
        fixture.config_table.clear();
        fixture.config.behavior.skip_fstab_check = true;

        let mut report = CheckReport::new(vec![target.clone()]);
        check_target(&fixture.ctx(), &target, &mut report);

        assert_eq!(
            report.severity(),
            Severity::Ok,
            "no fstab diagnostic expected: {:?}",
            report.diagnostics()
        );
    }

    #[test]
    fn fstab_stage_skipped_under_autoselection() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().to_string_lossy().into_owned();
        let mut fixture = Fixture::new(&target);
        fixture.config_table.clear();
        fixture.autoselected = true;

        let mut report = CheckReport::new(vec![target.clone()]);
        check_target(&fixture.ctx(), &target, &mut report);
        assert_eq!(report.severity(), Severity::Ok);
    }

    #[test]
    fn unmounted_target_is_critical() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().to_string_lossy().into_owned();
        let mut fixture = Fixture::new(&target);
        fixture.live_table.clear();

        let mut report = CheckReport::new(vec![target.clone()]);
        check_target(&fixture.ctx(), &target, &mut report);

        assert_eq!(report.severity(), Severity::Critical);
        assert!(
            report
                .diagnostics()
                .iter()
                .any(|d| d.contains("is not mounted"))
        );
    }

    #[test]
    fn symlink_satisfies_live_mount_when_accepted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let real = dir.path().join("real");
        std::fs::create_dir(&real).expect("create dir");
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(&real, &link).expect("create symlink");
        let target = link.to_string_lossy().into_owned();

        let mut fixture = Fixture::new(&target);
        fixture.live_table.clear();
        fixture.config.behavior.accept_symlinks = true;

        let mut report = CheckReport::new(vec![target.clone()]);
        check_target(&fixture.ctx(), &target, &mut report);
        assert_eq!(
            report.severity(),
            Severity::Ok,
            "{:?}",
            report.diagnostics()
        );
    }

    #[test]
    fn stale_probe_is_critical_with_stale_diagnostic() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().to_string_lossy().into_owned();
        let mut fixture = Fixture::new(&target);
        fixture.config.probe.space_argv = vec!["sleep".to_string(), "30".to_string()];
        fixture.config.thresholds.stale_secs = 0.2;
        fixture.config.thresholds.warning_secs = 0.1;
        fixture.config.thresholds.critical_secs = 0.1;

        let mut report = CheckReport::new(vec![target.clone()]);
        check_target(&fixture.ctx(), &target, &mut report);

        assert_eq!(report.severity(), Severity::Critical);
        assert!(
            report
                .diagnostics()
                .iter()
                .any(|d| d.contains("Seems to be stale.")),
            "{:?}",
            report.diagnostics()
        );
        // Timed-out probe: existence is not re-checked, so only the stale
        // diagnostic is present.
        assert_eq!(report.diagnostics().len(), 1);
    }

    #[test]
    fn slow_but_completing_probe_raises_warning_only() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().to_string_lossy().into_owned();
        let mut fixture = Fixture::new(&target);
        fixture.config.probe.space_argv = vec!["sleep".to_string(), "0.15".to_string()];
        fixture.config.thresholds.warning_secs = 0.05;
        fixture.config.thresholds.critical_secs = 5.0;
        fixture.config.thresholds.stale_secs = 10.0;

        let mut report = CheckReport::new(vec![target.clone()]);
        check_target(&fixture.ctx(), &target, &mut report);

        assert_eq!(report.severity(), Severity::Warning);
        assert!(
            report
                .diagnostics()
                .iter()
                .any(|d| d.contains("warning threshold"))
        );
    }

    #[test]
    fn metric_value_matches_graded_elapsed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().to_string_lossy().into_owned();
        let fixture = Fixture::new(&target);

        let mut report = CheckReport::new(vec![target.clone()]);
        check_target(&fixture.ctx(), &target, &mut report);

        let metric = &report.metrics()[0];
        assert!(metric.value_secs >= 0.0);
        assert!((metric.max_secs - fixture.config.thresholds.stale_secs).abs() < f64::EPSILON);
    }

    #[test]
    fn nondirectory_target_is_critical() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file_path = dir.path().join("plainfile");
        std::fs::write(&file_path, b"x").expect("write file");
        let target = file_path.to_string_lossy().into_owned();
        let fixture = Fixture::new(&target);

        let mut report = CheckReport::new(vec![target.clone()]);
        check_target(&fixture.ctx(), &target, &mut report);

        assert!(
            report
                .diagnostics()
                .iter()
                .any(|d| d.contains("is not a directory")),
            "{:?}",
            report.diagnostics()
        );
    }

    #[test]
    fn ro_mount_fails_write_test_without_touching_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().to_string_lossy().into_owned();
        let mut fixture = Fixture::new(&target);
        fixture.config.probe.writetest = true;
        fixture.autoselected = true;
        fixture.config_table = vec![row(&target, "nfs", &["ro"])];

        let mut report = CheckReport::new(vec![target.clone()]);
        check_target(&fixture.ctx(), &target, &mut report);

        assert_eq!(report.severity(), Severity::Critical);
        assert!(
            report
                .diagnostics()
                .iter()
                .any(|d| d.contains("filesystem was mounted RO"))
        );
        // No marker was created, so no write metric either.
        assert_eq!(report.metrics().len(), 1);
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .expect("readdir")
            .filter_map(std::result::Result::ok)
            .collect();
        assert!(leftovers.is_empty(), "no marker file may be created");
    }

    #[test]
    fn ro_option_outside_auto_mode_does_not_shortcut() {
        // Explicit targets skip the fstab ro shortcut; the write test runs.
        // The probe child is this test binary, which has no write-probe
        // subcommand, so the run completes with a failure status.
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().to_string_lossy().into_owned();
        let mut fixture = Fixture::new(&target);
        fixture.config.probe.writetest = true;
        fixture.config_table = vec![row(&target, "nfs", &["ro"])];

        let mut report = CheckReport::new(vec![target.clone()]);
        check_target(&fixture.ctx(), &target, &mut report);

        assert!(
            report
                .diagnostics()
                .iter()
                .all(|d| !d.contains("mounted RO")),
            "{:?}",
            report.diagnostics()
        );
        assert_eq!(report.metrics().len(), 2, "write metric must be recorded");
    }

    #[test]
    fn all_stages_accumulate_diagnostics() {
        // A target that is missing everywhere: not in fstab, not mounted,
        // not a directory. Every failing stage must contribute.
        let mut fixture = Fixture::new("/nonexistent/mhs/mount");
        fixture.config_table.clear();
        fixture.live_table.clear();

        let mut report = CheckReport::new(vec!["/nonexistent/mhs/mount".to_string()]);
        check_target(&fixture.ctx(), "/nonexistent/mhs/mount", &mut report);

        let joined = report.diagnostics().join("; ");
        assert!(joined.contains("is not in"));
        assert!(joined.contains("is not mounted"));
        assert!(joined.contains("is not a directory"));
        assert_eq!(report.severity(), Severity::Critical);
    }
}
