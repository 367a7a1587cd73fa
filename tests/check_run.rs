//! Integration tests: full check runs against synthetic fstab/mtab files
//! and temp-dir mount points.

use std::io::Write;
use std::path::PathBuf;

use mount_health_sentinel::check::engine::run_check;
use mount_health_sentinel::check::report::Severity;
use mount_health_sentinel::core::config::CheckConfig;
use mount_health_sentinel::logger::jsonl::EventLog;
use mount_health_sentinel::platform::profile::{LiveTableSource, PlatformProfile};

struct World {
    _dir: tempfile::TempDir,
    target: String,
    config: CheckConfig,
    profile: PlatformProfile,
}

/// One healthy target declared in both tables, probed with `true`.
fn world() -> World {
    world_with_options("rw,hard")
}

fn world_with_options(options: &str) -> World {
    let dir = tempfile::tempdir().expect("tempdir");
    let target_dir = dir.path().join("nfs1");
    std::fs::create_dir(&target_dir).expect("create target dir");
    let target = target_dir.to_string_lossy().into_owned();

    let fstab_path = dir.path().join("fstab");
    std::fs::write(
        &fstab_path,
        format!("# test fstab\nserver:/export {target} nfs {options} 0 0\n"),
    )
    .expect("write fstab");

    let mtab_path = dir.path().join("mtab");
    let mut mtab = std::fs::File::create(&mtab_path).expect("create mtab");
    writeln!(mtab, "server:/export {target} nfs rw,relatime 0 0").expect("write mtab");

    let mut profile = PlatformProfile::linux();
    profile.fstab_path = fstab_path;
    profile.live_table = LiveTableSource::File(mtab_path);
    profile.pseudo_fs = None;
    profile.container_probe = None;

    let mut config = CheckConfig::default();
    config.probe.space_argv = vec!["true".to_string()];
    config.thresholds.warning_secs = 3.0;
    config.thresholds.critical_secs = 3.0;
    config.thresholds.stale_secs = 3.0;

    World {
        _dir: dir,
        target,
        config,
        profile,
    }
}

fn run(world: &World, targets: &[String]) -> mount_health_sentinel::check::report::CheckReport {
    run_check(&world.config, &world.profile, targets, &EventLog::disabled())
        .expect("check run should succeed")
}

#[test]
fn responsive_declared_mount_is_ok() {
    let world = world();
    let report = run(&world, &[world.target.clone()]);

    assert_eq!(report.severity(), Severity::Ok, "{:?}", report.diagnostics());
    assert_eq!(report.exit_code(), 0);

    let rendered = report.render();
    let (status, perfdata) = rendered.split_once(" | ").expect("perfdata expected");
    assert_eq!(
        status,
        format!("OK: all mounts were found ({})", world.target)
    );
    assert!(perfdata.starts_with(&format!("{}=", world.target)));
    assert!(perfdata.ends_with(";3;3;0;3"));
}

#[test]
fn stale_mount_is_critical_with_stale_diagnostic() {
    let mut world = world();
    world.config.probe.space_argv = vec!["sleep".to_string(), "30".to_string()];
    world.config.thresholds.stale_secs = 0.3;
    world.config.thresholds.warning_secs = 0.1;
    world.config.thresholds.critical_secs = 0.2;

    let report = run(&world, &[world.target.clone()]);
    assert_eq!(report.severity(), Severity::Critical);
    assert_eq!(report.exit_code(), 2);
    assert!(
        report
            .diagnostics()
            .iter()
            .any(|d| d.contains("did not respond in 0.3 sec. Seems to be stale.")),
        "{:?}",
        report.diagnostics()
    );
}

#[test]
fn timeout_is_stale_regardless_of_generous_thresholds() {
    // Precedence invariant: an executor-level timeout is always graded
    // stale, even when warning/critical would not have fired.
    let mut world = world();
    world.config.probe.space_argv = vec!["sleep".to_string(), "30".to_string()];
    world.config.thresholds.warning_secs = 100.0;
    world.config.thresholds.critical_secs = 100.0;
    world.config.thresholds.stale_secs = 0.2;

    let report = run(&world, &[world.target.clone()]);
    assert_eq!(report.severity(), Severity::Critical);
    assert!(
        report
            .diagnostics()
            .iter()
            .any(|d| d.contains("Seems to be stale."))
    );
}

#[test]
fn undeclared_mount_is_reported_unless_fstab_check_skipped() {
    let mut world = world();
    // Replace the fstab with one that does not mention the target.
    std::fs::write(&world.profile.fstab_path, "# empty\n").expect("truncate fstab");

    let report = run(&world, &[world.target.clone()]);
    assert_eq!(report.severity(), Severity::Critical);
    assert!(
        report.diagnostics()[0].contains("is not in"),
        "{:?}",
        report.diagnostics()
    );

    world.config.behavior.skip_fstab_check = true;
    let report = run(&world, &[world.target.clone()]);
    assert_eq!(
        report.severity(),
        Severity::Ok,
        "stage 1 must not fire when disabled: {:?}",
        report.diagnostics()
    );
}

#[test]
fn write_test_on_ro_mount_reports_without_creating_marker() {
    let mut world = world_with_options("ro");
    world.config.selector.autoselect = true;
    world.config.probe.writetest = true;

    let report = run_check(
        &world.config,
        &world.profile,
        &[],
        &EventLog::disabled(),
    )
    .expect("auto run should succeed");

    assert_eq!(report.severity(), Severity::Critical);
    assert!(
        report
            .diagnostics()
            .iter()
            .any(|d| d.contains("filesystem was mounted RO")),
        "{:?}",
        report.diagnostics()
    );
    let leftovers: Vec<PathBuf> = std::fs::read_dir(&world.target)
        .expect("target readable")
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect();
    assert!(leftovers.is_empty(), "marker must not be created: {leftovers:?}");
}

#[test]
fn empty_tolerated_autodiscovery_reports_ok() {
    let mut world = world();
    std::fs::write(&world.profile.fstab_path, "# nothing external\n").expect("truncate fstab");
    world.config.selector.autoselect = true;
    world.config.selector.tolerate_empty = true;

    let report = run_check(
        &world.config,
        &world.profile,
        &[],
        &EventLog::disabled(),
    )
    .expect("tolerated empty run should succeed");
    assert_eq!(report.exit_code(), 0);
    assert_eq!(report.render(), "OK: no external mounts were found");
}

#[test]
fn empty_intolerant_autodiscovery_is_unknown() {
    let mut world = world();
    std::fs::write(&world.profile.fstab_path, "# nothing external\n").expect("truncate fstab");
    world.config.selector.autoselect = true;

    let err = run_check(
        &world.config,
        &world.profile,
        &[],
        &EventLog::disabled(),
    )
    .expect_err("empty discovery without tolerance is terminal");
    assert_eq!(err.code(), "MHS-2101");
}

#[test]
fn exclusion_pattern_prunes_discovered_targets() {
    let world = world();
    let scratch_dir = world._dir.path().join("scratch1");
    std::fs::create_dir(&scratch_dir).expect("create scratch dir");
    let scratch = scratch_dir.to_string_lossy().into_owned();

    let mut fstab = std::fs::OpenOptions::new()
        .append(true)
        .open(&world.profile.fstab_path)
        .expect("open fstab");
    writeln!(fstab, "server:/scratch {scratch} nfs rw 0 0").expect("append fstab");
    let mut mtab_path = None;
    if let LiveTableSource::File(path) = &world.profile.live_table {
        mtab_path = Some(path.clone());
    }
    let mut mtab = std::fs::OpenOptions::new()
        .append(true)
        .open(mtab_path.expect("file-backed live table"))
        .expect("open mtab");
    writeln!(mtab, "server:/scratch {scratch} nfs rw 0 0").expect("append mtab");

    let mut config = world.config.clone();
    config.selector.autoselect = true;
    config.selector.exclude_pattern = Some("scratch".to_string());

    let report = run_check(&config, &world.profile, &[], &EventLog::disabled())
        .expect("auto run should succeed");
    assert_eq!(report.severity(), Severity::Ok, "{:?}", report.diagnostics());
    let rendered = report.render();
    assert!(
        !rendered.contains("scratch"),
        "excluded mount leaked into the report: {rendered}"
    );
}

#[test]
fn multiple_targets_accumulate_worst_severity() {
    let world = world();
    let missing = "/nonexistent/mhs/it".to_string();

    let mut config = world.config.clone();
    config.behavior.skip_fstab_check = true;

    let report = run_check(
        &config,
        &world.profile,
        &[world.target.clone(), missing.clone()],
        &EventLog::disabled(),
    )
    .expect("run should succeed");

    assert_eq!(report.severity(), Severity::Critical);
    // The healthy target contributed a clean metric; the missing one its
    // diagnostics. Read metrics exist for both probes.
    assert_eq!(report.metrics().len(), 2);
    assert!(
        report
            .diagnostics()
            .iter()
            .all(|d| d.contains(&missing)),
        "only the missing target may produce diagnostics: {:?}",
        report.diagnostics()
    );
}

#[test]
fn event_log_records_check_lifecycle() {
    let world = world();
    let log_path = world._dir.path().join("events.jsonl");
    let log = EventLog::new(Some(log_path.clone()));

    run_check(&world.config, &world.profile, &[world.target.clone()], &log)
        .expect("run should succeed");

    let contents = std::fs::read_to_string(&log_path).expect("log readable");
    assert!(contents.contains("\"event\":\"check_start\""));
    assert!(contents.contains("\"event\":\"check_complete\""));
}
