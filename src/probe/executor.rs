//! Bounded probe executor: deadline-supervised child processes.
//!
//! A stale network mount can park a syscall in uninterruptible sleep with no
//! user-space cancellation primitive, so the blocking operation never runs in
//! the checking process itself. It runs in a spawned child that is polled at
//! sub-second intervals and forcibly reclaimed when the deadline passes:
//! SIGTERM, a short grace window, SIGKILL, then a non-blocking reap. A child
//! stuck in the kernel may ignore even SIGKILL until the server returns; such
//! an orphan is accepted and reported as stale rather than engineered around.
//!
//! One `Instant` drives both the deadline decision and the reported elapsed
//! time, so the value compared against thresholds is exactly the value that
//! lands in the metrics output.

#![allow(missing_docs)]

use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::core::errors::{MhsError, Result};

/// Polls during the post-SIGTERM grace window.
const GRACE_POLLS: u32 = 5;
/// Interval between grace-window polls.
const GRACE_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Result of one bounded probe. Produced fresh per invocation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeOutcome {
    /// The child exited before the deadline.
    pub completed: bool,
    /// The child exited with a success status.
    pub exit_ok: bool,
    /// Wall-clock seconds from dispatch to completion or deadline expiry,
    /// rounded up at millisecond precision — never less than the true
    /// duration.
    pub elapsed_secs: f64,
    /// The deadline expired before the child exited.
    pub timed_out: bool,
}

/// Executes probe commands under a deadline.
#[derive(Debug, Clone, Copy)]
pub struct ProbeExecutor {
    poll_interval: Duration,
}

impl ProbeExecutor {
    #[must_use]
    pub fn new(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }

    /// Run `command` to completion or until `deadline` expires.
    ///
    /// Output streams are discarded; only exit status and timing matter.
    pub fn run(&self, command: &mut Command, deadline: Duration) -> Result<ProbeOutcome> {
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let start = Instant::now();
        let mut child = command.spawn().map_err(|source| MhsError::ProbeSpawn {
            command: format!("{command:?}"),
            details: source.to_string(),
        })?;

        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    return Ok(ProbeOutcome {
                        completed: true,
                        exit_ok: status.success(),
                        elapsed_secs: round_up_millis(start.elapsed()),
                        timed_out: false,
                    });
                }
                Ok(None) => {}
                Err(source) => {
                    return Err(MhsError::ProbeWait {
                        details: source.to_string(),
                    });
                }
            }

            let elapsed = start.elapsed();
            if elapsed >= deadline {
                reclaim(&mut child);
                return Ok(ProbeOutcome {
                    completed: false,
                    exit_ok: false,
                    elapsed_secs: round_up_millis(elapsed),
                    timed_out: true,
                });
            }

            let remaining = deadline - elapsed;
            thread::sleep(self.poll_interval.min(remaining));
        }
    }
}

impl Default for ProbeExecutor {
    fn default() -> Self {
        Self::new(Duration::from_millis(100))
    }
}

/// Round a duration up to whole milliseconds, as fractional seconds.
///
/// Thresholds are compared against this value, so truncation toward zero
/// would understate a breach.
#[must_use]
pub fn round_up_millis(duration: Duration) -> f64 {
    let micros = duration.as_micros();
    let millis = micros.div_ceil(1000);
    #[allow(clippy::cast_precision_loss)]
    {
        millis as f64 / 1000.0
    }
}

/// Best-effort child reclamation: SIGTERM, grace, SIGKILL, reap.
fn reclaim(child: &mut Child) {
    send_term(child);
    for _ in 0..GRACE_POLLS {
        if matches!(child.try_wait(), Ok(Some(_))) {
            return;
        }
        thread::sleep(GRACE_POLL_INTERVAL);
    }
    let _ = child.kill();
    let _ = child.try_wait();
}

#[cfg(unix)]
fn send_term(child: &Child) {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    if let Ok(pid) = i32::try_from(child.id()) {
        let _ = kill(Pid::from_raw(pid), Signal::SIGTERM);
    }
}

#[cfg(not(unix))]
fn send_term(_child: &Child) {}
