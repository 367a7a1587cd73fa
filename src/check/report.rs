//! Check severity lattice, the per-run report accumulator, and the
//! plugin-line formatter.

#![allow(missing_docs)]

use std::fmt;

use serde::{Deserialize, Serialize};

/// Plugin severity, ordered so aggregation is a plain `max`.
///
/// `Unknown` is reserved for configuration and usage failures detected
/// before (or independent of) probing; the pipeline itself only ever raises
/// `Warning` or `Critical`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Ok,
    Warning,
    Critical,
    Unknown,
}

impl Severity {
    /// Process exit status consumed by the hosting monitoring system.
    #[must_use]
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::Ok => 0,
            Self::Warning => 1,
            Self::Critical => 2,
            Self::Unknown => 3,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Warning => "WARNING",
            Self::Critical => "CRITICAL",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One timing sample rendered into the performance-data segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub label: String,
    pub value_secs: f64,
    pub warn_secs: f64,
    pub crit_secs: f64,
    pub min_secs: f64,
    pub max_secs: f64,
}

impl MetricSample {
    fn render(&self) -> String {
        format!(
            "{}={}s;{};{};{};{}",
            self.label, self.value_secs, self.warn_secs, self.crit_secs, self.min_secs,
            self.max_secs
        )
    }
}

/// Accumulator over one check run: diagnostics, worst-case severity, and
/// timing metrics. Built incrementally by the pipeline, rendered once.
#[derive(Debug, Clone, Default)]
pub struct CheckReport {
    severity: Severity,
    diagnostics: Vec<String>,
    metrics: Vec<MetricSample>,
    targets: Vec<String>,
}

impl CheckReport {
    #[must_use]
    pub fn new(targets: Vec<String>) -> Self {
        Self {
            targets,
            ..Self::default()
        }
    }

    /// Raise the run severity; never downgrades.
    pub fn raise(&mut self, severity: Severity) {
        self.severity = self.severity.max(severity);
    }

    /// Record a diagnostic without touching severity.
    pub fn note(&mut self, message: impl Into<String>) {
        self.diagnostics.push(message.into());
    }

    /// Record a diagnostic and raise severity in one step.
    pub fn fail(&mut self, severity: Severity, message: impl Into<String>) {
        self.note(message);
        self.raise(severity);
    }

    pub fn add_metric(&mut self, sample: MetricSample) {
        self.metrics.push(sample);
    }

    #[must_use]
    pub fn severity(&self) -> Severity {
        self.severity
    }

    #[must_use]
    pub fn diagnostics(&self) -> &[String] {
        &self.diagnostics
    }

    #[must_use]
    pub fn metrics(&self) -> &[MetricSample] {
        &self.metrics
    }

    #[must_use]
    pub fn exit_code(&self) -> i32 {
        self.severity.exit_code()
    }

    /// Render the one-line plugin output: severity word, diagnostic summary,
    /// and the optional performance-data segment.
    #[must_use]
    pub fn render(&self) -> String {
        let body = if self.diagnostics.is_empty() {
            format!("all mounts were found ({})", self.targets.join(" "))
        } else {
            self.diagnostics.join("; ")
        };

        let mut line = format!("{}: {}", self.severity, body);
        if !self.metrics.is_empty() {
            line.push_str(" | ");
            let rendered: Vec<String> = self.metrics.iter().map(MetricSample::render).collect();
            line.push_str(&rendered.join(" "));
        }
        line
    }
}
