//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use mount_health_sentinel::prelude::*;
//! ```

// Core
pub use crate::core::config::CheckConfig;
pub use crate::core::errors::{MhsError, Result};

// Platform
pub use crate::platform::profile::{LiveTableSource, OsFlavor, PlatformProfile, detect_profile};

// Tables
pub use crate::tables::row::{ColumnSchema, MountTable, MountTableRow};

// Probing
pub use crate::probe::executor::{ProbeExecutor, ProbeOutcome};

// Check
pub use crate::check::engine::run_check;
pub use crate::check::report::{CheckReport, MetricSample, Severity};

// Logging
pub use crate::logger::jsonl::{EventLog, EventType, LogEntry, LogSeverity};
