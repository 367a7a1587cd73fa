//! Platform profiles: per-OS constants injected once at startup.

pub mod profile;
