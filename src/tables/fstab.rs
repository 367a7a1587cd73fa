//! Static config-table reader (fstab/vfstab).

#![allow(missing_docs)]

use std::fs;
use std::path::Path;

use crate::core::errors::{MhsError, Result};
use crate::tables::row::{ColumnSchema, MountTable, parse_line};

/// Read and parse the static mount configuration table.
///
/// Comment and blank lines are skipped; short lines produce rows with empty
/// fields. An unreadable file is an error — the caller decides whether that
/// is fatal (fstab-membership checks) or tolerable (auto-discovery with an
/// accepted-empty policy).
pub fn read(path: &Path, schema: ColumnSchema) -> Result<MountTable> {
    let raw = fs::read_to_string(path).map_err(|source| MhsError::table_read(path, &source))?;
    Ok(parse(&raw, schema))
}

/// Parse config-table text into rows.
#[must_use]
pub fn parse(raw: &str, schema: ColumnSchema) -> MountTable {
    raw.lines()
        .filter_map(|line| parse_line(line, schema))
        .collect()
}
