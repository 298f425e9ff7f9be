//! Reads target IDs from a catalogue table.
//!
//! The table is comma-separated with a header row. Lines starting with `#`
//! (the preamble archive exports carry) and blank lines are ignored. Cells
//! may be double-quoted; quoted commas stay inside the cell and `""` stands
//! for a literal quote.

use camino::Utf8Path;
use color_eyre::eyre::{Context, eyre};
use std::collections::HashSet;
use std::fs;
use tracing::debug;

use crate::artifact::ArtifactId;
use crate::error::InputResult;
use crate::observability::APP_TARGET;

/// Default name of the ID column.
pub const DEFAULT_ID_COLUMN: &str = "kepid";

/// Reads the IDs in `column` of the table at `path`.
///
/// Duplicates are dropped, keeping the position of the first occurrence.
///
/// # Errors
/// Returns an error when the file cannot be read, has no header, lacks
/// `column`, or holds a value in `column` that is not a positive integer.
pub fn read_ids(path: &Utf8Path, column: &str) -> InputResult<Vec<ArtifactId>> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("failed to read input table {path}"))?;
    let ids = parse_ids(&contents, column).with_context(|| format!("in {path}"))?;
    debug!(target: APP_TARGET, path = %path, count = ids.len(), "read input IDs");
    Ok(ids)
}

/// Parses table text already in memory. See [`read_ids`].
///
/// # Errors
/// As for [`read_ids`], minus the read failure.
pub fn parse_ids(contents: &str, column: &str) -> InputResult<Vec<ArtifactId>> {
    let mut rows = contents
        .lines()
        .enumerate()
        .map(|(index, line)| (index + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'));

    let Some((_, header)) = rows.next() else {
        return Err(eyre!("input table has no header row").into());
    };
    let position = split_row(header)
        .iter()
        .position(|name| name == column)
        .ok_or_else(|| eyre!("input table has no column named {column:?}"))?;

    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    for (line_no, row) in rows {
        let cell = split_row(row)
            .into_iter()
            .nth(position)
            .ok_or_else(|| eyre!("line {line_no}: missing {column:?} value"))?;
        let id: ArtifactId = cell
            .parse()
            .with_context(|| format!("line {line_no}: invalid {column:?} value {cell:?}"))?;
        if seen.insert(id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

fn split_row(row: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut cell = String::new();
    let mut quoted = false;
    let mut chars = row.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '"' if quoted && chars.peek() == Some(&'"') => {
                cell.push('"');
                chars.next();
            }
            '"' => quoted = !quoted,
            ',' if !quoted => cells.push(take_cell(&mut cell)),
            _ => cell.push(ch),
        }
    }
    cells.push(take_cell(&mut cell));
    cells
}

fn take_cell(cell: &mut String) -> String {
    let value = cell.trim().to_owned();
    cell.clear();
    value
}
