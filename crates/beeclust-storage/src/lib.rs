//! Flat text-matrix persistence for BeeClust grids.
//!
//! Grids travel as a rectangular matrix of small integers: one row per line,
//! whitespace-separated columns, values restricted to the cell alphabet
//! documented on [`Cell::code`]. Loading rejects anything outside that
//! alphabet; saving re-emits the same shape and encoding.

use beeclust_core::{Cell, Grid, ShapeError};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Errors raised while loading or saving a grid file.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// A token in the file is not an integer.
    #[error("line {line}: {token:?} is not an integer")]
    InvalidToken { line: usize, token: String },
    /// The decoded matrix violates the grid contract.
    #[error(transparent)]
    Shape(#[from] ShapeError),
}

/// Parse a grid from its textual matrix form.
///
/// Blank lines are skipped; everything else must tokenize into integers from
/// the cell alphabet, with every row the same width.
pub fn parse_grid(text: &str) -> Result<Grid, StorageError> {
    let mut codes = Vec::new();
    for (index, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let mut row = Vec::new();
        for token in line.split_whitespace() {
            let value: i64 = token.parse().map_err(|_| StorageError::InvalidToken {
                line: index + 1,
                token: token.to_string(),
            })?;
            row.push(value);
        }
        codes.push(row);
    }
    Ok(Grid::from_codes(&codes)?)
}

/// Render a grid back into its textual matrix form.
#[must_use]
pub fn render_grid(grid: &Grid) -> String {
    let mut out = String::new();
    for row in grid.to_codes() {
        for (col, value) in row.iter().enumerate() {
            if col > 0 {
                out.push(' ');
            }
            let _ = write!(out, "{value}");
        }
        out.push('\n');
    }
    out
}

/// Load a grid from a file on disk.
pub fn load_grid(path: impl AsRef<Path>) -> Result<Grid, StorageError> {
    parse_grid(&fs::read_to_string(path)?)
}

/// Save a grid to a file on disk, overwriting any previous contents.
pub fn save_grid(path: impl AsRef<Path>, grid: &Grid) -> Result<(), StorageError> {
    fs::write(path, render_grid(grid))?;
    Ok(())
}
