// SPDX-FileCopyrightText: 2025 dicomstore contributors
// SPDX-License-Identifier: MIT

//! Error types for reconstruction and series reading.

use std::path::PathBuf;

use thiserror::Error;

use crate::pixel::ImageReadError;

/// Result type for reconstruction and series reading.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while rebuilding headers and reading series.
///
/// Unknown tags are not errors here: they degrade to raw strings and are
/// recorded on the header (see [`crate::TypeResolutionError`]).
#[derive(Error, Debug)]
pub enum Error {
    #[error("Store database error: {0}")]
    Db(#[from] dicomstore_db::Error),

    #[error("No row with id {id} in table '{table}'")]
    NotFound { table: String, id: i64 },

    #[error("Series selection is empty")]
    EmptySeries,

    /// Rows belong to more than one SeriesInstanceUID; `None` is a row
    /// without one.
    #[error("Rows span {} series: {uids:?}", uids.len())]
    AmbiguousSeries { uids: Vec<Option<String>> },

    #[error("Cannot order {count} slices: none of {tried:?} is present on every row")]
    UnsortableSeries { tried: Vec<String>, count: usize },

    #[error("Row {id:?} has no file reference")]
    MissingFileReference { id: Option<i64> },

    #[error("Missing or non-numeric decay input: {field}")]
    MissingDecayInput { field: &'static str },

    #[error("Scale factor {factor} is not a positive finite number")]
    InvalidScaleFactor { factor: f64 },

    #[error("Image read error: {0}")]
    ImageRead(#[from] ImageReadError),

    #[error("Selection has {count} files, more than the limit of {limit}")]
    TooManyFiles { count: usize, limit: usize },

    #[error("Failed to import {}: {reason}", path.display())]
    Import { path: PathBuf, reason: String },
}
