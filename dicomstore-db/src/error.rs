// SPDX-FileCopyrightText: 2025 dicomstore contributors
// SPDX-License-Identifier: MIT

//! Error types for metadata store operations.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for metadata store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during metadata store operations.
#[derive(Error, Debug)]
pub enum Error {
    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Failed to open database with context
    #[error("Failed to open database at '{path}': {source}")]
    DatabaseOpen {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Structural table/column problem
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Malformed filter, sort or projection request
    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    /// Row id not present in table
    #[error("Row {id} not found in table '{table}'")]
    RowNotFound { table: String, id: i64 },
}

/// Structural errors raised by schema and write operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("table '{0}' does not exist")]
    UnknownTable(String),

    #[error("table '{0}' already exists")]
    TableExists(String),

    #[error("column '{column}' does not exist in table '{table}'")]
    UnknownColumn { table: String, column: String },

    #[error("'{0}' is a reserved identifier")]
    ReservedIdentifier(String),

    #[error("column '{requested}' conflicts with existing column '{existing}' in table '{table}'")]
    CaseConflict {
        table: String,
        requested: String,
        existing: String,
    },

    #[error("invalid identifier {0:?}")]
    InvalidIdentifier(String),
}

/// Errors raised while building a query.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("table '{0}' does not exist")]
    UnknownTable(String),

    #[error("column '{column}' does not exist in table '{table}'")]
    UnknownColumn { table: String, column: String },

    #[error("cannot materialize table '{0}' into itself")]
    DestinationIsSource(String),

    #[error("invalid identifier {0:?}")]
    InvalidIdentifier(String),
}
