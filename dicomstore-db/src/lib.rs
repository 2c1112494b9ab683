// SPDX-FileCopyrightText: 2025 dicomstore contributors
// SPDX-License-Identifier: MIT

//! SQLite store for flattened DICOM metadata.
//!
//! Every metadata domain lives in one table whose columns grow as new tag names
//! are encountered. Values are stored as TEXT unless a column is declared
//! otherwise; semantic typing happens when rows are read back.
//!
//! **Architecture**: This is the storage layer below header reconstruction and
//! series resolution.
//!
//! # Key Features
//!
//! - Lazy connection with explicit commit/close lifecycle
//! - Additive schema evolution (`ensure_table`, `ensure_columns`)
//! - Column removal by atomic table rebuild
//! - Parameterized keyword queries with projection and materialization
//! - In-memory databases for testing
//!
//! # Example
//!
//! ```ignore
//! use dicomstore_db::{MetadataDb, Query};
//!
//! let mut db = MetadataDb::memory();
//! db.ensure_table("dicom")?;
//! db.ensure_text_columns("dicom", &["PatientID", "Modality"])?;
//! db.insert_row("dicom", [("PatientID", "P1"), ("Modality", "PT")])?;
//!
//! let rows = db.query(&Query::new("dicom").filter("Modality", "PT"))?;
//! assert_eq!(rows[0].text("PatientID"), Some("P1"));
//! ```

mod connection;
mod error;
mod query;
mod schema;
mod types;
mod write;

pub use connection::{DbLocation, IN_MEMORY, MetadataDb, StoreOptions};
pub use error::{Error, QueryError, Result, SchemaError};
pub use query::{ColumnValues, Projection, Query};
pub use schema::{ColumnDef, ColumnInfo, ColumnType, ID_COLUMN, RESERVED_IDENTIFIERS};
pub use types::*;
