// SPDX-FileCopyrightText: 2025 dicomstore contributors
// SPDX-License-Identifier: MIT

//! Typed views over flattened DICOM metadata.
//!
//! Rows stored by `dicomstore-db` are plain text. This crate turns them back
//! into [`Header`]s through a [`TagDictionary`], groups them into ordered
//! series with [`SeriesResolver`], and computes decay-corrected SUV factors
//! for PET series. [`SeriesReader`] ties the pieces together and decodes the
//! pixel data.
//!
//! ```ignore
//! use dicomstore_db::MetadataDb;
//! use dicomstore_series::{DicomPixelReader, ReadOptions, SeriesReader, StandardTagDictionary};
//!
//! let mut db = MetadataDb::new("database.db");
//! let mut reader = SeriesReader::new(
//!     &mut db,
//!     "dicom",
//!     StandardTagDictionary,
//!     DicomPixelReader,
//!     ReadOptions::default(),
//! );
//! for uid in reader.series_uids()? {
//!     let image = reader.read_series(&uid)?;
//!     println!("{uid}: {} frames, SUV factor {:?}", image.grid.frames, image.scale_factor);
//! }
//! ```

mod decay;
mod dictionary;
mod error;
mod header;
mod ingest;
pub mod keywords;
mod parse;
mod pixel;
mod reader;
mod series;

pub use decay::{DecayInputs, DecayPolicy, scale_factor};
pub use dictionary::{
    StandardTagDictionary, StaticTagDictionary, TagDictionary, TypeResolutionError, ValueKind,
};
pub use error::{Error, Result};
pub use header::{
    Header, HeaderReconstructor, HeaderValue, PersonName, Radiopharmaceutical, SequenceItem,
    SequenceRef,
};
pub use ingest::{flatten_object, import_file};
pub use parse::{parse_date, parse_datetime, parse_time};
pub use pixel::{DicomPixelReader, ImageReadError, PixelReader, SampleGrid};
pub use reader::{DEFAULT_MAX_FILES, ReadOptions, ScaledImage, SeriesReader};
pub use series::{SeriesResolver, SeriesSelection, default_sort_preference};
