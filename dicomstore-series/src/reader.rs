// SPDX-FileCopyrightText: 2025 dicomstore contributors
// SPDX-License-Identifier: MIT

//! End-to-end series reads: select, order, decode and scale.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use dicomstore_db::{ColumnValues, MetadataDb, Query, Row, value_to_text};
use tracing::{debug, warn};

use crate::decay::{DecayPolicy, scale_factor};
use crate::dictionary::TagDictionary;
use crate::error::{Error, Result};
use crate::header::Header;
use crate::keywords::SERIES_INSTANCE_UID;
use crate::pixel::{PixelReader, SampleGrid};
use crate::series::{SeriesResolver, SeriesSelection, default_sort_preference};

/// Largest number of files a single read may touch.
pub const DEFAULT_MAX_FILES: usize = 5000;

#[derive(Debug, Clone, PartialEq)]
pub struct ReadOptions {
    pub folder: Option<PathBuf>,
    pub sort_preference: Vec<String>,
    pub decay: DecayPolicy,
    /// Multiply PET samples by the SUV factor
    pub apply_suv: bool,
    pub max_files: usize,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            folder: None,
            sort_preference: default_sort_preference(),
            decay: DecayPolicy::Required,
            apply_suv: true,
            max_files: DEFAULT_MAX_FILES,
        }
    }
}

/// Decoded series with the header of its first slice.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaledImage {
    pub series_uid: Option<String>,
    pub files: Vec<PathBuf>,
    pub grid: SampleGrid,
    pub header: Header,
    /// SUV factor for PET series, whether applied or not
    pub scale_factor: Option<f64>,
    pub scaled: bool,
}

pub struct SeriesReader<'a, D, R> {
    db: &'a mut MetadataDb,
    table: String,
    resolver: SeriesResolver<D>,
    pixels: R,
    options: ReadOptions,
}

impl<'a, D: TagDictionary, R: PixelReader> SeriesReader<'a, D, R> {
    pub fn new(
        db: &'a mut MetadataDb,
        table: impl Into<String>,
        dictionary: D,
        pixels: R,
        options: ReadOptions,
    ) -> Self {
        let mut resolver =
            SeriesResolver::new(dictionary).sort_preference(options.sort_preference.clone());
        if let Some(folder) = &options.folder {
            resolver = resolver.folder(folder.clone());
        }
        Self {
            db,
            table: table.into(),
            resolver,
            pixels,
            options,
        }
    }

    pub fn options(&self) -> &ReadOptions {
        &self.options
    }

    /// Distinct series UIDs of the table, sorted.
    pub fn series_uids(&mut self) -> Result<Vec<String>> {
        let values =
            self.db
                .column_values(&self.table, SERIES_INSTANCE_UID, ColumnValues::default())?;
        Ok(values.iter().filter_map(value_to_text).collect())
    }

    /// Rows of one series, bounded by `max_files`.
    fn series_rows(&mut self, uid: &str) -> Result<Vec<Row>> {
        let rows = self
            .db
            .query(&Query::new(self.table.as_str()).filter(SERIES_INSTANCE_UID, uid))?;
        if rows.len() > self.options.max_files {
            return Err(Error::TooManyFiles {
                count: rows.len(),
                limit: self.options.max_files,
            });
        }
        Ok(rows)
    }

    /// Resolve one series without decoding pixels.
    pub fn select(&mut self, uid: &str) -> Result<SeriesSelection> {
        let rows = self.series_rows(uid)?;
        self.resolver.resolve(&rows)
    }

    /// SUV factor of a resolved series; `None` for non-PET series or when an
    /// input is missing under [`DecayPolicy::Optional`].
    pub fn suv_factor(&self, header: &Header) -> Result<Option<f64>> {
        if !header.is_pet() {
            return Ok(None);
        }
        match (scale_factor(header), self.options.decay) {
            (Ok(factor), _) => Ok(Some(factor)),
            (Err(e @ Error::MissingDecayInput { .. }), DecayPolicy::Optional) => {
                warn!("Skipping SUV scaling: {e}");
                Ok(None)
            }
            (Err(e), _) => Err(e),
        }
    }

    pub fn read_series(&mut self, uid: &str) -> Result<ScaledImage> {
        let selection = self.select(uid)?;
        let mut grid = self.pixels.read(&selection.files)?;
        let scale_factor = self.suv_factor(&selection.header)?;

        let scaled = match scale_factor {
            Some(factor) if self.options.apply_suv => {
                grid.scale(factor);
                true
            }
            _ => false,
        };
        debug!(
            "Read series {uid}: {} file(s), {} frame(s), scale factor {scale_factor:?}",
            selection.files.len(),
            grid.frames
        );

        Ok(ScaledImage {
            series_uid: selection.series_uid,
            files: selection.files,
            grid,
            header: selection.header,
            scale_factor,
            scaled,
        })
    }

    /// Read every series of the table, keyed by UID.
    ///
    /// Rows without a `SeriesInstanceUID` belong to no series; their presence
    /// fails the read with [`Error::AmbiguousSeries`] before any decoding.
    pub fn read_all(&mut self) -> Result<BTreeMap<String, ScaledImage>> {
        let rows = self
            .db
            .query(&Query::new(self.table.as_str()).project([SERIES_INSTANCE_UID]))?;
        if rows.len() > self.options.max_files {
            return Err(Error::TooManyFiles {
                count: rows.len(),
                limit: self.options.max_files,
            });
        }
        let uids: BTreeSet<Option<String>> = rows
            .iter()
            .map(|row| row.get(SERIES_INSTANCE_UID).and_then(value_to_text))
            .collect();
        if uids.contains(&None) {
            return Err(Error::AmbiguousSeries {
                uids: uids.into_iter().collect(),
            });
        }
        uids.into_iter()
            .flatten()
            .map(|uid| Ok((uid.clone(), self.read_series(&uid)?)))
            .collect()
    }
}
