// SPDX-FileCopyrightText: 2025 dicomstore contributors
// SPDX-License-Identifier: MIT

//! Test utilities for dicomstore.
//!
//! Row builders for synthetic PET series, a pixel reader that never touches
//! the disk, and proptest strategies shared by the crates' integration tests.

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use dicomstore_db::{MetadataDb, Value};
use dicomstore_series::keywords::*;
use dicomstore_series::{ImageReadError, PixelReader, SampleGrid};
use proptest::prelude::*;
use tempfile::TempDir;

pub const TABLE: &str = "dicom";

/// Columns every synthetic slice carries.
pub const PET_COLUMNS: &[&str] = &[
    PATIENT_ID,
    PATIENT_NAME,
    PATIENT_WEIGHT,
    STUDY_INSTANCE_UID,
    SERIES_INSTANCE_UID,
    SOP_INSTANCE_UID,
    SOP_CLASS_UID,
    MODALITY,
    SERIES_DATE,
    SERIES_TIME,
    SLICE_LOCATION,
    INSTANCE_NUMBER,
    RADIONUCLIDE_TOTAL_DOSE,
    RADIONUCLIDE_HALF_LIFE,
    RADIOPHARMACEUTICAL_START_TIME,
    FILE_NAME,
];

/// Builder for one flattened PET slice.
///
/// Defaults: 70 kg patient, 500 Bq of F-18 (half-life 6586 s) injected at
/// 10:00, acquired at 11:00 the same day.
#[derive(Debug, Clone)]
pub struct PetSlice {
    values: Vec<(String, Value)>,
}

impl PetSlice {
    pub fn new(series_uid: &str, index: usize) -> Self {
        let text = |s: &str| Value::Text(s.to_owned());
        let values = vec![
            (PATIENT_ID, text("P1")),
            (PATIENT_NAME, text("Doe^Jane")),
            (PATIENT_WEIGHT, text("70")),
            (STUDY_INSTANCE_UID, text("1.2.840.99.1")),
            (SERIES_INSTANCE_UID, text(series_uid)),
            (SOP_INSTANCE_UID, text(&format!("{series_uid}.{index}"))),
            (SOP_CLASS_UID, text(SOP_CLASS_UID_PET)),
            (MODALITY, text("PT")),
            (SERIES_DATE, text("20170905")),
            (SERIES_TIME, text("110000")),
            (SLICE_LOCATION, text(&format!("{}", index as f64 * 2.5))),
            (INSTANCE_NUMBER, text(&(index + 1).to_string())),
            (RADIONUCLIDE_TOTAL_DOSE, text("500")),
            (RADIONUCLIDE_HALF_LIFE, text("6586")),
            (RADIOPHARMACEUTICAL_START_TIME, text("100000")),
            (FILE_NAME, text(&format!("{series_uid}/{index:04}.dcm"))),
        ];
        Self {
            values: values
                .into_iter()
                .map(|(k, v)| (k.to_owned(), v))
                .collect(),
        }
    }

    /// Replace (or add) one column.
    pub fn set(mut self, column: &str, value: impl Into<Option<String>>) -> Self {
        let value = value.into().map_or(Value::Null, Value::Text);
        match self.values.iter_mut().find(|(k, _)| k == column) {
            Some(entry) => entry.1 = value,
            None => self.values.push((column.to_owned(), value)),
        }
        self
    }

    pub fn without(self, column: &str) -> Self {
        self.set(column, None)
    }

    pub fn build(self) -> Vec<(String, Value)> {
        self.values
    }
}

/// `count` slices of one series, in acquisition order.
pub fn pet_series(series_uid: &str, count: usize) -> Vec<Vec<(String, Value)>> {
    (0..count)
        .map(|i| PetSlice::new(series_uid, i).build())
        .collect()
}

/// In-memory store with [`TABLE`] holding `rows`.
pub fn seeded_db(rows: Vec<Vec<(String, Value)>>) -> MetadataDb {
    let mut db = MetadataDb::memory();
    seed(&mut db, rows);
    db
}

fn seed(db: &mut MetadataDb, rows: Vec<Vec<(String, Value)>>) {
    db.ensure_table(TABLE).expect("create table");
    db.ensure_text_columns(TABLE, PET_COLUMNS)
        .expect("create columns");
    db.insert_rows(TABLE, rows).expect("insert rows");
}

/// A file-backed store inside a temporary directory.
pub struct TempStore {
    _dir: TempDir,
    path: PathBuf,
}

impl TempStore {
    pub fn new() -> std::io::Result<Self> {
        let dir = TempDir::new()?;
        let path = dir.path().join("database.db");
        Ok(Self { _dir: dir, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn open(&self) -> MetadataDb {
        MetadataDb::new(self.path.as_path())
    }

    pub fn seeded(&self, rows: Vec<Vec<(String, Value)>>) -> MetadataDb {
        let mut db = self.open();
        seed(&mut db, rows);
        db
    }
}

/// Pixel reader serving constant frames without touching the disk.
///
/// Each file yields one `rows` x `columns` frame filled with `value`. The
/// files of every call are recorded.
#[derive(Debug)]
pub struct FakePixelReader {
    pub rows: u32,
    pub columns: u32,
    pub value: f32,
    reads: RefCell<Vec<Vec<PathBuf>>>,
}

impl FakePixelReader {
    pub fn new(rows: u32, columns: u32, value: f32) -> Self {
        Self {
            rows,
            columns,
            value,
            reads: RefCell::new(Vec::new()),
        }
    }

    pub fn reads(&self) -> Vec<Vec<PathBuf>> {
        self.reads.borrow().clone()
    }
}

impl PixelReader for FakePixelReader {
    fn read(&self, files: &[PathBuf]) -> Result<SampleGrid, ImageReadError> {
        self.reads.borrow_mut().push(files.to_vec());
        if files.is_empty() {
            return Err(ImageReadError::NoFiles);
        }
        let frame_len = self.rows as usize * self.columns as usize;
        Ok(SampleGrid {
            frames: files.len(),
            rows: self.rows,
            columns: self.columns,
            samples: vec![self.value; frame_len * files.len()],
        })
    }
}

/// Pixel reader that fails on every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingPixelReader;

impl PixelReader for FailingPixelReader {
    fn read(&self, files: &[PathBuf]) -> Result<SampleGrid, ImageReadError> {
        Err(ImageReadError::Decode {
            path: files.first().cloned().unwrap_or_default(),
            reason: "corrupt pixel data".to_owned(),
        })
    }
}

/// Slice locations in stored text form, possibly negative and unordered.
pub fn arb_slice_locations() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(-500i32..500, 1..40)
        .prop_map(|cm| cm.into_iter().map(|c| format!("{}", c as f64 / 4.0)).collect())
}

prop_compose! {
    /// One series whose slices were stored in arbitrary order.
    pub fn arb_shuffled_series()(locations in arb_slice_locations()) -> Vec<Vec<(String, Value)>> {
        locations
            .iter()
            .enumerate()
            .map(|(i, location)| {
                PetSlice::new("1.2.840.99.7", i)
                    .set(SLICE_LOCATION, location.clone())
                    .build()
            })
            .collect()
    }
}
