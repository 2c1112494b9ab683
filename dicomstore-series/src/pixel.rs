// SPDX-FileCopyrightText: 2025 dicomstore contributors
// SPDX-License-Identifier: MIT

//! Pixel data access for resolved series.

use std::path::{Path, PathBuf};

use dicom::object::open_file;
use dicom::pixeldata::PixelDecoder;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ImageReadError {
    #[error("No files to read")]
    NoFiles,

    #[error("Failed to open {}: {reason}", path.display())]
    Open { path: PathBuf, reason: String },

    #[error("Failed to decode pixel data of {}: {reason}", path.display())]
    Decode { path: PathBuf, reason: String },

    #[error(
        "Frame geometry of {} is {found_rows}x{found_columns}, expected {rows}x{columns}",
        path.display()
    )]
    GeometryMismatch {
        path: PathBuf,
        rows: u32,
        columns: u32,
        found_rows: u32,
        found_columns: u32,
    },
}

/// Frames stacked in file order, samples row-major within each frame.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleGrid {
    pub frames: usize,
    pub rows: u32,
    pub columns: u32,
    pub samples: Vec<f32>,
}

impl SampleGrid {
    pub fn frame_len(&self) -> usize {
        self.rows as usize * self.columns as usize
    }

    pub fn frame(&self, index: usize) -> Option<&[f32]> {
        let len = self.frame_len();
        self.samples.get(index * len..(index + 1) * len)
    }

    /// Multiply every sample by `factor`.
    pub fn scale(&mut self, factor: f64) {
        for sample in &mut self.samples {
            *sample = (f64::from(*sample) * factor) as f32;
        }
    }
}

/// Reads the pixel data of an ordered file list.
pub trait PixelReader {
    fn read(&self, files: &[PathBuf]) -> Result<SampleGrid, ImageReadError>;
}

impl<R: PixelReader + ?Sized> PixelReader for &R {
    fn read(&self, files: &[PathBuf]) -> Result<SampleGrid, ImageReadError> {
        (**self).read(files)
    }
}

/// Decodes files with the `dicom` toolkit.
///
/// Samples are converted to `f32` with the modality LUT applied, so stored
/// values are already rescaled to modality units.
#[derive(Debug, Clone, Copy, Default)]
pub struct DicomPixelReader;

impl DicomPixelReader {
    fn append(&self, path: &Path, grid: &mut Option<SampleGrid>) -> Result<(), ImageReadError> {
        let object = open_file(path).map_err(|e| ImageReadError::Open {
            path: path.to_owned(),
            reason: e.to_string(),
        })?;
        let decode_error = |e: &dyn std::fmt::Display| ImageReadError::Decode {
            path: path.to_owned(),
            reason: e.to_string(),
        };
        let decoded = object.decode_pixel_data().map_err(|e| decode_error(&e))?;
        let (rows, columns) = (decoded.rows(), decoded.columns());

        let grid = grid.get_or_insert_with(|| SampleGrid {
            frames: 0,
            rows,
            columns,
            samples: Vec::new(),
        });
        if (grid.rows, grid.columns) != (rows, columns) {
            return Err(ImageReadError::GeometryMismatch {
                path: path.to_owned(),
                rows: grid.rows,
                columns: grid.columns,
                found_rows: rows,
                found_columns: columns,
            });
        }

        for frame in 0..decoded.number_of_frames() {
            let samples = decoded
                .to_vec_frame::<f32>(frame)
                .map_err(|e| decode_error(&e))?;
            grid.samples.extend(samples);
            grid.frames += 1;
        }
        debug!(
            "Decoded {} frame(s) of {rows}x{columns} from {}",
            decoded.number_of_frames(),
            path.display()
        );
        Ok(())
    }
}

impl PixelReader for DicomPixelReader {
    fn read(&self, files: &[PathBuf]) -> Result<SampleGrid, ImageReadError> {
        let mut grid = None;
        for path in files {
            self.append(path, &mut grid)?;
        }
        grid.ok_or(ImageReadError::NoFiles)
    }
}
