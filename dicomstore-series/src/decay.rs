// SPDX-FileCopyrightText: 2025 dicomstore contributors
// SPDX-License-Identifier: MIT

//! Decay-corrected standardized uptake value (SUV) scaling.

use chrono::NaiveDateTime;

use crate::error::{Error, Result};
use crate::header::Header;
use crate::keywords::*;

/// Whether a missing decay input aborts a series read.
///
/// Only absent inputs are covered; an invalid factor always aborts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecayPolicy {
    Required,
    /// Skip scaling and log a warning
    Optional,
}

/// Validated inputs of the SUV scale factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecayInputs {
    /// Injected activity (Bq)
    pub dose: f64,
    /// Nuclide half-life (s)
    pub half_life: f64,
    /// Patient weight (kg)
    pub weight: f64,
    pub injection: NaiveDateTime,
    pub acquisition: NaiveDateTime,
}

fn required(value: Option<f64>, field: &'static str) -> Result<f64> {
    value.ok_or(Error::MissingDecayInput { field })
}

impl DecayInputs {
    pub fn from_header(header: &Header) -> Result<Self> {
        let nuclide = header.radiopharmaceutical.clone().unwrap_or_default();
        let dose = required(nuclide.total_dose, RADIONUCLIDE_TOTAL_DOSE)?;
        let half_life = required(nuclide.half_life, RADIONUCLIDE_HALF_LIFE)?;
        let weight = required(header.patient_weight, PATIENT_WEIGHT)?;

        let series_date = header
            .series_date
            .ok_or(Error::MissingDecayInput { field: SERIES_DATE })?;
        let series_time = header
            .series_time
            .ok_or(Error::MissingDecayInput { field: SERIES_TIME })?;
        let acquisition = series_date.and_time(series_time);

        // assumes injection on the acquisition date unless a full datetime is stored
        let injection = match (nuclide.start_datetime, nuclide.start_time) {
            (Some(datetime), _) => datetime,
            (None, Some(time)) => series_date.and_time(time),
            (None, None) => {
                return Err(Error::MissingDecayInput {
                    field: RADIOPHARMACEUTICAL_START_TIME,
                });
            }
        };

        Ok(Self {
            dose,
            half_life,
            weight,
            injection,
            acquisition,
        })
    }

    /// Seconds from injection to acquisition.
    pub fn elapsed_seconds(&self) -> f64 {
        let elapsed = self.acquisition - self.injection;
        elapsed.num_milliseconds() as f64 / 1000.0
    }

    /// Remaining fraction of the injected activity at acquisition.
    pub fn decay(&self) -> f64 {
        0.5_f64.powf(self.elapsed_seconds() / self.half_life)
    }

    /// Fails with [`Error::InvalidScaleFactor`] unless the factor is finite
    /// and positive. A non-positive half-life never yields a valid factor.
    pub fn factor(&self) -> Result<f64> {
        let factor = self.weight * 1000.0 / (self.decay() * self.dose);
        if self.half_life > 0.0 && factor.is_finite() && factor > 0.0 {
            Ok(factor)
        } else {
            Err(Error::InvalidScaleFactor { factor })
        }
    }
}

/// SUV scale factor of a PET header.
pub fn scale_factor(header: &Header) -> Result<f64> {
    DecayInputs::from_header(header)?.factor()
}
