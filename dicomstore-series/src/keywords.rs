// SPDX-FileCopyrightText: 2025 dicomstore contributors
// SPDX-License-Identifier: MIT

//! DICOM keywords (and store-specific column names) the pipeline reads.

pub const PATIENT_ID: &str = "PatientID";
pub const PATIENT_NAME: &str = "PatientName";
pub const PATIENT_WEIGHT: &str = "PatientWeight";
pub const STUDY_INSTANCE_UID: &str = "StudyInstanceUID";
pub const SERIES_INSTANCE_UID: &str = "SeriesInstanceUID";
pub const SOP_INSTANCE_UID: &str = "SOPInstanceUID";
pub const SOP_CLASS_UID: &str = "SOPClassUID";
pub const MODALITY: &str = "Modality";
pub const SERIES_DATE: &str = "SeriesDate";
pub const SERIES_TIME: &str = "SeriesTime";
pub const SLICE_LOCATION: &str = "SliceLocation";
pub const INSTANCE_NUMBER: &str = "InstanceNumber";
pub const ACQUISITION_NUMBER: &str = "AcquisitionNumber";
pub const RESCALE_SLOPE: &str = "RescaleSlope";
pub const RESCALE_INTERCEPT: &str = "RescaleIntercept";
pub const PIXEL_DATA: &str = "PixelData";

pub const RADIOPHARMACEUTICAL_INFORMATION_SEQUENCE: &str =
    "RadiopharmaceuticalInformationSequence";
pub const RADIONUCLIDE_TOTAL_DOSE: &str = "RadionuclideTotalDose";
pub const RADIONUCLIDE_HALF_LIFE: &str = "RadionuclideHalfLife";
pub const RADIOPHARMACEUTICAL_START_TIME: &str = "RadiopharmaceuticalStartTime";
pub const RADIOPHARMACEUTICAL_START_DATE_TIME: &str = "RadiopharmaceuticalStartDateTime";

/// Column holding the file reference of each stored instance.
pub const FILE_NAME: &str = "FileName";

/// SOP class of PET image storage.
pub const SOP_CLASS_UID_PET: &str = "1.2.840.10008.5.1.4.1.1.128";
