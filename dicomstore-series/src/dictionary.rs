// SPDX-FileCopyrightText: 2025 dicomstore contributors
// SPDX-License-Identifier: MIT

//! Tag dictionary lookups: keyword to value-representation category.

use std::collections::BTreeMap;

use dicom::core::dictionary::{DataDictionary, VirtualVr};
use dicom::dictionary_std::StandardDataDictionary;
use thiserror::Error;

use crate::keywords::FILE_NAME;

/// Semantic category of a value representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    String,
    PersonName,
    Date,
    DateTime,
    Time,
    Float,
    Integer,
    Sequence,
}

impl ValueKind {
    /// Category of a two-letter VR code, `None` if the code is unknown.
    pub fn from_vr_code(code: &str) -> Option<ValueKind> {
        let kind = match code {
            "AE" | "AS" | "AT" | "CS" | "LO" | "LT" | "OB" | "OW" | "OF" | "OL" | "OV" | "SH"
            | "ST" | "UC" | "UI" | "UN" | "UR" | "UT" => ValueKind::String,
            "PN" => ValueKind::PersonName,
            "DA" => ValueKind::Date,
            "DT" => ValueKind::DateTime,
            "TM" => ValueKind::Time,
            // DS is decimal text; FL, FD and OD are binary floats
            "DS" | "FL" | "FD" | "OD" => ValueKind::Float,
            "IS" | "SL" | "SS" | "SV" | "UL" | "US" | "UV" => ValueKind::Integer,
            "SQ" => ValueKind::Sequence,
            _ => return None,
        };
        Some(kind)
    }
}

/// Recoverable failure to give a column its semantic type.
///
/// Reconstruction falls back to the raw string when this occurs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TypeResolutionError {
    #[error("tag '{0}' is not in the dictionary")]
    UnknownTag(String),

    #[error("value {value:?} of '{column}' is not a valid {kind:?}")]
    Unparseable {
        column: String,
        kind: ValueKind,
        value: String,
    },
}

/// Read-only mapping from tag keyword to value category.
pub trait TagDictionary {
    fn resolve(&self, keyword: &str) -> Result<ValueKind, TypeResolutionError>;
}

/// The DICOM standard data dictionary.
///
/// Also knows the store's own `FileName` column, which is a plain string.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardTagDictionary;

impl TagDictionary for StandardTagDictionary {
    fn resolve(&self, keyword: &str) -> Result<ValueKind, TypeResolutionError> {
        if keyword == FILE_NAME {
            return Ok(ValueKind::String);
        }
        let entry = StandardDataDictionary
            .by_name(keyword)
            .ok_or_else(|| TypeResolutionError::UnknownTag(keyword.to_owned()))?;
        let kind = match entry.vr {
            VirtualVr::Exact(vr) => ValueKind::from_vr_code(&vr.to_string()),
            // US or SS depending on pixel representation
            VirtualVr::Xs => Some(ValueKind::Integer),
            _ => Some(ValueKind::String),
        };
        kind.ok_or_else(|| TypeResolutionError::UnknownTag(keyword.to_owned()))
    }
}

/// Dictionary backed by an explicit map, for custom vocabularies and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticTagDictionary {
    entries: BTreeMap<String, ValueKind>,
}

impl StaticTagDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, keyword: impl Into<String>, kind: ValueKind) -> Self {
        self.entries.insert(keyword.into(), kind);
        self
    }
}

impl<K: Into<String>> FromIterator<(K, ValueKind)> for StaticTagDictionary {
    fn from_iter<T: IntoIterator<Item = (K, ValueKind)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl TagDictionary for StaticTagDictionary {
    fn resolve(&self, keyword: &str) -> Result<ValueKind, TypeResolutionError> {
        self.entries
            .get(keyword)
            .copied()
            .ok_or_else(|| TypeResolutionError::UnknownTag(keyword.to_owned()))
    }
}

impl<D: TagDictionary + ?Sized> TagDictionary for &D {
    fn resolve(&self, keyword: &str) -> Result<ValueKind, TypeResolutionError> {
        (**self).resolve(keyword)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("PatientName", ValueKind::PersonName)]
    #[case("PatientWeight", ValueKind::Float)]
    #[case("SeriesDate", ValueKind::Date)]
    #[case("SeriesTime", ValueKind::Time)]
    #[case("RadiopharmaceuticalStartDateTime", ValueKind::DateTime)]
    #[case("InstanceNumber", ValueKind::Integer)]
    #[case("SliceLocation", ValueKind::Float)]
    #[case("SeriesInstanceUID", ValueKind::String)]
    #[case("RadiopharmaceuticalInformationSequence", ValueKind::Sequence)]
    #[case("FileName", ValueKind::String)]
    fn test_standard_dictionary(#[case] keyword: &str, #[case] kind: ValueKind) {
        assert_eq!(StandardTagDictionary.resolve(keyword), Ok(kind));
    }

    #[test]
    fn test_unknown_keyword() {
        assert_eq!(
            StandardTagDictionary.resolve("NotADicomKeyword"),
            Err(TypeResolutionError::UnknownTag("NotADicomKeyword".into()))
        );
    }

    #[test]
    fn test_static_dictionary() {
        let dict = StaticTagDictionary::new().with("Weight", ValueKind::Float);
        assert_eq!(dict.resolve("Weight"), Ok(ValueKind::Float));
        assert!(dict.resolve("Other").is_err());
    }

    #[test]
    fn test_vr_codes() {
        assert_eq!(ValueKind::from_vr_code("DS"), Some(ValueKind::Float));
        assert_eq!(ValueKind::from_vr_code("US"), Some(ValueKind::Integer));
        assert_eq!(ValueKind::from_vr_code("SQ"), Some(ValueKind::Sequence));
        assert_eq!(ValueKind::from_vr_code("ZZ"), None);
    }
}
