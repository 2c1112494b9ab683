// SPDX-FileCopyrightText: 2025 dicomstore contributors
// SPDX-License-Identifier: MIT

//! Flattening of DICOM files into store rows.

use std::path::Path;

use dicom::core::VR;
use dicom::core::dictionary::DataDictionary;
use dicom::core::header::Header as _;
use dicom::core::value::Value as DicomValue;
use dicom::dictionary_std::{StandardDataDictionary, tags};
use dicom::object::{InMemDicomObject, open_file};
use dicomstore_db::{MetadataDb, Value};
use tracing::debug;

use crate::error::{Error, Result};
use crate::keywords::FILE_NAME;

fn is_binary(vr: VR) -> bool {
    matches!(
        vr,
        VR::OB | VR::OD | VR::OF | VR::OL | VR::OV | VR::OW | VR::UN
    )
}

/// Keyword and text of every element worth storing. Sequence items are
/// rendered as JSON objects, nested sequences as nested arrays.
fn elements(object: &InMemDicomObject) -> Vec<(&'static str, serde_json::Value)> {
    let mut out = Vec::new();
    for element in object.iter() {
        let tag = element.tag();
        if tag == tags::PIXEL_DATA || tag.group() % 2 == 1 || is_binary(element.vr()) {
            continue;
        }
        let Some(alias) = StandardDataDictionary.by_tag(tag).map(|entry| entry.alias) else {
            continue;
        };
        let value = match element.value() {
            DicomValue::Primitive(primitive) => {
                let text = primitive.to_str();
                let text = text.trim();
                if text.is_empty() {
                    continue;
                }
                serde_json::Value::String(text.to_owned())
            }
            DicomValue::Sequence(sequence) => serde_json::Value::Array(
                sequence
                    .items()
                    .iter()
                    .map(|item| {
                        let fields = elements(item)
                            .into_iter()
                            .map(|(keyword, value)| (keyword.to_owned(), value));
                        serde_json::Value::Object(fields.collect())
                    })
                    .collect(),
            ),
            DicomValue::PixelSequence(_) => continue,
        };
        out.push((alias, value));
    }
    out
}

/// Flatten a DICOM object into `(column, value)` pairs.
///
/// Columns are named by dictionary keyword. Pixel data, binary values and
/// private or unknown tags are left out. Sequences are stored as JSON arrays.
pub fn flatten_object(object: &InMemDicomObject, file_name: &str) -> Vec<(String, Value)> {
    let mut row: Vec<(String, Value)> = elements(object)
        .into_iter()
        .map(|(keyword, value)| {
            let text = match value {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            (keyword.to_owned(), Value::Text(text))
        })
        .collect();
    row.push((FILE_NAME.to_owned(), Value::Text(file_name.to_owned())));
    row
}

/// Import one DICOM file into `table`, growing the schema as needed.
///
/// Returns the identifier of the new row.
pub fn import_file(db: &mut MetadataDb, table: &str, path: &Path) -> Result<i64> {
    let object = open_file(path).map_err(|e| Error::Import {
        path: path.to_owned(),
        reason: e.to_string(),
    })?;
    let file_name = path.to_str().ok_or_else(|| Error::Import {
        path: path.to_owned(),
        reason: "path is not valid UTF-8".to_owned(),
    })?;
    let row = flatten_object(&object, file_name);

    db.ensure_table(table)?;
    let columns: Vec<&str> = row.iter().map(|(column, _)| column.as_str()).collect();
    db.ensure_text_columns(table, &columns)?;
    let id = db.insert_row(table, row)?;
    debug!("Imported {} as row {id} of {table}", path.display());
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicom::core::value::DataSetSequence;
    use dicom::core::{DataElement, Length, PrimitiveValue, Tag};
    use dicom::object::mem::InMemElement;

    fn object() -> InMemDicomObject {
        let nuclide = InMemDicomObject::from_element_iter([
            DataElement::new(
                tags::RADIONUCLIDE_TOTAL_DOSE,
                VR::DS,
                PrimitiveValue::from("370000000"),
            ),
            DataElement::new(
                tags::RADIONUCLIDE_HALF_LIFE,
                VR::DS,
                PrimitiveValue::from("6586.2"),
            ),
        ]);
        InMemDicomObject::from_element_iter([
            DataElement::new(tags::PATIENT_ID, VR::LO, PrimitiveValue::from("P1 ")),
            DataElement::new(tags::MODALITY, VR::CS, PrimitiveValue::from("PT")),
            DataElement::new(tags::SERIES_DESCRIPTION, VR::LO, PrimitiveValue::from("")),
            DataElement::new(Tag(0x0009, 0x0010), VR::LO, PrimitiveValue::from("VENDOR")),
            DataElement::new(
                tags::PIXEL_DATA,
                VR::OW,
                PrimitiveValue::U8(vec![0u8; 4].into()),
            ),
            InMemElement::new(
                tags::RADIOPHARMACEUTICAL_INFORMATION_SEQUENCE,
                VR::SQ,
                DicomValue::Sequence(DataSetSequence::new(vec![nuclide], Length::UNDEFINED)),
            ),
        ])
    }

    #[test]
    fn test_flatten_object() {
        let row = flatten_object(&object(), "a.dcm");
        let get = |name: &str| {
            row.iter()
                .find(|(column, _)| column == name)
                .map(|(_, value)| value.clone())
        };

        assert_eq!(get("PatientID"), Some(Value::Text("P1".into())));
        assert_eq!(get("Modality"), Some(Value::Text("PT".into())));
        assert_eq!(get("FileName"), Some(Value::Text("a.dcm".into())));
        assert_eq!(get("SeriesDescription"), None);
        assert_eq!(get("PixelData"), None);
        assert_eq!(row.len(), 4);

        let Some(Value::Text(seq)) = get("RadiopharmaceuticalInformationSequence") else {
            panic!("sequence not flattened");
        };
        let items: Vec<serde_json::Map<String, serde_json::Value>> =
            serde_json::from_str(&seq).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["RadionuclideTotalDose"], "370000000");
    }

    #[test]
    fn test_import_unreadable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not-dicom.dcm");
        std::fs::write(&path, b"plain text").unwrap();

        let mut db = MetadataDb::memory();
        let err = import_file(&mut db, "dicom", &path).unwrap_err();
        assert!(matches!(err, Error::Import { .. }));
        assert!(!db.has_table("dicom").unwrap());
    }
}
