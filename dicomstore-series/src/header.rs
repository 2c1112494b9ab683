// SPDX-FileCopyrightText: 2025 dicomstore contributors
// SPDX-License-Identifier: MIT

//! Reconstruction of typed headers from flattened metadata rows.
//!
//! Every column is interpreted through the tag dictionary. The tags the
//! pipeline depends on land in named fields of [`Header`]; everything else is
//! kept in [`Header::extra`].

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use dicomstore_db::{ID_COLUMN, MetadataDb, Row, Value, value_to_text};
use tracing::debug;

use crate::dictionary::{TagDictionary, TypeResolutionError, ValueKind};
use crate::error::{Error, Result};
use crate::keywords::*;
use crate::parse::{parse_date, parse_datetime, parse_time};

/// A DICOM person name (`Family^Given^Middle^Prefix^Suffix`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonName(String);

impl PersonName {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn family(&self) -> Option<&str> {
        self.component(0)
    }

    pub fn given(&self) -> Option<&str> {
        self.component(1)
    }

    fn component(&self, index: usize) -> Option<&str> {
        self.0
            .split('^')
            .nth(index)
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }
}

/// One item of a stored sequence: keyword to JSON value.
pub type SequenceItem = BTreeMap<String, serde_json::Value>;

/// Opaque reference to a stored sequence column.
///
/// Sequences are stored as JSON arrays of flattened items and only decoded
/// when [`SequenceRef::items`] is called.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceRef {
    column: String,
    raw: String,
}

impl SequenceRef {
    pub fn new(column: impl Into<String>, raw: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            raw: raw.into(),
        }
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn items(&self) -> std::result::Result<Vec<SequenceItem>, serde_json::Error> {
        serde_json::from_str(&self.raw)
    }
}

/// Typed value of one header field.
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValue {
    String(String),
    PersonName(PersonName),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Time(NaiveTime),
    Float(f64),
    Floats(Vec<f64>),
    Integer(i64),
    Integers(Vec<i64>),
    Sequence(SequenceRef),
}

impl HeaderValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            HeaderValue::String(s) => Some(s),
            HeaderValue::PersonName(name) => Some(name.as_str()),
            _ => None,
        }
    }

    /// Single numeric value, integers widened.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            HeaderValue::Float(f) => Some(*f),
            HeaderValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            HeaderValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            HeaderValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<NaiveTime> {
        match self {
            HeaderValue::Time(t) => Some(*t),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            HeaderValue::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&SequenceRef> {
        match self {
            HeaderValue::Sequence(seq) => Some(seq),
            _ => None,
        }
    }
}

/// Nuclide and injection data of a PET acquisition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Radiopharmaceutical {
    /// Injected activity (Bq)
    pub total_dose: Option<f64>,
    /// Half-life (s)
    pub half_life: Option<f64>,
    pub start_time: Option<NaiveTime>,
    pub start_datetime: Option<NaiveDateTime>,
}

impl Radiopharmaceutical {
    fn is_complete(&self) -> bool {
        self.total_dose.is_some()
            && self.half_life.is_some()
            && (self.start_time.is_some() || self.start_datetime.is_some())
    }

    fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Structured view of one stored image instance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header {
    pub id: Option<i64>,
    pub file_name: Option<String>,
    pub patient_id: Option<String>,
    pub patient_name: Option<PersonName>,
    /// kg
    pub patient_weight: Option<f64>,
    pub study_instance_uid: Option<String>,
    pub series_instance_uid: Option<String>,
    pub sop_instance_uid: Option<String>,
    pub sop_class_uid: Option<String>,
    pub modality: Option<String>,
    pub series_date: Option<NaiveDate>,
    pub series_time: Option<NaiveTime>,
    pub slice_location: Option<f64>,
    pub instance_number: Option<i64>,
    pub acquisition_number: Option<i64>,
    pub rescale_slope: Option<f64>,
    pub rescale_intercept: Option<f64>,
    pub radiopharmaceutical: Option<Radiopharmaceutical>,
    /// Every other non-null column
    pub extra: BTreeMap<String, HeaderValue>,
    /// Columns that fell back to their raw string
    pub fallbacks: Vec<TypeResolutionError>,
}

impl Header {
    /// Value of a column without a named field.
    pub fn get(&self, keyword: &str) -> Option<&HeaderValue> {
        self.extra.get(keyword)
    }

    pub fn is_pet(&self) -> bool {
        self.sop_class_uid.as_deref() == Some(SOP_CLASS_UID_PET)
            || self.modality.as_deref() == Some("PT")
    }

    /// Rescale slope and intercept, 1 and 0 when absent.
    pub fn rescale(&self) -> (f64, f64) {
        (
            self.rescale_slope.unwrap_or(1.0),
            self.rescale_intercept.unwrap_or(0.0),
        )
    }
}

fn numbers<T: std::str::FromStr>(text: &str) -> Option<Vec<T>> {
    text.split('\\')
        .map(|part| part.trim().parse().ok())
        .collect()
}

/// Remove `key` from `values` if it has the shape `pick` expects.
fn take<T>(
    values: &mut BTreeMap<String, HeaderValue>,
    key: &str,
    pick: impl Fn(&HeaderValue) -> Option<T>,
) -> Option<T> {
    let picked = pick(values.get(key)?)?;
    values.remove(key);
    Some(picked)
}

fn take_string(values: &mut BTreeMap<String, HeaderValue>, key: &str) -> Option<String> {
    take(values, key, |v| match v {
        HeaderValue::String(s) => Some(s.clone()),
        _ => None,
    })
}

/// Rebuilds [`Header`]s through a tag dictionary.
#[derive(Debug, Clone)]
pub struct HeaderReconstructor<D> {
    dictionary: D,
}

impl<D: TagDictionary> HeaderReconstructor<D> {
    pub fn new(dictionary: D) -> Self {
        Self { dictionary }
    }

    pub fn dictionary(&self) -> &D {
        &self.dictionary
    }

    /// Fetch row `id` of `table` and rebuild its header.
    pub fn header_for_id(&self, db: &mut MetadataDb, table: &str, id: i64) -> Result<Header> {
        let row = db.row_by_id(table, id)?.ok_or_else(|| Error::NotFound {
            table: table.to_owned(),
            id,
        })?;
        Ok(self.from_row(&row))
    }

    /// Give one stored value its semantic type.
    ///
    /// `Ok(None)` for NULL and for empty non-string values.
    pub fn interpret(
        &self,
        column: &str,
        value: &Value,
    ) -> std::result::Result<Option<HeaderValue>, TypeResolutionError> {
        let Some(text) = value_to_text(value) else {
            return Ok(None);
        };
        let kind = self.dictionary.resolve(column)?;
        let trimmed = text.trim();
        if trimmed.is_empty() && kind != ValueKind::String {
            return Ok(None);
        }

        let unparseable = || TypeResolutionError::Unparseable {
            column: column.to_owned(),
            kind,
            value: text.clone(),
        };
        let typed = match kind {
            ValueKind::String => HeaderValue::String(trimmed.to_owned()),
            ValueKind::PersonName => HeaderValue::PersonName(PersonName::new(trimmed)),
            ValueKind::Date => HeaderValue::Date(parse_date(trimmed).ok_or_else(unparseable)?),
            ValueKind::Time => HeaderValue::Time(parse_time(trimmed).ok_or_else(unparseable)?),
            ValueKind::DateTime => {
                HeaderValue::DateTime(parse_datetime(trimmed).ok_or_else(unparseable)?)
            }
            ValueKind::Float => match value {
                Value::Real(f) => HeaderValue::Float(*f),
                Value::Integer(i) => HeaderValue::Float(*i as f64),
                _ => {
                    let mut parsed = numbers::<f64>(trimmed).ok_or_else(unparseable)?;
                    if parsed.len() == 1 {
                        HeaderValue::Float(parsed.remove(0))
                    } else {
                        HeaderValue::Floats(parsed)
                    }
                }
            },
            ValueKind::Integer => match value {
                Value::Integer(i) => HeaderValue::Integer(*i),
                _ => {
                    let mut parsed = numbers::<i64>(trimmed).ok_or_else(unparseable)?;
                    if parsed.len() == 1 {
                        HeaderValue::Integer(parsed.remove(0))
                    } else {
                        HeaderValue::Integers(parsed)
                    }
                }
            },
            ValueKind::Sequence => HeaderValue::Sequence(SequenceRef::new(column, text.clone())),
        };
        Ok(Some(typed))
    }

    /// Rebuild the header of one row. Never fails: columns that cannot be
    /// typed fall back to their raw string.
    pub fn from_row(&self, row: &Row) -> Header {
        let mut header = Header::default();
        let mut values = BTreeMap::new();

        for (column, value) in row.iter() {
            if column == ID_COLUMN {
                header.id = match value {
                    Value::Integer(id) => Some(*id),
                    _ => None,
                };
                continue;
            }
            match self.interpret(column, value) {
                Ok(Some(typed)) => {
                    values.insert(column.to_owned(), typed);
                }
                Ok(None) => {}
                Err(e) => {
                    debug!("Falling back to raw string: {e}");
                    if let Some(raw) = value_to_text(value) {
                        values.insert(column.to_owned(), HeaderValue::String(raw));
                    }
                    header.fallbacks.push(e);
                }
            }
        }

        header.file_name = take_string(&mut values, FILE_NAME);
        header.patient_id = take_string(&mut values, PATIENT_ID);
        header.patient_name = take(&mut values, PATIENT_NAME, |v| match v {
            HeaderValue::PersonName(name) => Some(name.clone()),
            _ => None,
        });
        header.patient_weight = take(&mut values, PATIENT_WEIGHT, HeaderValue::as_f64);
        header.study_instance_uid = take_string(&mut values, STUDY_INSTANCE_UID);
        header.series_instance_uid = take_string(&mut values, SERIES_INSTANCE_UID);
        header.sop_instance_uid = take_string(&mut values, SOP_INSTANCE_UID);
        header.sop_class_uid = take_string(&mut values, SOP_CLASS_UID);
        header.modality = take_string(&mut values, MODALITY);
        header.series_date = take(&mut values, SERIES_DATE, HeaderValue::as_date);
        header.series_time = take(&mut values, SERIES_TIME, HeaderValue::as_time);
        header.slice_location = take(&mut values, SLICE_LOCATION, HeaderValue::as_f64);
        header.instance_number = take(&mut values, INSTANCE_NUMBER, HeaderValue::as_i64);
        header.acquisition_number = take(&mut values, ACQUISITION_NUMBER, HeaderValue::as_i64);
        header.rescale_slope = take(&mut values, RESCALE_SLOPE, HeaderValue::as_f64);
        header.rescale_intercept = take(&mut values, RESCALE_INTERCEPT, HeaderValue::as_f64);

        let mut nuclide = Radiopharmaceutical {
            total_dose: take(&mut values, RADIONUCLIDE_TOTAL_DOSE, HeaderValue::as_f64),
            half_life: take(&mut values, RADIONUCLIDE_HALF_LIFE, HeaderValue::as_f64),
            start_time: take(&mut values, RADIOPHARMACEUTICAL_START_TIME, HeaderValue::as_time),
            start_datetime: take(
                &mut values,
                RADIOPHARMACEUTICAL_START_DATE_TIME,
                HeaderValue::as_datetime,
            ),
        };
        if !nuclide.is_complete() {
            if let Some(seq) = values
                .get(RADIOPHARMACEUTICAL_INFORMATION_SEQUENCE)
                .and_then(HeaderValue::as_sequence)
            {
                self.fill_from_sequence(&mut nuclide, seq, &mut header.fallbacks);
            }
        }
        if !nuclide.is_empty() {
            header.radiopharmaceutical = Some(nuclide);
        }

        header.extra = values;
        header
    }

    /// Complete `nuclide` from the first item of the information sequence.
    fn fill_from_sequence(
        &self,
        nuclide: &mut Radiopharmaceutical,
        seq: &SequenceRef,
        fallbacks: &mut Vec<TypeResolutionError>,
    ) {
        let items = match seq.items() {
            Ok(items) => items,
            Err(e) => {
                debug!("Undecodable sequence {}: {e}", seq.column());
                fallbacks.push(TypeResolutionError::Unparseable {
                    column: seq.column().to_owned(),
                    kind: ValueKind::Sequence,
                    value: seq.raw().to_owned(),
                });
                return;
            }
        };
        let Some(item) = items.first() else {
            return;
        };

        let field = |keyword: &str| -> Option<HeaderValue> {
            let text = match item.get(keyword)? {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Null => return None,
                other => other.to_string(),
            };
            self.interpret(keyword, &Value::Text(text)).ok().flatten()
        };
        if nuclide.total_dose.is_none() {
            nuclide.total_dose = field(RADIONUCLIDE_TOTAL_DOSE).and_then(|v| v.as_f64());
        }
        if nuclide.half_life.is_none() {
            nuclide.half_life = field(RADIONUCLIDE_HALF_LIFE).and_then(|v| v.as_f64());
        }
        if nuclide.start_time.is_none() {
            nuclide.start_time = field(RADIOPHARMACEUTICAL_START_TIME).and_then(|v| v.as_time());
        }
        if nuclide.start_datetime.is_none() {
            nuclide.start_datetime =
                field(RADIOPHARMACEUTICAL_START_DATE_TIME).and_then(|v| v.as_datetime());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::StandardTagDictionary;

    fn text(s: &str) -> Value {
        Value::Text(s.to_owned())
    }

    fn reconstructor() -> HeaderReconstructor<StandardTagDictionary> {
        HeaderReconstructor::new(StandardTagDictionary)
    }

    #[test]
    fn test_interpret_kinds() {
        let r = reconstructor();
        assert_eq!(
            r.interpret("PatientWeight", &text("70.5")).unwrap(),
            Some(HeaderValue::Float(70.5))
        );
        assert_eq!(
            r.interpret("InstanceNumber", &text(" 12 ")).unwrap(),
            Some(HeaderValue::Integer(12))
        );
        assert_eq!(
            r.interpret("ImageOrientationPatient", &text("1\\0\\0\\0\\1\\0"))
                .unwrap(),
            Some(HeaderValue::Floats(vec![1.0, 0.0, 0.0, 0.0, 1.0, 0.0]))
        );
        assert_eq!(
            r.interpret("SeriesDate", &text("20170905")).unwrap(),
            NaiveDate::from_ymd_opt(2017, 9, 5).map(HeaderValue::Date)
        );
        assert_eq!(r.interpret("SliceLocation", &Value::Null).unwrap(), None);
        assert_eq!(r.interpret("SliceLocation", &text("  ")).unwrap(), None);
        assert_eq!(
            r.interpret("Modality", &text("PT ")).unwrap(),
            Some(HeaderValue::String("PT".into()))
        );
    }

    #[test]
    fn test_interpret_unparseable() {
        let err = reconstructor()
            .interpret("SeriesDate", &text("yesterday"))
            .unwrap_err();
        assert!(matches!(
            err,
            TypeResolutionError::Unparseable {
                kind: ValueKind::Date,
                ..
            }
        ));
    }

    #[test]
    fn test_person_name_components() {
        let name = PersonName::new("Doe^John^^Dr");
        assert_eq!(name.family(), Some("Doe"));
        assert_eq!(name.given(), Some("John"));
    }

    #[test]
    fn test_sequence_items() {
        let seq = SequenceRef::new(
            RADIOPHARMACEUTICAL_INFORMATION_SEQUENCE,
            r#"[{"RadionuclideTotalDose": "370000000"}]"#,
        );
        let items = seq.items().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(
            items[0]["RadionuclideTotalDose"],
            serde_json::Value::String("370000000".into())
        );
        assert!(SequenceRef::new("X", "not json").items().is_err());
    }

    #[test]
    fn test_header_defaults() {
        let header = Header::default();
        assert_eq!(header.rescale(), (1.0, 0.0));
        assert!(!header.is_pet());
    }
}
