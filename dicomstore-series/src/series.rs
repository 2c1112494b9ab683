// SPDX-FileCopyrightText: 2025 dicomstore contributors
// SPDX-License-Identifier: MIT

//! Resolution of a row set into one ordered series of files.

use std::collections::BTreeSet;
use std::path::PathBuf;

use dicomstore_db::{Row, Value, value_to_text};
use tracing::debug;

use crate::dictionary::TagDictionary;
use crate::error::{Error, Result};
use crate::header::{Header, HeaderReconstructor};
use crate::keywords::{FILE_NAME, INSTANCE_NUMBER, SERIES_INSTANCE_UID, SLICE_LOCATION};

/// Default slice ordering keys, most preferred first.
pub fn default_sort_preference() -> Vec<String> {
    vec![SLICE_LOCATION.to_owned(), INSTANCE_NUMBER.to_owned()]
}

/// An ordered, single-series file list.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesSelection {
    pub series_uid: Option<String>,
    pub files: Vec<PathBuf>,
    /// Key the files were ordered by; `None` for a single file
    pub sort_key: Option<String>,
    /// Header of the first file in order
    pub header: Header,
}

#[derive(Debug, Clone)]
pub struct SeriesResolver<D> {
    reconstructor: HeaderReconstructor<D>,
    sort_preference: Vec<String>,
    folder: Option<PathBuf>,
}

enum SortKey {
    Numeric(Vec<f64>),
    Lexical(Vec<String>),
}

/// Finite numeric reading of a value; `NaN` and infinities count as text.
fn numeric(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Integer(i) => Some(*i as f64),
        Value::Real(f) => Some(*f),
        Value::Text(s) => s.trim().parse().ok(),
        _ => None,
    };
    number.filter(|n: &f64| n.is_finite())
}

/// Values of `key` for every row, if none is missing.
fn sort_values(rows: &[Row], key: &str) -> Option<SortKey> {
    let values: Vec<&Value> = rows
        .iter()
        .map(|row| row.get(key).filter(|v| !matches!(v, Value::Null)))
        .collect::<Option<_>>()?;
    if let Some(numbers) = values.iter().map(|v| numeric(v)).collect::<Option<Vec<_>>>() {
        return Some(SortKey::Numeric(numbers));
    }
    values
        .iter()
        .map(|v| value_to_text(v))
        .collect::<Option<Vec<_>>>()
        .map(SortKey::Lexical)
}

impl<D: TagDictionary> SeriesResolver<D> {
    pub fn new(dictionary: D) -> Self {
        Self {
            reconstructor: HeaderReconstructor::new(dictionary),
            sort_preference: default_sort_preference(),
            folder: None,
        }
    }

    pub fn sort_preference<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sort_preference = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Base folder file references are relative to.
    pub fn folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.folder = Some(folder.into());
        self
    }

    pub fn reconstructor(&self) -> &HeaderReconstructor<D> {
        &self.reconstructor
    }

    pub fn resolve(&self, rows: &[Row]) -> Result<SeriesSelection> {
        let first = rows.first().ok_or(Error::EmptySeries)?;

        let uids: BTreeSet<Option<&str>> = rows
            .iter()
            .map(|row| row.text(SERIES_INSTANCE_UID))
            .collect();
        if uids.len() > 1 {
            return Err(Error::AmbiguousSeries {
                uids: uids.into_iter().map(|u| u.map(str::to_owned)).collect(),
            });
        }

        let mut order: Vec<usize> = (0..rows.len()).collect();
        let mut sort_key = None;
        if rows.len() > 1 {
            let (key, values) = self
                .sort_preference
                .iter()
                .find_map(|key| sort_values(rows, key).map(|values| (key, values)))
                .ok_or_else(|| Error::UnsortableSeries {
                    tried: self.sort_preference.clone(),
                    count: rows.len(),
                })?;
            match values {
                SortKey::Numeric(v) => order.sort_by(|&a, &b| v[a].total_cmp(&v[b])),
                SortKey::Lexical(v) => order.sort_by(|&a, &b| v[a].cmp(&v[b])),
            }
            debug!("Ordered {} slices by {key}", rows.len());
            sort_key = Some(key.clone());
        }

        let files = order
            .iter()
            .map(|&i| self.file_path(&rows[i]))
            .collect::<Result<Vec<_>>>()?;
        let head = order.first().map_or(first, |&i| &rows[i]);

        Ok(SeriesSelection {
            series_uid: first.text(SERIES_INSTANCE_UID).map(str::to_owned),
            files,
            sort_key,
            header: self.reconstructor.from_row(head),
        })
    }

    fn file_path(&self, row: &Row) -> Result<PathBuf> {
        let name = row
            .text(FILE_NAME)
            .filter(|name| !name.is_empty())
            .ok_or(Error::MissingFileReference { id: row.id() })?;
        Ok(match &self.folder {
            Some(folder) => folder.join(name),
            None => PathBuf::from(name),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::StandardTagDictionary;

    fn row(id: i64, uid: Option<&str>, file: &str, location: Option<&str>) -> Row {
        let mut row = Row::new();
        row.push("id", id);
        row.push(SERIES_INSTANCE_UID, uid);
        row.push(FILE_NAME, file);
        row.push(SLICE_LOCATION, location);
        row
    }

    #[test]
    fn test_numeric_not_lexical_order() {
        let rows = vec![
            row(1, Some("1.2"), "a.dcm", Some("10")),
            row(2, Some("1.2"), "b.dcm", Some("-2.5")),
            row(3, Some("1.2"), "c.dcm", Some("9")),
        ];
        let selection = SeriesResolver::new(StandardTagDictionary)
            .resolve(&rows)
            .unwrap();
        assert_eq!(
            selection.files,
            vec![
                PathBuf::from("b.dcm"),
                PathBuf::from("c.dcm"),
                PathBuf::from("a.dcm")
            ]
        );
        assert_eq!(selection.sort_key.as_deref(), Some(SLICE_LOCATION));
        assert_eq!(selection.header.id, Some(2));
    }

    #[test]
    fn test_non_finite_locations_sort_as_text() {
        let rows = vec![
            row(1, Some("1.2"), "a.dcm", Some("2")),
            row(2, Some("1.2"), "b.dcm", Some("NaN")),
            row(3, Some("1.2"), "c.dcm", Some("10")),
        ];
        let selection = SeriesResolver::new(StandardTagDictionary)
            .resolve(&rows)
            .unwrap();
        assert_eq!(
            selection.files,
            vec![
                PathBuf::from("c.dcm"),
                PathBuf::from("a.dcm"),
                PathBuf::from("b.dcm")
            ]
        );

        let rows: Vec<Row> = (0..40)
            .map(|i| {
                let location = if i % 3 == 0 {
                    "NaN".to_owned()
                } else {
                    (40 - i).to_string()
                };
                row(i, Some("1.2"), &format!("{location}/{i}.dcm"), Some(location.as_str()))
            })
            .collect();
        let selection = SeriesResolver::new(StandardTagDictionary)
            .resolve(&rows)
            .unwrap();
        let keys: Vec<String> = selection
            .files
            .iter()
            .filter_map(|f| f.parent().map(|p| p.display().to_string()))
            .collect();
        assert_eq!(keys.len(), 40);
        assert!(keys.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_missing_uid_counts_as_distinct() {
        let rows = vec![
            row(1, Some("1.2"), "a.dcm", Some("1")),
            row(2, None, "b.dcm", Some("2")),
        ];
        let err = SeriesResolver::new(StandardTagDictionary)
            .resolve(&rows)
            .unwrap_err();
        match err {
            Error::AmbiguousSeries { uids } => {
                assert_eq!(uids, vec![None, Some("1.2".to_owned())])
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_folder_join() {
        let rows = vec![row(1, Some("1.2"), "a.dcm", None)];
        let selection = SeriesResolver::new(StandardTagDictionary)
            .folder("/data/pet")
            .resolve(&rows)
            .unwrap();
        assert_eq!(selection.files, vec![PathBuf::from("/data/pet/a.dcm")]);
        assert_eq!(selection.sort_key, None);
    }
}
