// SPDX-FileCopyrightText: 2025 dicomstore contributors
// SPDX-License-Identifier: MIT

use std::io::Write;
use std::path::PathBuf;

use dicomstore_db::{MetadataDb, Query, Row, Value};
use dicomstore_series::{
    DicomPixelReader, Header, HeaderReconstructor, HeaderValue, PixelReader, SeriesReader,
    StandardTagDictionary, import_file, scale_factor,
};
use log::info;

use crate::cli::Command;
use crate::config::Config;
use crate::error::{IoContext, Result};

fn json_value(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Integer(i) => (*i).into(),
        Value::Real(f) => (*f).into(),
        Value::Text(s) => s.as_str().into(),
        Value::Blob(b) => String::from_utf8_lossy(b).into_owned().into(),
    }
}

fn row_json(row: &Row) -> serde_json::Value {
    serde_json::Value::Object(
        row.iter()
            .map(|(column, value)| (column.to_owned(), json_value(value)))
            .collect(),
    )
}

fn render(value: &HeaderValue) -> String {
    match value {
        HeaderValue::String(s) => s.clone(),
        HeaderValue::PersonName(name) => name.as_str().to_owned(),
        HeaderValue::Date(d) => d.to_string(),
        HeaderValue::DateTime(dt) => dt.to_string(),
        HeaderValue::Time(t) => t.to_string(),
        HeaderValue::Float(f) => f.to_string(),
        HeaderValue::Integer(i) => i.to_string(),
        HeaderValue::Floats(values) => {
            let parts: Vec<String> = values.iter().map(f64::to_string).collect();
            parts.join("\\")
        }
        HeaderValue::Integers(values) => {
            let parts: Vec<String> = values.iter().map(i64::to_string).collect();
            parts.join("\\")
        }
        HeaderValue::Sequence(seq) => match seq.items() {
            Ok(items) => format!("<sequence of {} item(s)>", items.len()),
            Err(_) => "<undecodable sequence>".to_owned(),
        },
    }
}

fn write_header(out: &mut impl Write, header: &Header) -> std::io::Result<()> {
    let mut field = |name: &str, value: Option<String>| -> std::io::Result<()> {
        match value {
            Some(value) => writeln!(out, "{name:<34}{value}"),
            None => Ok(()),
        }
    };
    let text = |s: &Option<String>| s.clone();
    field("id", header.id.map(|id| id.to_string()))?;
    field("FileName", text(&header.file_name))?;
    field("PatientID", text(&header.patient_id))?;
    field(
        "PatientName",
        header.patient_name.as_ref().map(|n| n.as_str().to_owned()),
    )?;
    field("PatientWeight", header.patient_weight.map(|w| w.to_string()))?;
    field("StudyInstanceUID", text(&header.study_instance_uid))?;
    field("SeriesInstanceUID", text(&header.series_instance_uid))?;
    field("SOPInstanceUID", text(&header.sop_instance_uid))?;
    field("SOPClassUID", text(&header.sop_class_uid))?;
    field("Modality", text(&header.modality))?;
    field("SeriesDate", header.series_date.map(|d| d.to_string()))?;
    field("SeriesTime", header.series_time.map(|t| t.to_string()))?;
    field("SliceLocation", header.slice_location.map(|v| v.to_string()))?;
    field("InstanceNumber", header.instance_number.map(|v| v.to_string()))?;
    field(
        "AcquisitionNumber",
        header.acquisition_number.map(|v| v.to_string()),
    )?;
    field("RescaleSlope", header.rescale_slope.map(|v| v.to_string()))?;
    field(
        "RescaleIntercept",
        header.rescale_intercept.map(|v| v.to_string()),
    )?;
    if let Some(nuclide) = &header.radiopharmaceutical {
        field(
            "RadionuclideTotalDose",
            nuclide.total_dose.map(|v| v.to_string()),
        )?;
        field(
            "RadionuclideHalfLife",
            nuclide.half_life.map(|v| v.to_string()),
        )?;
        field(
            "RadiopharmaceuticalStartTime",
            nuclide.start_time.map(|v| v.to_string()),
        )?;
        field(
            "RadiopharmaceuticalStartDateTime",
            nuclide.start_datetime.map(|v| v.to_string()),
        )?;
    }
    for (keyword, value) in &header.extra {
        field(keyword.as_str(), Some(render(value)))?;
    }
    for fallback in &header.fallbacks {
        writeln!(out, "# {fallback}")?;
    }
    Ok(())
}

fn import(config: &Config, db: &mut MetadataDb, files: &[PathBuf]) -> Result<Vec<i64>> {
    let mut ids = Vec::with_capacity(files.len());
    for path in files {
        let id = import_file(db, &config.table, path)?;
        info!("Imported {} as row {id}", path.display());
        ids.push(id);
    }
    Ok(ids)
}

/// Run `command` against the configured store, writing results to `out`.
pub fn run<R: PixelReader>(
    config: &Config,
    command: Command,
    pixels: R,
    out: &mut impl Write,
) -> Result<()> {
    let mut db = MetadataDb::with_options(config.location(), config.store_options());
    let result = run_with_db(config, command, pixels, &mut db, out);
    db.close()?;
    result
}

fn run_with_db<R: PixelReader>(
    config: &Config,
    command: Command,
    pixels: R,
    db: &mut MetadataDb,
    out: &mut impl Write,
) -> Result<()> {
    let write_error = || "Failed to write output".to_owned();
    match command {
        Command::Import { files } => {
            let ids = import(config, db, &files)?;
            writeln!(out, "imported {} file(s)", ids.len()).io_context(write_error)?;
        }
        Command::Query {
            partial,
            sort,
            filters,
        } => {
            let mut query = Query::new(config.table.as_str()).partial_match(partial);
            for (column, value) in filters {
                query = query.filter(column, value);
            }
            if let Some(column) = sort {
                query = query.sort_by(column);
            }
            for row in db.query(&query)? {
                writeln!(out, "{}", row_json(&row)).io_context(write_error)?;
            }
        }
        Command::Header { id } => {
            let header = HeaderReconstructor::new(StandardTagDictionary)
                .header_for_id(db, &config.table, id)?;
            write_header(out, &header).io_context(write_error)?;
        }
        Command::Suv { uid } => {
            let mut reader = SeriesReader::new(
                db,
                config.table.as_str(),
                StandardTagDictionary,
                pixels,
                config.read_options(),
            );
            let selection = reader.select(&uid)?;
            let factor = scale_factor(&selection.header)?;
            writeln!(out, "{factor:.6}").io_context(write_error)?;
        }
        Command::Read { uid } => {
            let mut reader = SeriesReader::new(
                db,
                config.table.as_str(),
                StandardTagDictionary,
                pixels,
                config.read_options(),
            );
            let image = reader.read_series(&uid)?;
            let (min, max) = image
                .grid
                .samples
                .iter()
                .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &s| {
                    (lo.min(s), hi.max(s))
                });
            writeln!(
                out,
                "{uid}: {} file(s), {} frame(s) of {}x{}, range [{min}, {max}], scale factor {}{}",
                image.files.len(),
                image.grid.frames,
                image.grid.rows,
                image.grid.columns,
                image
                    .scale_factor
                    .map_or_else(|| "none".to_owned(), |f| format!("{f:.6}")),
                if image.scaled { " (applied)" } else { "" },
            )
            .io_context(write_error)?;
        }
        Command::Series => {
            let mut reader = SeriesReader::new(
                db,
                config.table.as_str(),
                StandardTagDictionary,
                pixels,
                config.read_options(),
            );
            for uid in reader.series_uids()? {
                writeln!(out, "{uid}").io_context(write_error)?;
            }
        }
    }
    Ok(())
}

/// [`run`] with the real pixel decoder.
pub fn run_default(config: &Config, command: Command, out: &mut impl Write) -> Result<()> {
    run(config, command, DicomPixelReader, out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CliError;
    use dicomstore_utils_test::{FakePixelReader, PetSlice, TempStore, pet_series};

    const UID: &str = "1.2.840.99.5";

    fn config(store: &TempStore) -> Config {
        Config {
            database: store.path().to_string_lossy().into_owned(),
            ..Config::default()
        }
    }

    fn output(config: &Config, command: Command) -> Result<String> {
        let mut out = Vec::new();
        run(config, command, FakePixelReader::new(2, 2, 1.0), &mut out)?;
        Ok(String::from_utf8(out).unwrap())
    }

    fn seeded() -> (TempStore, Config) {
        let store = TempStore::new().unwrap();
        let mut rows = pet_series(UID, 3);
        rows.push(
            PetSlice::new("1.2.840.99.6", 0)
                .set("Modality", "CT".to_owned())
                .build(),
        );
        store.seeded(rows).close().unwrap();
        let config = config(&store);
        (store, config)
    }

    #[test]
    fn test_query_prints_json_rows() {
        let (_store, config) = seeded();
        let out = output(
            &config,
            Command::Query {
                partial: false,
                sort: Some("SliceLocation".into()),
                filters: vec![("SeriesInstanceUID".into(), UID.into())],
            },
        )
        .unwrap();
        let rows: Vec<serde_json::Value> = out
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0]["id"], 1);
        assert_eq!(rows[0]["PatientID"], "P1");

        let out = output(
            &config,
            Command::Query {
                partial: true,
                sort: None,
                filters: vec![("Modality".into(), "C".into())],
            },
        )
        .unwrap();
        assert_eq!(out.lines().count(), 1);
    }

    #[test]
    fn test_header_and_suv() {
        let (_store, config) = seeded();
        let out = output(&config, Command::Header { id: 1 }).unwrap();
        assert!(out.contains("PatientWeight"));
        assert!(out.lines().any(|l| l.starts_with("SeriesDate") && l.ends_with("2017-09-05")));

        let out = output(&config, Command::Suv { uid: UID.into() }).unwrap();
        let factor: f64 = out.trim().parse().unwrap();
        assert!((factor - 204.4915).abs() < 1e-2);
    }

    #[test]
    fn test_read_and_series() {
        let (_store, config) = seeded();
        let out = output(&config, Command::Series).unwrap();
        assert_eq!(out.lines().collect::<Vec<_>>(), vec![UID, "1.2.840.99.6"]);

        let out = output(&config, Command::Read { uid: UID.into() }).unwrap();
        assert!(out.starts_with(&format!("{UID}: 3 file(s), 3 frame(s) of 2x2")));
        assert!(out.trim_end().ends_with("(applied)"));
    }

    #[test]
    fn test_missing_row_is_an_error() {
        let (_store, config) = seeded();
        let err = output(&config, Command::Header { id: 99 }).unwrap_err();
        assert!(matches!(
            err,
            CliError::Series(dicomstore_series::Error::NotFound { id: 99, .. })
        ));
    }

    #[test]
    fn test_import_rejects_non_dicom() {
        let store = TempStore::new().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "not dicom").unwrap();

        let err = output(&config(&store), Command::Import { files: vec![path] }).unwrap_err();
        assert!(matches!(
            err,
            CliError::Series(dicomstore_series::Error::Import { .. })
        ));
    }
}
