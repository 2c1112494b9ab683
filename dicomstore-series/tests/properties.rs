// SPDX-FileCopyrightText: 2025 dicomstore contributors
// SPDX-License-Identifier: MIT

//! Property tests for series ordering and SUV scaling.

use chrono::{NaiveDate, NaiveTime, TimeDelta};
use dicomstore_db::Query;
use dicomstore_series::keywords::SLICE_LOCATION;
use dicomstore_series::{
    Header, Radiopharmaceutical, SeriesResolver, StandardTagDictionary, scale_factor,
};
use dicomstore_utils_test::{TABLE, arb_shuffled_series, seeded_db};
use proptest::prelude::*;

fn pet_header(dose: f64, weight: f64, half_life: f64, minutes: u32) -> Header {
    Header {
        patient_weight: Some(weight),
        series_date: NaiveDate::from_ymd_opt(2017, 9, 5),
        series_time: NaiveTime::from_hms_opt(12, 0, 0),
        radiopharmaceutical: Some(Radiopharmaceutical {
            total_dose: Some(dose),
            half_life: Some(half_life),
            start_time: NaiveTime::from_hms_opt(12, 0, 0)
                .map(|t| t - TimeDelta::minutes(i64::from(minutes))),
            start_datetime: None,
        }),
        ..Header::default()
    }
}

proptest! {
    #[test]
    fn resolved_files_follow_slice_location(rows in arb_shuffled_series()) {
        let count = rows.len();
        let mut db = seeded_db(rows);
        let rows = db.query(&Query::new(TABLE)).unwrap();

        let selection = SeriesResolver::new(StandardTagDictionary).resolve(&rows).unwrap();
        prop_assert_eq!(selection.files.len(), count);

        let location_of = |file: &std::path::PathBuf| -> f64 {
            let row = rows
                .iter()
                .find(|r| r.text("FileName").map(std::path::Path::new) == Some(file.as_path()))
                .unwrap();
            row.text(SLICE_LOCATION).unwrap().parse().unwrap()
        };
        let locations: Vec<f64> = selection.files.iter().map(location_of).collect();
        prop_assert!(locations.windows(2).all(|w| w[0] <= w[1]), "{:?}", locations);
    }

    #[test]
    fn suv_is_inverse_in_dose_and_direct_in_weight(
        dose in 1.0e6f64..1.0e9,
        weight in 20.0f64..150.0,
        half_life in 100.0f64..10000.0,
        minutes in 0u32..180,
        k in 1.5f64..4.0,
    ) {
        let base = scale_factor(&pet_header(dose, weight, half_life, minutes)).unwrap();
        let more_dose = scale_factor(&pet_header(dose * k, weight, half_life, minutes)).unwrap();
        let more_weight = scale_factor(&pet_header(dose, weight * k, half_life, minutes)).unwrap();

        prop_assert!(base > 0.0);
        prop_assert!((more_dose * k - base).abs() <= base * 1e-9);
        prop_assert!((more_weight - base * k).abs() <= base * k * 1e-9);
    }
}
