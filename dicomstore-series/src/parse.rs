// SPDX-FileCopyrightText: 2025 dicomstore contributors
// SPDX-License-Identifier: MIT

//! Parsing of stored DA, TM and DT text.
//!
//! Accepts both the compact DICOM encodings (`20170905`, `101530.25`,
//! `20170905101530+0200`) and ISO-like forms (`2017-09-05`, `10:15:30`,
//! `2017-09-05T10:15:30`). UTC offsets are dropped: all arithmetic is done on
//! naive local times, as stored by the scanner.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

fn all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let s = text.trim();
    if s.len() == 8 && all_digits(s) {
        return NaiveDate::parse_from_str(s, "%Y%m%d").ok();
    }
    // date prefix of an ISO datetime
    let s = match s.get(..10) {
        Some(prefix) if s.len() > 10 && matches!(s.as_bytes()[10], b'T' | b' ') => prefix,
        _ => s,
    };
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        // ACR-NEMA style
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y.%m.%d"))
        .ok()
}

pub fn parse_time(text: &str) -> Option<NaiveTime> {
    let s = text.trim();
    if s.contains(':') {
        return ["%H:%M:%S%.f", "%H:%M"]
            .iter()
            .find_map(|fmt| NaiveTime::parse_from_str(s, fmt).ok());
    }

    let (whole, fraction) = match s.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (s, None),
    };
    if !all_digits(whole) || !matches!(whole.len(), 2 | 4 | 6) {
        return None;
    }
    let field = |range: std::ops::Range<usize>| -> Option<u32> {
        whole.get(range).map_or(Some(0), |d| d.parse().ok())
    };
    let hour = field(0..2)?;
    let minute = field(2..4)?;
    let second = field(4..6)?;
    let nanos = match fraction {
        None | Some("") => 0,
        Some(f) if all_digits(f) => {
            let digits: String = f.chars().chain(std::iter::repeat('0')).take(9).collect();
            digits.parse().ok()?
        }
        Some(_) => return None,
    };
    NaiveTime::from_hms_nano_opt(hour, minute, second, nanos)
}

/// Strip a trailing `Z` or `±hhmm` / `±hh:mm` offset.
fn strip_offset(s: &str) -> &str {
    if let Some(rest) = s.strip_suffix('Z') {
        return rest;
    }
    match s.rfind(['+', '-']) {
        Some(pos) => &s[..pos],
        None => s,
    }
}

pub fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    let s = text.trim();
    let iso = s.len() >= 10 && s.as_bytes()[4] == b'-';
    if iso {
        let date = parse_date(s.get(..10)?)?;
        let rest = s[10..].trim_start_matches(['T', ' ']);
        if rest.is_empty() {
            return date.and_hms_opt(0, 0, 0);
        }
        return Some(date.and_time(parse_time(strip_offset(rest))?));
    }

    let date = parse_date(s.get(..8).filter(|d| all_digits(d))?)?;
    let rest = strip_offset(&s[8..]);
    if rest.is_empty() {
        return date.and_hms_opt(0, 0, 0);
    }
    Some(date.and_time(parse_time(rest)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn time(h: u32, m: u32, s: u32, micro: u32) -> NaiveTime {
        NaiveTime::from_hms_micro_opt(h, m, s, micro).unwrap()
    }

    #[rstest]
    #[case("20170905")]
    #[case("2017-09-05")]
    #[case("2017.09.05")]
    #[case(" 20170905 ")]
    #[case("2017-09-05 10:15:00")]
    fn test_parse_date(#[case] text: &str) {
        assert_eq!(parse_date(text), NaiveDate::from_ymd_opt(2017, 9, 5));
    }

    #[rstest]
    #[case("101530", time(10, 15, 30, 0))]
    #[case("101530.25", time(10, 15, 30, 250_000))]
    #[case("101530.000001", time(10, 15, 30, 1))]
    #[case("1015", time(10, 15, 0, 0))]
    #[case("10", time(10, 0, 0, 0))]
    #[case("10:15:30", time(10, 15, 30, 0))]
    #[case("10:15:30.5", time(10, 15, 30, 500_000))]
    #[case("10:15", time(10, 15, 0, 0))]
    fn test_parse_time(#[case] text: &str, #[case] expected: NaiveTime) {
        assert_eq!(parse_time(text), Some(expected));
    }

    #[rstest]
    #[case("")]
    #[case("1")]
    #[case("10153")]
    #[case("251530")]
    #[case("10x530")]
    #[case("101530.2x")]
    fn test_parse_time_invalid(#[case] text: &str) {
        assert_eq!(parse_time(text), None);
    }

    #[rstest]
    #[case("20170905101530")]
    #[case("20170905101530+0200")]
    #[case("20170905101530-0500")]
    #[case("2017-09-05T10:15:30")]
    #[case("2017-09-05 10:15:30")]
    #[case("2017-09-05T10:15:30Z")]
    #[case("2017-09-05T10:15:30+02:00")]
    fn test_parse_datetime(#[case] text: &str) {
        let expected = NaiveDate::from_ymd_opt(2017, 9, 5)
            .unwrap()
            .and_hms_opt(10, 15, 30)
            .unwrap();
        assert_eq!(parse_datetime(text), Some(expected));
    }

    #[test]
    fn test_parse_datetime_date_only() {
        let expected = NaiveDate::from_ymd_opt(2017, 9, 5)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(parse_datetime("20170905"), Some(expected));
        assert_eq!(parse_datetime("2017-09-05"), Some(expected));
        assert_eq!(parse_datetime("2017"), None);
    }
}
