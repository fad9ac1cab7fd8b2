//! Device report parsing
//!
//! The device prints a free-form, line-oriented report. Parsing is a single
//! forward pass over the trimmed, non-empty lines with a three-state region
//! machine (`Header`, `RightEye`, `LeftEye`). Each line is classified by the
//! first matching rule below, in this order:
//!
//! | # | Rule | Effect |
//! |---|------|--------|
//! | 1 | starts with `ID:` | patient id = rest of line, trimmed |
//! | 2 | whole line is a date/time and no date yet | diagnosis date |
//! | 3 | starts with `OD / Right` | region = `RightEye` |
//! | 4 | starts with `OS / Left` | region = `LeftEye` |
//! | 5 | region is `RightEye`, measurement line | append to right eye |
//! | 6 | region is `LeftEye`, measurement line | append to left eye |
//! | 7 | region is `LeftEye`, starts with `Aurolab` | device name = whole line |
//! | 8 | region is `LeftEye`, starts with `S/N:` | serial = second token |
//! | 9 | anything else | ignored |
//!
//! Prefixes match ASCII case-insensitively. Parsing never fails: lines that
//! fit no rule are dropped and the matching fields stay unset.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use tracing::trace;

use esee_types::{PatientResult, TestResult};

use crate::constants::{markers, AXIS_PLACEHOLDER};

/// Parse a device report into a structured result
pub fn parse_report(text: &str) -> PatientResult {
    let mut parser = ReportParser::new();
    for line in split_lines(text) {
        parser.feed(line);
    }
    parser.finish()
}

/// Split on `\n`, `\r\n` or `\r`, trimming and dropping blank lines
pub fn split_lines(text: &str) -> impl Iterator<Item = &str> {
    text.split(['\n', '\r'])
        .map(str::trim)
        .filter(|line| !line.is_empty())
}

/// Report section the parser is in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Header,
    RightEye,
    LeftEye,
}

/// Classification of one report line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line<'a> {
    PatientId(&'a str),
    DiagDate(NaiveDateTime),
    RightEyeMarker,
    LeftEyeMarker,
    RightEyeTest(TestResult),
    LeftEyeTest(TestResult),
    DeviceName(&'a str),
    SerialNumber(Option<&'a str>),
    Ignored,
}

/// Incremental report parser
#[derive(Debug)]
pub struct ReportParser {
    region: Region,
    result: PatientResult,
}

impl ReportParser {
    pub fn new() -> Self {
        Self {
            region: Region::Header,
            result: PatientResult::default(),
        }
    }

    pub fn region(&self) -> Region {
        self.region
    }

    /// Classify a trimmed line against the current region
    pub fn classify<'a>(&self, line: &'a str) -> Line<'a> {
        if let Some(rest) = strip_prefix_ignore_case(line, markers::PATIENT_ID) {
            return Line::PatientId(rest.trim());
        }

        if self.result.diag_date.is_none() {
            if let Some(date) = parse_date(line) {
                return Line::DiagDate(date);
            }
        }

        if starts_with_ignore_case(line, markers::RIGHT_EYE) {
            return Line::RightEyeMarker;
        }

        if starts_with_ignore_case(line, markers::LEFT_EYE) {
            return Line::LeftEyeMarker;
        }

        match self.region {
            Region::Header => Line::Ignored,
            Region::RightEye if is_measurement_line(line) => parse_measurement(line)
                .map(Line::RightEyeTest)
                .unwrap_or(Line::Ignored),
            Region::LeftEye if is_measurement_line(line) => parse_measurement(line)
                .map(Line::LeftEyeTest)
                .unwrap_or(Line::Ignored),
            Region::LeftEye if starts_with_ignore_case(line, markers::DEVICE_NAME) => {
                Line::DeviceName(line)
            }
            Region::LeftEye if starts_with_ignore_case(line, markers::SERIAL_NUMBER) => {
                Line::SerialNumber(line.split_whitespace().nth(1))
            }
            _ => Line::Ignored,
        }
    }

    /// Apply one line
    pub fn feed(&mut self, line: &str) {
        match self.classify(line) {
            Line::PatientId(id) => self.result.patient_id = Some(id.to_string()),
            Line::DiagDate(date) => self.result.diag_date = Some(date),
            Line::RightEyeMarker => self.region = Region::RightEye,
            Line::LeftEyeMarker => self.region = Region::LeftEye,
            Line::RightEyeTest(test) => self.result.right_eye_results.push(test),
            Line::LeftEyeTest(test) => self.result.left_eye_results.push(test),
            Line::DeviceName(name) => self.result.device_name = Some(name.to_string()),
            Line::SerialNumber(Some(serial)) => {
                self.result.device_serial_number = Some(serial.to_string())
            }
            Line::SerialNumber(None) => trace!("Serial line without value: {:?}", line),
            Line::Ignored => trace!("Ignored report line: {:?}", line),
        }
    }

    pub fn finish(self) -> PatientResult {
        self.result
    }
}

impl Default for ReportParser {
    fn default() -> Self {
        Self::new()
    }
}

/// True for lines that may carry a test inside an eye section
pub fn is_measurement_line(line: &str) -> bool {
    !line.is_empty()
        && ![
            markers::TABLE_HEADER,
            markers::RULE,
            markers::DEVICE_NAME,
            markers::SERIAL_NUMBER,
        ]
        .iter()
        .any(|prefix| starts_with_ignore_case(line, prefix))
}

/// Parse `N SPH CYL AXIS SE` or `N SPH CYL SE`
///
/// The first token must be a positive integer. Values are kept verbatim.
pub fn parse_measurement(line: &str) -> Option<TestResult> {
    let tokens: Vec<&str> = line.split_whitespace().collect();

    let test_number = tokens.first()?;
    if !test_number.parse::<i32>().is_ok_and(|n| n > 0) {
        return None;
    }

    match tokens.as_slice() {
        [number, sphere, cylinder, axis, equivalent] => Some(TestResult {
            test_number: number.to_string(),
            sphere: sphere.to_string(),
            cylinder: cylinder.to_string(),
            axis: axis.to_string(),
            spherical_equivalent: equivalent.to_string(),
        }),
        [number, sphere, cylinder, equivalent] => Some(TestResult {
            test_number: number.to_string(),
            sphere: sphere.to_string(),
            cylinder: cylinder.to_string(),
            axis: AXIS_PLACEHOLDER.to_string(),
            spherical_equivalent: equivalent.to_string(),
        }),
        _ => None,
    }
}

const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d/%m/%Y %I:%M:%S %p",
    "%d/%m/%Y %I:%M %p",
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
    "%d-%m-%Y %I:%M:%S %p",
    "%d-%m-%Y %I:%M %p",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
    "%d-%b-%Y %H:%M:%S",
    "%d-%b-%Y %H:%M",
    "%d %b %Y %H:%M:%S",
    "%d %b %Y %H:%M",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%d-%b-%Y",
    "%d %b %Y",
    "%d %B %Y",
    "%b %d, %Y",
    "%B %d, %Y",
];

/// Parse a line that consists entirely of a date or date/time
///
/// Numeric dates are read day-first.
pub fn parse_date(line: &str) -> Option<NaiveDateTime> {
    if let Ok(stamp) = DateTime::parse_from_rfc3339(line) {
        return Some(stamp.naive_local());
    }

    DATE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(line, format).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(line, format).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

fn starts_with_ignore_case(line: &str, prefix: &str) -> bool {
    strip_prefix_ignore_case(line, prefix).is_some()
}

fn strip_prefix_ignore_case<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let head = line.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        line.get(prefix.len()..)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    const FULL_REPORT: &str = "ID: 12345\n\
        2024-01-15\n\
        OD / Right\n\
        Test  Sphere Cyl Axis SE\n\
        1 +1.00 -0.50 180 +0.75\n\
        OS / Left\n\
        2 -2.00 -1.00 090 -2.50\n\
        Aurolab Device X\n\
        S/N: ABC123";

    fn test(number: &str, sphere: &str, cylinder: &str, axis: &str, se: &str) -> TestResult {
        TestResult {
            test_number: number.into(),
            sphere: sphere.into(),
            cylinder: cylinder.into(),
            axis: axis.into(),
            spherical_equivalent: se.into(),
        }
    }

    fn date(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    #[test]
    fn test_full_report() {
        let result = parse_report(FULL_REPORT);

        let expected = PatientResult {
            patient_id: Some("12345".into()),
            diag_date: Some(date(2024, 1, 15, 0, 0, 0)),
            right_eye_results: vec![test("1", "+1.00", "-0.50", "180", "+0.75")],
            left_eye_results: vec![test("2", "-2.00", "-1.00", "090", "-2.50")],
            device_name: Some("Aurolab Device X".into()),
            device_serial_number: Some("ABC123".into()),
        };

        assert_eq!(result, expected);
    }

    #[test]
    fn test_four_token_line_uses_axis_placeholder() {
        let result = parse_report("OD / Right\n3 +0.50 -0.25 +0.38");

        assert_eq!(
            result.right_eye_results,
            vec![test("3", "+0.50", "-0.25", "--", "+0.38")]
        );
    }

    #[test]
    fn test_garbage_yields_empty_result() {
        let result = parse_report("hello world\nnothing to see here\n42\n???");
        assert!(result.is_empty());
        assert_eq!(result, PatientResult::default());
    }

    #[test]
    fn test_empty_input() {
        assert!(parse_report("").is_empty());
        assert!(parse_report("\r\n\r\n   \n").is_empty());
    }

    #[test]
    fn test_line_endings_parse_identically() {
        let lf = parse_report(FULL_REPORT);
        let crlf = parse_report(&FULL_REPORT.replace('\n', "\r\n"));
        let cr = parse_report(&FULL_REPORT.replace('\n', "\r"));

        assert_eq!(lf, crlf);
        assert_eq!(lf, cr);
    }

    #[test]
    fn test_multiple_tests_keep_order() {
        let report = "OD / Right\n\
            3 +1.00 -0.50 180 +0.75\n\
            1 +1.25 -0.50 175 +1.00\n\
            2 +1.00 -0.75 +0.63\n\
            OS / Left\n\
            5 -2.00 -1.00 090 -2.50\n\
            4 -2.25 -1.00 085 -2.75";
        let result = parse_report(report);

        let right: Vec<&str> = result
            .right_eye_results
            .iter()
            .map(|t| t.test_number.as_str())
            .collect();
        let left: Vec<&str> = result
            .left_eye_results
            .iter()
            .map(|t| t.test_number.as_str())
            .collect();

        assert_eq!(right, vec!["3", "1", "2"]);
        assert_eq!(left, vec!["5", "4"]);
    }

    #[test]
    fn test_markers_are_case_insensitive() {
        let report = "id: 77\nod / right\n1 +1.00 -0.50 180 +0.75\nos / LEFT\naurolab e-see\ns/n: XY9";
        let result = parse_report(report);

        assert_eq!(result.patient_id.as_deref(), Some("77"));
        assert_eq!(result.right_eye_results.len(), 1);
        assert_eq!(result.device_name.as_deref(), Some("aurolab e-see"));
        assert_eq!(result.device_serial_number.as_deref(), Some("XY9"));
    }

    #[test]
    fn test_rejected_measurement_lines() {
        let report = "OD / Right\n\
            0 +1.00 -0.50 180 +0.75\n\
            -1 +1.00 -0.50 180 +0.75\n\
            x +1.00 -0.50 180 +0.75\n\
            1 +1.00 -0.50\n\
            1 +1.00 -0.50 180 +0.75 extra\n\
            ------------------------\n\
            Test Sph Cyl Ax SE";
        let result = parse_report(report);

        assert!(result.right_eye_results.is_empty());
    }

    #[test]
    fn test_tabs_separate_tokens() {
        let result = parse_report("OS / Left\n1\t-1.00\t-0.25\t010\t-1.13");
        assert_eq!(
            result.left_eye_results,
            vec![test("1", "-1.00", "-0.25", "010", "-1.13")]
        );
    }

    #[test]
    fn test_measurements_outside_eye_regions_ignored() {
        let result = parse_report("1 +1.00 -0.50 180 +0.75\nID: 5");
        assert!(result.right_eye_results.is_empty());
        assert!(result.left_eye_results.is_empty());
        assert_eq!(result.patient_id.as_deref(), Some("5"));
    }

    #[test]
    fn test_device_metadata_only_in_left_region() {
        let report = "OD / Right\nAurolab Device X\nS/N: ABC123";
        let result = parse_report(report);

        assert_eq!(result.device_name, None);
        assert_eq!(result.device_serial_number, None);
    }

    #[test]
    fn test_serial_without_value_stays_unset() {
        let result = parse_report("OS / Left\nS/N:");
        assert_eq!(result.device_serial_number, None);

        let result = parse_report("OS / Left\nS/N:ABC123");
        assert_eq!(result.device_serial_number, None);
    }

    #[test]
    fn test_first_date_wins() {
        let result = parse_report("15/01/2024 10:30\n2023-12-01");
        assert_eq!(result.diag_date, Some(date(2024, 1, 15, 10, 30, 0)));
    }

    #[test]
    fn test_region_switches_back_and_forth() {
        let report = "OS / Left\n\
            1 -1.00 -0.50 090 -1.25\n\
            OD / Right\n\
            2 +1.00 -0.50 180 +0.75\n\
            OS / Left\n\
            3 -1.25 -0.50 090 -1.50";
        let result = parse_report(report);

        assert_eq!(result.right_eye_results.len(), 1);
        assert_eq!(result.left_eye_results.len(), 2);
    }

    #[test]
    fn test_unrecognized_lines_keep_region() {
        let report = "OD / Right\n\
            Avg\n\
            ========\n\
            1 +1.00 -0.50 180 +0.75";
        let result = parse_report(report);
        assert_eq!(result.right_eye_results.len(), 1);
    }

    #[test]
    fn test_id_line_trims_remainder() {
        let result = parse_report("ID:    A-0042   ");
        assert_eq!(result.patient_id.as_deref(), Some("A-0042"));
    }

    #[test]
    fn test_classify_follows_region() {
        let mut parser = ReportParser::new();
        assert_eq!(parser.classify("1 +1.00 -0.50 180 +0.75"), Line::Ignored);

        parser.feed("OD / Right");
        assert_eq!(parser.region(), Region::RightEye);
        assert!(matches!(
            parser.classify("1 +1.00 -0.50 180 +0.75"),
            Line::RightEyeTest(_)
        ));

        parser.feed("OS / Left");
        assert_eq!(parser.region(), Region::LeftEye);
        assert_eq!(parser.classify("Aurolab X"), Line::DeviceName("Aurolab X"));
    }

    #[test]
    fn test_parse_date_formats() {
        assert_eq!(parse_date("2024-01-15"), Some(date(2024, 1, 15, 0, 0, 0)));
        assert_eq!(
            parse_date("2024-01-15 09:41:07"),
            Some(date(2024, 1, 15, 9, 41, 7))
        );
        assert_eq!(parse_date("15/01/2024"), Some(date(2024, 1, 15, 0, 0, 0)));
        assert_eq!(
            parse_date("15-01-2024 02:05 PM"),
            Some(date(2024, 1, 15, 14, 5, 0))
        );
        assert_eq!(parse_date("15-Jan-2024"), Some(date(2024, 1, 15, 0, 0, 0)));
        assert_eq!(
            parse_date("2024-01-15T08:00:00+05:30"),
            Some(date(2024, 1, 15, 8, 0, 0))
        );
        assert_eq!(parse_date("OD / Right"), None);
        assert_eq!(parse_date("1 +1.00 -0.50 180 +0.75"), None);
        assert_eq!(parse_date("2024"), None);
    }

    #[test]
    fn test_is_measurement_line() {
        assert!(is_measurement_line("1 +1.00 -0.50 180 +0.75"));
        assert!(!is_measurement_line(""));
        assert!(!is_measurement_line("TEST Sph"));
        assert!(!is_measurement_line("-----"));
        assert!(!is_measurement_line("AUROLAB"));
        assert!(!is_measurement_line("s/n: 1"));
    }

    proptest! {
        #[test]
        fn prop_parse_never_panics(text in "\\PC*") {
            let _ = parse_report(&text);
        }

        #[test]
        fn prop_line_endings_independent(
            lines in prop::collection::vec("[ -~]{0,24}", 0..12)
        ) {
            let lf = parse_report(&lines.join("\n"));
            let crlf = parse_report(&lines.join("\r\n"));
            let cr = parse_report(&lines.join("\r"));

            prop_assert_eq!(&lf, &crlf);
            prop_assert_eq!(&lf, &cr);
        }

        #[test]
        fn prop_measurements_preserved_verbatim(
            number in 1u32..100,
            sphere in "[+-][0-9]\\.[0-9]{2}",
            cylinder in "[+-][0-9]\\.[0-9]{2}",
            axis in "[0-9]{3}",
            se in "[+-][0-9]\\.[0-9]{2}",
        ) {
            let report = format!("OD / Right\n{} {} {} {} {}", number, sphere, cylinder, axis, se);
            let result = parse_report(&report);

            prop_assert_eq!(result.right_eye_results.len(), 1);
            let parsed = &result.right_eye_results[0];
            prop_assert_eq!(&parsed.test_number, &number.to_string());
            prop_assert_eq!(&parsed.sphere, &sphere);
            prop_assert_eq!(&parsed.cylinder, &cylinder);
            prop_assert_eq!(&parsed.axis, &axis);
            prop_assert_eq!(&parsed.spherical_equivalent, &se);
        }
    }
}
