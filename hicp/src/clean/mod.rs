//! Cleaning of raw sheet cells.
//!
//! Turns [`RawObservation`]s into [`CleanObservation`]s:
//!
//! - Row labels are resolved to EU27 codes; other rows (aggregates, footnotes,
//!   non-members) are dropped.
//! - Period headers are parsed to [`YearMonth`]; unparsable columns are dropped.
//! - Cells become [`Value`]: Eurostat placeholders (`:`, `d`) and stray text
//!   are `Missing`, never a parse artifact.
//!
//! Nothing here aborts: every drop or coercion is counted in a [`CleanReport`].

use chrono::{Days, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::config::countries::{eu27, CountrySet};
use crate::models::{Cell, CleanObservation, RawObservation, Value, YearMonth};

/// Distinct labels kept per issue kind for diagnostics.
const MAX_SAMPLES: usize = 5;

/// Numbers optionally followed by Eurostat flag letters, e.g. `105.3 p`.
static FLAGGED_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([+-]?\d+(?:[.,]\d+)?(?:[eE][+-]?\d+)?)\s*[bcdefnpsuz]*$").expect("valid regex")
});

/// Recoverable issues met while cleaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Row label is not an EU27 member (record dropped).
    UnknownCountry,
    /// Column header is not a period (record dropped).
    BadPeriod,
    /// Cell text is not a number (record kept as missing).
    NonNumeric,
}

/// Counts of what the cleaner dropped or coerced.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CleanReport {
    pub input: usize,
    pub kept: usize,
    /// Kept records whose value is an explicit not-available placeholder.
    pub placeholders: usize,
    pub issues: BTreeMap<IssueKind, usize>,
    pub samples: BTreeMap<IssueKind, Vec<String>>,
}

impl CleanReport {
    pub fn count(&self, kind: IssueKind) -> usize {
        self.issues.get(&kind).copied().unwrap_or(0)
    }

    pub fn dropped(&self) -> usize {
        self.count(IssueKind::UnknownCountry) + self.count(IssueKind::BadPeriod)
    }

    fn record(&mut self, kind: IssueKind, label: &str) {
        *self.issues.entry(kind).or_default() += 1;
        let samples = self.samples.entry(kind).or_default();
        if samples.len() < MAX_SAMPLES && !samples.iter().any(|s| s == label) {
            samples.push(label.to_string());
        }
    }

    /// Fold another report into this one.
    pub fn merge(&mut self, other: &CleanReport) {
        self.input += other.input;
        self.kept += other.kept;
        self.placeholders += other.placeholders;
        for (kind, count) in &other.issues {
            *self.issues.entry(*kind).or_default() += count;
        }
        for (kind, labels) in &other.samples {
            for label in labels {
                let samples = self.samples.entry(*kind).or_default();
                if samples.len() < MAX_SAMPLES && !samples.contains(label) {
                    samples.push(label.clone());
                }
            }
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "Kept {} of {} records ({} unknown country, {} bad period, {} non-numeric, {} not available)",
            self.kept,
            self.input,
            self.count(IssueKind::UnknownCountry),
            self.count(IssueKind::BadPeriod),
            self.count(IssueKind::NonNumeric),
            self.placeholders
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct CleanOutput {
    pub observations: Vec<CleanObservation>,
    pub report: CleanReport,
}

/// Outcome of coercing one cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Coerced {
    Number(f64),
    /// Empty cell or a not-available code.
    Placeholder,
    /// Anything else; kept as missing and reported.
    Invalid,
}

impl Coerced {
    pub fn value(&self) -> Value {
        match self {
            Coerced::Number(v) => Value::observed(*v),
            Coerced::Placeholder | Coerced::Invalid => Value::Missing,
        }
    }
}

/// Coerce a cell to a number without ever failing.
pub fn coerce_value(cell: &Cell) -> Coerced {
    match cell {
        Cell::Empty => Coerced::Placeholder,
        Cell::Number(v) if v.is_finite() => Coerced::Number(*v),
        Cell::Number(_) | Cell::Date(_) => Coerced::Invalid,
        Cell::Text(text) => {
            let text = text.trim();
            if text.is_empty() || text.starts_with(':') || text == "d" {
                return Coerced::Placeholder;
            }
            FLAGGED_NUMBER
                .captures(text)
                .and_then(|c| c[1].replace(',', ".").parse::<f64>().ok())
                .filter(|v| v.is_finite())
                .map(Coerced::Number)
                .unwrap_or(Coerced::Invalid)
        }
    }
}

/// Parse a period header cell.
///
/// Whole numbers in 1900..=2100 are years; larger numbers are spreadsheet
/// serial dates.
pub fn parse_period(cell: &Cell) -> Option<YearMonth> {
    match cell {
        Cell::Empty => None,
        Cell::Text(text) => text.parse().ok(),
        Cell::Date(date) => Some(YearMonth::from_date(*date)),
        Cell::Number(n) if n.fract() == 0.0 && (1900.0..=2100.0).contains(n) => {
            YearMonth::new(*n as i32, 1)
        }
        Cell::Number(n) if *n > 2100.0 && *n < 2_958_466.0 => {
            let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
            epoch
                .checked_add_days(Days::new(n.floor() as u64))
                .map(YearMonth::from_date)
        }
        Cell::Number(_) => None,
    }
}

/// Applies the country filter, period parsing and value coercion.
pub struct Cleaner<'a> {
    countries: &'a CountrySet,
}

impl<'a> Cleaner<'a> {
    pub fn new(countries: &'a CountrySet) -> Self {
        Self { countries }
    }

    pub fn clean(&self, raw: Vec<RawObservation>) -> CleanOutput {
        let mut report = CleanReport { input: raw.len(), ..Default::default() };
        let mut observations = Vec::with_capacity(raw.len());

        for obs in raw {
            let Some(country) = self.countries.resolve(&obs.country) else {
                report.record(IssueKind::UnknownCountry, &obs.country);
                continue;
            };
            let Some(period) = parse_period(&obs.period) else {
                let label = obs.period.as_text().unwrap_or_default();
                report.record(IssueKind::BadPeriod, &format!("{}: '{}'", obs.sheet, label));
                continue;
            };
            let coerced = coerce_value(&obs.value);
            match coerced {
                Coerced::Number(_) => {}
                Coerced::Placeholder => report.placeholders += 1,
                Coerced::Invalid => {
                    let label = obs.value.as_text().unwrap_or_default();
                    report.record(IssueKind::NonNumeric, &label);
                }
            }

            observations.push(CleanObservation {
                country: country.code.to_string(),
                category: obs.category,
                period,
                value: coerced.value(),
                sheet: obs.sheet,
                source_index: obs.source_index,
            });
        }

        report.kept = observations.len();
        CleanOutput { observations, report }
    }
}

/// Clean against the EU27 registry.
pub fn clean(raw: Vec<RawObservation>) -> CleanOutput {
    Cleaner::new(eu27()).clean(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(country: &str, period: &str, value: Cell) -> RawObservation {
        RawObservation {
            country: country.to_string(),
            category: "Energy".to_string(),
            period: Cell::Text(period.to_string()),
            value,
            sheet: "Sheet 3".to_string(),
            source_index: 0,
        }
    }

    #[test]
    fn test_coerce_placeholders_and_flags() {
        assert_eq!(coerce_value(&Cell::Text(":".into())), Coerced::Placeholder);
        assert_eq!(coerce_value(&Cell::Text(": c".into())), Coerced::Placeholder);
        assert_eq!(coerce_value(&Cell::Text("d".into())), Coerced::Placeholder);
        assert_eq!(coerce_value(&Cell::Empty), Coerced::Placeholder);
        assert_eq!(coerce_value(&Cell::Text("105.3 p".into())), Coerced::Number(105.3));
        assert_eq!(coerce_value(&Cell::Text("99,5".into())), Coerced::Number(99.5));
        assert_eq!(coerce_value(&Cell::Number(101.0)), Coerced::Number(101.0));
        assert_eq!(coerce_value(&Cell::Text("n/a".into())), Coerced::Invalid);
        assert_eq!(coerce_value(&Cell::Text("nan".into())), Coerced::Invalid);
        assert_eq!(coerce_value(&Cell::Number(f64::INFINITY)), Coerced::Invalid);
    }

    #[test]
    fn test_parse_period_cells() {
        let jan21 = YearMonth::new(2021, 1);
        assert_eq!(parse_period(&Cell::Text("2021-01".into())), jan21);
        assert_eq!(parse_period(&Cell::Number(2021.0)), jan21);
        // 44197 = 2021-01-01 as a spreadsheet serial
        assert_eq!(parse_period(&Cell::Number(44197.0)), jan21);
        assert_eq!(
            parse_period(&Cell::Date(NaiveDate::from_ymd_opt(2021, 1, 31).unwrap())),
            jan21
        );
        assert_eq!(parse_period(&Cell::Text("GEO (Labels)".into())), None);
        assert_eq!(parse_period(&Cell::Empty), None);
    }

    #[test]
    fn test_only_eu27_codes_survive() {
        let out = clean(vec![
            raw("France", "2021-01", Cell::Text("100".into())),
            raw("XX", "2021-01", Cell::Text("100".into())),
            raw("United Kingdom", "2021-01", Cell::Text("100".into())),
            raw("Euro area - 19 countries", "2021-01", Cell::Text("100".into())),
            raw("DE", "2021-01", Cell::Text("101".into())),
        ]);

        let codes: Vec<&str> = out.observations.iter().map(|o| o.country.as_str()).collect();
        assert_eq!(codes, vec!["FR", "DE"]);
        assert!(out.observations.iter().all(|o| eu27().contains_code(&o.country)));
        assert_eq!(out.report.count(IssueKind::UnknownCountry), 3);
        assert!(out.report.samples[&IssueKind::UnknownCountry].contains(&"XX".to_string()));
    }

    #[test]
    fn test_bad_period_dropped_non_numeric_kept_missing() {
        let out = clean(vec![
            raw("France", "not a date", Cell::Text("100".into())),
            raw("France", "2021-02", Cell::Text("oops".into())),
            raw("France", "2021-03", Cell::Text(":".into())),
        ]);

        assert_eq!(out.report.input, 3);
        assert_eq!(out.report.kept, 2);
        assert_eq!(out.report.count(IssueKind::BadPeriod), 1);
        assert_eq!(out.report.count(IssueKind::NonNumeric), 1);
        assert_eq!(out.report.placeholders, 1);
        assert_eq!(out.report.dropped(), 1);
        assert!(out.observations.iter().all(|o| o.value.is_missing()));
    }

    #[test]
    fn test_report_merge() {
        let mut a = clean(vec![raw("XX", "2021-01", Cell::Empty)]).report;
        let b = clean(vec![
            raw("YY", "2021-01", Cell::Empty),
            raw("France", "2021-01", Cell::Empty),
        ])
        .report;
        a.merge(&b);
        assert_eq!(a.input, 3);
        assert_eq!(a.kept, 1);
        assert_eq!(a.count(IssueKind::UnknownCountry), 2);
        assert_eq!(a.samples[&IssueKind::UnknownCountry], vec!["XX", "YY"]);
        assert!(a.summary().contains("Kept 1 of 3"));
    }
}
