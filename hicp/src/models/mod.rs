//! Domain models for the HICP analysis pipeline.
//!
//! This module contains the data structures passed between stages:
//!
//! - [`YearMonth`] / [`Window`] - Calendar keys and analysis windows
//! - [`Value`] - Explicit observed/missing cell value
//! - [`Cell`] - Raw spreadsheet cell as read by the loader
//! - [`RawObservation`] / [`CleanObservation`] / [`LongRecord`] - One record per stage
//! - [`YoyPoint`], [`ShareRecord`], [`Contribution`], [`WindowStat`] - Derived series
//! - [`HeatmapMatrix`] - Labelled matrix ready for rendering

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// =============================================================================
// Periods
// =============================================================================

/// A monthly period key.
///
/// Annual observations (COICOP weights) are keyed on January of their year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct YearMonth {
    year: i32,
    month: u32,
}

/// Period text that matches none of the accepted formats.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Unrecognized period: '{0}'")]
pub struct ParsePeriodError(pub String);

static MONTHLY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})\s*[-/Mm]\s*(\d{1,2})$").expect("valid regex"));
static DAILY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})(?:[ T].*)?$").expect("valid regex"));
static ANNUAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{4})$").expect("valid regex"));

impl YearMonth {
    pub const MIN: YearMonth = YearMonth { year: i32::MIN, month: 1 };
    pub const MAX: YearMonth = YearMonth { year: i32::MAX, month: 12 };

    /// Build a period, rejecting months outside 1..=12.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    /// Const constructor for literals; `month` must be in 1..=12.
    pub(crate) const fn from_parts(year: i32, month: u32) -> Self {
        Self { year, month }
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self { year: date.year(), month: date.month() }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// January of the same year.
    pub fn year_start(&self) -> Self {
        Self { year: self.year, month: 1 }
    }

    /// Shift by a signed number of months.
    pub fn offset(&self, months: i32) -> Self {
        let total = self.year as i64 * 12 + (self.month as i64 - 1) + months as i64;
        Self {
            year: total.div_euclid(12) as i32,
            month: total.rem_euclid(12) as u32 + 1,
        }
    }

    /// Number of months from `self` to `other` (negative when `other` is earlier).
    pub fn months_until(&self, other: &YearMonth) -> i64 {
        (other.year as i64 - self.year as i64) * 12 + (other.month as i64 - self.month as i64)
    }
}

impl FromStr for YearMonth {
    type Err = ParsePeriodError;

    /// Accepts `2021-01`, `2021M01`, `2021/1`, `2021-01-31`, `2021-01-01 00:00:00` and `2021`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let err = || ParsePeriodError(s.to_string());

        let captures = MONTHLY
            .captures(text)
            .or_else(|| DAILY.captures(text))
            .map(|c| (c[1].to_string(), Some(c[2].to_string())))
            .or_else(|| ANNUAL.captures(text).map(|c| (c[1].to_string(), None)));

        let (year, month) = captures.ok_or_else(err)?;
        let year: i32 = year.parse().map_err(|_| err())?;
        let month: u32 = match month {
            Some(m) => m.parse().map_err(|_| err())?,
            None => 1,
        };
        YearMonth::new(year, month).ok_or_else(err)
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl TryFrom<String> for YearMonth {
    type Error = ParsePeriodError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<YearMonth> for String {
    fn from(value: YearMonth) -> Self {
        value.to_string()
    }
}

/// Inclusive range of periods the statistics are computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub start: YearMonth,
    pub end: YearMonth,
}

impl Window {
    /// Returns `None` when `start` is after `end`.
    pub fn new(start: YearMonth, end: YearMonth) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    pub fn contains(&self, period: &YearMonth) -> bool {
        *period >= self.start && *period <= self.end
    }

    /// Every month of the window in order.
    pub fn periods(&self) -> Vec<YearMonth> {
        let span = self.start.months_until(&self.end);
        (0..=span).map(|m| self.start.offset(m as i32)).collect()
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

// =============================================================================
// Values
// =============================================================================

/// A numeric cell that is either observed or explicitly missing.
///
/// Serialized as a number or `null`. Non-finite numbers are never observed.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Option<f64>", into = "Option<f64>")]
pub enum Value {
    Observed(f64),
    #[default]
    Missing,
}

impl Value {
    /// Wraps a number, mapping NaN and infinities to `Missing`.
    pub fn observed(v: f64) -> Self {
        if v.is_finite() {
            Value::Observed(v)
        } else {
            Value::Missing
        }
    }

    pub fn as_option(&self) -> Option<f64> {
        match self {
            Value::Observed(v) => Some(*v),
            Value::Missing => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }
}

impl From<Option<f64>> for Value {
    fn from(value: Option<f64>) -> Self {
        value.map(Value::observed).unwrap_or(Value::Missing)
    }
}

impl From<Value> for Option<f64> {
    fn from(value: Value) -> Self {
        value.as_option()
    }
}

// =============================================================================
// Raw cells
// =============================================================================

/// A spreadsheet cell before any type coercion.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Cell {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDate),
}

impl Cell {
    /// Trimmed textual form, `None` for empty or whitespace-only cells.
    pub fn as_text(&self) -> Option<String> {
        let text = match self {
            Cell::Empty => return None,
            Cell::Text(s) => s.trim().to_string(),
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            Cell::Number(n) => n.to_string(),
            Cell::Date(d) => d.format("%Y-%m-%d").to_string(),
        };
        (!text.is_empty()).then_some(text)
    }

    pub fn is_blank(&self) -> bool {
        self.as_text().is_none()
    }
}

// =============================================================================
// Datasets and categories
// =============================================================================

/// The three workbook families the analysis reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetKind {
    /// HICP indices for all countries and main COICOP categories.
    Main,
    /// HICP indices by sub-category.
    Details,
    /// Annual COICOP weights, per mille of household expenditure.
    Weights,
}

impl DatasetKind {
    pub const ALL: [DatasetKind; 3] = [DatasetKind::Main, DatasetKind::Details, DatasetKind::Weights];

    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetKind::Main => "main",
            DatasetKind::Details => "details",
            DatasetKind::Weights => "weights",
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main group a sub-category sheet belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CategoryGroup {
    Food,
    HousingEnergy,
    Transport,
    Other,
}

impl CategoryGroup {
    pub fn label(&self) -> &'static str {
        match self {
            CategoryGroup::Food => "Food",
            CategoryGroup::HousingEnergy => "Housing & Energy",
            CategoryGroup::Transport => "Transport",
            CategoryGroup::Other => "Other",
        }
    }
}

// =============================================================================
// Records
// =============================================================================

/// One cell of a data sheet, as loaded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawObservation {
    /// Row label (country name or code).
    pub country: String,
    /// Sheet description from the summary sheet.
    pub category: String,
    /// Column header of the period.
    pub period: Cell,
    pub value: Cell,
    pub sheet: String,
    /// Position of the originating source in load order.
    pub source_index: usize,
}

/// A raw observation with validated country, period and value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleanObservation {
    /// EU27 country code.
    pub country: String,
    pub category: String,
    pub period: YearMonth,
    pub value: Value,
    pub sheet: String,
    pub source_index: usize,
}

/// The reshaped unit of analysis, unique per (country, category, period).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LongRecord {
    pub country: String,
    pub category: String,
    pub period: YearMonth,
    pub value: Value,
}

/// Year-over-year rate `value[t] / value[t-12] - 1`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YoyPoint {
    pub country: String,
    pub category: String,
    pub period: YearMonth,
    pub rate: Value,
}

/// Share of one category in the sum over categories for a country-period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShareRecord {
    pub country: String,
    pub category: String,
    pub period: YearMonth,
    pub share: Value,
}

/// Weighted contribution of a category to headline inflation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Contribution {
    pub country: String,
    pub category: String,
    pub period: YearMonth,
    pub contribution: Value,
}

/// Summary statistics of one (country, category) series over a window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowStat {
    pub country: String,
    pub category: String,
    /// Observed (non-missing) points inside the window.
    pub observations: usize,
    pub mean: Value,
    pub std_dev: Value,
    pub peak: Value,
    pub peak_period: Option<YearMonth>,
}

/// Access to the (country, category, period, value) shape shared by derived series.
pub trait SeriesPoint {
    fn country(&self) -> &str;
    fn category(&self) -> &str;
    fn period(&self) -> YearMonth;
    fn value(&self) -> Value;
}

macro_rules! series_point {
    ($ty:ty, $field:ident) => {
        impl SeriesPoint for $ty {
            fn country(&self) -> &str {
                &self.country
            }
            fn category(&self) -> &str {
                &self.category
            }
            fn period(&self) -> YearMonth {
                self.period
            }
            fn value(&self) -> Value {
                self.$field
            }
        }
    };
}

series_point!(LongRecord, value);
series_point!(YoyPoint, rate);
series_point!(ShareRecord, share);
series_point!(Contribution, contribution);

// =============================================================================
// Heatmaps
// =============================================================================

/// A labelled matrix consumed by heatmap rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatmapMatrix {
    pub rows: Vec<String>,
    pub columns: Vec<String>,
    pub values: Vec<Vec<Value>>,
}

impl HeatmapMatrix {
    pub fn get(&self, row: &str, column: &str) -> Option<Value> {
        let r = self.rows.iter().position(|x| x == row)?;
        let c = self.columns.iter().position(|x| x == column)?;
        self.values.get(r).and_then(|v| v.get(c)).copied()
    }
}
