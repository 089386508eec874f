//! Long-format table keyed by (country, category, period).
//!
//! # Tie-break
//!
//! When two sources carry the same key, the record loaded later wins:
//! observations are applied in source order (manifest position, then order
//! within the source) and each insert replaces the previous value. The number
//! of replaced keys is kept in [`LongTable::overridden`].
//!
//! # CSV round trip
//!
//! [`LongTable::write_csv`] writes `country,category,period,value` with an
//! empty field for missing values; [`LongTable::read_csv`] reads it back into
//! an identical table.

use serde::{Deserialize, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use crate::error::{LoadError, LoadResult};
use crate::models::{CleanObservation, HeatmapMatrix, LongRecord, Value, YearMonth};

type RecordKey = (String, String, YearMonth);

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LongTable {
    rows: BTreeMap<RecordKey, Value>,
    overridden: usize,
}

const CSV_HEADER: [&str; 4] = ["country", "category", "period", "value"];

#[derive(Debug, Serialize, Deserialize)]
struct CsvRow {
    country: String,
    category: String,
    period: String,
    value: Option<f64>,
}

impl LongTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from cleaned observations, later sources overriding earlier ones.
    pub fn from_observations(mut observations: Vec<CleanObservation>) -> Self {
        // stable: in-source order is preserved within a source index
        observations.sort_by_key(|o| o.source_index);

        let mut table = Self::new();
        for obs in observations {
            table.insert(LongRecord {
                country: obs.country,
                category: obs.category,
                period: obs.period,
                value: obs.value,
            });
        }
        table
    }

    /// Build from records in order, later records overriding earlier ones.
    pub fn from_records(records: impl IntoIterator<Item = LongRecord>) -> Self {
        let mut table = Self::new();
        for record in records {
            table.insert(record);
        }
        table
    }

    /// Insert or replace; returns the replaced value.
    pub fn insert(&mut self, record: LongRecord) -> Option<Value> {
        let previous = self
            .rows
            .insert((record.country, record.category, record.period), record.value);
        if previous.is_some() {
            self.overridden += 1;
        }
        previous
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Keys replaced by a later record while building the table.
    pub fn overridden(&self) -> usize {
        self.overridden
    }

    pub fn get(&self, country: &str, category: &str, period: YearMonth) -> Option<Value> {
        self.rows
            .get(&(country.to_string(), category.to_string(), period))
            .copied()
    }

    /// Records in (country, category, period) order.
    pub fn records(&self) -> impl Iterator<Item = LongRecord> + '_ {
        self.rows.iter().map(|((country, category, period), value)| LongRecord {
            country: country.clone(),
            category: category.clone(),
            period: *period,
            value: *value,
        })
    }

    pub fn countries(&self) -> Vec<String> {
        let set: BTreeSet<&String> = self.rows.keys().map(|(c, _, _)| c).collect();
        set.into_iter().cloned().collect()
    }

    pub fn categories(&self) -> Vec<String> {
        let set: BTreeSet<&String> = self.rows.keys().map(|(_, c, _)| c).collect();
        set.into_iter().cloned().collect()
    }

    pub fn periods(&self) -> Vec<YearMonth> {
        let set: BTreeSet<YearMonth> = self.rows.keys().map(|(_, _, p)| *p).collect();
        set.into_iter().collect()
    }

    /// Distinct (country, category) pairs.
    pub fn series_keys(&self) -> Vec<(String, String)> {
        let set: BTreeSet<(&String, &String)> = self.rows.keys().map(|(c, k, _)| (c, k)).collect();
        set.into_iter().map(|(c, k)| (c.clone(), k.clone())).collect()
    }

    /// One series in period order.
    pub fn series(&self, country: &str, category: &str) -> Vec<(YearMonth, Value)> {
        let lo = (country.to_string(), category.to_string(), YearMonth::MIN);
        let hi = (country.to_string(), category.to_string(), YearMonth::MAX);
        self.rows.range(lo..=hi).map(|((_, _, p), v)| (*p, *v)).collect()
    }

    /// Sub-table of the categories accepted by `keep`.
    pub fn filter_categories(&self, keep: impl Fn(&str) -> bool) -> LongTable {
        LongTable {
            rows: self
                .rows
                .iter()
                .filter(|((_, category, _), _)| keep(category))
                .map(|(k, v)| (k.clone(), *v))
                .collect(),
            overridden: 0,
        }
    }

    /// Wide country × period matrix for one category.
    pub fn pivot(&self, category: &str) -> HeatmapMatrix {
        let sub = self.filter_categories(|c| c == category);
        let rows = sub.countries();
        let periods = sub.periods();
        let values = rows
            .iter()
            .map(|country| {
                periods
                    .iter()
                    .map(|p| sub.get(country, category, *p).unwrap_or(Value::Missing))
                    .collect()
            })
            .collect();
        HeatmapMatrix {
            rows,
            columns: periods.iter().map(|p| p.to_string()).collect(),
            values,
        }
    }

    // =========================================================================
    // CSV export / import
    // =========================================================================

    pub fn write_csv<W: Write>(&self, writer: W) -> LoadResult<()> {
        let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(writer);
        wtr.write_record(CSV_HEADER)?;
        for record in self.records() {
            wtr.serialize(CsvRow {
                country: record.country,
                category: record.category,
                period: record.period.to_string(),
                value: record.value.as_option(),
            })?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn write_csv_file(&self, path: &Path) -> LoadResult<()> {
        self.write_csv(File::create(path)?)
    }

    pub fn read_csv<R: Read>(reader: R) -> LoadResult<Self> {
        let mut rdr = csv::Reader::from_reader(reader);
        let mut records = Vec::new();
        for (idx, row) in rdr.deserialize::<CsvRow>().enumerate() {
            let line = idx + 2;
            let row = row?;
            let period = row.period.parse().map_err(|e| LoadError::InvalidRow {
                line,
                message: format!("{}", e),
            })?;
            records.push(LongRecord {
                country: row.country,
                category: row.category,
                period,
                value: Value::from(row.value),
            });
        }
        Ok(Self::from_records(records))
    }

    pub fn read_csv_file(path: &Path) -> LoadResult<Self> {
        if !path.is_file() {
            return Err(LoadError::FileNotFound(path.to_path_buf()));
        }
        Self::read_csv(File::open(path)?)
    }
}

impl Serialize for LongTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.records())
    }
}
