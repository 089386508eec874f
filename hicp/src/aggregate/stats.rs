//! Window statistics per (country, category).

use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::{SeriesPoint, Value, Window, WindowStat, YearMonth};

/// A series with too few observations in the window for its statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsufficientData {
    pub country: String,
    pub category: String,
    pub found: usize,
    pub required: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StatsOutput {
    pub stats: Vec<WindowStat>,
    pub insufficient: Vec<InsufficientData>,
}

/// Mean, sample standard deviation and peak of every series over `window`.
///
/// Only observed values inside the window count. A series with fewer than
/// `min_observations` of them gets missing statistics and an
/// [`InsufficientData`] entry; the others are unaffected.
pub fn window_stats<P: SeriesPoint>(points: &[P], window: &Window, min_observations: usize) -> StatsOutput {
    let required = min_observations.max(1);

    let mut series: BTreeMap<(&str, &str), Vec<(YearMonth, f64)>> = BTreeMap::new();
    for point in points {
        let entry = series.entry((point.country(), point.category())).or_default();
        if let (true, Some(v)) = (window.contains(&point.period()), point.value().as_option()) {
            entry.push((point.period(), v));
        }
    }

    let mut output = StatsOutput::default();
    for ((country, category), values) in series {
        let n = values.len();
        if n < required {
            output.insufficient.push(InsufficientData {
                country: country.to_string(),
                category: category.to_string(),
                found: n,
                required,
            });
            output.stats.push(WindowStat {
                country: country.to_string(),
                category: category.to_string(),
                observations: n,
                mean: Value::Missing,
                std_dev: Value::Missing,
                peak: Value::Missing,
                peak_period: None,
            });
            continue;
        }

        let mean = values.iter().map(|(_, v)| v).sum::<f64>() / n as f64;
        let std_dev = if n > 1 {
            let ss: f64 = values.iter().map(|(_, v)| (v - mean).powi(2)).sum();
            Value::observed((ss / (n - 1) as f64).sqrt())
        } else {
            Value::Missing
        };
        let (peak_period, peak) = values
            .iter()
            .copied()
            .fold(None, |best: Option<(YearMonth, f64)>, (p, v)| match best {
                Some((_, b)) if b >= v => best,
                _ => Some((p, v)),
            })
            .map(|(p, v)| (Some(p), Value::observed(v)))
            .unwrap_or((None, Value::Missing));

        output.stats.push(WindowStat {
            country: country.to_string(),
            category: category.to_string(),
            observations: n,
            mean: Value::observed(mean),
            std_dev,
            peak,
            peak_period,
        });
    }
    output
}
