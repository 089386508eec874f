//! Derived series computed from long tables.
//!
//! - [`yoy_rates`] - Year-over-year rate with a 12-period lag
//! - [`contribution_shares`] - Category share of the per-(country, period) total
//! - [`weighted_contributions`] - Weight-scaled contribution to headline inflation
//! - [`stats::window_stats`] - Mean, deviation and peak over an analysis window
//! - [`groups`] - Sub-category to main-group mapping and group averages

pub mod groups;
pub mod stats;

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::models::{Contribution, ShareRecord, Value, YearMonth, YoyPoint};
use crate::reshape::LongTable;

pub use groups::{category_groups, group_for_sheet, group_means};
pub use stats::{window_stats, InsufficientData, StatsOutput};

/// Months between a period and its year-ago comparison.
pub const YOY_LAG: i32 = 12;

/// `value[t] / value[t-12] - 1` for every record of the table.
///
/// Missing when either value is missing, when `t-12` is not in the series,
/// or when the year-ago value is zero.
pub fn yoy_rates(table: &LongTable) -> Vec<YoyPoint> {
    let mut points = Vec::with_capacity(table.len());

    for (country, category) in table.series_keys() {
        let series = table.series(&country, &category);
        let by_period: HashMap<YearMonth, Value> = series.iter().copied().collect();

        for (period, value) in &series {
            let base = by_period.get(&period.offset(-YOY_LAG)).copied();
            let rate = match (value, base) {
                (Value::Observed(now), Some(Value::Observed(then))) if then != 0.0 => {
                    Value::observed(now / then - 1.0)
                }
                _ => Value::Missing,
            };
            points.push(YoyPoint {
                country: country.clone(),
                category: category.clone(),
                period: *period,
                rate,
            });
        }
    }
    points
}

/// Share of each category in the sum of observed category values of its
/// (country, period).
///
/// Missing values stay missing and do not enter the denominator. A zero
/// denominator makes every share of that group missing.
pub fn contribution_shares(table: &LongTable) -> Vec<ShareRecord> {
    let mut groups: BTreeMap<(String, YearMonth), Vec<(String, Value)>> = BTreeMap::new();
    for record in table.records() {
        groups
            .entry((record.country, record.period))
            .or_default()
            .push((record.category, record.value));
    }

    let mut shares = Vec::with_capacity(table.len());
    for ((country, period), members) in groups {
        let total: f64 = members.iter().filter_map(|(_, v)| v.as_option()).sum();
        for (category, value) in members {
            let share = match value {
                Value::Observed(v) if total != 0.0 => Value::observed(v / total),
                _ => Value::Missing,
            };
            shares.push(ShareRecord {
                country: country.clone(),
                category,
                period,
                share,
            });
        }
    }
    shares
}

/// Contribution of each category to headline inflation.
///
/// `weight / 1000 × yoy`, where the weight is the per-mille COICOP weight of
/// the same country and category for the year of the period. Categories
/// absent from the weights table are skipped; a missing weight or rate gives
/// a missing contribution.
pub fn weighted_contributions(yoy: &[YoyPoint], weights: &LongTable) -> Vec<Contribution> {
    let weighted: HashSet<String> = weights.categories().into_iter().collect();

    yoy.iter()
        .filter(|p| weighted.contains(&p.category))
        .map(|p| {
            let weight = weights
                .get(&p.country, &p.category, p.period.year_start())
                .unwrap_or(Value::Missing);
            let contribution = match (weight, p.rate) {
                (Value::Observed(w), Value::Observed(r)) => Value::observed(w / 1000.0 * r),
                _ => Value::Missing,
            };
            Contribution {
                country: p.country.clone(),
                category: p.category.clone(),
                period: p.period,
                contribution,
            }
        })
        .collect()
}
