//! Main-group mapping for the sub-category workbook.
//!
//! Sheets of `hicp_subcategories_eu.xlsx` are ordered by COICOP code, so the
//! trailing sheet number decides the group.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use crate::models::{CategoryGroup, Value, YearMonth, YoyPoint};
use crate::parser::SheetEntry;

const FOOD_SHEETS: RangeInclusive<u32> = 1..=75;
const HOUSING_ENERGY_SHEETS: RangeInclusive<u32> = 76..=108;
const TRANSPORT_SHEETS: RangeInclusive<u32> = 109..=150;

/// Group of a sheet named like `Sheet 23`; `Other` without a trailing number.
pub fn group_for_sheet(sheet_name: &str) -> CategoryGroup {
    let Some(idx) = sheet_name
        .split_whitespace()
        .last()
        .and_then(|s| s.parse::<u32>().ok())
    else {
        return CategoryGroup::Other;
    };

    if FOOD_SHEETS.contains(&idx) {
        CategoryGroup::Food
    } else if HOUSING_ENERGY_SHEETS.contains(&idx) {
        CategoryGroup::HousingEnergy
    } else if TRANSPORT_SHEETS.contains(&idx) {
        CategoryGroup::Transport
    } else {
        CategoryGroup::Other
    }
}

/// Category description → group, from the summary entries of a source.
pub fn category_groups(entries: &[SheetEntry]) -> BTreeMap<String, CategoryGroup> {
    entries
        .iter()
        .map(|e| (e.description.clone(), group_for_sheet(&e.sheet_name)))
        .collect()
}

/// Mean YoY rate of each group's sub-categories per (country, period).
///
/// The result uses the group label as its category. Categories without a
/// group are ignored; a group with no observed member is missing.
pub fn group_means(yoy: &[YoyPoint], groups: &BTreeMap<String, CategoryGroup>) -> Vec<YoyPoint> {
    let mut buckets: BTreeMap<(&str, CategoryGroup, YearMonth), Vec<f64>> = BTreeMap::new();
    for point in yoy {
        let Some(group) = groups.get(&point.category) else {
            continue;
        };
        let bucket = buckets.entry((point.country.as_str(), *group, point.period)).or_default();
        if let Some(v) = point.rate.as_option() {
            bucket.push(v);
        }
    }

    buckets
        .into_iter()
        .map(|((country, group, period), values)| {
            let rate = if values.is_empty() {
                Value::Missing
            } else {
                Value::observed(values.iter().sum::<f64>() / values.len() as f64)
            };
            YoyPoint {
                country: country.to_string(),
                category: group.label().to_string(),
                period,
                rate,
            }
        })
        .collect()
}
