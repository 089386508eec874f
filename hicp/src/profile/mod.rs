//! Country profiles and their reduction.
//!
//! - [`ProfileMatrix`] - Country × category matrix of one window statistic
//! - [`MissingPolicy`] - How incomplete profiles are completed
//! - [`pca::standardize`] / [`pca::pca`] - Standardization and principal components
//! - [`heatmap`] - Distance and intensity matrices

pub mod heatmap;
pub mod pca;

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::models::{Value, Window, WindowStat};

pub use heatmap::{distance_heatmap, intensity_heatmap};
pub use pca::{pca, standardize, Embedding, Standardized};

/// Which window statistic fills the profile cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ProfileStatistic {
    #[default]
    Mean,
    StdDev,
    Peak,
}

impl ProfileStatistic {
    pub fn pick(&self, stat: &WindowStat) -> Value {
        match self {
            ProfileStatistic::Mean => stat.mean,
            ProfileStatistic::StdDev => stat.std_dev,
            ProfileStatistic::Peak => stat.peak,
        }
    }
}

/// Completion of profiles with missing cells. One policy per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingPolicy {
    /// Drop countries with any missing cell.
    #[default]
    Exclude,
    /// Replace a missing cell with the mean of the observed countries.
    ImputeMean,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryProfile {
    pub country: String,
    /// One value per category of the owning matrix, same order.
    pub values: Vec<Value>,
}

/// Profiles sharing one category ordering and one window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileMatrix {
    pub categories: Vec<String>,
    pub window: Window,
    pub statistic: ProfileStatistic,
    pub profiles: Vec<CountryProfile>,
}

/// A profile matrix without missing cells.
#[derive(Debug, Clone)]
pub struct CompleteProfile {
    pub countries: Vec<String>,
    pub categories: Vec<String>,
    pub data: Array2<f64>,
    /// Countries removed under [`MissingPolicy::Exclude`].
    pub excluded: Vec<String>,
    /// Cells filled under [`MissingPolicy::ImputeMean`].
    pub imputed: usize,
    /// Categories with no observed country at all.
    pub dropped: Vec<String>,
}

impl ProfileMatrix {
    /// Build from window statistics.
    ///
    /// `categories` fixes the column order; by default every category of
    /// `stats` in sorted order. Countries are sorted by code.
    pub fn from_stats(
        stats: &[WindowStat],
        window: Window,
        statistic: ProfileStatistic,
        categories: Option<&[String]>,
    ) -> Self {
        let categories: Vec<String> = match categories {
            Some(c) => c.to_vec(),
            None => stats
                .iter()
                .map(|s| s.category.clone())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
        };
        let countries: BTreeSet<&str> = stats.iter().map(|s| s.country.as_str()).collect();

        let profiles = countries
            .into_iter()
            .map(|country| CountryProfile {
                country: country.to_string(),
                values: categories
                    .iter()
                    .map(|category| {
                        stats
                            .iter()
                            .find(|s| s.country == country && &s.category == category)
                            .map(|s| statistic.pick(s))
                            .unwrap_or(Value::Missing)
                    })
                    .collect(),
            })
            .collect();

        Self {
            categories,
            window,
            statistic,
            profiles,
        }
    }

    pub fn get(&self, country: &str, category: &str) -> Option<Value> {
        let col = self.categories.iter().position(|c| c == category)?;
        self.profiles
            .iter()
            .find(|p| p.country == country)
            .and_then(|p| p.values.get(col).copied())
    }

    pub fn complete(&self, policy: MissingPolicy) -> CompleteProfile {
        match policy {
            MissingPolicy::Exclude => self.exclude_incomplete(),
            MissingPolicy::ImputeMean => self.impute_mean(),
        }
    }

    fn exclude_incomplete(&self) -> CompleteProfile {
        let (kept_columns, dropped) = self.observed_columns();

        let (kept, excluded): (Vec<&CountryProfile>, Vec<&CountryProfile>) = self
            .profiles
            .iter()
            .partition(|p| kept_columns.iter().all(|&col| p.values.get(col).map_or(false, |v| !v.is_missing())));

        let rows: Vec<Vec<f64>> = kept
            .iter()
            .map(|p| kept_columns.iter().filter_map(|&col| p.values.get(col).and_then(Value::as_option)).collect())
            .collect();

        CompleteProfile {
            countries: kept.iter().map(|p| p.country.clone()).collect(),
            categories: kept_columns.iter().map(|&c| self.categories[c].clone()).collect(),
            data: to_array(&rows, kept_columns.len()),
            excluded: excluded.iter().map(|p| p.country.clone()).collect(),
            imputed: 0,
            dropped,
        }
    }

    fn impute_mean(&self) -> CompleteProfile {
        let (kept_columns, dropped) = self.observed_columns();
        let means: Vec<f64> = kept_columns
            .iter()
            .map(|&col| {
                let observed: Vec<f64> = self.observed_in(col).collect();
                observed.iter().sum::<f64>() / observed.len() as f64
            })
            .collect();

        let mut imputed = 0;
        let rows: Vec<Vec<f64>> = self
            .profiles
            .iter()
            .map(|p| {
                kept_columns
                    .iter()
                    .zip(&means)
                    .map(|(&col, &mean)| match p.values.get(col).and_then(Value::as_option) {
                        Some(v) => v,
                        None => {
                            imputed += 1;
                            mean
                        }
                    })
                    .collect()
            })
            .collect();

        CompleteProfile {
            countries: self.profiles.iter().map(|p| p.country.clone()).collect(),
            categories: kept_columns.iter().map(|&c| self.categories[c].clone()).collect(),
            data: to_array(&rows, kept_columns.len()),
            excluded: Vec::new(),
            imputed,
            dropped,
        }
    }

    fn observed_in(&self, col: usize) -> impl Iterator<Item = f64> + '_ {
        self.profiles.iter().filter_map(move |p| p.values.get(col).and_then(Value::as_option))
    }

    /// Split columns into those observed for at least one country and the
    /// names of those observed for none.
    fn observed_columns(&self) -> (Vec<usize>, Vec<String>) {
        let mut kept = Vec::new();
        let mut dropped = Vec::new();
        for (col, category) in self.categories.iter().enumerate() {
            if self.observed_in(col).next().is_some() {
                kept.push(col);
            } else {
                dropped.push(category.clone());
            }
        }
        (kept, dropped)
    }
}

fn to_array(rows: &[Vec<f64>], width: usize) -> Array2<f64> {
    Array2::from_shape_fn((rows.len(), width), |(i, j)| rows[i][j])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::YearMonth;

    fn window() -> Window {
        Window::new("2021-01".parse().unwrap(), "2022-12".parse().unwrap()).unwrap()
    }

    fn stat(country: &str, category: &str, mean: Value) -> WindowStat {
        WindowStat {
            country: country.into(),
            category: category.into(),
            observations: 24,
            mean,
            std_dev: Value::Missing,
            peak: Value::observed(1.0),
            peak_period: Some(YearMonth::new(2022, 10).unwrap()),
        }
    }

    fn sample() -> Vec<WindowStat> {
        vec![
            stat("FR", "Energy", Value::observed(0.2)),
            stat("FR", "Food", Value::observed(0.05)),
            stat("DE", "Energy", Value::observed(0.3)),
            stat("DE", "Food", Value::observed(0.07)),
            stat("IT", "Energy", Value::observed(0.4)),
            stat("IT", "Food", Value::Missing),
        ]
    }

    #[test]
    fn test_fixed_category_order() {
        let order = vec!["Food".to_string(), "Energy".to_string(), "Services".to_string()];
        let matrix = ProfileMatrix::from_stats(&sample(), window(), ProfileStatistic::Mean, Some(&order));

        assert_eq!(matrix.categories, order);
        assert!(matrix.profiles.iter().all(|p| p.values.len() == 3));
        assert_eq!(matrix.get("FR", "Food"), Some(Value::Observed(0.05)));
        assert_eq!(matrix.get("FR", "Services"), Some(Value::Missing));
        assert_eq!(matrix.profiles[0].country, "DE");
    }

    #[test]
    fn test_exclude_lists_incomplete_countries() {
        let matrix = ProfileMatrix::from_stats(&sample(), window(), ProfileStatistic::Mean, None);
        let complete = matrix.complete(MissingPolicy::Exclude);

        assert_eq!(complete.countries, vec!["DE", "FR"]);
        assert_eq!(complete.excluded, vec!["IT"]);
        assert_eq!(complete.data.dim(), (2, 2));
        assert_eq!(complete.data[[1, 0]], 0.2);
    }

    #[test]
    fn test_impute_mean_fills_from_observed() {
        let matrix = ProfileMatrix::from_stats(&sample(), window(), ProfileStatistic::Mean, None);
        let complete = matrix.complete(MissingPolicy::ImputeMean);

        assert_eq!(complete.countries, vec!["DE", "FR", "IT"]);
        assert_eq!(complete.imputed, 1);
        assert!(complete.excluded.is_empty());
        assert!((complete.data[[2, 1]] - 0.06).abs() < 1e-12);
    }

    #[test]
    fn test_impute_drops_unobserved_category() {
        let order = vec!["Energy".to_string(), "Services".to_string()];
        let matrix = ProfileMatrix::from_stats(&sample(), window(), ProfileStatistic::Mean, Some(&order));
        let complete = matrix.complete(MissingPolicy::ImputeMean);

        assert_eq!(complete.categories, vec!["Energy"]);
        assert_eq!(complete.dropped, vec!["Services"]);
        assert!(complete.data.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_statistic_selects_peak() {
        let matrix = ProfileMatrix::from_stats(&sample(), window(), ProfileStatistic::Peak, None);
        assert_eq!(matrix.get("IT", "Food"), Some(Value::Observed(1.0)));
    }

    #[test]
    fn test_exclude_drops_unobserved_category_before_countries() {
        let order = vec!["Energy".to_string(), "Services".to_string()];
        let stats = vec![
            stat("DE", "Energy", Value::observed(0.3)),
            stat("FR", "Energy", Value::observed(0.2)),
            stat("IT", "Energy", Value::observed(0.4)),
        ];
        let matrix = ProfileMatrix::from_stats(&stats, window(), ProfileStatistic::Mean, Some(&order));
        let complete = matrix.complete(MissingPolicy::Exclude);

        assert_eq!(complete.countries, vec!["DE", "FR", "IT"]);
        assert!(complete.excluded.is_empty());
        assert_eq!(complete.categories, vec!["Energy"]);
        assert_eq!(complete.dropped, vec!["Services"]);
        assert_eq!(complete.data.dim(), (3, 1));
    }

    #[test]
    fn test_policies_agree_on_dropped_categories() {
        let order = vec!["Food".to_string(), "Energy".to_string(), "Services".to_string()];
        let matrix = ProfileMatrix::from_stats(&sample(), window(), ProfileStatistic::Mean, Some(&order));
        let excluded = matrix.complete(MissingPolicy::Exclude);
        let imputed = matrix.complete(MissingPolicy::ImputeMean);

        assert_eq!(excluded.dropped, imputed.dropped);
        assert_eq!(excluded.categories, imputed.categories);
        assert_eq!(excluded.excluded, vec!["IT"]);
        assert_eq!(excluded.data.dim(), (2, 2));
    }
}
