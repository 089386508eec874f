//! Standardization and principal component analysis of country profiles.
//!
//! The covariance matrix of the standardized profiles is diagonalized with
//! cyclic Jacobi rotations. Profile matrices are small (27 countries, a
//! dozen categories), so the rotation count is never an issue.

use ndarray::{Array1, Array2, Axis};
use serde::Serialize;

use super::CompleteProfile;
use crate::error::{ProfileError, ProfileResult};

/// Deviation below which a category is treated as constant.
const MIN_STD_DEV: f64 = 1e-12;
const MAX_SWEEPS: usize = 100;
const OFF_DIAGONAL_TOLERANCE: f64 = 1e-22;

/// Profiles scaled to zero mean and unit sample variance per category.
#[derive(Debug, Clone)]
pub struct Standardized {
    pub countries: Vec<String>,
    pub categories: Vec<String>,
    /// Constant categories removed before scaling.
    pub dropped_dimensions: Vec<String>,
    pub data: Array2<f64>,
    pub means: Vec<f64>,
    pub std_devs: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Embedding {
    pub countries: Vec<String>,
    pub categories: Vec<String>,
    pub dropped_dimensions: Vec<String>,
    /// One row per country, one column per component.
    pub scores: Vec<Vec<f64>>,
    /// One row per category, one column per component.
    pub loadings: Vec<Vec<f64>>,
    pub explained_variance: Vec<f64>,
    pub explained_variance_ratio: Vec<f64>,
}

impl Embedding {
    pub fn components(&self) -> usize {
        self.explained_variance.len()
    }

    pub fn score(&self, country: &str, component: usize) -> Option<f64> {
        let row = self.countries.iter().position(|c| c == country)?;
        self.scores.get(row).and_then(|r| r.get(component)).copied()
    }
}

pub fn standardize(profile: &CompleteProfile) -> ProfileResult<Standardized> {
    let n = profile.data.nrows();
    if n < 2 {
        return Err(ProfileError::TooFewCountries { found: n });
    }

    let mut kept = Vec::new();
    let mut dropped_dimensions = profile.dropped.clone();
    let mut means = Vec::new();
    let mut std_devs = Vec::new();

    for (j, column) in profile.data.axis_iter(Axis(1)).enumerate() {
        let mean = column.sum() / n as f64;
        let var = column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
        let sd = var.sqrt();
        if sd.is_finite() && sd > MIN_STD_DEV {
            kept.push(j);
            means.push(mean);
            std_devs.push(sd);
        } else {
            dropped_dimensions.push(profile.categories[j].clone());
        }
    }

    if kept.is_empty() {
        return Err(ProfileError::NoVaryingDimension);
    }

    let data = Array2::from_shape_fn((n, kept.len()), |(i, k)| {
        (profile.data[[i, kept[k]]] - means[k]) / std_devs[k]
    });

    Ok(Standardized {
        countries: profile.countries.clone(),
        categories: kept.iter().map(|&j| profile.categories[j].clone()).collect(),
        dropped_dimensions,
        data,
        means,
        std_devs,
    })
}

/// Project standardized profiles on their first `components` principal axes.
///
/// `components` is clamped to `1..=categories`. Each axis is oriented so its
/// largest-magnitude loading is positive.
pub fn pca(standardized: &Standardized, components: usize) -> Embedding {
    let z = &standardized.data;
    let (n, p) = z.dim();
    let k = components.clamp(1, p.max(1));

    let covariance = z.t().dot(z) / (n.saturating_sub(1).max(1)) as f64;
    let (eigenvalues, eigenvectors) = jacobi_eigen(covariance);

    let mut order: Vec<usize> = (0..p).collect();
    order.sort_by(|&a, &b| eigenvalues[b].total_cmp(&eigenvalues[a]));

    let clamped: Vec<f64> = order.iter().map(|&i| eigenvalues[i].max(0.0)).collect();
    let total: f64 = clamped.iter().sum();

    let mut loadings = Array2::<f64>::zeros((p, k));
    for (c, &i) in order.iter().take(k).enumerate() {
        let mut axis = eigenvectors.column(i).to_owned();
        let pivot = axis
            .iter()
            .copied()
            .fold(0.0_f64, |best, v| if v.abs() > best.abs() { v } else { best });
        if pivot < 0.0 {
            axis.mapv_inplace(|v| -v);
        }
        loadings.column_mut(c).assign(&axis);
    }

    let scores = z.dot(&loadings);
    let explained_variance: Vec<f64> = clamped.iter().take(k).copied().collect();
    let explained_variance_ratio = explained_variance
        .iter()
        .map(|v| if total > 0.0 { v / total } else { 0.0 })
        .collect();

    Embedding {
        countries: standardized.countries.clone(),
        categories: standardized.categories.clone(),
        dropped_dimensions: standardized.dropped_dimensions.clone(),
        scores: rows_of(&scores),
        loadings: rows_of(&loadings),
        explained_variance,
        explained_variance_ratio,
    }
}

fn rows_of(matrix: &Array2<f64>) -> Vec<Vec<f64>> {
    matrix.outer_iter().map(|row| row.to_vec()).collect()
}

/// Eigenvalues and eigenvectors (as columns) of a symmetric matrix.
fn jacobi_eigen(mut a: Array2<f64>) -> (Array1<f64>, Array2<f64>) {
    let n = a.nrows();
    let mut v = Array2::<f64>::eye(n);

    for _ in 0..MAX_SWEEPS {
        let off: f64 = (0..n)
            .flat_map(|p| (p + 1..n).map(move |q| (p, q)))
            .map(|(p, q)| a[[p, q]].powi(2))
            .sum();
        if off < OFF_DIAGONAL_TOLERANCE {
            break;
        }

        for p in 0..n {
            for q in p + 1..n {
                let apq = a[[p, q]];
                if apq.abs() < f64::MIN_POSITIVE {
                    continue;
                }
                let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for k in 0..n {
                    let (akp, akq) = (a[[k, p]], a[[k, q]]);
                    a[[k, p]] = c * akp - s * akq;
                    a[[k, q]] = s * akp + c * akq;
                }
                for k in 0..n {
                    let (apk, aqk) = (a[[p, k]], a[[q, k]]);
                    a[[p, k]] = c * apk - s * aqk;
                    a[[q, k]] = s * apk + c * aqk;
                }
                for k in 0..n {
                    let (vkp, vkq) = (v[[k, p]], v[[k, q]]);
                    v[[k, p]] = c * vkp - s * vkq;
                    v[[k, q]] = s * vkp + c * vkq;
                }
            }
        }
    }

    (a.diag().to_owned(), v)
}
