use std::collections::{BTreeMap, BTreeSet};

use super::Standardized;
use crate::models::{HeatmapMatrix, Value, Window, YearMonth, YoyPoint};

/// Pairwise Euclidean distance between standardized country profiles.
pub fn distance_heatmap(standardized: &Standardized) -> HeatmapMatrix {
    let data = &standardized.data;
    let n = data.nrows();
    let values = (0..n)
        .map(|i| {
            (0..n)
                .map(|j| {
                    let d2: f64 = data
                        .row(i)
                        .iter()
                        .zip(data.row(j).iter())
                        .map(|(a, b)| (a - b).powi(2))
                        .sum();
                    Value::observed(d2.sqrt())
                })
                .collect()
        })
        .collect();

    HeatmapMatrix {
        rows: standardized.countries.clone(),
        columns: standardized.countries.clone(),
        values,
    }
}

/// Country × month YoY rates of one category over the window.
///
/// Every month of the window is a column, observed or not.
pub fn intensity_heatmap(yoy: &[YoyPoint], category: &str, window: &Window) -> HeatmapMatrix {
    let mut cells: BTreeMap<(&str, YearMonth), Value> = BTreeMap::new();
    let mut countries: BTreeSet<&str> = BTreeSet::new();
    for point in yoy.iter().filter(|p| p.category == category) {
        countries.insert(point.country.as_str());
        if window.contains(&point.period) {
            cells.insert((point.country.as_str(), point.period), point.rate);
        }
    }

    let periods = window.periods();
    let values = countries
        .iter()
        .map(|country| {
            periods
                .iter()
                .map(|p| cells.get(&(*country, *p)).copied().unwrap_or(Value::Missing))
                .collect()
        })
        .collect();

    HeatmapMatrix {
        rows: countries.iter().map(|c| c.to_string()).collect(),
        columns: periods.iter().map(|p| p.to_string()).collect(),
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_distance_is_symmetric_with_zero_diagonal() {
        let std = Standardized {
            countries: vec!["DE".into(), "FR".into(), "IT".into()],
            categories: vec!["A".into(), "B".into()],
            dropped_dimensions: Vec::new(),
            data: array![[0.0, 0.0], [3.0, 4.0], [1.0, 0.0]],
            means: vec![0.0, 0.0],
            std_devs: vec![1.0, 1.0],
        };
        let heat = distance_heatmap(&std);

        assert_eq!(heat.get("DE", "DE"), Some(Value::Observed(0.0)));
        assert_eq!(heat.get("DE", "FR"), Some(Value::Observed(5.0)));
        assert_eq!(heat.get("FR", "DE"), heat.get("DE", "FR"));
    }

    #[test]
    fn test_intensity_covers_whole_window() {
        let window = Window::new("2022-01".parse().unwrap(), "2022-03".parse().unwrap()).unwrap();
        let point = |country: &str, period: &str, category: &str, rate: f64| YoyPoint {
            country: country.into(),
            category: category.into(),
            period: period.parse().unwrap(),
            rate: Value::observed(rate),
        };
        let yoy = vec![
            point("FR", "2022-01", "Energy", 0.2),
            point("FR", "2022-03", "Energy", 0.3),
            point("FR", "2023-01", "Energy", 0.9),
            point("DE", "2022-02", "Energy", 0.4),
            point("DE", "2022-02", "Food", 0.1),
        ];
        let heat = intensity_heatmap(&yoy, "Energy", &window);

        assert_eq!(heat.rows, vec!["DE", "FR"]);
        assert_eq!(heat.columns, vec!["2022-01", "2022-02", "2022-03"]);
        assert_eq!(heat.get("FR", "2022-02"), Some(Value::Missing));
        assert_eq!(heat.get("FR", "2022-03"), Some(Value::Observed(0.3)));
        assert_eq!(heat.get("DE", "2022-02"), Some(Value::Observed(0.4)));
    }
}
