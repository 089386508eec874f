//! End-to-end runs over Eurostat-shaped CSV workbooks.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use hicp_shock::{
    eu27, run, AnalysisConfig, DatasetKind, IssueKind, LoadError, LongTable, MissingPolicy, PipelineError,
    SourceManifest, SourceSpec, Value, YearMonth,
};
use tempfile::TempDir;

struct Sheet {
    name: String,
    description: String,
    periods: Vec<String>,
    rows: Vec<Vec<String>>,
}

fn ym(s: &str) -> YearMonth {
    s.parse().unwrap()
}

fn months(start: &str, count: usize) -> Vec<String> {
    let start = ym(start);
    (0..count).map(|i| start.offset(i as i32).to_string()).collect()
}

fn write_csv(path: &Path, rows: &[Vec<String>]) {
    let text: String = rows.iter().map(|r| r.join(",") + "\n").collect();
    fs::write(path, text).unwrap();
}

/// A CSV sheet directory with a `Summary` sheet and one sheet per entry.
///
/// `with_base` selects the main/sub-category summary columns (base in 3,
/// description in 4) over the weights ones (description in 3).
fn write_workbook(dir: &Path, header_row: usize, with_base: bool, sheets: &[Sheet]) {
    fs::create_dir_all(dir).unwrap();

    let s = |v: &str| v.to_string();
    let mut summary = vec![
        vec![s(""), s("Sheet"), s(""), s("Base"), s("Description")],
        vec![s(""), s("Contents"), s(""), s(""), s("")],
    ];
    for sheet in sheets {
        if with_base {
            summary.push(vec![s(""), sheet.name.clone(), s(""), s("2015=100"), sheet.description.clone()]);
        } else {
            summary.push(vec![s(""), sheet.name.clone(), s(""), sheet.description.clone(), s("")]);
        }
    }
    write_csv(&dir.join("Summary.csv"), &summary);

    for sheet in sheets {
        let width = 1 + sheet.periods.len() * 2;
        let mut rows: Vec<Vec<String>> = (0..header_row)
            .map(|i| {
                let mut row = vec![String::new(); width];
                if i == 0 {
                    row[0] = s("Dataset: prc_hicp_midx");
                }
                row
            })
            .collect();

        let mut header = vec![s("TIME")];
        for p in &sheet.periods {
            header.push(p.clone());
            header.push(String::new());
        }
        rows.push(header);

        for row in &sheet.rows {
            let mut out = vec![row[0].clone()];
            for v in &row[1..] {
                out.push(v.clone());
                out.push(String::new());
            }
            rows.push(out);
        }
        write_csv(&dir.join(format!("{}.csv", sheet.name)), &rows);
    }
}

/// Monthly index sheet 2020-01..=2022-12 growing at `growth(row)` a year.
fn index_sheet(name: &str, description: &str, labels: &[&str], growth: impl Fn(usize) -> f64) -> Sheet {
    let periods = months("2020-01", 36);
    let rows = labels
        .iter()
        .enumerate()
        .map(|(i, label)| {
            let g = growth(i);
            let mut row = vec![label.to_string()];
            row.extend((0..periods.len()).map(|m| format!("{}", 100.0 * (1.0 + g).powf(m as f64 / 12.0))));
            row
        })
        .collect();
    Sheet {
        name: name.into(),
        description: description.into(),
        periods,
        rows,
    }
}

const MEMBERS: [&str; 4] = ["France", "Germany", "Italy", "Spain"];

fn write_main(dir: &Path, food_growth: impl Fn(usize) -> f64) {
    let mut headline: Vec<&str> = MEMBERS.to_vec();
    headline.push("Euro area - 19 countries");
    let mut energy: Vec<&str> = MEMBERS.to_vec();
    energy.push("XX");

    write_workbook(
        dir,
        8,
        true,
        &[
            index_sheet("Sheet 1", "All-items HICP", &headline, |i| 0.03 + 0.01 * i as f64),
            index_sheet("Sheet 2", "Energy", &energy, |i| 0.10 + 0.05 * i as f64),
            index_sheet("Sheet 3", "Food", &MEMBERS, food_growth),
        ],
    );
}

fn write_study(root: &Path) {
    write_main(&root.join("main"), |i| 0.02 + 0.005 * (i * i) as f64);

    // Italy / Food / 2020-06 is not available
    let food = root.join("main").join("Sheet 3.csv");
    let text = fs::read_to_string(&food).unwrap();
    let patched: Vec<String> = text
        .lines()
        .map(|line| {
            if line.starts_with("Italy,") {
                let mut cells: Vec<String> = line.split(',').map(String::from).collect();
                // label, then (value, flag) pairs: 2020-06 is the sixth value
                cells[1 + 5 * 2] = ":".to_string();
                cells.join(",")
            } else {
                line.to_string()
            }
        })
        .collect();
    fs::write(&food, patched.join("\n") + "\n").unwrap();

    write_workbook(
        &root.join("main_revision"),
        8,
        true,
        &[Sheet {
            name: "Sheet 2".into(),
            description: "Energy".into(),
            periods: vec!["2021-01".into()],
            rows: vec![vec!["France".into(), "105".into()]],
        }],
    );

    write_workbook(
        &root.join("details"),
        8,
        true,
        &[
            index_sheet("Sheet 2", "Bread and cereals", &MEMBERS, |i| 0.04 + 0.01 * i as f64),
            index_sheet("Sheet 80", "Electricity", &MEMBERS, |i| 0.20 + 0.02 * i as f64),
            index_sheet("Sheet 120", "Fuels and lubricants", &MEMBERS, |i| 0.15 - 0.01 * i as f64),
            index_sheet("Sheet 200", "Recreational services", &MEMBERS, |_| 0.02),
        ],
    );

    let weight_rows = |base: f64| {
        MEMBERS
            .iter()
            .enumerate()
            .map(|(i, m)| {
                let w = base + 10.0 * i as f64;
                vec![m.to_string(), format!("{}", w), format!("{}", w + 5.0)]
            })
            .collect()
    };
    write_workbook(
        &root.join("weights"),
        7,
        false,
        &[
            Sheet {
                name: "Sheet 1".into(),
                description: "Energy".into(),
                periods: vec!["2021".into(), "2022".into()],
                rows: weight_rows(100.0),
            },
            Sheet {
                name: "Sheet 2".into(),
                description: "Food".into(),
                periods: vec!["2021".into(), "2022".into()],
                rows: weight_rows(200.0),
            },
        ],
    );
}

fn study_manifest() -> SourceManifest {
    SourceManifest {
        version: None,
        sources: vec![
            SourceSpec::new(DatasetKind::Main, "main"),
            SourceSpec::new(DatasetKind::Details, "details"),
            SourceSpec::new(DatasetKind::Weights, "weights"),
            SourceSpec::new(DatasetKind::Main, "main_revision"),
        ],
    }
}

fn study_config(root: &Path) -> AnalysisConfig {
    let mut config = AnalysisConfig::new(root);
    config.manifest = study_manifest();
    config
}

#[test]
fn test_full_run() {
    let tmp = TempDir::new().unwrap();
    write_study(tmp.path());
    let result = run(&study_config(tmp.path())).unwrap();

    // Only EU27 members survive cleaning.
    assert_eq!(result.main.countries(), vec!["DE", "ES", "FR", "IT"]);
    assert!(result.main.countries().iter().all(|c| eu27().contains_code(c)));

    let main_report = result.report.dataset(DatasetKind::Main).unwrap();
    assert_eq!(main_report.sources, vec!["main", "main_revision"]);
    assert_eq!(main_report.clean.count(IssueKind::UnknownCountry), 72);
    assert!(main_report.clean.samples[&IssueKind::UnknownCountry].contains(&"XX".to_string()));
    assert_eq!(main_report.clean.placeholders, 1);

    // One record per key; the revision overrides the original cell.
    assert_eq!(result.main.len(), 4 * 3 * 36);
    assert_eq!(main_report.overridden, 1);
    assert_eq!(result.main.get("FR", "Energy", ym("2021-01")), Some(Value::Observed(105.0)));
    assert_eq!(result.main.get("IT", "Food", ym("2020-06")), Some(Value::Missing));
}

#[test]
fn test_derived_series() {
    let tmp = TempDir::new().unwrap();
    write_study(tmp.path());
    let result = run(&study_config(tmp.path())).unwrap();

    // No year-ago value for 2020.
    assert!(result
        .yoy
        .iter()
        .filter(|p| p.period < ym("2021-01"))
        .all(|p| p.rate.is_missing()));
    let de_energy = result
        .yoy
        .iter()
        .find(|p| p.country == "DE" && p.category == "Energy" && p.period == ym("2022-05"))
        .unwrap();
    assert!((de_energy.rate.as_option().unwrap() - 0.15).abs() < 1e-9);

    // Shares of the components sum to one where nothing is missing.
    let mut sums: BTreeMap<(String, YearMonth), (f64, bool)> = BTreeMap::new();
    for share in &result.shares {
        assert_ne!(share.category, "All-items HICP");
        let entry = sums.entry((share.country.clone(), share.period)).or_insert((0.0, true));
        match share.share {
            Value::Observed(v) => entry.0 += v,
            Value::Missing => entry.1 = false,
        }
    }
    for ((_, _), (sum, complete)) in sums {
        if complete {
            assert!((sum - 1.0).abs() < 1e-9);
        }
    }

    // weight / 1000 × yoy with the annual weight of the period's year
    let contribution = result
        .contributions
        .iter()
        .find(|c| c.country == "FR" && c.category == "Energy" && c.period == ym("2022-03"))
        .unwrap();
    let rate = result
        .yoy
        .iter()
        .find(|p| p.country == "FR" && p.category == "Energy" && p.period == ym("2022-03"))
        .unwrap()
        .rate
        .as_option()
        .unwrap();
    assert!((contribution.contribution.as_option().unwrap() - 105.0 / 1000.0 * rate).abs() < 1e-12);
    assert!(result.contributions.iter().all(|c| c.category != "All-items HICP"));

    // Sub-categories roll up into their sheet-range groups.
    let groups: BTreeSet<&str> = result.group_yoy.iter().map(|p| p.category.as_str()).collect();
    assert_eq!(groups, BTreeSet::from(["Food", "Housing & Energy", "Other", "Transport"]));
    assert!(!result.group_stats.is_empty());
}

#[test]
fn test_profile_and_heatmaps() {
    let tmp = TempDir::new().unwrap();
    write_study(tmp.path());
    let result = run(&study_config(tmp.path())).unwrap();

    assert_eq!(result.profile.categories, vec!["Energy", "Food"]);
    assert!(result.report.excluded_countries.is_empty());
    assert!(result.report.profile_error.is_none());

    let embedding = result.embedding.as_ref().unwrap();
    assert_eq!(embedding.countries, vec!["DE", "ES", "FR", "IT"]);
    assert_eq!(embedding.components(), 2);
    let total: f64 = embedding.explained_variance_ratio.iter().sum();
    assert!((total - 1.0).abs() < 1e-9);
    assert!(embedding.scores.iter().flatten().all(|v| v.is_finite()));

    let distance = result.distance_heatmap.as_ref().unwrap();
    assert_eq!(distance.rows.len(), 4);
    assert_eq!(distance.get("FR", "FR"), Some(Value::Observed(0.0)));

    let intensity = result.intensity_heatmap.as_ref().unwrap();
    assert_eq!(intensity.columns.len(), 24);
    assert_eq!(intensity.columns[0], "2021-01");

    assert!(!result.report.logs.is_empty());
    assert_eq!(result.report.eu27_version, "2020-02");
}

#[test]
fn test_export_round_trip() {
    let tmp = TempDir::new().unwrap();
    write_study(tmp.path());
    let mut config = study_config(tmp.path());
    config.export_dir = Some(tmp.path().join("out"));
    let result = run(&config).unwrap();

    let exported = LongTable::read_csv_file(&tmp.path().join("out").join("main_long.csv")).unwrap();
    assert_eq!(exported.records().collect::<Vec<_>>(), result.main.records().collect::<Vec<_>>());
    assert!(tmp.path().join("out").join("weights_long.csv").is_file());
}

#[test]
fn test_constant_category_is_dropped() {
    let tmp = TempDir::new().unwrap();
    write_main(&tmp.path().join("main"), |_| 0.03);
    let mut config = AnalysisConfig::new(tmp.path());
    config.manifest = SourceManifest {
        version: None,
        sources: vec![SourceSpec::new(DatasetKind::Main, "main")],
    };
    config.missing_policy = MissingPolicy::ImputeMean;

    let result = run(&config).unwrap();
    assert_eq!(result.report.dropped_dimensions, vec!["Food"]);
    let embedding = result.embedding.unwrap();
    assert_eq!(embedding.categories, vec!["Energy"]);
    assert!(embedding.scores.iter().flatten().all(|v| v.is_finite()));
    assert!(result.details.is_none() && result.weights.is_none());
}

#[test]
fn test_missing_configured_source_is_fatal() {
    let tmp = TempDir::new().unwrap();
    write_main(&tmp.path().join("main"), |i| 0.02 + 0.01 * i as f64);
    let mut config = AnalysisConfig::new(tmp.path());
    config.manifest = SourceManifest {
        version: None,
        sources: vec![
            SourceSpec::new(DatasetKind::Main, "main"),
            SourceSpec::new(DatasetKind::Weights, "coicop_weights_eu.xlsx"),
        ],
    };

    match run(&config) {
        Err(PipelineError::Load(LoadError::FileNotFound(path))) => {
            assert!(path.ends_with("coicop_weights_eu.xlsx"));
        }
        other => panic!("unexpected: {:?}", other.map(|r| r.main.len())),
    }
}

#[test]
fn test_manifest_without_main_dataset() {
    let tmp = TempDir::new().unwrap();
    let mut config = AnalysisConfig::new(tmp.path());
    config.manifest = SourceManifest {
        version: None,
        sources: vec![SourceSpec::new(DatasetKind::Weights, "weights")],
    };
    assert!(matches!(run(&config), Err(PipelineError::MissingMainDataset)));
}

#[test]
fn test_layout_mismatch_names_the_sheet() {
    let tmp = TempDir::new().unwrap();
    // weights-shaped workbook read with the main layout: header on the wrong row
    write_workbook(
        &tmp.path().join("main"),
        5,
        true,
        &[index_sheet("Sheet 1", "All-items HICP", &MEMBERS, |_| 0.02)],
    );
    let mut config = AnalysisConfig::new(tmp.path());
    config.manifest = SourceManifest {
        version: None,
        sources: vec![SourceSpec::new(DatasetKind::Main, "main")],
    };

    match run(&config) {
        Err(PipelineError::Load(LoadError::LayoutMismatch { sheet, .. })) => assert_eq!(sheet, "Sheet 1"),
        other => panic!("unexpected: {:?}", other.map(|r| r.main.len())),
    }
}

#[test]
fn test_single_country_reports_profile_error() {
    let tmp = TempDir::new().unwrap();
    write_workbook(
        &tmp.path().join("main"),
        8,
        true,
        &[
            index_sheet("Sheet 1", "Energy", &["France"], |_| 0.1),
            index_sheet("Sheet 2", "Food", &["France"], |_| 0.05),
        ],
    );
    let mut config = AnalysisConfig::new(tmp.path());
    config.manifest = SourceManifest {
        version: None,
        sources: vec![SourceSpec::new(DatasetKind::Main, "main")],
    };

    let result = run(&config).unwrap();
    assert!(result.embedding.is_none());
    assert!(result.report.profile_error.unwrap().contains("at least 2"));
    assert!(result.intensity_heatmap.is_none());
}

#[test]
fn test_category_without_window_data_is_dropped_not_fatal() {
    let tmp = TempDir::new().unwrap();
    let mut services = index_sheet("Sheet 2", "Services", &MEMBERS, |_| 0.02);
    // 2020 only: no YoY rate falls inside the window
    services.periods.truncate(12);
    for row in &mut services.rows {
        row.truncate(13);
    }
    write_workbook(
        &tmp.path().join("main"),
        8,
        true,
        &[
            index_sheet("Sheet 1", "Energy", &MEMBERS, |i| 0.10 + 0.05 * i as f64),
            services,
        ],
    );
    let mut config = AnalysisConfig::new(tmp.path());
    config.manifest = SourceManifest {
        version: None,
        sources: vec![SourceSpec::new(DatasetKind::Main, "main")],
    };
    assert_eq!(config.missing_policy, MissingPolicy::Exclude);

    let result = run(&config).unwrap();
    assert!(result.report.excluded_countries.is_empty());
    assert_eq!(result.report.dropped_dimensions, vec!["Services"]);
    assert!(result.report.profile_error.is_none());
    let embedding = result.embedding.unwrap();
    assert_eq!(embedding.countries, vec!["DE", "ES", "FR", "IT"]);
    assert_eq!(embedding.categories, vec!["Energy"]);
}

#[test]
fn test_concurrent_runs_keep_their_own_logs() {
    let tmp = TempDir::new().unwrap();
    write_study(tmp.path());
    let config = study_config(tmp.path());

    let reports: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..2).map(|_| scope.spawn(|| run(&config).unwrap().report)).collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for report in &reports {
        let starts: Vec<&str> = report
            .logs
            .iter()
            .filter(|e| e.message.contains("Run "))
            .map(|e| e.message.as_str())
            .collect();
        assert_eq!(starts.len(), 1);
        assert!(starts[0].contains(&report.run_id.to_string()));
    }
    assert_ne!(reports[0].run_id, reports[1].run_id);
}

#[test]
fn test_all_dropped_dataset_exports_header_only() {
    let tmp = TempDir::new().unwrap();
    write_main(&tmp.path().join("main"), |i| 0.02 + 0.01 * i as f64);
    write_workbook(
        &tmp.path().join("details"),
        8,
        true,
        &[index_sheet("Sheet 2", "Bread", &["XX", "Euro area - 19 countries"], |_| 0.02)],
    );
    let mut config = AnalysisConfig::new(tmp.path());
    config.manifest = SourceManifest {
        version: None,
        sources: vec![
            SourceSpec::new(DatasetKind::Main, "main"),
            SourceSpec::new(DatasetKind::Details, "details"),
        ],
    };
    config.export_dir = Some(tmp.path().join("out"));

    let result = run(&config).unwrap();
    assert!(result.details.unwrap().is_empty());
    let exported = fs::read_to_string(tmp.path().join("out").join("details_long.csv")).unwrap();
    assert_eq!(exported, "country,category,period,value\n");
}
