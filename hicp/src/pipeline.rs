//! End-to-end analysis run.
//!
//! Runs every stage once, strictly forward:
//!
//! 1. Load each manifest source (in manifest order) against its layout
//! 2. Clean and reshape each dataset into a [`LongTable`]
//! 3. Aggregate: YoY rates, shares, weighted contributions, window statistics
//! 4. Profile: country matrix, standardization, PCA, heatmaps
//!
//! Only load errors abort the run. Dropped cells, short series and an
//! irreducible profile matrix are recorded in the [`RunReport`].
//!
//! # Example
//!
//! ```rust,ignore
//! use hicp_shock::{run, AnalysisConfig};
//!
//! let result = run(&AnalysisConfig::new("data"))?;
//! println!("{} countries profiled", result.embedding.map_or(0, |e| e.countries.len()));
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use uuid::Uuid;

use crate::aggregate::{
    category_groups, contribution_shares, group_means, weighted_contributions, window_stats, yoy_rates,
    InsufficientData,
};
use crate::clean::{clean, CleanReport};
use crate::config::countries::EU27_VERSION;
use crate::config::AnalysisConfig;
use crate::error::{LoadError, PipelineError, PipelineResult};
use crate::logs::{capture, log_info, log_info_indent, log_success, log_warning, LogEntry};
use crate::models::{
    CategoryGroup, Contribution, DatasetKind, HeatmapMatrix, ShareRecord, Window, WindowStat, YoyPoint,
};
use crate::parser::{load_source, SheetEntry};
use crate::profile::{distance_heatmap, intensity_heatmap, pca, standardize, Embedding, ProfileMatrix};
use crate::reshape::LongTable;

/// Insufficient-data issues kept verbatim in the report.
const MAX_REPORTED_ISSUES: usize = 20;

/// What happened to one dataset between load and reshape.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetReport {
    pub dataset: DatasetKind,
    pub sources: Vec<String>,
    pub sheets: usize,
    pub raw_cells: usize,
    pub clean: CleanReport,
    /// Keys replaced by a later source or a later cell.
    pub overridden: usize,
    pub records: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub eu27_version: String,
    pub window: Window,
    pub datasets: Vec<DatasetReport>,
    pub insufficient_series: usize,
    pub insufficient_samples: Vec<InsufficientData>,
    pub excluded_countries: Vec<String>,
    pub imputed_cells: usize,
    pub dropped_dimensions: Vec<String>,
    /// Why no embedding was produced, if none was.
    pub profile_error: Option<String>,
    pub logs: Vec<LogEntry>,
}

impl RunReport {
    pub fn dataset(&self, kind: DatasetKind) -> Option<&DatasetReport> {
        self.datasets.iter().find(|d| d.dataset == kind)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub main: LongTable,
    pub details: Option<LongTable>,
    pub weights: Option<LongTable>,
    pub yoy: Vec<YoyPoint>,
    pub stats: Vec<WindowStat>,
    pub shares: Vec<ShareRecord>,
    pub contributions: Vec<Contribution>,
    /// Mean sub-category YoY per main group.
    pub group_yoy: Vec<YoyPoint>,
    pub group_stats: Vec<WindowStat>,
    pub profile: ProfileMatrix,
    pub embedding: Option<Embedding>,
    pub distance_heatmap: Option<HeatmapMatrix>,
    pub intensity_heatmap: Option<HeatmapMatrix>,
    pub report: RunReport,
}

/// A dataset after load, clean and reshape.
struct LoadedDataset {
    table: LongTable,
    entries: Vec<SheetEntry>,
    report: DatasetReport,
}

/// Load, clean and reshape every source of one dataset.
///
/// Returns `None` when the manifest lists no source for it.
fn load_dataset(config: &AnalysisConfig, kind: DatasetKind) -> PipelineResult<Option<LoadedDataset>> {
    let sources: Vec<_> = config.manifest.sources_for(kind).collect();
    if sources.is_empty() {
        return Ok(None);
    }

    log_info(format!("📂 Loading {} dataset ({} source(s))", kind, sources.len()));
    let mut names = Vec::new();
    let mut entries = Vec::new();
    let mut raw = Vec::new();
    for (index, spec) in sources {
        let loaded = load_source(&config.resolve(spec), &spec.layout(), index)?;
        names.push(loaded.name);
        entries.extend(loaded.entries);
        raw.extend(loaded.observations);
    }

    let raw_cells = raw.len();
    let cleaned = clean(raw);
    log_info_indent(cleaned.report.summary(), 1);
    for (issue, labels) in &cleaned.report.samples {
        log_warning_samples(&format!("{:?}", issue), labels);
    }

    let table = LongTable::from_observations(cleaned.observations);
    if table.overridden() > 0 {
        log_info_indent(format!("{} duplicate keys resolved in load order", table.overridden()), 1);
    }
    log_success(format!("{}: {} records", kind, table.len()));

    if let Some(dir) = &config.export_dir {
        fs::create_dir_all(dir).map_err(LoadError::from)?;
        let path = dir.join(format!("{}_long.csv", kind));
        table.write_csv_file(&path)?;
        log_info_indent(format!("💾 Exported {}", path.display()), 1);
    }

    let report = DatasetReport {
        dataset: kind,
        sources: names,
        sheets: entries.len(),
        raw_cells,
        clean: cleaned.report,
        overridden: table.overridden(),
        records: table.len(),
    };
    Ok(Some(LoadedDataset { table, entries, report }))
}

fn log_warning_samples(issue: &str, labels: &[String]) {
    if !labels.is_empty() {
        log_warning(format!("{}: e.g. {}", issue, labels.join(", ")));
    }
}

/// Run the whole analysis.
///
/// The report carries the log entries of this run only, even when other
/// runs share the process.
pub fn run(config: &AnalysisConfig) -> PipelineResult<AnalysisResult> {
    let (result, logs) = capture(|| analyse(config));
    let mut result = result?;
    result.report.logs = logs;
    Ok(result)
}

fn analyse(config: &AnalysisConfig) -> PipelineResult<AnalysisResult> {
    let run_id = Uuid::new_v4();
    let started_at = Utc::now();
    log_info(format!("🚀 Run {} (window {}, EU27 {})", run_id, config.window, EU27_VERSION));

    // =========================================================================
    // Load → Clean → Reshape
    // =========================================================================

    let main = load_dataset(config, DatasetKind::Main)?.ok_or(PipelineError::MissingMainDataset)?;
    if main.table.is_empty() {
        return Err(PipelineError::EmptyDataset(DatasetKind::Main.to_string()));
    }
    let details = load_dataset(config, DatasetKind::Details)?;
    let weights = load_dataset(config, DatasetKind::Weights)?;

    // =========================================================================
    // Aggregate
    // =========================================================================

    log_info("📈 Aggregating");
    let yoy = yoy_rates(&main.table);
    let stats_output = window_stats(&yoy, &config.window, config.min_observations);
    let components = main.table.filter_categories(|c| c != config.headline_category);
    let shares = contribution_shares(&components);

    let contributions = match &weights {
        Some(w) => weighted_contributions(&yoy, &w.table),
        None => Vec::new(),
    };

    let (group_yoy, group_stats, group_insufficient) = match &details {
        Some(d) => {
            let groups = category_groups(&d.entries);
            let detail_yoy = yoy_rates(&d.table);
            let group_yoy = group_means(&detail_yoy, &groups);
            let output = window_stats(&group_yoy, &config.window, config.min_observations);
            let other = groups.values().filter(|g| **g == CategoryGroup::Other).count();
            if other > 0 {
                log_info_indent(format!("{} sub-categories outside the Food/Housing/Transport ranges", other), 1);
            }
            (group_yoy, output.stats, output.insufficient)
        }
        None => (Vec::new(), Vec::new(), Vec::new()),
    };

    let mut insufficient = stats_output.insufficient;
    insufficient.extend(group_insufficient);
    if !insufficient.is_empty() {
        log_warning(format!(
            "{} series have fewer than {} observations in {}",
            insufficient.len(),
            config.min_observations,
            config.window
        ));
    }
    log_success(format!(
        "{} YoY points, {} window statistics, {} contributions",
        yoy.len(),
        stats_output.stats.len(),
        contributions.len()
    ));

    // =========================================================================
    // Profile
    // =========================================================================

    log_info("🧭 Profiling countries");
    let categories = components.categories();
    let profile = ProfileMatrix::from_stats(&stats_output.stats, config.window, config.statistic, Some(&categories));
    let complete = profile.complete(config.missing_policy);
    if !complete.excluded.is_empty() {
        log_warning(format!("Excluded incomplete profiles: {}", complete.excluded.join(", ")));
    }
    if complete.imputed > 0 {
        log_info_indent(format!("{} profile cells imputed with the category mean", complete.imputed), 1);
    }

    let mut dropped_dimensions = complete.dropped.clone();
    let (embedding, distance, profile_error) = match standardize(&complete) {
        Ok(standardized) => {
            dropped_dimensions = standardized.dropped_dimensions.clone();
            if !dropped_dimensions.is_empty() {
                log_warning(format!("Categories dropped from the profile: {}", dropped_dimensions.join(", ")));
            }
            let embedding = pca(&standardized, config.components);
            log_success(format!(
                "PCA: {} countries, explained variance {:?}",
                embedding.countries.len(),
                embedding
                    .explained_variance_ratio
                    .iter()
                    .map(|r| format!("{:.1}%", r * 100.0))
                    .collect::<Vec<_>>()
            ));
            (Some(embedding), Some(distance_heatmap(&standardized)), None)
        }
        Err(e) => {
            log_warning(format!("No embedding: {}", e));
            (None, None, Some(e.to_string()))
        }
    };

    let intensity = main
        .table
        .categories()
        .contains(&config.headline_category)
        .then(|| intensity_heatmap(&yoy, &config.headline_category, &config.window));

    // =========================================================================
    // Report
    // =========================================================================

    let datasets: Vec<DatasetReport> = [Some(&main), details.as_ref(), weights.as_ref()]
        .into_iter()
        .flatten()
        .map(|d| d.report.clone())
        .collect();
    let dropped: usize = datasets.iter().map(|d| d.clean.dropped()).sum();
    log_success(format!("✨ Done: {} cells dropped across {} dataset(s)", dropped, datasets.len()));

    let report = RunReport {
        run_id,
        started_at,
        eu27_version: EU27_VERSION.to_string(),
        window: config.window,
        datasets,
        insufficient_series: insufficient.len(),
        insufficient_samples: insufficient.into_iter().take(MAX_REPORTED_ISSUES).collect(),
        excluded_countries: complete.excluded,
        imputed_cells: complete.imputed,
        dropped_dimensions,
        profile_error,
        logs: Vec::new(),
    };

    Ok(AnalysisResult {
        main: main.table,
        details: details.map(|d| d.table),
        weights: weights.map(|w| w.table),
        yoy,
        stats: stats_output.stats,
        shares,
        contributions,
        group_yoy,
        group_stats,
        profile,
        embedding,
        distance_heatmap: distance,
        intensity_heatmap: intensity,
        report,
    })
}
