//! Run configuration.
//!
//! - [`countries`] - The EU27 registry
//! - [`SourceManifest`] - Which workbooks to load, in which order
//! - [`AnalysisConfig`] - Window, thresholds and policies of one run
//!
//! Defaults reproduce the 2021-2022 shock study; every field can be
//! overridden from the environment (a `.env` file is honoured) or the CLI.

pub mod countries;

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, ConfigResult};
use crate::models::{DatasetKind, Window, YearMonth};
use crate::parser::SheetLayout;
use crate::profile::{MissingPolicy, ProfileStatistic};
use crate::validation::validate_manifest;

pub const ENV_DATA_DIR: &str = "HICP_DATA_DIR";
pub const ENV_WINDOW_START: &str = "HICP_WINDOW_START";
pub const ENV_WINDOW_END: &str = "HICP_WINDOW_END";
pub const ENV_MIN_OBSERVATIONS: &str = "HICP_MIN_OBSERVATIONS";
pub const ENV_COMPONENTS: &str = "HICP_COMPONENTS";

pub const DEFAULT_WINDOW_START: YearMonth = YearMonth::from_parts(2021, 1);
pub const DEFAULT_WINDOW_END: YearMonth = YearMonth::from_parts(2022, 12);
pub const DEFAULT_MIN_OBSERVATIONS: usize = 2;
pub const DEFAULT_COMPONENTS: usize = 2;
pub const DEFAULT_HEADLINE_CATEGORY: &str = "All-items HICP";

// =============================================================================
// Source manifest
// =============================================================================

/// One workbook to load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceSpec {
    pub dataset: DatasetKind,
    /// Workbook file or CSV sheet directory, relative to the data directory.
    pub path: PathBuf,
    /// Overrides the built-in layout of the dataset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<SheetLayout>,
}

impl SourceSpec {
    pub fn new(dataset: DatasetKind, path: impl Into<PathBuf>) -> Self {
        Self {
            dataset,
            path: path.into(),
            layout: None,
        }
    }

    pub fn layout(&self) -> SheetLayout {
        self.layout
            .clone()
            .unwrap_or_else(|| SheetLayout::for_dataset(self.dataset))
    }
}

/// Ordered list of sources. Position in the list is the load order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceManifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub sources: Vec<SourceSpec>,
}

impl Default for SourceManifest {
    fn default() -> Self {
        Self {
            version: None,
            sources: vec![
                SourceSpec::new(DatasetKind::Main, "hicp_main_categories_eu.xlsx"),
                SourceSpec::new(DatasetKind::Details, "hicp_subcategories_eu.xlsx"),
                SourceSpec::new(DatasetKind::Weights, "coicop_weights_eu.xlsx"),
            ],
        }
    }
}

impl SourceManifest {
    /// Parse and schema-validate a manifest.
    pub fn from_json(content: &str) -> ConfigResult<Self> {
        let value: serde_json::Value = serde_json::from_str(content)?;
        validate_manifest(&value).map_err(|errors| ConfigError::InvalidManifest { errors })?;
        Ok(serde_json::from_value(value)?)
    }

    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn to_json(&self) -> ConfigResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Sources of one dataset with their manifest positions.
    pub fn sources_for(&self, dataset: DatasetKind) -> impl Iterator<Item = (usize, &SourceSpec)> {
        self.sources
            .iter()
            .enumerate()
            .filter(move |(_, s)| s.dataset == dataset)
    }
}

// =============================================================================
// Analysis config
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisConfig {
    /// Directory the manifest paths are relative to.
    pub data_dir: PathBuf,
    pub manifest: SourceManifest,
    pub window: Window,
    /// Observed values a series needs in the window for its statistics.
    pub min_observations: usize,
    /// Principal components to keep.
    pub components: usize,
    pub missing_policy: MissingPolicy,
    pub statistic: ProfileStatistic,
    /// Main-dataset category used for the intensity heatmap.
    pub headline_category: String,
    /// Where cleaned long tables are written as CSV, if anywhere.
    pub export_dir: Option<PathBuf>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            manifest: SourceManifest::default(),
            window: Window {
                start: DEFAULT_WINDOW_START,
                end: DEFAULT_WINDOW_END,
            },
            min_observations: DEFAULT_MIN_OBSERVATIONS,
            components: DEFAULT_COMPONENTS,
            missing_policy: MissingPolicy::default(),
            statistic: ProfileStatistic::default(),
            headline_category: DEFAULT_HEADLINE_CATEGORY.to_string(),
            export_dir: None,
        }
    }
}

impl AnalysisConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Defaults overridden by `HICP_*` variables (a `.env` file is loaded first).
    pub fn from_env() -> ConfigResult<Self> {
        let _ = dotenvy::dotenv();
        let mut config = Self::default();
        config.apply_env(|name| env::var(name).ok())?;
        Ok(config)
    }

    /// Apply overrides from any variable lookup.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<()> {
        if let Some(dir) = lookup(ENV_DATA_DIR) {
            self.data_dir = PathBuf::from(dir);
        }

        let start = match lookup(ENV_WINDOW_START) {
            Some(s) => parse_period(&s)?,
            None => self.window.start,
        };
        let end = match lookup(ENV_WINDOW_END) {
            Some(s) => parse_period(&s)?,
            None => self.window.end,
        };
        self.set_window(start, end)?;

        if let Some(v) = lookup(ENV_MIN_OBSERVATIONS) {
            self.min_observations = parse_positive(ENV_MIN_OBSERVATIONS, &v)?;
        }
        if let Some(v) = lookup(ENV_COMPONENTS) {
            self.components = parse_positive(ENV_COMPONENTS, &v)?;
        }
        Ok(())
    }

    pub fn set_window(&mut self, start: YearMonth, end: YearMonth) -> ConfigResult<()> {
        self.window = Window::new(start, end).ok_or_else(|| ConfigError::InvalidWindow {
            start: start.to_string(),
            end: end.to_string(),
        })?;
        Ok(())
    }

    /// Absolute or data-dir-relative location of a source.
    pub fn resolve(&self, source: &SourceSpec) -> PathBuf {
        if source.path.is_absolute() {
            source.path.clone()
        } else {
            self.data_dir.join(&source.path)
        }
    }
}

pub fn parse_period(s: &str) -> ConfigResult<YearMonth> {
    s.trim()
        .parse()
        .map_err(|_| ConfigError::InvalidPeriod(s.to_string()))
}

fn parse_positive(name: &str, value: &str) -> ConfigResult<usize> {
    value
        .trim()
        .parse::<usize>()
        .ok()
        .filter(|v| *v > 0)
        .ok_or_else(|| ConfigError::InvalidEnv {
            name: name.to_string(),
            value: value.to_string(),
        })
}
