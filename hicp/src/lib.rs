//! # HICP Shock - Eurostat HICP loading and country profiling
//!
//! Reads Eurostat HICP spreadsheet exports for the EU27, cleans and reshapes
//! them into a long table, and derives the statistics, country profiles,
//! principal components and heatmap matrices of the 2021-2022 inflation shock.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌────────────┐   ┌──────────┐
//! │  Loader  │──▶│ Cleaner  │──▶│ Reshaper │──▶│ Aggregator │──▶│ Profiler │
//! │ (parser) │   │ (clean)  │   │(reshape) │   │(aggregate) │   │(profile) │
//! └──────────┘   └──────────┘   └──────────┘   └────────────┘   └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use hicp_shock::{run, AnalysisConfig};
//!
//! let config = AnalysisConfig::from_env()?;
//! let result = run(&config)?;
//! println!("{}", result.report.datasets[0].clean.summary());
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Periods, values and records passed between stages
//! - [`parser`] - Workbook access and declared sheet layouts
//! - [`clean`] - EU27 filter, value coercion, period parsing
//! - [`reshape`] - Keyed long table and CSV export
//! - [`aggregate`] - YoY rates, shares, contributions, window statistics
//! - [`profile`] - Profile matrix, PCA and heatmaps
//! - [`pipeline`] - One-call analysis run
//! - [`config`] - Manifest, window and EU27 registry
//! - [`validation`] - Manifest schema validation
//! - [`logs`] - Run log

// Core modules
pub mod error;
pub mod logs;
pub mod models;

// Configuration
pub mod config;
pub mod validation;

// Stages
pub mod aggregate;
pub mod clean;
pub mod parser;
pub mod profile;
pub mod reshape;

// Orchestration
pub mod pipeline;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConfigError, ConfigResult, LoadError, LoadResult, PipelineError, PipelineResult, ProfileError, ProfileResult,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    CategoryGroup, Cell, CleanObservation, Contribution, DatasetKind, HeatmapMatrix, LongRecord, RawObservation,
    SeriesPoint, ShareRecord, Value, Window, WindowStat, YearMonth, YoyPoint,
};

// =============================================================================
// Re-exports - Configuration
// =============================================================================

pub use config::countries::{eu27, Country, CountrySet, EU27, EU27_VERSION};
pub use config::{AnalysisConfig, SourceManifest, SourceSpec};
pub use validation::{is_valid, is_valid_manifest, validate, validate_manifest};

// =============================================================================
// Re-exports - Loader
// =============================================================================

pub use parser::{
    load_sheet, load_source, load_summary, open_workbook, CsvWorkbook, LoadedSource, MemoryWorkbook, SheetEntry,
    SheetGrid, SheetLayout, Workbook, XlsxWorkbook,
};

// =============================================================================
// Re-exports - Cleaner / Reshaper
// =============================================================================

pub use clean::{clean, coerce_value, parse_period, CleanOutput, CleanReport, Cleaner, IssueKind};
pub use reshape::LongTable;

// =============================================================================
// Re-exports - Aggregator
// =============================================================================

pub use aggregate::{
    category_groups, contribution_shares, group_for_sheet, group_means, weighted_contributions, window_stats,
    yoy_rates, InsufficientData, StatsOutput,
};

// =============================================================================
// Re-exports - Profiler
// =============================================================================

pub use profile::{
    distance_heatmap, intensity_heatmap, pca, standardize, CompleteProfile, CountryProfile, Embedding,
    MissingPolicy, ProfileMatrix, ProfileStatistic, Standardized,
};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use pipeline::{run, AnalysisResult, DatasetReport, RunReport};
