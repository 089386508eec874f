//! Error types for the HICP analysis pipeline.
//!
//! - [`LoadError`] - Fatal source loading errors (missing file/sheet, layout mismatch)
//! - [`ConfigError`] - Invalid manifest, window or environment override
//! - [`ProfileError`] - Profile matrix cannot be reduced
//! - [`PipelineError`] - Top-level orchestration errors
//!
//! Recoverable data issues (unknown countries, bad periods, short series) are
//! not errors: they are accumulated into reports by the stage that meets them.

use std::path::PathBuf;
use thiserror::Error;

// =============================================================================
// Load Errors
// =============================================================================

/// Errors while reading a source workbook. Always fatal for the run.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Configured source does not exist.
    #[error("Source file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Workbook could not be opened or decoded.
    #[error("Cannot open workbook '{path}': {message}")]
    Workbook { path: String, message: String },

    /// A sheet named by the summary or the layout is absent.
    #[error("Sheet '{sheet}' not found in '{workbook}'")]
    SheetNotFound { workbook: String, sheet: String },

    /// Sheet content does not match the declared layout.
    #[error("Layout mismatch in '{workbook}', sheet '{sheet}': {message}")]
    LayoutMismatch {
        workbook: String,
        sheet: String,
        message: String,
    },

    /// Malformed row in an exported long table.
    #[error("Invalid long-table row {line}: {message}")]
    InvalidRow { line: usize, message: String },

    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors while building an [`crate::config::AnalysisConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Manifest failed schema validation.
    #[error("Invalid source manifest: {}", .errors.join("; "))]
    InvalidManifest { errors: Vec<String> },

    #[error("Invalid period '{0}'")]
    InvalidPeriod(String),

    #[error("Analysis window start {start} is after end {end}")]
    InvalidWindow { start: String, end: String },

    /// Environment override with an unusable value.
    #[error("Invalid value for {name}: '{value}'")]
    InvalidEnv { name: String, value: String },

    #[error("Manifest JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Cannot read manifest: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Profile Errors
// =============================================================================

/// Errors from standardization and dimensionality reduction.
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("Need at least 2 complete country profiles, found {found}")]
    TooFewCountries { found: usize },

    /// Every category was constant across countries.
    #[error("No category varies across countries")]
    NoVaryingDimension,
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level error returned by [`crate::pipeline::run`].
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Profile error: {0}")]
    Profile(#[from] ProfileError),

    /// The manifest names no main-category source.
    #[error("Manifest has no source for the main dataset")]
    MissingMainDataset,

    /// Every observation of a required dataset was dropped.
    #[error("Dataset '{0}' has no usable observations")]
    EmptyDataset(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

pub type LoadResult<T> = Result<T, LoadError>;

pub type ConfigResult<T> = Result<T, ConfigError>;

pub type ProfileResult<T> = Result<T, ProfileError>;

pub type PipelineResult<T> = Result<T, PipelineError>;
