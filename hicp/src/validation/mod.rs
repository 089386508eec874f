//! JSON Schema validation for source manifests.
//!
//! The manifest schema is embedded at compile time from
//! `schemas/source-manifest.json` and validated with JSON Schema Draft 7
//! before the manifest is deserialized, so a bad manifest is reported with
//! every schema error at once rather than the first serde failure.
//!
//! # Example
//!
//! ```rust,ignore
//! use serde_json::json;
//! use hicp_shock::validation::validate_manifest;
//!
//! let manifest = json!({
//!     "sources": [{ "dataset": "main", "path": "hicp_main_categories_eu.xlsx" }]
//! });
//! assert!(validate_manifest(&manifest).is_ok());
//! ```

use once_cell::sync::Lazy;
use serde_json::Value;

static MANIFEST_SCHEMA: Lazy<Value> = Lazy::new(|| {
    serde_json::from_str(include_str!("../../schemas/source-manifest.json"))
        .expect("Invalid embedded schema")
});

/// Validate a JSON document against a schema.
///
/// Returns every validation error as a message, or `Ok(())`.
pub fn validate(schema: &Value, data: &Value) -> Result<(), Vec<String>> {
    let validator = jsonschema::draft7::new(schema)
        .map_err(|e| vec![format!("Invalid schema: {}", e)])?;

    let errors: Vec<String> = validator
        .iter_errors(data)
        .map(|e| e.to_string())
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

pub fn is_valid(schema: &Value, data: &Value) -> bool {
    jsonschema::draft7::is_valid(schema, data)
}

/// Validate against the source manifest schema.
pub fn validate_manifest(data: &Value) -> Result<(), Vec<String>> {
    validate(&MANIFEST_SCHEMA, data)
}

pub fn is_valid_manifest(data: &Value) -> bool {
    is_valid(&MANIFEST_SCHEMA, data)
}
