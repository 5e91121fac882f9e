//! Validation module for panel input files.
//!
//! This module provides integrity checks run before the pipeline:
//! - Schema and value ranges
//! - Per-county date continuity and history length
//! - Density and mobility coverage

pub mod data_integrity;

pub use data_integrity::{
    CheckResult, DataIntegrityReport, DataIntegrityValidator, ValidationError, ValidationResult,
};
