//! Panel data module.
//!
//! Provides the county-day panel types and the polars-based loader.

pub mod loader;
pub mod types;

pub use loader::{check_schema, LoaderError, PanelLoader, EXPECTED_COLUMNS};
pub use types::{MobilityIndicator, Panel, PanelRecord, SchemaError};
