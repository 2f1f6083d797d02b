//! Ingestion boundary
//!
//! Per-source collectors hand the pipeline raw rows as JSON objects; the
//! decoder turns each row into a typed entity, skipping malformed rows
//! without aborting the batch.

pub mod collector;
pub mod decode;

pub use collector::{CsvFileCollector, SourceCollector};
pub use decode::{decode_exoplanet, decode_star};
