pub mod config;
pub mod consolidate;
pub mod draft;
pub mod entity;
pub mod error;
pub mod export;
pub mod ingest;
pub mod measurement;
pub mod pipeline;
pub mod stats;
pub mod status;
