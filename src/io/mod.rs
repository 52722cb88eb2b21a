//! File boundary: consumption ingestion and scenario export.

pub mod consumption;
pub mod export;
