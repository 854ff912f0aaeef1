//! Shared wire types for the CSV ingestion core.
//!
//! This crate has no intra-core dependencies: it is the leaf every other
//! ingestion crate builds on. It carries every data-model primitive that
//! doesn't need a schema contract to exist: the dynamic `Value` union,
//! cell/row errors, inference/mapping/validation results, and the
//! `Ingestion` record itself.

mod cell;
mod inference;
mod ingestion;
mod mapping;
mod status;
mod validation;
mod value;

pub use cell::{CellError, CellErrorType, RowAction, RowError};
pub use inference::{InferredColumn, InferredSchema};
pub use ingestion::Ingestion;
pub use mapping::{ColumnMapping, MappingCandidate, MappingMethod, MappingResult, ReviewDecision};
pub use status::IngestionStatus;
pub use validation::ValidationResult;
pub use value::{DataType, Value};
