//! The canonical schema contract.
//!
//! Schema = Intent: a user-declared target structure that hostile CSV input
//! must be normalized against. Mirrors the "schema is a contract" framing
//! this workspace already uses for its own schema crate, narrowed to the
//! fields the ingestion pipeline actually needs.

mod column;
mod validator;

pub use column::{CanonicalSchema, ColumnDefinition, ErrorPolicy};
pub use validator::Validator;

pub use ingest_protocol::DataType;
