use crate::validator::Validator;
use ingest_protocol::DataType;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Row disposition strategy when a row contains at least one cell error.
/// Consulted in two places: validate (to decide row action) and output
/// (to decide value substitution).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    #[default]
    Flag,
    RejectRow,
    CoerceDefault,
    Abort,
}

/// A single column in a `CanonicalSchema`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: DataType,
    #[serde(default)]
    pub required: bool,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub default: Option<JsonValue>,
    #[serde(default)]
    pub date_format: Option<String>,
    #[serde(default)]
    pub validators: Vec<Validator>,
}

fn default_nullable() -> bool {
    true
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            required: false,
            nullable: true,
            aliases: Vec::new(),
            default: None,
            date_format: None,
            validators: Vec::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn not_nullable(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn with_aliases(mut self, aliases: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_default(mut self, default: JsonValue) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_validators(mut self, validators: Vec<Validator>) -> Self {
        self.validators = validators;
        self
    }
}

/// The user-declared target structure a CSV must conform to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalSchema {
    pub name: String,
    pub version: u32,
    #[serde(default)]
    pub description: Option<String>,
    pub columns: Vec<ColumnDefinition>,
    #[serde(default)]
    pub error_policy: ErrorPolicy,
    #[serde(default)]
    pub strict: bool,
}

impl CanonicalSchema {
    pub fn new(name: impl Into<String>, version: u32, columns: Vec<ColumnDefinition>) -> Self {
        Self {
            name: name.into(),
            version,
            description: None,
            columns,
            error_policy: ErrorPolicy::default(),
            strict: false,
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_a_schema_with_required_and_aliased_columns() {
        let schema = CanonicalSchema::new(
            "orders",
            1,
            vec![
                ColumnDefinition::new("order_id", DataType::String).required(),
                ColumnDefinition::new("customer_email", DataType::Email).with_aliases(["email"]),
            ],
        );
        assert_eq!(schema.columns.len(), 2);
        assert!(schema.column("order_id").unwrap().required);
        assert_eq!(schema.column("customer_email").unwrap().aliases, vec!["email"]);
    }
}
