//! Column mapping data model.
//!
//! A [`ColumnMapping`] describes how one destination column is produced: which
//! source column feeds it (if any), which transformation applies, and the
//! descriptive type metadata carried along for the generated artifacts.
//! Mappings are grouped per [`TableKey`] by the [`crate::store::MappingStore`].

use std::{collections::BTreeMap, fmt, str::FromStr};

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DIRECT_TRANSFORMATION: &str = "direct";
pub const CUSTOM_SQL_TRANSFORMATION: &str = "custom_sql";

/// Identifies a source table as `schema.table`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TableKey {
    pub schema: String,
    pub table: String,
}

impl TableKey {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let (schema, table) = trimmed
            .split_once('.')
            .ok_or_else(|| anyhow!("Table key '{trimmed}' must have the form schema.table"))?;
        let schema = schema.trim();
        let table = table.trim();
        if schema.is_empty() || table.is_empty() {
            return Err(anyhow!(
                "Table key '{trimmed}' must name both a schema and a table"
            ));
        }
        Ok(Self::new(schema, table))
    }
}

impl fmt::Display for TableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

impl FromStr for TableKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// One column as reported by schema introspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceColumn {
    pub name: String,
    #[serde(rename = "type", default)]
    pub data_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<String>,
}

impl SourceColumn {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            length: None,
        }
    }

    pub fn with_length(mut self, length: impl Into<String>) -> Self {
        self.length = Some(length.into());
        self
    }
}

pub type ColumnList = Vec<SourceColumn>;

/// A single source-to-target column correspondence plus its transformation.
///
/// Transformation parameters (for example the `format` of a `date_format`
/// transformation) live in `params` and are flattened into the serialized
/// record, so persisted mappings keep the shape `{"source": .., "format": ..}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMapping {
    #[serde(default)]
    pub source: Option<String>,
    pub target: String,
    #[serde(default = "default_transformation")]
    pub transformation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_data_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_length: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_data_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_length: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub derived: bool,
    #[serde(rename = "is_audit", default, skip_serializing_if = "is_false")]
    pub is_audit: bool,
    #[serde(flatten)]
    pub params: BTreeMap<String, Value>,
}

fn default_transformation() -> String {
    DIRECT_TRANSFORMATION.to_string()
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl ColumnMapping {
    /// Minimal direct mapping where the target mirrors the source name.
    pub fn direct(source: impl Into<String>) -> Self {
        let source = source.into();
        Self {
            target: source.clone(),
            source: Some(source),
            transformation: default_transformation(),
            source_data_type: None,
            source_length: None,
            target_data_type: None,
            target_length: None,
            expression: None,
            derived: false,
            is_audit: false,
            params: BTreeMap::new(),
        }
    }

    pub fn from_column(column: &SourceColumn) -> Self {
        let mut mapping = Self::direct(column.name.clone());
        if !column.data_type.is_empty() {
            mapping.source_data_type = Some(column.data_type.clone());
        }
        mapping.source_length = column.length.clone();
        mapping
    }

    pub fn audit(target: impl Into<String>) -> Self {
        Self {
            source: None,
            target: target.into(),
            transformation: default_transformation(),
            source_data_type: None,
            source_length: None,
            target_data_type: None,
            target_length: None,
            expression: None,
            derived: true,
            is_audit: true,
            params: BTreeMap::new(),
        }
    }

    pub fn source_name(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn has_source(&self, name: &str) -> bool {
        self.source.as_deref() == Some(name)
    }

    pub fn with_transformation(mut self, transformation: impl Into<String>) -> Self {
        self.transformation = transformation.into();
        self
    }

    pub fn apply(&mut self, edit: FieldEdit) {
        match edit {
            FieldEdit::Target(value) => self.target = value,
            FieldEdit::Transformation(value) => self.transformation = value,
            FieldEdit::SourceDataType(value) => self.source_data_type = value,
            FieldEdit::SourceLength(value) => self.source_length = value,
            FieldEdit::TargetDataType(value) => self.target_data_type = value,
            FieldEdit::TargetLength(value) => self.target_length = value,
            FieldEdit::Expression(value) => self.expression = value,
            FieldEdit::Parameter { name, value } => match value {
                Some(value) => {
                    self.params.insert(name, value);
                }
                None => {
                    self.params.remove(&name);
                }
            },
        }
    }
}

/// A single-field edit on a mapping. Optional fields are cleared with `None`.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldEdit {
    Target(String),
    Transformation(String),
    SourceDataType(Option<String>),
    SourceLength(Option<String>),
    TargetDataType(Option<String>),
    TargetLength(Option<String>),
    Expression(Option<String>),
    Parameter { name: String, value: Option<Value> },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn table_key_round_trips_through_display() {
        let key = TableKey::parse(" sales.orders ").expect("parse key");
        assert_eq!(key, TableKey::new("sales", "orders"));
        assert_eq!(key.to_string(), "sales.orders");
        assert!(TableKey::parse("orders").is_err());
        assert!(TableKey::parse(".orders").is_err());
    }

    #[test]
    fn params_flatten_into_serialized_mapping() {
        let mut mapping = ColumnMapping::direct("created");
        mapping.apply(FieldEdit::Transformation("date_format".to_string()));
        mapping.apply(FieldEdit::Parameter {
            name: "format".to_string(),
            value: Some(json!("%Y-%m-%d")),
        });

        let encoded = serde_json::to_value(&mapping).expect("serialize");
        assert_eq!(
            encoded,
            json!({
                "source": "created",
                "target": "created",
                "transformation": "date_format",
                "format": "%Y-%m-%d"
            })
        );
        let decoded: ColumnMapping = serde_json::from_value(encoded).expect("deserialize");
        assert_eq!(decoded, mapping);
    }

    #[test]
    fn audit_mapping_serializes_flags() {
        let encoded = serde_json::to_value(ColumnMapping::audit("audit_column_1")).unwrap();
        assert_eq!(encoded["source"], Value::Null);
        assert_eq!(encoded["derived"], json!(true));
        assert_eq!(encoded["is_audit"], json!(true));
    }
}
