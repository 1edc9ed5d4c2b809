//! Column lists produced by schema introspection.
//!
//! Introspection output is accepted either as a JSON array of
//! `{"name", "type", "length"}` objects or as a CSV file with `name` and
//! `type` headers and an optional `length` header.

use std::path::Path;

use anyhow::{Context, Result, anyhow};
use log::info;

use crate::{
    io_utils,
    mapping::{ColumnList, SourceColumn},
};

pub fn load_columns(path: &Path) -> Result<ColumnList> {
    let text = io_utils::read_text(path, None)?;
    let columns = if text.trim_start().starts_with('[') {
        serde_json::from_str::<ColumnList>(&text)
            .with_context(|| format!("Parsing column list JSON from {path:?}"))?
    } else {
        parse_columns_csv(&text)
            .with_context(|| format!("Parsing column list CSV from {path:?}"))?
    };
    info!("Loaded {} column(s) from {:?}", columns.len(), path);
    Ok(columns)
}

pub fn parse_columns_csv(text: &str) -> Result<ColumnList> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());
    let headers = reader.headers()?.clone();
    let position = |name: &str| {
        headers
            .iter()
            .position(|header| header.eq_ignore_ascii_case(name))
    };
    let name_idx =
        position("name").ok_or_else(|| anyhow!("Column list is missing a 'name' header"))?;
    let type_idx = position("type");
    let length_idx = position("length");

    let mut columns = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Reading column list row {}", row + 2))?;
        let Some(name) = record.get(name_idx).filter(|name| !name.is_empty()) else {
            continue;
        };
        let data_type = type_idx.and_then(|idx| record.get(idx)).unwrap_or_default();
        let mut column = SourceColumn::new(name, data_type);
        column.length = length_idx
            .and_then(|idx| record.get(idx))
            .filter(|length| !length.is_empty())
            .map(str::to_string);
        columns.push(column);
    }
    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_column_lists_allow_missing_length() {
        let columns = parse_columns_csv("name,type\nid,int\n,varchar\nupdated_at,timestamp\n")
            .expect("parse columns");
        assert_eq!(
            columns,
            vec![
                SourceColumn::new("id", "int"),
                SourceColumn::new("updated_at", "timestamp"),
            ]
        );
    }

    #[test]
    fn csv_column_lists_require_a_name_header() {
        let err = parse_columns_csv("column,type\nid,int\n").unwrap_err();
        assert!(err.to_string().contains("'name'"));
    }
}
