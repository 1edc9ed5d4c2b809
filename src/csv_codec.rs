//! CSV interchange for mapping lists.
//!
//! Exported files always carry the full column set below, in this order.
//! Imported files only need `source`, `target` and `transformation`; any
//! subset or ordering of the remaining columns is accepted and unknown headers
//! are ignored. Quoting follows RFC 4180: fields containing a comma, quote or
//! line break are quoted with embedded quotes doubled. The whole text is fed
//! through the CSV reader, so quoted line breaks survive a round trip.
//!
//! Audit columns are never exported, and fields outside the column set
//! (parameters, expressions, flags) do not survive the trip.

use std::io;

use csv::{QuoteStyle, ReaderBuilder, StringRecord, Terminator, WriterBuilder};
use log::debug;
use thiserror::Error;

use crate::mapping::ColumnMapping;

pub const SOURCE: &str = "source";
pub const SOURCE_DATA_TYPE: &str = "sourceDataType";
pub const SOURCE_LENGTH: &str = "sourceLength";
pub const TARGET: &str = "target";
pub const TARGET_DATA_TYPE: &str = "targetDataType";
pub const TARGET_LENGTH: &str = "targetLength";
pub const TRANSFORMATION: &str = "transformation";
pub const TARGET_POSITION: &str = "targetPosition";

pub const CSV_COLUMNS: [&str; 8] = [
    SOURCE,
    SOURCE_DATA_TYPE,
    SOURCE_LENGTH,
    TARGET,
    TARGET_DATA_TYPE,
    TARGET_LENGTH,
    TRANSFORMATION,
    TARGET_POSITION,
];

pub const REQUIRED_COLUMNS: [&str; 3] = [SOURCE, TARGET, TRANSFORMATION];

#[derive(Debug, Error)]
pub enum CsvCodecError {
    #[error("No mappings to export")]
    NothingToExport,
    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
    #[error("No valid mappings found in CSV")]
    NoValidMappings,
    #[error("Malformed CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("Failed to write CSV: {0}")]
    Io(#[from] io::Error),
}

/// Serializes the non-audit mappings as CSV text, header row first.
pub fn export(mappings: &[ColumnMapping]) -> Result<String, CsvCodecError> {
    let exported = mappings
        .iter()
        .filter(|mapping| !mapping.is_audit)
        .collect::<Vec<_>>();
    if exported.is_empty() {
        return Err(CsvCodecError::NothingToExport);
    }

    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Necessary)
        .double_quote(true)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record(CSV_COLUMNS)?;
    for (idx, mapping) in exported.iter().enumerate() {
        let position = (idx + 1).to_string();
        writer.write_record([
            mapping.source.as_deref().unwrap_or_default(),
            mapping.source_data_type.as_deref().unwrap_or_default(),
            mapping.source_length.as_deref().unwrap_or_default(),
            mapping.target.as_str(),
            mapping.target_data_type.as_deref().unwrap_or_default(),
            mapping.target_length.as_deref().unwrap_or_default(),
            mapping.transformation.as_str(),
            position.as_str(),
        ])?;
    }
    writer.flush()?;
    let bytes = writer
        .into_inner()
        .map_err(|err| CsvCodecError::Io(err.into_error()))?;
    String::from_utf8(bytes)
        .map_err(|err| CsvCodecError::Io(io::Error::new(io::ErrorKind::InvalidData, err)))
}

/// Positions of the known columns within an imported header row.
#[derive(Debug, Default)]
struct HeaderLayout {
    positions: [Option<usize>; CSV_COLUMNS.len()],
}

impl HeaderLayout {
    fn from_headers(headers: &StringRecord) -> Result<Self, CsvCodecError> {
        let mut layout = HeaderLayout::default();
        for (idx, header) in headers.iter().enumerate() {
            let header = header.trim_start_matches('\u{feff}').trim();
            if let Some(column) = CSV_COLUMNS
                .iter()
                .position(|name| name.eq_ignore_ascii_case(header))
            {
                layout.positions[column].get_or_insert(idx);
            }
        }
        let missing = REQUIRED_COLUMNS
            .iter()
            .filter(|name| layout.index_of(name).is_none())
            .map(|name| name.to_string())
            .collect::<Vec<_>>();
        if missing.is_empty() {
            Ok(layout)
        } else {
            Err(CsvCodecError::MissingColumns(missing))
        }
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        CSV_COLUMNS
            .iter()
            .position(|column| *column == name)
            .and_then(|column| self.positions[column])
    }

    fn field<'r>(&self, record: &'r StringRecord, name: &str) -> Option<&'r str> {
        self.index_of(name)
            .and_then(|idx| record.get(idx))
            .filter(|value| !value.is_empty())
    }
}

/// Parses CSV text into mappings. Rows lacking a source, target or
/// transformation are skipped. When every surviving row carries a valid
/// `targetPosition`, rows are ordered by it; otherwise file order is kept.
///
/// Header names are trimmed; cell values are kept exactly as written. An empty
/// cell reads as an absent value, so an optional field holding `Some("")`
/// comes back as `None`.
pub fn import(text: &str) -> Result<Vec<ColumnMapping>, CsvCodecError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .double_quote(true)
        .from_reader(text.as_bytes());
    let layout = HeaderLayout::from_headers(reader.headers()?)?;

    let mut rows: Vec<(Option<usize>, ColumnMapping)> = Vec::new();
    let mut skipped = 0usize;
    for record in reader.records() {
        let record = record?;
        let (Some(source), Some(target), Some(transformation)) = (
            layout.field(&record, SOURCE),
            layout.field(&record, TARGET),
            layout.field(&record, TRANSFORMATION),
        ) else {
            skipped += 1;
            continue;
        };
        let optional = |name: &str| layout.field(&record, name).map(str::to_string);
        let mut mapping = ColumnMapping::direct(source);
        mapping.target = target.to_string();
        mapping.transformation = transformation.to_string();
        mapping.source_data_type = optional(SOURCE_DATA_TYPE);
        mapping.source_length = optional(SOURCE_LENGTH);
        mapping.target_data_type = optional(TARGET_DATA_TYPE);
        mapping.target_length = optional(TARGET_LENGTH);
        let position = layout
            .field(&record, TARGET_POSITION)
            .and_then(|raw| raw.trim().parse::<usize>().ok());
        rows.push((position, mapping));
    }

    if skipped > 0 {
        debug!("Skipped {skipped} CSV row(s) missing required values");
    }
    if rows.is_empty() {
        return Err(CsvCodecError::NoValidMappings);
    }
    if rows.iter().all(|(position, _)| position.is_some()) {
        rows.sort_by_key(|(position, _)| *position);
    }
    Ok(rows.into_iter().map(|(_, mapping)| mapping).collect())
}
