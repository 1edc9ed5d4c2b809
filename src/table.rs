//! Plain-text table rendering for terminal listings.

use std::fmt::Write as _;

use itertools::Itertools;

use crate::mapping::ColumnMapping;

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths = headers
        .iter()
        .map(|header| header.chars().count().max(3))
        .collect::<Vec<_>>();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(flatten(cell).chars().count());
        }
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers.iter().map(String::as_str), &widths));
    let separators = widths.iter().map(|width| "-".repeat(*width)).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(separators.iter().map(String::as_str), &widths));
    for row in rows {
        let cells = row.iter().map(|cell| flatten(cell)).collect::<Vec<_>>();
        let _ = writeln!(output, "{}", format_row(cells.iter().map(String::as_str), &widths));
    }
    output
}

pub fn print_table(headers: &[String], rows: &[Vec<String>]) {
    print!("{}", render_table(headers, rows));
}

/// One line per mapping: position, source, target, transformation, flags.
pub fn render_mappings(mappings: &[ColumnMapping]) -> String {
    let headers = ["#", "source", "type", "target", "transformation", "flags"]
        .map(String::from)
        .to_vec();
    let rows = mappings
        .iter()
        .enumerate()
        .map(|(idx, mapping)| {
            let flags = [(mapping.is_audit, "audit"), (mapping.derived, "derived")]
                .into_iter()
                .filter_map(|(set, flag)| set.then_some(flag))
                .join(",");
            vec![
                (idx + 1).to_string(),
                mapping.source.clone().unwrap_or_else(|| "-".to_string()),
                mapping.source_data_type.clone().unwrap_or_default(),
                mapping.target.clone(),
                mapping.transformation.clone(),
                flags,
            ]
        })
        .collect::<Vec<_>>();
    render_table(&headers, &rows)
}

fn format_row<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    let line = cells
        .zip(widths)
        .map(|(cell, &width)| format!("{cell:<width$}"))
        .join("  ");
    line.trim_end().to_string()
}

fn flatten(cell: &str) -> String {
    cell.replace(['\n', '\r', '\t'], " ")
}
