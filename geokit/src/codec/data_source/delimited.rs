use std::io::Write;
use std::sync::LazyLock;

use log::{debug, warn};
use regex::Regex;

use super::{Column, EdmType, Table};
use crate::error::GeoKitError;

/// First field of the line that starts every delimited data source.
pub const SCHEMA_MARKER: &str = "Bing Spatial Data Services";
const SCHEMA_VERSION: &str = "1.0";

static COLUMN_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*([^()]*?)\s*(?:\(\s*([A-Za-z.0-9]+)\s*(,\s*primaryKey\s*)?\))?\s*$").expect("valid regex")
});

pub(crate) fn read_table(text: &str) -> Result<Table, GeoKitError> {
    let mut lines = text.splitn(3, '\n');
    let marker = lines.next().unwrap_or_default().trim_end_matches('\r');
    let marker_fields: Vec<&str> = marker.split(',').map(str::trim).collect();
    if marker_fields.first() != Some(&SCHEMA_MARKER) {
        return Err(GeoKitError::Format(format!(
            "data source must start with the '{SCHEMA_MARKER}' line"
        )));
    }

    let Some(entity_type_name) = marker_fields.get(2).filter(|name| !name.is_empty()) else {
        return Err(GeoKitError::Format("entity type name is missing".into()));
    };
    debug!(
        "Reading data source of {entity_type_name} entities, version {}",
        marker_fields.get(1).unwrap_or(&"")
    );

    let header = lines
        .next()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
        .ok_or_else(|| GeoKitError::Format("data source header is missing".into()))?;
    let delimiter = detect_delimiter(header);
    let columns = split_header(header, delimiter as char)
        .into_iter()
        .map(parse_column)
        .collect::<Result<Vec<_>, _>>()?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(lines.next().unwrap_or_default().as_bytes());

    let mut rows = vec![];
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        if record.len() != columns.len() {
            warn!(
                "Data source row {} has {} cells, expected {}",
                rows.len() + 1,
                record.len(),
                columns.len()
            );
        }

        let row: Vec<Option<String>> = (0..columns.len())
            .map(|index| {
                record
                    .get(index)
                    .map(str::trim)
                    .filter(|cell| !cell.is_empty())
                    .map(str::to_string)
            })
            .collect();
        rows.push(row);
    }

    Ok(Table {
        data_source_name: None,
        entity_type_name: entity_type_name.to_string(),
        columns,
        rows,
    })
}

pub(crate) fn write_table(table: &Table, delimiter: u8, out: &mut dyn Write) -> Result<(), GeoKitError> {
    writeln!(out, "{SCHEMA_MARKER}, {SCHEMA_VERSION}, {}", table.entity_type_name)?;

    let header: Vec<String> = table
        .columns
        .iter()
        .map(|column| {
            if column.primary_key {
                format!("{}({},primaryKey)", column.name, column.edm_type)
            } else {
                format!("{}({})", column.name, column.edm_type)
            }
        })
        .collect();
    writeln!(out, "{}", header.join(&(delimiter as char).to_string()))?;

    let mut writer = csv::WriterBuilder::new().delimiter(delimiter).from_writer(out);
    for row in &table.rows {
        writer.write_record(row.iter().map(|cell| cell.as_deref().unwrap_or_default()))?;
    }
    writer.flush()?;

    Ok(())
}

fn detect_delimiter(header: &str) -> u8 {
    if header.contains('\t') {
        b'\t'
    } else if header.contains('|') {
        b'|'
    } else {
        b','
    }
}

/// Splits the header row, ignoring delimiters inside the type declaration parentheses.
fn split_header(header: &str, delimiter: char) -> Vec<&str> {
    let mut cells = vec![];
    let mut depth = 0usize;
    let mut start = 0;
    for (index, c) in header.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            c if c == delimiter && depth == 0 => {
                cells.push(&header[start..index]);
                start = index + c.len_utf8();
            }
            _ => {}
        }
    }
    cells.push(&header[start..]);

    cells
}

fn parse_column(cell: &str) -> Result<Column, GeoKitError> {
    let captures = COLUMN_HEADER
        .captures(cell)
        .ok_or_else(|| GeoKitError::Format(format!("invalid column header {cell:?}")))?;
    let name = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
    if name.is_empty() {
        return Err(GeoKitError::Format(format!("column header {cell:?} has no name")));
    }

    let edm_type = match captures.get(2) {
        Some(type_name) => EdmType::from_name(type_name.as_str()).unwrap_or_else(|| {
            warn!("Unknown type {} of column {name}, reading it as text", type_name.as_str());
            EdmType::String
        }),
        None => EdmType::String,
    };

    Ok(Column {
        primary_key: captures.get(3).is_some(),
        ..Column::new(name, edm_type)
    })
}
