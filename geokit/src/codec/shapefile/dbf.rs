use std::collections::BTreeMap;
use std::io::Cursor;

use chrono::{NaiveDate, TimeZone, Utc};
use dbase::FieldValue;
use geokit_types::PropertyValue;
use log::warn;

use crate::error::GeoKitError;

/// Attributes of one DBF row.
pub type DbfRow = BTreeMap<String, PropertyValue>;

/// Parses a dBASE table. Only the columns listed in `columns` are read (compared case-insensitively) if it is set.
///
/// Blank cells are left out of the row. Numeric cells without a fractional part are read as integers.
pub fn parse_dbf(data: &[u8], columns: Option<&[String]>) -> Result<Vec<DbfRow>, GeoKitError> {
    let mut reader = dbase::Reader::new(Cursor::new(data))?;
    let names: Vec<String> = reader
        .fields()
        .iter()
        .map(|field| field.name().to_string())
        .filter(|name| {
            columns
                .map(|columns| columns.iter().any(|c| c.eq_ignore_ascii_case(name)))
                .unwrap_or(true)
        })
        .collect();

    let records = reader.read()?;
    let rows = records
        .iter()
        .map(|record| {
            names
                .iter()
                .filter_map(|name| {
                    let value = property_value(name, record.get(name)?)?;
                    Some((name.clone(), value))
                })
                .collect()
        })
        .collect();

    Ok(rows)
}

fn property_value(name: &str, value: &FieldValue) -> Option<PropertyValue> {
    match value {
        FieldValue::Character(Some(text)) | FieldValue::Memo(text) => {
            let text = text.trim();
            (!text.is_empty()).then(|| PropertyValue::String(text.to_string()))
        }
        FieldValue::Numeric(Some(number)) => Some(number_value(*number)),
        FieldValue::Float(Some(number)) => Some(PropertyValue::Double(*number as f64)),
        FieldValue::Double(number) | FieldValue::Currency(number) => Some(PropertyValue::Double(*number)),
        FieldValue::Integer(number) => Some(PropertyValue::Int(*number as i64)),
        FieldValue::Logical(Some(flag)) => Some(PropertyValue::Bool(*flag)),
        FieldValue::Date(Some(date)) => {
            let value = NaiveDate::from_ymd_opt(date.year() as i32, date.month() as u32, date.day() as u32)
                .and_then(|date| date.and_hms_opt(0, 0, 0))
                .map(|time| PropertyValue::DateTime(Utc.from_utc_datetime(&time)));
            if value.is_none() {
                warn!("Skipping malformed date of DBF field {name}");
            }
            value
        }
        FieldValue::Character(None)
        | FieldValue::Numeric(None)
        | FieldValue::Float(None)
        | FieldValue::Logical(None)
        | FieldValue::Date(None) => None,
        other => {
            warn!("Skipping DBF field {name} of unsupported type: {other:?}");
            None
        }
    }
}

fn number_value(number: f64) -> PropertyValue {
    const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;
    if number.fract() == 0.0 && number.abs() < MAX_EXACT_INTEGER {
        PropertyValue::Int(number as i64)
    } else {
        PropertyValue::Double(number)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use assert_matches::assert_matches;
    use chrono::Datelike;

    use super::*;
    use crate::binary::{BinaryWriter, ByteOrder};

    const HEADER_LENGTH: usize = 32;
    const FIELD_DESCRIPTOR_LENGTH: usize = 32;
    const HEADER_TERMINATOR: u8 = 0x0D;

    /// Builds a DBF table. Fields are `(name, type, length, decimal count)`.
    pub(crate) fn build_dbf(fields: &[(&str, u8, u8, u8)], rows: &[&[&str]]) -> Vec<u8> {
        let record_length: usize = 1 + fields.iter().map(|f| f.2 as usize).sum::<usize>();
        let header_length = HEADER_LENGTH + fields.len() * FIELD_DESCRIPTOR_LENGTH + 1;

        let mut writer = BinaryWriter::new();
        writer.write_u8(3);
        writer.write_bytes(&[124, 1, 1]);
        writer.write_u32(rows.len() as u32, ByteOrder::LittleEndian);
        writer.write_i16(header_length as i16, ByteOrder::LittleEndian);
        writer.write_i16(record_length as i16, ByteOrder::LittleEndian);
        writer.write_bytes(&[0; 20]);

        for (name, field_type, length, decimal_count) in fields {
            let mut name_bytes = [0u8; 11];
            name_bytes[..name.len()].copy_from_slice(name.as_bytes());
            writer.write_bytes(&name_bytes);
            writer.write_u8(*field_type);
            writer.write_bytes(&[0; 4]);
            writer.write_u8(*length);
            writer.write_u8(*decimal_count);
            writer.write_bytes(&[0; 14]);
        }
        writer.write_u8(HEADER_TERMINATOR);

        for row in rows {
            writer.write_u8(b' ');
            for ((_, _, length, _), value) in fields.iter().zip(row.iter()) {
                let mut cell = vec![b' '; *length as usize];
                cell[..value.len()].copy_from_slice(value.as_bytes());
                writer.write_bytes(&cell);
            }
        }
        writer.write_u8(0x1A);

        writer.into_bytes().to_vec()
    }

    fn sample() -> Vec<u8> {
        build_dbf(
            &[
                ("NAME", b'C', 10, 0),
                ("COUNT", b'N', 6, 0),
                ("AREA", b'N', 8, 2),
                ("OPEN", b'L', 1, 0),
                ("BUILT", b'D', 8, 0),
            ],
            &[
                &["Alpha", "12", "3.25", "Y", "19991231"],
                &["Beta", "", "", "?", "20200101"],
            ],
        )
    }

    #[test]
    fn rows() {
        let rows = parse_dbf(&sample(), None).unwrap();
        assert_eq!(rows.len(), 2);

        let first = &rows[0];
        assert_eq!(first["NAME"], PropertyValue::String("Alpha".into()));
        assert_eq!(first["COUNT"], PropertyValue::Int(12));
        assert_eq!(first["AREA"], PropertyValue::Double(3.25));
        assert_eq!(first["OPEN"], PropertyValue::Bool(true));
        assert_matches!(&first["BUILT"], PropertyValue::DateTime(d) if d.year() == 1999 && d.month() == 12);

        let second = &rows[1];
        assert_eq!(second.len(), 2);
        assert!(second.contains_key("NAME"));
        assert!(second.contains_key("BUILT"));
    }

    #[test]
    fn column_filter() {
        let columns = vec!["name".to_string(), "open".to_string()];
        let rows = parse_dbf(&sample(), Some(&columns)).unwrap();
        assert_eq!(rows[0].keys().collect::<Vec<_>>(), vec!["NAME", "OPEN"]);
    }

    #[test]
    fn truncated() {
        let data = sample();
        assert_matches!(parse_dbf(&data[..20], None), Err(GeoKitError::Format(_)));
        assert_matches!(parse_dbf(&data[..data.len() - 10], None), Err(GeoKitError::Format(_)));
    }
}
