//! KML and KMZ reader and writer.
//!
//! Coordinates are written in KML as `lon,lat[,alt]` tuples separated by whitespace. KMZ archives are recognized
//! by their zip signature, the first `.kml` entry of the archive is read.

use std::borrow::Cow;
use std::io::{Cursor, Read};
use std::sync::LazyLock;

use geokit_types::Coordinate;
use log::warn;
use regex::Regex;
use zip::ZipArchive;

use crate::codec::wkt::format_number;
use crate::error::GeoKitError;

mod reader;
mod writer;

pub use reader::{KmlReader, KmzReader, MAX_NETWORK_LINK_DEPTH};
pub use writer::KmlWriter;

const ZIP_SIGNATURE: &[u8] = b"PK\x03\x04";

static COMMA_SPACING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*,\s*").expect("valid regex"));

/// Returns true if the data starts with a zip signature.
pub fn is_kmz(data: &[u8]) -> bool {
    data.starts_with(ZIP_SIGNATURE)
}

/// Returns the KML document contained in the data. Zipped data is unpacked, other data is returned as is.
pub(crate) fn unpack(data: &[u8]) -> Result<Cow<'_, [u8]>, GeoKitError> {
    if !is_kmz(data) {
        return Ok(Cow::Borrowed(data));
    }

    let mut archive = ZipArchive::new(Cursor::new(data))?;
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        if entry.is_file() && entry.name().to_ascii_lowercase().ends_with(".kml") {
            let mut content = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut content)?;
            return Ok(Cow::Owned(content));
        }
    }

    Err(GeoKitError::Format(
        "KMZ archive does not contain a KML document".into(),
    ))
}

/// Parses the content of a `coordinates` element. Malformed tuples are skipped.
pub(crate) fn parse_coordinates(text: &str) -> Vec<Coordinate> {
    let text = COMMA_SPACING.replace_all(text.trim(), ",");
    let mut coordinates = vec![];
    for tuple in text.split_whitespace() {
        let values: Result<Vec<f64>, _> = tuple.split(',').filter(|v| !v.is_empty()).map(str::parse).collect();
        match values.as_deref() {
            Ok([lon, lat]) => coordinates.push(Coordinate::new(*lat, *lon)),
            Ok([lon, lat, alt, ..]) => coordinates.push(Coordinate::with_altitude(*lat, *lon, *alt)),
            _ => warn!("Skipping malformed KML coordinate {tuple:?}"),
        }
    }

    coordinates
}

/// Formats coordinates as the content of a `coordinates` element.
pub(crate) fn format_coordinates(coordinates: &[Coordinate]) -> String {
    coordinates
        .iter()
        .map(|c| {
            let mut tuple = format!("{},{}", format_number(c.longitude()), format_number(c.latitude()));
            if let Some(altitude) = c.altitude() {
                tuple.push(',');
                tuple.push_str(&format_number(altitude));
            }
            tuple
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use geokit_types::latlon;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    use super::*;

    pub(super) fn zip(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(vec![]));
        for (name, content) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn coordinates() {
        let coordinates = parse_coordinates(
            "
            -122.0822035425683,37.42228990140251,0
            -122.085, 37.422
            bad,tuple
            ",
        );
        assert_eq!(
            coordinates,
            vec![
                latlon!(37.42228990140251, -122.0822035425683, 0.0),
                latlon!(37.422, -122.085)
            ]
        );

        assert_eq!(
            format_coordinates(&[latlon!(1.0, 2.0), latlon!(3.5, 4.25, 10.0)]),
            "2,1 4.25,3.5,10"
        );
    }

    #[test]
    fn kmz_unpacking() {
        let archive = zip(&[("images/readme.txt", "text"), ("doc.kml", "<kml/>")]);
        assert!(is_kmz(&archive));
        assert_eq!(unpack(&archive).unwrap().as_ref(), b"<kml/>");

        let plain = b"<kml/>";
        assert!(matches!(unpack(plain).unwrap(), Cow::Borrowed(_)));

        let empty = zip(&[("readme.txt", "text")]);
        assert!(matches!(unpack(&empty), Err(GeoKitError::Format(_))));
    }
}
