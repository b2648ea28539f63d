//! ESRI Shapefile reader.
//!
//! The `.shp` file has a big-endian header and record headers with little-endian record contents. Attributes are
//! stored in a separate dBASE (`.dbf`) table with one row per `.shp` record, that can be merged with
//! [`ShapefileReader::parse_with_dbf`]. Z values become altitudes, M values are ignored.
//!
//! Records with null shapes take part in matching DBF rows but are not included in the dataset.

use std::io::Write;

use geokit_types::{Attributed, BoundingBox, Geometry, SpatialDataSet};

use crate::codec::{ShapefileOptions, SpatialReader, SpatialWriter};
use crate::error::GeoKitError;

mod dbf;
mod shp;

pub use dbf::{parse_dbf, DbfRow};
pub use shp::{ShapeType, FILE_CODE};

/// Shapefile reader. Only reads binary data, loading by URI is not supported.
#[derive(Debug, Clone, Default)]
pub struct ShapefileReader {
    options: ShapefileOptions,
}

impl ShapefileReader {
    /// Creates a new reader.
    pub fn new(options: ShapefileOptions) -> Self {
        Self { options }
    }

    /// Parses the `.shp` file and merges the attributes of the `.dbf` table into the metadata of the geometries.
    ///
    /// Fails with [`GeoKitError::DataInconsistency`] if the number of table rows differs from the number of
    /// shape records.
    pub fn parse_with_dbf(&self, shp: &[u8], dbf: &[u8]) -> Result<SpatialDataSet, GeoKitError> {
        let shp = shp::parse_shp(shp)?;
        let rows = parse_dbf(dbf, self.options.dbf_columns.as_deref())?;
        if rows.len() != shp.records.len() {
            return Err(GeoKitError::DataInconsistency(format!(
                "DBF table has {} rows, but shapefile has {} records",
                rows.len(),
                shp.records.len()
            )));
        }

        let mut geometries = vec![];
        for (record, row) in shp.records.into_iter().zip(rows) {
            let Some(mut geometry) = record else {
                continue;
            };

            if !row.is_empty() {
                geometry.metadata_or_default().properties.extend(row);
            }
            geometries.push(geometry);
        }

        Ok(self.finish(geometries, shp.bounds))
    }

    /// Same as [`ShapefileReader::parse_with_dbf`], but stores errors in the returned dataset.
    pub fn read_with_dbf(&self, shp: &[u8], dbf: &[u8]) -> SpatialDataSet {
        SpatialDataSet::from_result(self.parse_with_dbf(shp, dbf))
    }

    fn finish(&self, geometries: Vec<Geometry>, bounds: Option<BoundingBox>) -> SpatialDataSet {
        let mut dataset = SpatialDataSet::new();
        dataset.geometries = geometries;
        dataset.bounding_box = bounds;
        self.options.base.finish(&mut dataset);
        dataset
    }
}

impl SpatialReader for ShapefileReader {
    fn parse(&self, data: &[u8]) -> Result<SpatialDataSet, GeoKitError> {
        let shp = shp::parse_shp(data)?;
        let geometries = shp.records.into_iter().flatten().collect();
        Ok(self.finish(geometries, shp.bounds))
    }
}

/// Placeholder writer: shapefiles cannot be written, every call fails with [`GeoKitError::NotSupported`].
#[derive(Debug, Clone, Default)]
pub struct ShapefileWriter;

impl SpatialWriter for ShapefileWriter {
    fn write(&self, _data: &SpatialDataSet, _out: &mut dyn Write) -> Result<(), GeoKitError> {
        Err(GeoKitError::NotSupported("writing shapefiles"))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use geokit_types::{GeometryType, PropertyValue, Shape};

    use super::dbf::tests::build_dbf;
    use super::shp::tests::{build_shp, point_content};
    use super::*;
    use crate::codec::ReadOptions;

    fn points() -> Vec<u8> {
        build_shp(
            1,
            &[
                (1, point_content(10.0, 20.0)),
                (0, vec![]),
                (1, point_content(30.0, 40.0)),
            ],
        )
    }

    #[test]
    fn merge_attributes() {
        let dbf = build_dbf(
            &[("NAME", b'C', 8, 0), ("RANK", b'N', 4, 0)],
            &[&["first", "1"], &["null", "2"], &["third", "3"]],
        );

        let dataset = ShapefileReader::default().parse_with_dbf(&points(), &dbf).unwrap();
        assert_eq!(dataset.geometries.len(), 2);
        let metadata = dataset.geometries[1].metadata().unwrap();
        assert_eq!(metadata.property("NAME"), Some(&PropertyValue::String("third".into())));
        assert_eq!(metadata.property("RANK"), Some(&PropertyValue::Int(3)));

        let reader = ShapefileReader::new(ShapefileOptions::default().with_dbf_columns(["rank"]));
        let dataset = reader.parse_with_dbf(&points(), &dbf).unwrap();
        let metadata = dataset.geometries[0].metadata().unwrap();
        assert!(metadata.property("NAME").is_none());
        assert_eq!(metadata.property("RANK"), Some(&PropertyValue::Int(1)));
    }

    #[test]
    fn row_count_mismatch() {
        let dbf = build_dbf(&[("NAME", b'C', 8, 0)], &[&["first"]]);
        let reader = ShapefileReader::default();
        assert_matches!(
            reader.parse_with_dbf(&points(), &dbf),
            Err(GeoKitError::DataInconsistency(_))
        );

        let dataset = reader.read_with_dbf(&points(), &dbf);
        assert!(dataset.is_error());
        assert!(dataset.geometries.is_empty());
    }

    #[test]
    fn shapes_only() {
        let reader = ShapefileReader::new(ShapefileOptions {
            base: ReadOptions::default(),
            dbf_columns: None,
        });
        let dataset = reader.parse(&points()).unwrap();
        assert_eq!(dataset.geometries.len(), 2);
        assert!(dataset
            .geometries
            .iter()
            .all(|g| g.geometry_type() == GeometryType::Point && g.metadata().is_none()));
        assert!(dataset.bounding_box.is_some());

        assert!(reader.read(b"not a shapefile").is_error());
    }

    #[test]
    fn writing_is_not_supported() {
        let dataset = ShapefileReader::default().parse(&points()).unwrap();
        let mut out = vec![];
        assert_matches!(
            ShapefileWriter.write(&dataset, &mut out),
            Err(GeoKitError::NotSupported(_))
        );
        assert!(out.is_empty());
    }
}
