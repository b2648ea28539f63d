//! Geokit reads and writes geospatial feeds. Every supported format is converted into the same in-memory model, a
//! [`SpatialDataSet`] of geometries with metadata and styles defined in the [`geokit_types`] crate.
//!
//! # Quick start
//!
//! ```no_run
//! use geokit::codec::{SpatialReader, TextWriter};
//! use geokit::{GeoJsonWriter, KmlReader};
//!
//! let kml = std::fs::read("places.kml").unwrap();
//! let dataset = KmlReader::default().parse(&kml).unwrap();
//! let geojson = GeoJsonWriter.write_string(&dataset).unwrap();
//! ```
//!
//! # Supported formats
//!
//! | Format                      | Reader                        | Writer               |
//! |-----------------------------|-------------------------------|----------------------|
//! | GeoJSON                     | [`GeoJsonReader`]             | [`GeoJsonWriter`]    |
//! | GML                         | [`GmlReader`]                 | [`GmlWriter`]        |
//! | GeoRSS (RSS and Atom)       | [`GeoRssReader`]              | [`GeoRssWriter`]     |
//! | KML and KMZ                 | [`KmlReader`], [`KmzReader`]  | [`KmlWriter`]        |
//! | GPX                         | [`GpxReader`]                 | [`GpxWriter`]        |
//! | ESRI Shapefile with DBF     | [`ShapefileReader`]           | not supported        |
//! | Well-Known Text             | [`WktReader`]                 | [`WktWriter`]        |
//! | Well-Known Binary           | [`WkbReader`]                 | [`WkbWriter`]        |
//! | Bing Spatial Data Services  | [`DataSourceReader`]          | [`DataSourceWriter`] |
//!
//! All readers implement [`SpatialReader`](codec::SpatialReader). Text feeds can also be loaded by URI with
//! [`UriReader`](codec::UriReader) and a [`Fetcher`](fetch::Fetcher). Failures are reported either as
//! [`GeoKitError`] by the `parse*` methods, or stored in [`SpatialDataSet::error`] by the `read*` methods.
//!
//! The library logs through the [`log`] facade and never installs a logger itself.

pub mod binary;
pub mod codec;
pub mod error;
pub mod fetch;
pub mod xml;

pub use codec::data_source::{DataSourceFormat, DataSourceOptions, DataSourceReader, DataSourceWriter};
pub use codec::geojson::{GeoJsonReader, GeoJsonWriter};
pub use codec::georss::{GeoRssReader, GeoRssWriter};
pub use codec::gml::{GmlReader, GmlWriter};
pub use codec::gpx::{GpxReader, GpxWriter};
pub use codec::kml::{KmlReader, KmlWriter, KmzReader};
pub use codec::shapefile::{ShapefileReader, ShapefileWriter};
pub use codec::wkb::{WkbReader, WkbWriter};
pub use codec::wkt::{WktReader, WktWriter};
pub use codec::{ReadOptions, SpatialReader, SpatialWriter, TextWriter, UriReader};
pub use error::GeoKitError;
pub use geokit_types;
pub use geokit_types::SpatialDataSet;
