//! Readers and writers of the supported formats.
//!
//! Every format implements the same contract:
//! * [`SpatialReader`] parses a complete document from bytes, strings or a stream,
//! * [`UriReader`] loads a document with a [`Fetcher`] first (not available for binary formats),
//! * [`SpatialWriter`] serializes a dataset into a stream, and [`TextWriter`] into a string for text formats.
//!
//! Methods starting with `parse` return [`Result`]. Methods starting with `read` never fail: errors are stored in
//! the [`SpatialDataSet::error`] field of an otherwise empty dataset.

use std::io::{Read, Write};

use async_trait::async_trait;
use geokit_types::SpatialDataSet;

use crate::error::GeoKitError;
use crate::fetch::Fetcher;

pub mod data_source;
pub mod geojson;
pub mod georss;
pub mod gml;
pub mod gpx;
pub mod kml;
mod options;
pub mod shapefile;
pub mod wkb;
pub mod wkt;

pub use options::{GeoRssWriteOptions, GpxReadOptions, KmlReadOptions, ReadOptions, ShapefileOptions};

/// Reader of a complete document.
pub trait SpatialReader {
    /// Parses the document.
    fn parse(&self, data: &[u8]) -> Result<SpatialDataSet, GeoKitError>;

    /// Parses the document, storing an error in the returned dataset.
    fn read(&self, data: &[u8]) -> SpatialDataSet {
        SpatialDataSet::from_result(self.parse(data))
    }

    /// Parses a text document, storing an error in the returned dataset.
    fn read_str(&self, text: &str) -> SpatialDataSet {
        self.read(text.as_bytes())
    }

    /// Reads the stream to the end and parses its content.
    fn parse_from(&self, source: &mut dyn Read) -> Result<SpatialDataSet, GeoKitError> {
        let mut data = vec![];
        source.read_to_end(&mut data)?;
        self.parse(&data)
    }

    /// Reads the stream to the end and parses its content, storing an error in the returned dataset.
    fn read_from(&self, source: &mut dyn Read) -> SpatialDataSet {
        SpatialDataSet::from_result(self.parse_from(source))
    }
}

/// Reader that can load its document by URI.
#[async_trait]
pub trait UriReader: SpatialReader + Sync {
    /// Loads and parses the document.
    async fn parse_uri(&self, uri: &str, fetcher: &dyn Fetcher) -> Result<SpatialDataSet, GeoKitError> {
        let data = fetcher.fetch_bytes(uri).await?;
        self.parse(&data)
    }

    /// Loads and parses the document. Network and parse failures are stored in the returned dataset.
    async fn read_uri(&self, uri: &str, fetcher: &dyn Fetcher) -> SpatialDataSet {
        SpatialDataSet::from_result(self.parse_uri(uri, fetcher).await)
    }
}

/// Writer of a dataset.
pub trait SpatialWriter {
    /// Writes the dataset into the stream.
    fn write(&self, data: &SpatialDataSet, out: &mut dyn Write) -> Result<(), GeoKitError>;
}

/// Writer of a text format.
pub trait TextWriter: SpatialWriter {
    /// Writes the dataset into a string.
    fn write_string(&self, data: &SpatialDataSet) -> Result<String, GeoKitError> {
        let mut buffer = vec![];
        self.write(data, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
