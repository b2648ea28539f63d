//! This example converts a spatial feed from one format into another.
//!
//! Run it with the source (a file path or an `http(s)://` URL) and the name of the output file. Formats are
//! selected by the file extensions:
//!
//! ```shell
//! cargo run --example convert -- ./places.kml ./places.geojson
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Result};
use geokit::codec::{GpxReadOptions, KmlReadOptions, SpatialWriter};
use geokit::fetch::{Fetcher, HttpFetcher, HttpFetcherConfig};
use geokit::*;
use log::info;

fn extension(path: &str) -> String {
    Path::new(path)
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default()
}

async fn load(source: &str, fetcher: &dyn Fetcher) -> Result<SpatialDataSet> {
    let options = ReadOptions::default().with_strip_html(true);
    let dataset = match extension(source).as_str() {
        "geojson" | "json" => GeoJsonReader::new(options).read_uri(source, fetcher).await,
        "gml" => GmlReader::new(options).read_uri(source, fetcher).await,
        "rss" | "atom" | "xml" => GeoRssReader::new(options).read_uri(source, fetcher).await,
        "kml" | "kmz" => {
            let options = KmlReadOptions {
                base: options,
                ..Default::default()
            };
            KmlReader::new(options).read_uri(source, fetcher).await
        }
        "gpx" => {
            let options = GpxReadOptions {
                base: options,
                read_route_waypoints: false,
            };
            GpxReader::new(options).read_uri(source, fetcher).await
        }
        "wkt" => WktReader::new(options).read_uri(source, fetcher).await,
        "csv" | "tab" | "txt" => DataSourceReader::new(options).read_uri(source, fetcher).await,
        "shp" => ShapefileReader::default().read(&fetcher.fetch_bytes(source).await?),
        "wkb" => WkbReader::new(options).read(&fetcher.fetch_bytes(source).await?),
        other => return Err(anyhow!("unknown input format: {other:?}")),
    };

    match &dataset.error {
        Some(error) => Err(anyhow!("failed to read {source}: {error}")),
        None => Ok(dataset),
    }
}

fn writer(target: &str) -> Result<Box<dyn SpatialWriter>> {
    let writer: Box<dyn SpatialWriter> = match extension(target).as_str() {
        "geojson" | "json" => Box::new(GeoJsonWriter),
        "gml" => Box::new(GmlWriter),
        "atom" | "rss" => Box::new(GeoRssWriter::default()),
        "kml" => Box::new(KmlWriter),
        "gpx" => Box::new(GpxWriter),
        "wkt" => Box::new(WktWriter),
        "wkb" => Box::new(WkbWriter),
        "csv" => Box::new(DataSourceWriter::new(DataSourceOptions::new(DataSourceFormat::Csv))),
        "tab" => Box::new(DataSourceWriter::new(DataSourceOptions::new(DataSourceFormat::Tab))),
        "xml" => Box::new(DataSourceWriter::new(DataSourceOptions::new(DataSourceFormat::Xml))),
        other => return Err(anyhow!("unknown output format: {other:?}")),
    };

    Ok(writer)
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let [source, target] = args.as_slice() else {
        return Err(anyhow!(
            "This example must be run with two arguments - source file or URL and output file"
        ));
    };

    let fetcher = HttpFetcher::new(HttpFetcherConfig::default().with_timeout(Duration::from_secs(30)))?;
    let dataset = load(source, &fetcher).await?;
    info!(
        "Loaded {} geometries and {} styles from {source}",
        dataset.geometries.len(),
        dataset.styles.iter().count()
    );

    let writer = writer(target)?;
    let mut file = std::fs::File::create(target)?;
    writer.write(&dataset, &mut file)?;
    info!("Saved {target}");

    Ok(())
}
