use geokit_types::SpatialDataSet;

/// Options shared by all readers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadOptions {
    /// If set, every line and ring is simplified with this tolerance (in degrees) after reading.
    pub tolerance: Option<f64>,
    /// Remove HTML tags from titles and descriptions.
    pub strip_html: bool,
}

impl ReadOptions {
    /// Sets the simplification tolerance.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = Some(tolerance);
        self
    }

    /// Sets whether HTML is stripped from text values.
    pub fn with_strip_html(mut self, strip_html: bool) -> Self {
        self.strip_html = strip_html;
        self
    }

    /// Applies the post-processing steps to a freshly read dataset: simplification and, if the document did not
    /// declare one, computing the bounding box.
    pub(crate) fn finish(&self, dataset: &mut SpatialDataSet) {
        if let Some(tolerance) = self.tolerance {
            dataset.reduce(tolerance);
        }

        if dataset.bounding_box.is_none() {
            dataset.recompute_bounds();
        }
    }
}

/// Options of the GPX reader.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GpxReadOptions {
    /// Common options.
    pub base: ReadOptions,
    /// Read route points as separate points instead of one route line.
    pub read_route_waypoints: bool,
}

impl GpxReadOptions {
    /// Sets whether route points are read as separate points.
    pub fn with_route_waypoints(mut self, read_route_waypoints: bool) -> Self {
        self.read_route_waypoints = read_route_waypoints;
        self
    }
}

impl From<ReadOptions> for GpxReadOptions {
    fn from(base: ReadOptions) -> Self {
        Self {
            base,
            ..Default::default()
        }
    }
}

/// Options of the KML reader.
#[derive(Debug, Clone, PartialEq)]
pub struct KmlReadOptions {
    /// Common options.
    pub base: ReadOptions,
    /// Load documents referenced by `NetworkLink` elements when reading by URI.
    pub resolve_network_links: bool,
}

impl Default for KmlReadOptions {
    fn default() -> Self {
        Self {
            base: ReadOptions::default(),
            resolve_network_links: true,
        }
    }
}

impl KmlReadOptions {
    /// Sets whether network links are followed.
    pub fn with_network_links(mut self, resolve_network_links: bool) -> Self {
        self.resolve_network_links = resolve_network_links;
        self
    }
}

impl From<ReadOptions> for KmlReadOptions {
    fn from(base: ReadOptions) -> Self {
        Self {
            base,
            ..Default::default()
        }
    }
}

/// Options of the GeoRSS writer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeoRssWriteOptions {
    /// Write every geometry as GML inside `georss:where`, instead of simple GeoRSS elements.
    pub use_gml: bool,
}

/// Options of the shapefile reader.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShapefileOptions {
    /// Common options.
    pub base: ReadOptions,
    /// Names of the DBF columns to read. All columns are read if not set.
    pub dbf_columns: Option<Vec<String>>,
}

impl ShapefileOptions {
    /// Restricts the DBF columns that are read.
    pub fn with_dbf_columns(mut self, columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.dbf_columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }
}
