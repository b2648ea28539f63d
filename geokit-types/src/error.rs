//! Error type used by the crate.

use thiserror::Error;

use crate::geometry_type::GeometryType;

/// Error enum.
#[derive(Debug, Error)]
pub enum GeoKitTypesError {
    /// Geometry conversion error.
    #[error("invalid input geometry: {0}")]
    Conversion(String),
    /// Geometry of one kind was found where another kind was required.
    #[error("expected {expected} geometry, found {found}")]
    UnexpectedKind {
        /// Kind that was required.
        expected: GeometryType,
        /// Kind that was actually provided.
        found: GeometryType,
    },
}
