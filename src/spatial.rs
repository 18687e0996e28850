//! Geometry handling: reference systems, vector file reading, search AOI
//! normalization and footprint reprojection.
pub mod aoi;
pub mod crs;
pub mod reader;
pub mod transform;

pub use aoi::normalize;
pub use crs::{Crs, SEARCH_CRS};
pub use transform::{transform, FootprintTransformer};

use geo::Geometry;

/// OGC type name of a geometry, as reported in errors.
pub fn geometry_type(geom: &Geometry<f64>) -> &'static str {
    match geom {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}
