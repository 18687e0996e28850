//! Search area-of-interest normalization.
//!
//! EODMS accepts a single polygon or multipolygon in EPSG:4326 as WKT, and
//! rejects overly large requests; an AOI file is read, reprojected, unioned and
//! checked here before it is embedded in a query.
use super::crs::{Crs, Reprojector};
use super::geometry_type;
use super::reader::read_features;
use crate::error::Error;
use geo::{BooleanOps, Contains, Geometry, MultiPolygon, Polygon};
use std::path::Path;
use tracing::debug;
use wkt::ToWkt;

/// Vertex ceiling for a search geometry.
pub const MAX_VERTICES: usize = 1000;

/// Reads `geofile`, unions its features in `search_crs` and returns the result
/// as WKT.
pub fn normalize(geofile: &Path, search_crs: &Crs) -> Result<String, Error> {
    let layer = read_features(geofile)?;
    debug!(
        "Read {} feature(s) in {} from {}",
        layer.geometries.len(),
        layer.crs,
        geofile.display()
    );

    let geometries = if layer.crs == *search_crs {
        layer.geometries
    } else {
        debug!("Reprojecting search geometry from {} to {}", layer.crs, search_crs);
        let reprojector = Reprojector::new(&layer.crs, search_crs)?;
        layer
            .geometries
            .iter()
            .map(|g| reprojector.geometry(g))
            .collect::<Result<Vec<_>, _>>()?
    };

    let geometry = union_polygons(&geometries)?;
    let vertices = count_vertices(&geometry);
    debug!("Search geometry has {} vertices", vertices);
    if vertices > MAX_VERTICES {
        return Err(Error::GeometryTooComplex {
            vertices,
            limit: MAX_VERTICES,
        });
    }

    Ok(geometry.wkt_string())
}

/// Unions all polygonal input into a single `Polygon` or `MultiPolygon`.
/// Points and lines lying inside the union are absorbed by it; any other
/// non-polygonal part makes the input unsupported.
fn union_polygons(geometries: &[Geometry<f64>]) -> Result<Geometry<f64>, Error> {
    let mut polygons: Vec<Polygon<f64>> = vec![];
    let mut others: Vec<Geometry<f64>> = vec![];
    for geometry in geometries {
        collect_polygons(geometry, &mut polygons, &mut others);
    }

    if polygons.is_empty() {
        let kinds: Vec<&'static str> = others.iter().map(geometry_type).collect();
        let kind = match kinds.as_slice() {
            [] => "empty GeometryCollection",
            [single] => single,
            [first, rest @ ..] if rest.iter().all(|k| k == first) => multi_name(first),
            _ => "GeometryCollection",
        };
        return Err(Error::UnsupportedGeometryType(kind.to_string()));
    }

    let mut merged = if polygons.len() == 1 {
        MultiPolygon::new(polygons)
    } else {
        polygons
            .into_iter()
            .fold(MultiPolygon::new(vec![]), |acc, polygon| {
                acc.union(&MultiPolygon::new(vec![polygon]))
            })
    };

    if others.iter().any(|other| !Geometry::MultiPolygon(merged.clone()).contains(other)) {
        return Err(Error::UnsupportedGeometryType(
            "GeometryCollection".to_string(),
        ));
    }
    if !others.is_empty() {
        debug!("{} point/line part(s) absorbed by the search polygon", others.len());
    }

    if merged.0.len() == 1 {
        Ok(Geometry::Polygon(merged.0.remove(0)))
    } else {
        Ok(Geometry::MultiPolygon(merged))
    }
}

fn collect_polygons(
    geometry: &Geometry<f64>,
    polygons: &mut Vec<Polygon<f64>>,
    others: &mut Vec<Geometry<f64>>,
) {
    match geometry {
        Geometry::Polygon(p) => polygons.push(p.clone()),
        Geometry::MultiPolygon(mp) => polygons.extend(mp.0.iter().cloned()),
        Geometry::Rect(r) => polygons.push(r.to_polygon()),
        Geometry::Triangle(t) => polygons.push(t.to_polygon()),
        Geometry::GeometryCollection(gc) => {
            for g in gc.0.iter() {
                collect_polygons(g, polygons, others);
            }
        }
        other => others.push(other.clone()),
    }
}

fn multi_name(kind: &str) -> &'static str {
    match kind {
        "Point" | "MultiPoint" => "MultiPoint",
        "LineString" | "Line" | "MultiLineString" => "MultiLineString",
        _ => "GeometryCollection",
    }
}

fn ring_vertices(polygon: &Polygon<f64>) -> usize {
    polygon.exterior().0.len().saturating_sub(1)
}

/// Distinct exterior-ring vertices; interior rings are not counted.
pub fn count_vertices(geometry: &Geometry<f64>) -> usize {
    match geometry {
        Geometry::Polygon(p) => ring_vertices(p),
        Geometry::MultiPolygon(mp) => mp.0.iter().map(ring_vertices).sum(),
        _ => 0,
    }
}
