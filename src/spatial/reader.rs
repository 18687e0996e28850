//! Reads the features of a vector file into `geo` geometries together with the
//! reference system they are expressed in.
use super::crs::Crs;
use crate::error::Error;
use geo::{Coord, Geometry, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon};
use geojson::GeoJson;
use std::fs;
use std::path::Path;
use wkt::TryFromWkt;

#[derive(Debug)]
pub struct VectorLayer {
    pub geometries: Vec<Geometry<f64>>,
    pub crs: Crs,
}

pub fn read_features(path: &Path) -> Result<VectorLayer, Error> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "geojson" | "json" => read_geojson(path),
        "shp" => read_shapefile(path),
        "wkt" | "txt" => read_wkt(path),
        "gpkg" => read_geopackage(path),
        "" => Err(Error::unreadable(path, "missing file extension")),
        other => Err(Error::unreadable(path, format!("unsupported format '.{other}'"))),
    }
}

fn read_geojson(path: &Path) -> Result<VectorLayer, Error> {
    let content = fs::read_to_string(path).map_err(|e| Error::unreadable(path, e))?;
    let geojson = content
        .parse::<GeoJson>()
        .map_err(|e| Error::unreadable(path, e))?;

    let (geometries, foreign_members) = match geojson {
        GeoJson::FeatureCollection(fc) => (
            fc.features
                .into_iter()
                .filter_map(|f| f.geometry)
                .collect::<Vec<_>>(),
            fc.foreign_members,
        ),
        GeoJson::Feature(f) => (f.geometry.into_iter().collect(), f.foreign_members),
        GeoJson::Geometry(g) => {
            let members = g.foreign_members.clone();
            (vec![g], members)
        }
    };

    let crs = foreign_members
        .as_ref()
        .and_then(|members| members.get("crs"))
        .and_then(|crs| crs.get("properties"))
        .and_then(|props| props.get("name"))
        .and_then(|name| name.as_str())
        .map(Crs::new)
        .unwrap_or_else(Crs::search);

    let geometries = geometries
        .into_iter()
        .map(Geometry::<f64>::try_from)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| Error::unreadable(path, e))?;

    Ok(VectorLayer { geometries, crs })
}

fn read_wkt(path: &Path) -> Result<VectorLayer, Error> {
    let content = fs::read_to_string(path).map_err(|e| Error::unreadable(path, e))?;
    let geometry = Geometry::<f64>::try_from_wkt_str(content.trim())
        .map_err(|e| Error::unreadable(path, e))?;
    Ok(VectorLayer {
        geometries: vec![geometry],
        crs: Crs::search(),
    })
}

fn read_shapefile(path: &Path) -> Result<VectorLayer, Error> {
    let shapes = shapefile::read_shapes(path).map_err(|e| Error::unreadable(path, e))?;

    let prj = path.with_extension("prj");
    let crs = if prj.exists() {
        let definition = fs::read_to_string(&prj).map_err(|e| Error::unreadable(&prj, e))?;
        Crs::new(&definition)
    } else {
        Crs::search()
    };

    let mut geometries = vec![];
    for shape in shapes {
        if let Some(geometry) = shape_to_geometry(shape).map_err(|e| Error::unreadable(path, e))? {
            geometries.push(geometry);
        }
    }
    Ok(VectorLayer { geometries, crs })
}

/// Reads the first layer of a GeoPackage through GDAL.
#[cfg(feature = "gpkg")]
fn read_geopackage(path: &Path) -> Result<VectorLayer, Error> {
    use gdal::vector::LayerAccess;
    use gdal::Dataset;

    let dataset = Dataset::open(path).map_err(|e| Error::unreadable(path, e))?;
    let mut layer = dataset.layer(0).map_err(|e| Error::unreadable(path, e))?;

    let crs = match layer.spatial_ref() {
        Some(srs) => match (srs.auth_name(), srs.auth_code()) {
            (Ok(name), Ok(code)) => Crs::new(&format!("{name}:{code}")),
            _ => Crs::new(&srs.to_wkt().map_err(|e| Error::unreadable(path, e))?),
        },
        None => Crs::search(),
    };

    let mut geometries = vec![];
    for feature in layer.features() {
        let Some(geometry) = feature.geometry() else {
            continue;
        };
        let wkt = geometry.wkt().map_err(|e| Error::unreadable(path, e))?;
        let geometry =
            Geometry::<f64>::try_from_wkt_str(&wkt).map_err(|e| Error::unreadable(path, e))?;
        geometries.push(geometry);
    }
    Ok(VectorLayer { geometries, crs })
}

#[cfg(not(feature = "gpkg"))]
fn read_geopackage(path: &Path) -> Result<VectorLayer, Error> {
    Err(Error::unreadable(
        path,
        "GeoPackage support requires building with the `gpkg` feature",
    ))
}

trait XY {
    fn coord(&self) -> Coord<f64>;
}

impl XY for shapefile::Point {
    fn coord(&self) -> Coord<f64> {
        Coord { x: self.x, y: self.y }
    }
}
impl XY for shapefile::PointM {
    fn coord(&self) -> Coord<f64> {
        Coord { x: self.x, y: self.y }
    }
}
impl XY for shapefile::PointZ {
    fn coord(&self) -> Coord<f64> {
        Coord { x: self.x, y: self.y }
    }
}

fn line<P: XY>(points: &[P]) -> LineString<f64> {
    LineString::new(points.iter().map(XY::coord).collect())
}

fn polygons<P: XY>(rings: &[shapefile::PolygonRing<P>]) -> Result<MultiPolygon<f64>, &'static str> {
    let mut polygons: Vec<Polygon<f64>> = vec![];
    for ring in rings {
        match ring {
            shapefile::PolygonRing::Outer(points) => {
                polygons.push(Polygon::new(line(points), vec![]));
            }
            shapefile::PolygonRing::Inner(points) => {
                let outer = polygons
                    .last_mut()
                    .ok_or("inner ring found before any outer ring")?;
                outer.interiors_push(line(points));
            }
        }
    }
    Ok(MultiPolygon::new(polygons))
}

fn multipoint<P: XY>(points: &[P]) -> MultiPoint<f64> {
    MultiPoint::new(points.iter().map(|p| Point::from(p.coord())).collect())
}

fn multiline<P: XY>(parts: &[Vec<P>]) -> MultiLineString<f64> {
    MultiLineString::new(parts.iter().map(|part| line(part)).collect())
}

fn shape_to_geometry(shape: shapefile::Shape) -> Result<Option<Geometry<f64>>, &'static str> {
    use shapefile::Shape;
    let geometry = match shape {
        Shape::NullShape => return Ok(None),
        Shape::Point(p) => Geometry::Point(p.coord().into()),
        Shape::PointM(p) => Geometry::Point(p.coord().into()),
        Shape::PointZ(p) => Geometry::Point(p.coord().into()),
        Shape::Polyline(g) => Geometry::MultiLineString(multiline(g.parts())),
        Shape::PolylineM(g) => Geometry::MultiLineString(multiline(g.parts())),
        Shape::PolylineZ(g) => Geometry::MultiLineString(multiline(g.parts())),
        Shape::Polygon(g) => Geometry::MultiPolygon(polygons(g.rings())?),
        Shape::PolygonM(g) => Geometry::MultiPolygon(polygons(g.rings())?),
        Shape::PolygonZ(g) => Geometry::MultiPolygon(polygons(g.rings())?),
        Shape::Multipoint(g) => Geometry::MultiPoint(multipoint(g.points())),
        Shape::MultipointM(g) => Geometry::MultiPoint(multipoint(g.points())),
        Shape::MultipointZ(g) => Geometry::MultiPoint(multipoint(g.points())),
        Shape::Multipatch(_) => return Err("multipatch shapes are not supported"),
    };
    Ok(Some(geometry))
}
