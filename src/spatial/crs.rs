use crate::error::Error;
use geo::{Coord, MapCoords, Polygon};
use proj::Proj;
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// Reference system of every search geometry and every footprint EODMS returns.
pub const SEARCH_CRS: &str = "EPSG:4326";

fn epsg_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^(?:urn:ogc:def:crs:)?EPSG:{1,2}(?:[\d.]*:)?(?<code>\d+)$")
            .expect("Regex pattern should always compile")
    })
}

/// A reference system specifier understood by PROJ: an authority code
/// (`EPSG:32633`), a bare EPSG number, a PROJ string or a WKT definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Crs(String);

impl Crs {
    pub fn new(definition: &str) -> Self {
        let definition = definition.trim();
        if definition.chars().all(|c| c.is_ascii_digit()) && !definition.is_empty() {
            return Self(format!("EPSG:{definition}"));
        }
        if definition.eq_ignore_ascii_case("urn:ogc:def:crs:OGC:1.3:CRS84")
            || definition.eq_ignore_ascii_case("CRS84")
        {
            return Self(SEARCH_CRS.to_string());
        }
        if let Some(captures) = epsg_pattern().captures(definition) {
            return Self(format!("EPSG:{}", &captures["code"]));
        }
        if is_wgs84_geographic_wkt(definition) {
            return Self(SEARCH_CRS.to_string());
        }
        Self(definition.to_string())
    }

    pub fn search() -> Self {
        Self(SEARCH_CRS.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_search_crs(&self) -> bool {
        self.0 == SEARCH_CRS
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Shapefile .prj files carry ESRI WKT; plain WGS84 lon/lat is by far the common case.
fn is_wgs84_geographic_wkt(definition: &str) -> bool {
    let upper = definition.to_ascii_uppercase();
    upper.starts_with("GEOGCS[")
        && (upper.contains("WGS_1984") || upper.contains("WGS 84") || upper.contains("WGS84"))
}

/// Pointwise coordinate transformation between two reference systems, always
/// in longitude/latitude (x/y) axis order.
pub struct Reprojector {
    proj: Proj,
    source: Crs,
    target: Crs,
}

impl fmt::Debug for Reprojector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reprojector")
            .field("source", &self.source)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl Reprojector {
    pub fn new(source: &Crs, target: &Crs) -> Result<Self, Error> {
        for crs in [source, target] {
            Proj::new(crs.as_str())
                .map_err(|_| Error::UnknownReferenceSystem(crs.to_string()))?;
        }
        let proj = Proj::new_known_crs(source.as_str(), target.as_str(), None).map_err(|_| {
            Error::UnknownReferenceSystem(format!("{source} -> {target}"))
        })?;
        Ok(Self {
            proj,
            source: source.clone(),
            target: target.clone(),
        })
    }

    pub fn target(&self) -> &Crs {
        &self.target
    }

    pub fn convert(&self, coord: Coord<f64>) -> Result<Coord<f64>, Error> {
        let (x, y) = self
            .proj
            .convert((coord.x, coord.y))
            .map_err(|e| Error::UnknownReferenceSystem(format!("{}: {e}", self.target)))?;
        Ok(Coord { x, y })
    }

    pub fn polygon(&self, polygon: &Polygon<f64>) -> Result<Polygon<f64>, Error> {
        polygon.try_map_coords(|c| self.convert(c))
    }

    pub fn geometry(&self, geometry: &geo::Geometry<f64>) -> Result<geo::Geometry<f64>, Error> {
        geometry.try_map_coords(|c| self.convert(c))
    }
}
