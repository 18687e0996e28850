use super::crs::{Crs, Reprojector};
use crate::error::Error;
use geo::Polygon;

/// Transformation applied to every footprint of a result set.
#[derive(Debug)]
pub enum FootprintTransformer {
    /// Footprints stay in the source reference system.
    Identity,
    Reproject(Box<Reprojector>),
}

impl FootprintTransformer {
    pub fn new(source: &Crs, target: Option<&Crs>) -> Result<Self, Error> {
        match target {
            None => Ok(Self::Identity),
            Some(target) => Ok(Self::Reproject(Box::new(Reprojector::new(source, target)?))),
        }
    }

    pub fn apply(&self, footprint: Polygon<f64>) -> Result<Polygon<f64>, Error> {
        match self {
            Self::Identity => Ok(footprint),
            // exterior and interior rings alike; map_coords keeps rings closed
            Self::Reproject(reprojector) => reprojector.polygon(&footprint),
        }
    }
}

/// Transforms a single footprint from `source` into `target`, or returns it
/// untouched when no target is given.
pub fn transform(
    footprint: &Polygon<f64>,
    source: &Crs,
    target: Option<&Crs>,
) -> Result<Polygon<f64>, Error> {
    FootprintTransformer::new(source, target)?.apply(footprint.clone())
}
