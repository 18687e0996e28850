//! EODMS collections and the per-collection vocabularies used to validate
//! filters, build queries and scrape record metadata.
use clap::ValueEnum;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum Collection {
    #[value(name = "Radarsat")]
    Radarsat,
    #[value(name = "Radarsat2")]
    Radarsat2,
    #[value(name = "RCMImageProducts")]
    Rcm,
    #[value(name = "NAPL")]
    Napl,
    #[value(name = "PlanetScope")]
    PlanetScope,
}

/// Filters whose values come from a fixed vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnumFilter {
    Polarization,
    ProductFormat,
    OrbitDirection,
    LookDirection,
    RcmSatellite,
}

const RCM_POLARIZATIONS: &[&str] = &[
    "CH+CV", "HH", "HH+HV", "HH+HV+VH+VV", "HH+VV", "HV", "VH", "VH+VV", "VV",
];
const RS2_POLARIZATIONS: &[&str] = &["HH", "HH+HV", "HH+HV+VH+VV", "HH+VV", "HV", "VH", "VH+VV", "VV"];
const RS1_POLARIZATIONS: &[&str] = &["HH"];
const PRODUCT_FORMATS: &[&str] = &["GeoTIFF", "NITF21"];
const ORBIT_DIRECTIONS: &[&str] = &["Ascending", "Descending"];
const LOOK_DIRECTIONS: &[&str] = &["Left", "Right"];
const RCM_SATELLITES: &[&str] = &["RCM1", "RCM2", "RCM3"];

const RCM_META_KEYS: &[&str] = &[
    "recordId",
    "title",
    "Acquisition Start Date",
    "Acquisition End Date",
    "Satellite ID",
    "Beam Mnemonic",
    "Beam Mode Type",
    "Beam Mode Description",
    "Beam Mode Version",
    "Spatial Resolution",
    "Polarization Data Mode",
    "Polarization",
    "Polarization in Product",
    "Number of Azimuth Looks",
    "Number of Range Looks",
    "Incidence Angle (Low)",
    "Incidence Angle (High)",
    "Orbit Direction",
    "LUT Applied",
    "Product Format",
    "Product Type",
    "Product Ellipsoid",
    "Sample Type",
    "Sampled Pixel Spacing",
    "Data Type",
    "Relative Orbit",
    "Absolute Orbit",
    "Orbit Data Source",
];

const RADARSAT_META_KEYS: &[&str] = &[
    "recordId",
    "title",
    "Acquisition Start Date",
    "Acquisition End Date",
    "Beam Mnemonic",
    "Beam Mode Type",
    "Polarization",
    "Incidence Angle (Low)",
    "Incidence Angle (High)",
    "Orbit Direction",
    "Look Orientation",
    "Product Type",
    "Relative Orbit",
    "Absolute Orbit",
];

const OPTICAL_META_KEYS: &[&str] = &[
    "recordId",
    "title",
    "Acquisition Start Date",
    "Acquisition End Date",
    "Product Type",
];

impl Collection {
    /// Identifier used by the EODMS REST API.
    pub fn id(&self) -> &'static str {
        match self {
            Self::Radarsat => "Radarsat",
            Self::Radarsat2 => "Radarsat2",
            Self::Rcm => "RCMImageProducts",
            Self::Napl => "NAPL",
            Self::PlanetScope => "PlanetScope",
        }
    }

    /// Table prefix of collection-specific query fields.
    pub fn table(&self) -> &'static str {
        match self {
            Self::Radarsat => "RSAT1",
            Self::Radarsat2 => "RSAT2",
            Self::Rcm => "RCM",
            Self::Napl => "NAPL",
            Self::PlanetScope => "PLANETSCOPE",
        }
    }

    /// Allowed tokens for an enumerated filter. Attributes that do not apply to
    /// a collection fall back to the full vocabulary so they pass through.
    pub fn allowed(&self, filter: EnumFilter) -> &'static [&'static str] {
        match (self, filter) {
            (Self::Rcm, EnumFilter::Polarization) => RCM_POLARIZATIONS,
            (Self::Radarsat2, EnumFilter::Polarization) => RS2_POLARIZATIONS,
            (Self::Radarsat, EnumFilter::Polarization) => RS1_POLARIZATIONS,
            (Self::Napl | Self::PlanetScope, EnumFilter::Polarization) => RCM_POLARIZATIONS,
            (_, EnumFilter::ProductFormat) => PRODUCT_FORMATS,
            (_, EnumFilter::OrbitDirection) => ORBIT_DIRECTIONS,
            (_, EnumFilter::LookDirection) => LOOK_DIRECTIONS,
            (_, EnumFilter::RcmSatellite) => RCM_SATELLITES,
        }
    }

    /// Metadata fields scraped for each record of the collection.
    pub fn meta_keys(&self) -> &'static [&'static str] {
        match self {
            Self::Rcm => RCM_META_KEYS,
            Self::Radarsat | Self::Radarsat2 => RADARSAT_META_KEYS,
            Self::Napl | Self::PlanetScope => OPTICAL_META_KEYS,
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_parse_case_insensitively() {
        let rcm = Collection::from_str("rcmimageproducts", true).unwrap();
        assert_eq!(rcm, Collection::Rcm);
        assert_eq!(rcm.id(), "RCMImageProducts");
    }

    #[test]
    fn test_compact_polarization_is_rcm_only() {
        assert!(Collection::Rcm
            .allowed(EnumFilter::Polarization)
            .contains(&"CH+CV"));
        assert!(!Collection::Radarsat2
            .allowed(EnumFilter::Polarization)
            .contains(&"CH+CV"));
    }

    #[test]
    fn test_every_collection_scrapes_id_and_title() {
        for collection in Collection::value_variants() {
            let keys = collection.meta_keys();
            assert_eq!(&keys[..2], &["recordId", "title"]);
        }
    }
}
