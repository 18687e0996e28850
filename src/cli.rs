use crate::collection::Collection;
use crate::error::Error;
use crate::params::FilterSet;
use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};

/// Query, order and download imagery from the EODMS REST API.
#[derive(Parser, Debug, Clone)]
#[command(name = "eodmsapi", version, about)]
pub struct Cli {
    /// EODMS username (leave blank to use the environment, config file or .netrc)
    #[arg(short, long)]
    pub username: Option<String>,

    /// EODMS password (leave blank to use the environment, config file or .netrc)
    #[arg(short, long)]
    pub password: Option<String>,

    /// EODMS collection to search
    #[arg(short, long, value_enum, ignore_case = true)]
    pub collection: Collection,

    /// Beginning of acquisition time window (default to 1 day prior to now)
    #[arg(short, long, default_value = "TODAY-1")]
    pub start: String,

    /// End of acquisition time window (default to now)
    #[arg(short, long, default_value = "TODAY")]
    pub end: String,

    /// File containing polygon used to constrain the query results to a spatial region
    #[arg(short, long)]
    pub geometry: Option<PathBuf>,

    /// Limit results to a certain image product type
    #[arg(long, visible_alias = "pt")]
    pub product_type: Option<String>,

    /// Limit results to a certain image product format (GeoTIFF, NITF21)
    #[arg(long, visible_alias = "pf")]
    pub product_format: Option<String>,

    /// Limit results to the desired relative orbit Id
    #[arg(long, visible_alias = "rel")]
    pub relative_orbit: Option<u32>,

    /// Limit results to the desired absolute orbit Id
    #[arg(long, visible_alias = "abs")]
    pub absolute_orbit: Option<u32>,

    /// Limit results to the desired incidence angle
    #[arg(long, visible_alias = "ia")]
    pub incidence_angle: Option<f64>,

    /// Limit SAR collection results to the desired beam mode
    #[arg(long, visible_alias = "rb")]
    pub radarsat_beam_mode: Option<String>,

    /// Limit SAR collection results to the desired beam mnemonic
    #[arg(long, visible_alias = "rm")]
    pub radarsat_beam_mnemonic: Option<String>,

    /// Limit SAR collection results to the desired polarization (e.g. HH, HH+HV, CH+CV)
    #[arg(long, visible_alias = "rp")]
    pub radarsat_polarization: Option<String>,

    /// Limit SAR collection results to the desired orbit type (Ascending, Descending)
    #[arg(long, visible_alias = "ro")]
    pub radarsat_orbit_direction: Option<String>,

    /// Limit SAR collection results to the desired antenna look direction (Left, Right)
    #[arg(long, visible_alias = "rl")]
    pub radarsat_look_direction: Option<String>,

    /// Limit SAR collection results to the desired downlink segment Id
    #[arg(long, visible_alias = "rd")]
    pub radarsat_downlink_segment_id: Option<String>,

    /// Limit RCM collection results to the desired satellite (RCM1, RCM2, RCM3)
    #[arg(long, visible_alias = "rs")]
    pub rcm_satellite: Option<String>,

    /// Reference system for result footprints (e.g. EPSG:3978); defaults to WGS84
    #[arg(long, visible_alias = "t-srs")]
    pub target_crs: Option<String>,

    /// Save the query results to a GeoJSON file
    #[arg(long)]
    pub dump_results: bool,

    /// Output file for --dump-results
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Submit an order to EODMS from the results of the current query parameters
    #[arg(long)]
    pub submit_order: bool,

    /// Specific record Id to order from the desired collection
    #[arg(long, group = "fast_path")]
    pub record_id: Option<String>,

    /// File of line-separated record Ids to order from the desired collection
    #[arg(long, group = "fast_path")]
    pub record_ids: Option<PathBuf>,

    /// Specific Order item Id to download from EODMS
    #[arg(long, group = "fast_path")]
    pub download_id: Option<String>,

    /// File of line-separated Order item Ids to download from EODMS
    #[arg(long, group = "fast_path")]
    pub download_ids: Option<PathBuf>,

    /// Directory for downloaded files
    #[arg(long)]
    pub download_dir: Option<PathBuf>,

    /// Configuration file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Use debug-level logging
    #[arg(long)]
    pub log_verbose: bool,
}

/// What one invocation does. Supplying record or item ids skips the search.
#[derive(Debug, Clone, PartialEq)]
pub enum Mode {
    Query,
    DirectOrder(Vec<String>),
    DirectDownload(Vec<String>),
}

impl Mode {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        if let Some(id) = &cli.record_id {
            return Ok(Mode::DirectOrder(vec![id.trim().to_string()]));
        }
        if let Some(path) = &cli.record_ids {
            return Ok(Mode::DirectOrder(read_ids(path)?));
        }
        if let Some(id) = &cli.download_id {
            return Ok(Mode::DirectDownload(vec![id.trim().to_string()]));
        }
        if let Some(path) = &cli.download_ids {
            return Ok(Mode::DirectDownload(read_ids(path)?));
        }
        Ok(Mode::Query)
    }
}

/// Reads non-empty lines of an id file.
pub fn read_ids(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Unable to read id file {}", path.display()))?;
    let ids: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    if ids.is_empty() {
        return Err(Error::EmptyIdFile(path.display().to_string()).into());
    }
    Ok(ids)
}

impl Cli {
    /// Filters as given on the command line. The geometry is normalized
    /// separately since it needs the AOI file read.
    pub fn filters(&self, geometry_wkt: Option<String>) -> FilterSet {
        FilterSet {
            start: Some(self.start.clone()),
            end: Some(self.end.clone()),
            geometry: geometry_wkt,
            product_type: self.product_type.clone(),
            product_format: self.product_format.clone(),
            relative_orbit: self.relative_orbit,
            absolute_orbit: self.absolute_orbit,
            incidence_angle: self.incidence_angle,
            beam_mode: self.radarsat_beam_mode.clone(),
            beam_mnemonic: self.radarsat_beam_mnemonic.clone(),
            polarization: self.radarsat_polarization.clone(),
            orbit_direction: self.radarsat_orbit_direction.clone(),
            look_direction: self.radarsat_look_direction.clone(),
            downlink_segment_id: self.radarsat_downlink_segment_id.clone(),
            rcm_satellite: self.rcm_satellite.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("eodmsapi").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&["-c", "RCMImageProducts"]);
        assert_eq!(cli.collection, Collection::Rcm);
        assert_eq!(cli.start, "TODAY-1");
        assert_eq!(cli.end, "TODAY");
        assert_eq!(Mode::from_cli(&cli).unwrap(), Mode::Query);
    }

    #[test]
    fn test_collection_is_case_insensitive() {
        let cli = parse(&["--collection", "radarsat2"]);
        assert_eq!(cli.collection, Collection::Radarsat2);
    }

    #[test]
    fn test_collection_is_required() {
        assert!(Cli::try_parse_from(["eodmsapi"]).is_err());
    }

    #[test]
    fn test_single_record_is_direct_order() {
        let cli = parse(&["-c", "Radarsat2", "--record-id", "123"]);
        assert_eq!(
            Mode::from_cli(&cli).unwrap(),
            Mode::DirectOrder(vec!["123".to_string()])
        );
    }

    #[test]
    fn test_id_file_is_direct_download() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "1001\n\n1002\n").unwrap();
        let path = file.path().to_str().unwrap();
        let cli = parse(&["-c", "RCMImageProducts", "--download-ids", path]);
        assert_eq!(
            Mode::from_cli(&cli).unwrap(),
            Mode::DirectDownload(vec!["1001".to_string(), "1002".to_string()])
        );
    }

    #[test]
    fn test_empty_id_file_fails() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap();
        let cli = parse(&["-c", "RCMImageProducts", "--record-ids", path]);
        let err = Mode::from_cli(&cli).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::EmptyIdFile(_))));
    }

    #[test]
    fn test_fast_paths_are_exclusive() {
        let result = Cli::try_parse_from([
            "eodmsapi",
            "-c",
            "RCMImageProducts",
            "--record-id",
            "1",
            "--download-id",
            "2",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_filters_carry_sar_options() {
        let cli = parse(&[
            "-c",
            "RCMImageProducts",
            "--radarsat-polarization",
            "HH+HV",
            "--rel",
            "12",
            "--rcm-satellite",
            "RCM2",
        ]);
        let filters = cli.filters(None);
        assert_eq!(filters.polarization.as_deref(), Some("HH+HV"));
        assert_eq!(filters.relative_orbit, Some(12));
        assert_eq!(filters.rcm_satellite.as_deref(), Some("RCM2"));
        assert!(filters.geometry.is_none());
    }
}
