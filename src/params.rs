//! Translation of user-supplied filters into EODMS query parameters.
use crate::collection::{Collection, EnumFilter};
use crate::error::Error;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

/// Optional search filters for one invocation. `None` means "not set".
#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    pub start: Option<String>,
    pub end: Option<String>,
    /// Normalized search geometry as WKT in the search reference system.
    pub geometry: Option<String>,
    pub product_type: Option<String>,
    pub product_format: Option<String>,
    pub relative_orbit: Option<u32>,
    pub absolute_orbit: Option<u32>,
    pub incidence_angle: Option<f64>,
    pub beam_mode: Option<String>,
    pub beam_mnemonic: Option<String>,
    pub polarization: Option<String>,
    pub orbit_direction: Option<String>,
    pub look_direction: Option<String>,
    pub downlink_segment_id: Option<String>,
    pub rcm_satellite: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Filter {
    Start,
    End,
    Geometry,
    ProductType,
    ProductFormat,
    RelativeOrbit,
    AbsoluteOrbit,
    IncidenceAngle,
    BeamMode,
    BeamMnemonic,
    Polarization,
    OrbitDirection,
    LookDirection,
    DownlinkSegmentId,
    RcmSatellite,
}

impl Filter {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::End => "end",
            Self::Geometry => "geometry",
            Self::ProductType => "product_type",
            Self::ProductFormat => "product_format",
            Self::RelativeOrbit => "relative_orbit",
            Self::AbsoluteOrbit => "absolute_orbit",
            Self::IncidenceAngle => "incidence_angle",
            Self::BeamMode => "beam_mode",
            Self::BeamMnemonic => "beam_mnemonic",
            Self::Polarization => "polarization",
            Self::OrbitDirection => "orbit_direction",
            Self::LookDirection => "look_direction",
            Self::DownlinkSegmentId => "downlink_segment_id",
            Self::RcmSatellite => "rcm_satellite",
        }
    }

    /// Fully-qualified EODMS query field.
    pub fn field(&self, collection: Collection) -> String {
        let table = collection.table();
        match self {
            Self::Start | Self::End => "CATALOG_IMAGE.START_DATETIME".to_string(),
            Self::Geometry => "CATALOG_IMAGE.THE_GEOM_4326".to_string(),
            Self::ProductType => "ARCHIVE_IMAGE.PRODUCT_TYPE".to_string(),
            Self::ProductFormat => "PRODUCT_FORMAT.FORMAT_NAME_E".to_string(),
            Self::RelativeOrbit => format!("{table}.ORBIT_REL"),
            Self::AbsoluteOrbit => format!("{table}.ORBIT_ABS"),
            Self::IncidenceAngle => format!("{table}.INCIDENCE_ANGLE"),
            Self::BeamMode => format!("{table}.SBEAM"),
            Self::BeamMnemonic => format!("{table}.BEAM_MNEMONIC"),
            Self::Polarization => format!("{table}.POLARIZATION"),
            Self::OrbitDirection => format!("{table}.ORBIT_DIRECTION"),
            Self::LookDirection => format!("{table}.ANTENNA_ORIENTATION"),
            Self::DownlinkSegmentId => format!("{table}.DOWNLINK_SEGMENT_ID"),
            Self::RcmSatellite => format!("{table}.SATELLITE_ID"),
        }
    }

    fn operator(&self) -> &'static str {
        match self {
            Self::Start => ">=",
            Self::End => "<=",
            Self::Geometry => " INTERSECTS ",
            _ => "=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    Text(String),
    Number(String),
    Timestamp(DateTime<Utc>),
    Wkt(String),
}

impl fmt::Display for QueryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Self::Number(n) => f.write_str(n),
            Self::Timestamp(t) => write!(f, "'{}'", t.format("%Y-%m-%dT%H:%M:%SZ")),
            Self::Wkt(w) => f.write_str(w),
        }
    }
}

/// Request parameters for one search; only filters that were set appear.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParams {
    params: BTreeMap<Filter, QueryValue>,
}

impl QueryParams {
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn get(&self, filter: Filter) -> Option<&QueryValue> {
        self.params.get(&filter)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Filter, &QueryValue)> {
        self.params.iter()
    }

    /// Renders the EODMS `query` expression, clauses joined with `AND`.
    pub fn to_query(&self, collection: Collection) -> String {
        self.params
            .iter()
            .map(|(filter, value)| format!("{}{}{}", filter.field(collection), filter.operator(), value))
            .collect::<Vec<_>>()
            .join(" AND ")
    }
}

fn relative_time_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^(?:today|now)(?:\s*-\s*(?<days>\d+))?$")
            .expect("Regex pattern should always compile")
    })
}

/// Resolves an absolute timestamp or a relative `TODAY[-N]`/`NOW[-N]` token
/// (N in days) against `now`.
pub fn resolve_time(token: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, Error> {
    let token = token.trim();
    if let Some(captures) = relative_time_pattern().captures(token) {
        let days = match captures.name("days") {
            Some(days) => days
                .as_str()
                .parse::<i64>()
                .map_err(|_| Error::InvalidTimeToken(token.to_string()))?,
            None => 0,
        };
        return Duration::try_days(days)
            .and_then(|offset| now.checked_sub_signed(offset))
            .ok_or_else(|| Error::InvalidTimeToken(token.to_string()));
    }
    if let Ok(t) = DateTime::parse_from_rfc3339(token) {
        return Ok(t.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(t) = NaiveDateTime::parse_from_str(token, format) {
            return Ok(t.and_utc());
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(token, "%Y-%m-%d") {
        if let Some(t) = d.and_hms_opt(0, 0, 0) {
            return Ok(t.and_utc());
        }
    }
    Err(Error::InvalidTimeToken(token.to_string()))
}

fn validate(
    collection: Collection,
    filter: Filter,
    kind: EnumFilter,
    value: &str,
) -> Result<QueryValue, Error> {
    let allowed = collection.allowed(kind);
    allowed
        .iter()
        .find(|token| token.eq_ignore_ascii_case(value.trim()))
        .map(|token| QueryValue::Text(token.to_string()))
        .ok_or_else(|| Error::InvalidFilterValue {
            filter: filter.name(),
            value: value.to_string(),
            allowed: allowed.to_vec(),
        })
}

/// Builds the parameter set for `collection` from the filters that are set.
/// Relative time tokens are resolved here, once, against `now`.
pub fn build_params(
    filters: &FilterSet,
    collection: Collection,
    now: DateTime<Utc>,
) -> Result<QueryParams, Error> {
    let mut params = BTreeMap::new();

    let text = |value: &Option<String>| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    if let Some(start) = text(&filters.start) {
        params.insert(Filter::Start, QueryValue::Timestamp(resolve_time(&start, now)?));
    }
    if let Some(end) = text(&filters.end) {
        params.insert(Filter::End, QueryValue::Timestamp(resolve_time(&end, now)?));
    }
    if let Some(wkt) = text(&filters.geometry) {
        params.insert(Filter::Geometry, QueryValue::Wkt(wkt));
    }
    if let Some(v) = text(&filters.product_type) {
        params.insert(Filter::ProductType, QueryValue::Text(v));
    }
    if let Some(v) = text(&filters.product_format) {
        let value = validate(collection, Filter::ProductFormat, EnumFilter::ProductFormat, &v)?;
        params.insert(Filter::ProductFormat, value);
    }
    if let Some(v) = filters.relative_orbit {
        params.insert(Filter::RelativeOrbit, QueryValue::Number(v.to_string()));
    }
    if let Some(v) = filters.absolute_orbit {
        params.insert(Filter::AbsoluteOrbit, QueryValue::Number(v.to_string()));
    }
    if let Some(v) = filters.incidence_angle {
        if !v.is_finite() {
            return Err(Error::InvalidFilterValue {
                filter: Filter::IncidenceAngle.name(),
                value: v.to_string(),
                allowed: vec!["any finite angle in degrees"],
            });
        }
        params.insert(Filter::IncidenceAngle, QueryValue::Number(v.to_string()));
    }
    if let Some(v) = text(&filters.beam_mode) {
        params.insert(Filter::BeamMode, QueryValue::Text(v));
    }
    if let Some(v) = text(&filters.beam_mnemonic) {
        params.insert(Filter::BeamMnemonic, QueryValue::Text(v));
    }
    if let Some(v) = text(&filters.polarization) {
        let value = validate(collection, Filter::Polarization, EnumFilter::Polarization, &v)?;
        params.insert(Filter::Polarization, value);
    }
    if let Some(v) = text(&filters.orbit_direction) {
        let value = validate(collection, Filter::OrbitDirection, EnumFilter::OrbitDirection, &v)?;
        params.insert(Filter::OrbitDirection, value);
    }
    if let Some(v) = text(&filters.look_direction) {
        let value = validate(collection, Filter::LookDirection, EnumFilter::LookDirection, &v)?;
        params.insert(Filter::LookDirection, value);
    }
    if let Some(v) = text(&filters.downlink_segment_id) {
        params.insert(Filter::DownlinkSegmentId, QueryValue::Text(v));
    }
    if let Some(v) = text(&filters.rcm_satellite) {
        let value = validate(collection, Filter::RcmSatellite, EnumFilter::RcmSatellite, &v)?;
        params.insert(Filter::RcmSatellite, value);
    }

    Ok(QueryParams { params })
}
