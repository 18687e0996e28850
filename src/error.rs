use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unable to read vector features from {path}: {reason}")]
    UnreadableInput { path: String, reason: String },

    #[error("Search geometry must be a polygon/multipolygon, got {0}")]
    UnsupportedGeometryType(String),

    #[error("Search geometry is too complex ({vertices} vertices, limit is {limit})")]
    GeometryTooComplex { vertices: usize, limit: usize },

    #[error("Unknown reference system: {0}")]
    UnknownReferenceSystem(String),

    #[error("Invalid value '{value}' for {filter}; allowed values: {}", .allowed.join(", "))]
    InvalidFilterValue {
        filter: &'static str,
        value: String,
        allowed: Vec<&'static str>,
    },

    #[error("Invalid time value '{0}' (expected YYYY-MM-DD[THH:MM:SS], RFC 3339, TODAY[-N] or NOW[-N])")]
    InvalidTimeToken(String),

    #[error("No EODMS credentials found (use --username/--password, EODMS_USERNAME/EODMS_PASSWORD, the config file or ~/.netrc)")]
    MissingCredentials,

    #[error("No ids found in file: {0}")]
    EmptyIdFile(String),

    #[error("EODMS request failed - HTTP-{status}: {url}")]
    Service { status: u16, url: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unable to clone request")]
    RequestClone,
}

impl Error {
    pub fn unreadable(path: impl AsRef<std::path::Path>, reason: impl ToString) -> Self {
        Error::UnreadableInput {
            path: path.as_ref().display().to_string(),
            reason: reason.to_string(),
        }
    }
}
